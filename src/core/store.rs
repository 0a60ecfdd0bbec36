use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, Holding, Transaction, TransactionKind};

/// Errors that can occur when reading from or writing to a ledger store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced account does not exist.
    AccountNotFound(Uuid),
    /// The referenced transaction does not exist.
    TransactionNotFound(Uuid),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::AccountNotFound(id) => write!(f, "account not found: {id}"),
            StoreError::TransactionNotFound(id) => write!(f, "transaction not found: {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Income, expense and invested sums for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub income: Decimal,
    pub expense: Decimal,
    pub invested: Decimal,
}

/// Abstraction over the ledger's persistence, replacing the source's
/// hardcoded arrays with an injectable seam.
pub trait LedgerStore {
    /// All accounts, in insertion order.
    fn accounts(&self) -> Vec<Account>;
    /// Looks up a single account.
    fn account(&self, id: Uuid) -> Result<Account, StoreError>;
    /// All committed transactions, in commit order.
    fn transactions(&self) -> Vec<Transaction>;
    /// Committed transactions on `account_id` with dates in `[start, end]`.
    fn transactions_between(
        &self,
        account_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Transaction>;
    /// All holdings.
    fn holdings(&self) -> Vec<Holding>;
    /// Appends a transaction and applies its signed amount to the account
    /// balance.
    fn append_transaction(&mut self, txn: Transaction) -> Result<(), StoreError>;
    /// Replaces the category of a committed transaction. The only permitted
    /// mutation of committed entries.
    fn correct_category(&mut self, id: Uuid, category: String) -> Result<(), StoreError>;
}

/// In-memory ledger store seeded at construction time.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    holdings: Vec<Holding>,
}

impl MemoryStore {
    pub fn new(
        accounts: Vec<Account>,
        transactions: Vec<Transaction>,
        holdings: Vec<Holding>,
    ) -> Self {
        Self {
            accounts,
            transactions,
            holdings,
        }
    }

    /// Sum of balances over liquid accounts (bank and e-wallet).
    pub fn liquid_balance(&self) -> Decimal {
        self.accounts
            .iter()
            .filter(|a| a.kind.is_liquid())
            .map(|a| a.balance)
            .sum()
    }

    /// Income/expense/invested totals for the given calendar month.
    pub fn monthly_totals(&self, year: i32, month: u32) -> MonthlyTotals {
        let mut totals = MonthlyTotals {
            income: Decimal::ZERO,
            expense: Decimal::ZERO,
            invested: Decimal::ZERO,
        };
        for txn in &self.transactions {
            if txn.date.year() != year || txn.date.month() != month {
                continue;
            }
            match txn.kind {
                TransactionKind::Income => totals.income += txn.amount,
                TransactionKind::Expense => totals.expense += txn.amount,
                TransactionKind::Investment => totals.invested += txn.amount,
                TransactionKind::Transfer => {}
            }
        }
        totals
    }

}

impl LedgerStore for MemoryStore {
    fn accounts(&self) -> Vec<Account> {
        self.accounts.clone()
    }

    fn account(&self, id: Uuid) -> Result<Account, StoreError> {
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::AccountNotFound(id))
    }

    fn transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    fn transactions_between(
        &self,
        account_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.account_id == account_id && t.date >= start && t.date <= end)
            .cloned()
            .collect()
    }

    fn holdings(&self) -> Vec<Holding> {
        self.holdings.clone()
    }

    fn append_transaction(&mut self, txn: Transaction) -> Result<(), StoreError> {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.id == txn.account_id)
            .ok_or(StoreError::AccountNotFound(txn.account_id))?;
        account.balance += txn.signed_amount();
        self.transactions.push(txn);
        Ok(())
    }

    fn correct_category(&mut self, id: Uuid, category: String) -> Result<(), StoreError> {
        let txn = self
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::TransactionNotFound(id))?;
        txn.category = category;
        Ok(())
    }
}
