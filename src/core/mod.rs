//! Core ledger data model: accounts, transactions, holdings.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod policy;
pub mod store;

pub use policy::{AllocationTarget, ContributionFrequency, PolicyError, PolicySettings};
pub use store::{LedgerStore, MemoryStore, StoreError};

/// Kind of account holding money. Closed set; every consumer matches
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Bank,
    EWallet,
    Brokerage,
}

impl AccountKind {
    /// Liquid accounts count toward the cash reserve used by stage
    /// evaluation; brokerage balances do not.
    pub fn is_liquid(self) -> bool {
        matches!(self, AccountKind::Bank | AccountKind::EWallet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Expense,
    Income,
    Investment,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Manual,
    Imported,
}

/// Errors that can occur when creating a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The amount provided is negative; sign is implied by the kind.
    NegativeAmount,
    /// The canonical category is empty.
    MissingCategory,
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionError::NegativeAmount => write!(f, "amount must not be negative"),
            TransactionError::MissingCategory => {
                write!(f, "transaction requires a canonical category")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

/// An account holding a balance. The balance is only ever mutated by
/// applying transactions through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    /// ISO 4217 currency code (e.g. CNY).
    pub currency: String,
    pub balance: Decimal,
}

impl Account {
    pub fn new(name: impl Into<String>, kind: AccountKind, currency: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            currency: currency.into(),
            balance: Decimal::ZERO,
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }
}

/// A committed ledger entry. Immutable once committed except for category
/// correction, which goes through [`LedgerStore::correct_category`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for this transaction.
    pub id: Uuid,
    pub date: NaiveDate,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    /// Non-negative amount; the sign applied to the balance is implied by
    /// `kind`.
    pub amount: Decimal,
    /// Canonical category from the closed taxonomy.
    pub category: String,
    /// Free-text merchant as it appeared on the statement.
    pub merchant: String,
    pub description: String,
    pub source: TransactionSource,
}

impl Transaction {
    /// Creates a transaction after validating the amount and category.
    pub fn new(
        date: NaiveDate,
        account_id: Uuid,
        kind: TransactionKind,
        amount: Decimal,
        category: impl Into<String>,
        merchant: impl Into<String>,
        description: impl Into<String>,
        source: TransactionSource,
    ) -> Result<Self, TransactionError> {
        if amount < Decimal::ZERO {
            return Err(TransactionError::NegativeAmount);
        }
        let category = category.into();
        if category.trim().is_empty() {
            return Err(TransactionError::MissingCategory);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            date,
            account_id,
            kind,
            amount,
            category,
            merchant: merchant.into(),
            description: description.into(),
            source,
        })
    }

    /// Amount as applied to the account balance: expenses and investments
    /// debit, income credits, transfers credit the receiving account.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Expense | TransactionKind::Investment => -self.amount,
            TransactionKind::Income | TransactionKind::Transfer => self.amount,
        }
    }
}

/// A position held in a brokerage account. Market value and profit are
/// always derived from quantity and price, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: Uuid,
    pub account_id: Uuid,
    pub asset_type: String,
    pub symbol: String,
    pub name: String,
    pub quantity: Decimal,
    /// Cumulative acquisition cost.
    pub cost_basis: Decimal,
    pub current_price: Decimal,
}

impl Holding {
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    pub fn profit(&self) -> Decimal {
        self.market_value() - self.cost_basis
    }

    /// Profit relative to cost basis; `None` when the cost basis is zero.
    pub fn profit_rate(&self) -> Option<Decimal> {
        if self.cost_basis.is_zero() {
            None
        } else {
            Some(self.profit() / self.cost_basis)
        }
    }
}

/// Aggregate view over a set of holdings, as shown on the portfolio page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_cost: Decimal,
    pub total_market_value: Decimal,
    pub total_profit: Decimal,
    /// `None` when no cost has been incurred.
    pub profit_rate: Option<Decimal>,
}

/// Computes cost, market value and cumulative profit over `holdings`.
pub fn portfolio_summary(holdings: &[Holding]) -> PortfolioSummary {
    let total_cost: Decimal = holdings.iter().map(|h| h.cost_basis).sum();
    let total_market_value: Decimal = holdings.iter().map(|h| h.market_value()).sum();
    let total_profit = total_market_value - total_cost;
    let profit_rate = if total_cost.is_zero() {
        None
    } else {
        Some(total_profit / total_cost)
    };
    PortfolioSummary {
        total_cost,
        total_market_value,
        total_profit,
        profit_rate,
    }
}
