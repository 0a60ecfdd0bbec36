use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use super::categories::{CategoryMapper, MatchConfidence};
use super::dedup::{DedupCandidate, DedupConfig, find_duplicate};
use super::{
    BatchSummary, ImportBatch, ImportCandidateRow, ImportError, ParseFailure, RawRow, RowStatus,
};
use crate::core::{LedgerStore, Transaction, TransactionKind, TransactionSource};

/// Reconciles raw statement rows against a ledger snapshot, producing a
/// reviewable batch.
///
/// Rows are processed in input order so row numbering is deterministic:
/// parse failures are recorded and excluded, unmappable rows are kept as
/// `MappingFailed`, and mapped rows are checked for duplicates against the
/// snapshot and against earlier accepted rows of the same batch. Summary
/// counts are computed once at the end.
pub fn reconcile(
    raw_rows: &[RawRow],
    account_id: Uuid,
    ledger_snapshot: &[Transaction],
    mapper: &CategoryMapper,
    config: &DedupConfig,
) -> ImportBatch {
    let mut rows = Vec::new();
    let mut parse_failures = Vec::new();
    // Ephemeral transactions for rows accepted earlier in this batch, so a
    // statement that lists the same payment twice is caught too.
    let mut accepted_in_batch: Vec<Transaction> = Vec::new();

    for (idx, raw) in raw_rows.iter().enumerate() {
        let row_number = idx + 1;
        let (date, amount, kind) = match parse_row(raw) {
            Ok(fields) => fields,
            Err(reason) => {
                debug!(row_number, %reason, "Excluding unparseable row");
                parse_failures.push(ParseFailure { row_number, reason });
                continue;
            }
        };

        let mapped = mapper.map(&raw.category);
        let mut row = ImportCandidateRow {
            row_number,
            date,
            kind,
            raw_category: raw.category.clone(),
            mapped_category: mapped.category,
            amount,
            merchant: raw.merchant.clone(),
            description: raw.description.clone(),
            dedup_suspect_of: None,
            status: RowStatus::Ready,
        };

        if mapped.confidence == MatchConfidence::None {
            row.status = RowStatus::MappingFailed;
            rows.push(row);
            continue;
        }

        let candidate = DedupCandidate {
            account_id,
            date,
            amount,
            category: row.mapped_category.as_deref(),
            merchant: &row.merchant,
        };
        if let Some(existing) = find_duplicate(&candidate, ledger_snapshot, config) {
            row.dedup_suspect_of = Some(existing);
            row.status = RowStatus::DuplicateSuspect;
        } else if find_duplicate(&candidate, &accepted_in_batch, config).is_some() {
            // Intra-file duplicate; there is no committed transaction to
            // reference yet.
            row.status = RowStatus::DuplicateSuspect;
        } else if let Ok(txn) = to_transaction(&row, account_id, None) {
            accepted_in_batch.push(txn);
        }
        rows.push(row);
    }

    let summary = summarize(&rows, parse_failures.len());
    info!(
        total = raw_rows.len(),
        ready = summary.ready,
        duplicate_suspect = summary.duplicate_suspect,
        mapping_failed = summary.mapping_failed,
        parse_errors = summary.parse_errors,
        "Reconciled import batch"
    );
    ImportBatch {
        rows,
        parse_failures,
        summary,
    }
}

/// Human review decisions applied when committing a batch. Row numbers
/// refer to [`ImportCandidateRow::row_number`].
#[derive(Debug, Default, Clone)]
pub struct CommitOverrides {
    /// Duplicate suspects confirmed as genuine, to be committed anyway.
    pub accept_duplicates: BTreeSet<usize>,
    /// Human-supplied categories for mapping-failed rows.
    pub resolved_categories: BTreeMap<usize, String>,
}

/// Commits a reviewed batch into the store, all-or-nothing.
///
/// Ready rows commit as-is; duplicate suspects and mapping failures commit
/// only with an explicit override. Every transaction is validated before
/// the first one is appended, so a bad override leaves the store untouched.
/// Returns the ids of the committed transactions. Rows without an override
/// are discarded, never silently persisted.
pub fn commit_batch(
    store: &mut dyn LedgerStore,
    batch: &ImportBatch,
    account_id: Uuid,
    overrides: &CommitOverrides,
) -> Result<Vec<Uuid>, ImportError> {
    let known: BTreeSet<usize> = batch.rows.iter().map(|r| r.row_number).collect();
    for number in overrides
        .accept_duplicates
        .iter()
        .chain(overrides.resolved_categories.keys())
    {
        if !known.contains(number) {
            return Err(ImportError::UnknownRow(*number));
        }
    }
    store.account(account_id)?;

    let mut pending = Vec::new();
    for row in &batch.rows {
        let accepted = match row.status {
            RowStatus::Ready => Some(None),
            RowStatus::DuplicateSuspect if overrides.accept_duplicates.contains(&row.row_number) => {
                Some(None)
            }
            RowStatus::MappingFailed => overrides
                .resolved_categories
                .get(&row.row_number)
                .map(|category| Some(category.clone())),
            _ => None,
        };
        if let Some(category_override) = accepted {
            pending.push(to_transaction(row, account_id, category_override)?);
        }
    }

    let mut committed = Vec::with_capacity(pending.len());
    for txn in pending {
        let id = txn.id;
        store.append_transaction(txn)?;
        committed.push(id);
    }
    info!(account_id = %account_id, committed = committed.len(), "Committed import batch");
    Ok(committed)
}

fn parse_row(raw: &RawRow) -> Result<(NaiveDate, Decimal, TransactionKind), String> {
    let date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date: {}", raw.date))?;
    let amount = Decimal::from_str(raw.amount.trim())
        .map_err(|_| format!("invalid amount: {}", raw.amount))?;
    if amount < Decimal::ZERO {
        return Err(format!("negative amount: {}", raw.amount));
    }
    let kind = match raw.kind.trim() {
        "" | "expense" => TransactionKind::Expense,
        "income" => TransactionKind::Income,
        "investment" => TransactionKind::Investment,
        "transfer" => TransactionKind::Transfer,
        other => return Err(format!("unknown transaction kind: {other}")),
    };
    Ok((date, amount, kind))
}

fn to_transaction(
    row: &ImportCandidateRow,
    account_id: Uuid,
    category_override: Option<String>,
) -> Result<Transaction, ImportError> {
    let category = match category_override.or_else(|| row.mapped_category.clone()) {
        Some(category) => category,
        None => return Err(ImportError::UnresolvedCategory(row.row_number)),
    };
    Transaction::new(
        row.date,
        account_id,
        row.kind,
        row.amount,
        category,
        row.merchant.clone(),
        row.description.clone(),
        TransactionSource::Imported,
    )
    .map_err(ImportError::Transaction)
}

fn summarize(rows: &[ImportCandidateRow], parse_errors: usize) -> BatchSummary {
    let mut summary = BatchSummary {
        ready: 0,
        duplicate_suspect: 0,
        mapping_failed: 0,
        parse_errors,
    };
    for row in rows {
        match row.status {
            RowStatus::Ready => summary.ready += 1,
            RowStatus::DuplicateSuspect => summary.duplicate_suspect += 1,
            RowStatus::MappingFailed => summary.mapping_failed += 1,
        }
    }
    summary
}
