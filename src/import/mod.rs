//! Statement import: category mapping, duplicate detection and the
//! reconciliation pipeline that turns raw rows into a reviewable batch.

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{StoreError, TransactionError, TransactionKind};

pub mod categories;
pub mod dedup;
pub mod reconcile;

pub use categories::{CategoryMapper, MappedCategory, MatchConfidence};
pub use dedup::DedupConfig;
pub use reconcile::{CommitOverrides, commit_batch, reconcile};

/// Errors raised while reading statement files or committing a batch.
#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    /// The statement file could not be parsed at all.
    Parse(String),
    /// A row override referenced a row number not present in the batch.
    UnknownRow(usize),
    /// A mapping-failed row was accepted without a human-supplied category.
    UnresolvedCategory(usize),
    Transaction(TransactionError),
    Store(StoreError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(e) => write!(f, "io error: {e}"),
            ImportError::Parse(e) => write!(f, "parse error: {e}"),
            ImportError::UnknownRow(n) => write!(f, "no row {n} in this batch"),
            ImportError::UnresolvedCategory(n) => {
                write!(f, "row {n} has no category; supply one before committing")
            }
            ImportError::Transaction(e) => write!(f, "transaction error: {e}"),
            ImportError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(e) => Some(e),
            ImportError::Transaction(e) => Some(e),
            ImportError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(e: std::io::Error) -> Self {
        ImportError::Io(e)
    }
}

impl From<TransactionError> for ImportError {
    fn from(e: TransactionError) -> Self {
        ImportError::Transaction(e)
    }
}

impl From<StoreError> for ImportError {
    fn from(e: StoreError) -> Self {
        ImportError::Store(e)
    }
}

/// One already-tokenized statement row, all fields still text. Parsing into
/// typed fields happens inside the pipeline so a bad row becomes a recorded
/// parse failure instead of aborting the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    pub date: String,
    pub amount: String,
    /// Transaction kind as exported by the statement; empty means expense.
    #[serde(default)]
    pub kind: String,
    pub category: String,
    #[serde(default)]
    pub merchant: String,
    #[serde(default)]
    pub description: String,
}

/// Review status of a candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Parsed, mapped and not suspected of duplication; commits without
    /// further review.
    Ready,
    /// Provisionally matched against an existing transaction; needs human
    /// confirmation.
    DuplicateSuspect,
    /// No canonical category could be derived; needs a human-supplied one.
    MappingFailed,
}

/// A candidate transaction inside an import batch. Transient: accepted rows
/// become transactions on commit, the rest are discarded with the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportCandidateRow {
    /// One-based position in the raw input, stable across re-runs.
    pub row_number: usize,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub raw_category: String,
    /// `None` until mapping succeeds or a human resolves it.
    pub mapped_category: Option<String>,
    pub amount: Decimal,
    pub merchant: String,
    pub description: String,
    /// Existing transaction this row is suspected to duplicate.
    pub dedup_suspect_of: Option<Uuid>,
    pub status: RowStatus,
}

/// A row excluded from the batch because it failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub row_number: usize,
    pub reason: String,
}

/// Aggregate counts, computed once after all rows are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub ready: usize,
    pub duplicate_suspect: usize,
    pub mapping_failed: usize,
    pub parse_errors: usize,
}

/// The reviewable result of reconciling one statement against the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportBatch {
    pub rows: Vec<ImportCandidateRow>,
    pub parse_failures: Vec<ParseFailure>,
    pub summary: BatchSummary,
}

/// Reads raw rows from a delimited statement file with a
/// `date,amount,kind,category,merchant,description` header.
pub fn read_raw_rows(path: &Path) -> Result<Vec<RawRow>, ImportError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| ImportError::Parse(e.to_string()))?;
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: RawRow = result.map_err(|e| ImportError::Parse(e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}
