//! The discipline engine: stage evaluation, instruction generation and the
//! consolidated status view consumed by the presentation layer.

use std::sync::Mutex;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::core::{LedgerStore, PolicyError, PolicySettings};
use crate::import::{
    CategoryMapper, CommitOverrides, DedupConfig, ImportBatch, ImportError, RawRow,
};

pub mod instructions;
pub mod stage;

pub use instructions::{Instruction, InstructionKind, generate};
pub use stage::{Stage, StageAssessment, evaluate};

/// Errors raised when mutating the instruction log. Both are recoverable;
/// callers surface them as no-ops or warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionError {
    /// No instruction with the given id exists.
    NotFound,
    /// The instruction was already marked executed; the flag is monotonic.
    AlreadyExecuted,
}

impl std::fmt::Display for InstructionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstructionError::NotFound => write!(f, "instruction not found"),
            InstructionError::AlreadyExecuted => write!(f, "instruction already executed"),
        }
    }
}

impl std::error::Error for InstructionError {}

/// Read-only system status for dashboard widgets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub stage: Stage,
    /// Progress toward the active stage's target, in [0, 1].
    pub progress: Decimal,
    /// The active stage's target amount.
    pub target: Decimal,
    /// Open instructions awaiting execution, oldest first.
    pub pending_instructions: Vec<Instruction>,
    /// The full append-only log, newest first.
    pub history: Vec<Instruction>,
}

/// Orchestrates stage evaluation and instruction generation over a ledger
/// store. One exclusive writer: all mutations take the store lock for the
/// duration of a single commit, reads work from the last-committed
/// snapshot.
pub struct DisciplineEngine<S: LedgerStore> {
    store: Mutex<S>,
    policy: PolicySettings,
    log: Mutex<Vec<Instruction>>,
}

impl<S: LedgerStore> DisciplineEngine<S> {
    /// Creates an engine, refusing to start on an invalid policy.
    pub fn new(store: S, policy: PolicySettings) -> Result<Self, PolicyError> {
        Self::with_log(store, policy, Vec::new())
    }

    /// Creates an engine with a previously persisted instruction log.
    pub fn with_log(
        store: S,
        policy: PolicySettings,
        log: Vec<Instruction>,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            store: Mutex::new(store),
            policy,
            log: Mutex::new(log),
        })
    }

    pub fn policy(&self) -> &PolicySettings {
        &self.policy
    }

    /// Evaluates the current stage from live balances.
    pub fn assessment(&self) -> StageAssessment {
        let store = self.store.lock().expect("store mutex poisoned");
        let liquid: Decimal = store
            .accounts()
            .iter()
            .filter(|a| a.kind.is_liquid())
            .map(|a| a.balance)
            .sum();
        stage::evaluate(liquid, &self.policy)
    }

    /// The consolidated status view: stage, progress, pending instructions
    /// and the reverse-chronological history.
    pub fn status(&self) -> SystemStatus {
        let assessment = self.assessment();
        let log = self.log.lock().expect("log mutex poisoned");
        let pending: Vec<Instruction> = log.iter().filter(|i| !i.executed).cloned().collect();
        let mut history: Vec<Instruction> = log.clone();
        // The log grows append-only, so reversing yields newest-first even
        // for same-day entries.
        history.reverse();
        SystemStatus {
            stage: assessment.stage,
            progress: assessment.progress,
            target: assessment.target,
            pending_instructions: pending,
            history,
        }
    }

    /// Evaluates the stage and appends the instructions due on `as_of`.
    /// Idempotent per period: a second call with no intervening ledger
    /// change appends nothing.
    pub fn run_generation(&self, as_of: NaiveDate) -> Vec<Instruction> {
        let assessment = self.assessment();
        let mut log = self.log.lock().expect("log mutex poisoned");
        let fresh = instructions::generate(&assessment, &self.policy, as_of, &log);
        if !fresh.is_empty() {
            info!(
                stage = %assessment.stage,
                count = fresh.len(),
                "Generated instructions"
            );
            log.extend(fresh.iter().cloned());
        }
        fresh
    }

    /// Marks an instruction executed. Fails with [`InstructionError::NotFound`]
    /// for unknown ids and [`InstructionError::AlreadyExecuted`] when
    /// re-invoked; the executed flag and date never change again.
    pub fn mark_executed(
        &self,
        instruction_id: Uuid,
        executed_date: NaiveDate,
    ) -> Result<(), InstructionError> {
        let mut log = self.log.lock().expect("log mutex poisoned");
        let instruction = log
            .iter_mut()
            .find(|i| i.id == instruction_id)
            .ok_or(InstructionError::NotFound)?;
        if instruction.executed {
            return Err(InstructionError::AlreadyExecuted);
        }
        instruction.executed = true;
        instruction.executed_date = Some(executed_date);
        info!(instruction_id = %instruction_id, "Marked instruction executed");
        Ok(())
    }

    /// Reconciles raw statement rows against the last-committed snapshot.
    /// Read-side only; does not block behind in-flight commits longer than
    /// the snapshot copy.
    pub fn reconcile(
        &self,
        raw_rows: &[RawRow],
        account_id: Uuid,
        mapper: &CategoryMapper,
        config: &DedupConfig,
    ) -> ImportBatch {
        let snapshot = {
            let store = self.store.lock().expect("store mutex poisoned");
            store.transactions()
        };
        crate::import::reconcile::reconcile(raw_rows, account_id, &snapshot, mapper, config)
    }

    /// Commits a reviewed batch atomically under the store lock. Readers
    /// never observe a partially applied batch.
    pub fn commit_import(
        &self,
        batch: &ImportBatch,
        account_id: Uuid,
        overrides: &CommitOverrides,
    ) -> Result<Vec<Uuid>, ImportError> {
        let mut store = self.store.lock().expect("store mutex poisoned");
        crate::import::reconcile::commit_batch(&mut *store, batch, account_id, overrides)
    }

    /// Runs a read-only closure against the store snapshot.
    pub fn with_store<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let store = self.store.lock().expect("store mutex poisoned");
        f(&store)
    }

    /// Consumes the engine, returning the store and instruction log for
    /// persistence.
    pub fn into_parts(self) -> (S, Vec<Instruction>) {
        (
            self.store.into_inner().expect("store mutex poisoned"),
            self.log.into_inner().expect("log mutex poisoned"),
        )
    }
}
