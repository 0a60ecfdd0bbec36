use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{Stage, StageAssessment};
use crate::core::{ContributionFrequency, PolicySettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// Top up the cash or buffer reserve.
    ReserveTransfer,
    /// Buy one allocation slice at the base contribution amount.
    Allocation,
}

/// One dated action instruction. Append-only: once created, only the
/// executed flag and date ever change, and executed never reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: Uuid,
    pub created: NaiveDate,
    /// Stage active when this instruction was generated.
    pub stage: Stage,
    pub kind: InstructionKind,
    pub text: String,
    pub executed: bool,
    pub executed_date: Option<NaiveDate>,
}

impl Instruction {
    fn new(created: NaiveDate, stage: Stage, kind: InstructionKind, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            created,
            stage,
            kind,
            text,
            executed: false,
            executed_date: None,
        }
    }
}

/// Period bucket for the at-most-one-instruction-per-period rule.
fn period_key(date: NaiveDate, frequency: ContributionFrequency) -> (i32, u32) {
    match frequency {
        ContributionFrequency::Monthly => (date.year(), date.month()),
        ContributionFrequency::Weekly => {
            let week = date.iso_week();
            (week.year(), week.week())
        }
    }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Produces the instructions due on `as_of`, given the current assessment
/// and the recent instruction log.
///
/// Reserve stages emit at most one open transfer per month, for the smaller
/// of the base contribution and the remaining shortfall. Active investing
/// emits one allocation instruction per target, but only when the current
/// contribution period has none yet. Calling this twice for the same period
/// without an intervening ledger change yields nothing the second time.
pub fn generate(
    assessment: &StageAssessment,
    policy: &PolicySettings,
    as_of: NaiveDate,
    recent: &[Instruction],
) -> Vec<Instruction> {
    match assessment.stage {
        Stage::AccumulatingCashReserve | Stage::BuildingBuffer => {
            let open_this_month = recent.iter().any(|i| {
                i.kind == InstructionKind::ReserveTransfer
                    && !i.executed
                    && same_month(i.created, as_of)
            });
            if open_this_month {
                return Vec::new();
            }
            let amount = policy.base_investment_amount.min(assessment.shortfall);
            if amount <= Decimal::ZERO {
                return Vec::new();
            }
            let destination = match assessment.stage {
                Stage::AccumulatingCashReserve => "cash reserve",
                _ => "buffer reserve",
            };
            let text = format!(
                "Transfer ¥{} into the {destination} ({}% of ¥{} funded)",
                amount.round_dp(2),
                (assessment.progress * Decimal::ONE_HUNDRED).round_dp(0),
                assessment.target.round_dp(2),
            );
            vec![Instruction::new(
                as_of,
                assessment.stage,
                InstructionKind::ReserveTransfer,
                text,
            )]
        }
        Stage::ActiveInvesting => {
            let period = period_key(as_of, policy.contribution_frequency);
            let period_has_allocations = recent.iter().any(|i| {
                i.kind == InstructionKind::Allocation
                    && period_key(i.created, policy.contribution_frequency) == period
            });
            if period_has_allocations {
                return Vec::new();
            }
            policy
                .allocation_targets
                .iter()
                .map(|target| {
                    let amount = (policy.base_investment_amount * target.ratio).round_dp(2);
                    let text = format!(
                        "Invest ¥{amount} into {} ({} of base contribution)",
                        target.asset_class, target.ratio,
                    );
                    Instruction::new(
                        as_of,
                        Stage::ActiveInvesting,
                        InstructionKind::Allocation,
                        text,
                    )
                })
                .collect()
        }
    }
}
