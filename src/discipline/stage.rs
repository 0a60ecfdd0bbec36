use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::PolicySettings;

/// The investor's current phase in the three-tier progression. Always
/// derived from live balances, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AccumulatingCashReserve,
    BuildingBuffer,
    ActiveInvesting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::AccumulatingCashReserve => write!(f, "accumulating cash reserve"),
            Stage::BuildingBuffer => write!(f, "building buffer"),
            Stage::ActiveInvesting => write!(f, "active investing"),
        }
    }
}

/// Result of one stage evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageAssessment {
    pub stage: Stage,
    /// Progress toward the active stage's target, in [0, 1].
    pub progress: Decimal,
    /// The active stage's target amount.
    pub target: Decimal,
    /// Amount still missing for the active stage; zero once actively
    /// investing.
    pub shortfall: Decimal,
}

/// Classifies the liquid balance against the policy thresholds.
///
/// Equality at a threshold belongs to the next stage: thresholds are
/// inclusive lower bounds of the stage above. Recomputed on every call, so
/// a depleted reserve naturally demotes the stage.
pub fn evaluate(liquid_balance: Decimal, policy: &PolicySettings) -> StageAssessment {
    let cash_target = policy.cash_reserve_target;
    let buffer_target = policy.buffer_reserve_target;
    if liquid_balance < cash_target {
        StageAssessment {
            stage: Stage::AccumulatingCashReserve,
            progress: clamp_ratio(liquid_balance / cash_target),
            target: cash_target,
            shortfall: cash_target - liquid_balance,
        }
    } else if liquid_balance < cash_target + buffer_target {
        let above_reserve = liquid_balance - cash_target;
        StageAssessment {
            stage: Stage::BuildingBuffer,
            progress: clamp_ratio(above_reserve / buffer_target),
            target: buffer_target,
            shortfall: buffer_target - above_reserve,
        }
    } else {
        StageAssessment {
            stage: Stage::ActiveInvesting,
            progress: Decimal::ONE,
            target: cash_target + buffer_target,
            shortfall: Decimal::ZERO,
        }
    }
}

fn clamp_ratio(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AllocationTarget, ContributionFrequency};
    use rust_decimal_macros::dec;

    fn policy() -> PolicySettings {
        PolicySettings {
            monthly_income: dec!(30000),
            monthly_expense: dec!(8000),
            cash_reserve_target: dec!(50000),
            buffer_reserve_target: dec!(100000),
            base_investment_amount: dec!(5000),
            contribution_frequency: ContributionFrequency::Monthly,
            allocation_targets: vec![AllocationTarget {
                asset_class: "equity".into(),
                ratio: dec!(1.0),
            }],
        }
    }

    #[test]
    fn below_reserve_target() {
        let a = evaluate(dec!(25000), &policy());
        assert_eq!(a.stage, Stage::AccumulatingCashReserve);
        assert_eq!(a.progress, dec!(0.5));
        assert_eq!(a.target, dec!(50000));
        assert_eq!(a.shortfall, dec!(25000));
    }

    #[test]
    fn threshold_equality_belongs_to_next_stage() {
        let a = evaluate(dec!(50000), &policy());
        assert_eq!(a.stage, Stage::BuildingBuffer);
        assert_eq!(a.progress, dec!(0));

        let a = evaluate(dec!(150000), &policy());
        assert_eq!(a.stage, Stage::ActiveInvesting);
    }

    #[test]
    fn buffer_progress_is_relative_to_buffer_target() {
        let a = evaluate(dec!(62500), &policy());
        assert_eq!(a.stage, Stage::BuildingBuffer);
        assert_eq!(a.progress, dec!(0.125));
        assert_eq!(a.shortfall, dec!(87500));
    }

    #[test]
    fn fully_funded_is_pinned_at_one() {
        let a = evaluate(dec!(200000), &policy());
        assert_eq!(a.stage, Stage::ActiveInvesting);
        assert_eq!(a.progress, Decimal::ONE);
        assert_eq!(a.shortfall, Decimal::ZERO);
    }

    #[test]
    fn depleted_reserves_demote_the_stage() {
        // Live recomputation: nothing remembers the earlier stage.
        assert_eq!(evaluate(dec!(160000), &policy()).stage, Stage::ActiveInvesting);
        assert_eq!(
            evaluate(dec!(40000), &policy()).stage,
            Stage::AccumulatingCashReserve
        );
    }
}
