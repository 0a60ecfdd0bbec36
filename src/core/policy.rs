use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tolerance when checking that allocation ratios sum to one.
pub const ALLOCATION_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 4); // 0.0001

/// How often contribution instructions are issued once actively investing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionFrequency {
    Weekly,
    Monthly,
}

/// One target slice of the investment allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub asset_class: String,
    pub ratio: Decimal,
}

/// Errors raised when a policy fails validation or cannot be parsed. All of
/// these are fatal at engine construction time.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// A threshold or base amount is zero or negative.
    NonPositiveAmount(&'static str),
    /// The allocation table is empty.
    EmptyAllocation,
    /// An individual allocation ratio lies outside (0, 1].
    RatioOutOfRange(String),
    /// Allocation ratios do not sum to one within [`ALLOCATION_EPSILON`].
    AllocationSum(Decimal),
    /// The settings document could not be parsed.
    Parse(String),
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::NonPositiveAmount(field) => {
                write!(f, "policy field {field} must be positive")
            }
            PolicyError::EmptyAllocation => write!(f, "allocation targets must not be empty"),
            PolicyError::RatioOutOfRange(class) => {
                write!(f, "allocation ratio for {class} must be in (0, 1]")
            }
            PolicyError::AllocationSum(sum) => {
                write!(f, "allocation ratios sum to {sum}, expected 1")
            }
            PolicyError::Parse(e) => write!(f, "invalid policy settings: {e}"),
        }
    }
}

impl std::error::Error for PolicyError {}

/// Investment-discipline policy, supplied once at engine construction.
/// Unknown fields in the source document are ignored; missing required
/// fields fail parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    pub monthly_income: Decimal,
    pub monthly_expense: Decimal,
    /// Stage-one target: the baseline emergency fund.
    pub cash_reserve_target: Decimal,
    /// Stage-two target: the secondary cushion above the emergency fund.
    pub buffer_reserve_target: Decimal,
    pub base_investment_amount: Decimal,
    pub contribution_frequency: ContributionFrequency,
    /// Ordered allocation slices; ratios must sum to 1 ± epsilon.
    pub allocation_targets: Vec<AllocationTarget>,
}

impl PolicySettings {
    /// Parses settings from a TOML document and validates them.
    pub fn from_toml(doc: &str) -> Result<Self, PolicyError> {
        let policy: PolicySettings =
            toml::from_str(doc).map_err(|e| PolicyError::Parse(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Checks the invariants the engine relies on. Called by the engine
    /// constructor; an invalid policy refuses to start.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, value) in [
            ("monthly_income", self.monthly_income),
            ("monthly_expense", self.monthly_expense),
            ("cash_reserve_target", self.cash_reserve_target),
            ("buffer_reserve_target", self.buffer_reserve_target),
            ("base_investment_amount", self.base_investment_amount),
        ] {
            if value <= Decimal::ZERO {
                return Err(PolicyError::NonPositiveAmount(field));
            }
        }
        if self.allocation_targets.is_empty() {
            return Err(PolicyError::EmptyAllocation);
        }
        for target in &self.allocation_targets {
            if target.ratio <= Decimal::ZERO || target.ratio > Decimal::ONE {
                return Err(PolicyError::RatioOutOfRange(target.asset_class.clone()));
            }
        }
        let sum: Decimal = self.allocation_targets.iter().map(|t| t.ratio).sum();
        if (sum - Decimal::ONE).abs() > ALLOCATION_EPSILON {
            return Err(PolicyError::AllocationSum(sum));
        }
        Ok(())
    }
}
