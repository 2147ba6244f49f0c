//! Deduction, reduction and credit models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Stage;

/// The kind of an adjustment, which fixes when it is applied.
///
/// Deductions reduce taxable income before any tax is computed; reductions
/// and then credits reduce the computed tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Deductible allowance against taxable income.
    Deduction,
    /// Reduction of gross chargeable tax.
    Reduction,
    /// Credit against tax remaining after reductions.
    Credit,
}

impl AdjustmentKind {
    /// The pipeline stage in which adjustments of this kind are applied.
    pub fn stage(&self) -> Stage {
        match self {
            AdjustmentKind::Deduction => Stage::ApplyDeductions,
            AdjustmentKind::Reduction => Stage::ApplyReductions,
            AdjustmentKind::Credit => Stage::ApplyCredits,
        }
    }

    /// Returns the snake_case identifier of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Deduction => "deduction",
            AdjustmentKind::Reduction => "reduction",
            AdjustmentKind::Credit => "credit",
        }
    }
}

/// How an allowed adjustment amount is turned into an offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentValuation {
    /// The allowed amount itself is offset against the liability.
    #[default]
    FaceValue,
    /// The allowed amount is a rebate at the average rate of tax:
    /// `allowed × gross_chargeable_tax / taxable_income`.
    AverageRate,
}

/// A resolved adjustment: what was claimed, the cap, and what was used.
///
/// The amounts always satisfy:
///
/// * `allowed_amount = min(claimed_amount, cap)`
/// * `value` is `allowed_amount` at face value, or its average-rate rebate
/// * `applied_amount + unabsorbed_amount = value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentItem {
    /// The registered adjustment key.
    pub key: String,
    /// Description from the adjustment rule.
    pub description: String,
    /// The kind of adjustment.
    pub kind: AdjustmentKind,
    /// Total amount claimed under this key.
    pub claimed_amount: Decimal,
    /// The resolved cap, or `None` when the rule is uncapped.
    pub cap: Option<Decimal>,
    /// Human-readable description of how the cap was derived.
    pub cap_basis: String,
    /// Whether the claim was cut down to the cap.
    pub cap_applied: bool,
    /// The claim after the cap.
    pub allowed_amount: Decimal,
    /// How the allowed amount was valued.
    pub valuation: AdjustmentValuation,
    /// The offset the allowed amount is worth against the liability.
    pub value: Decimal,
    /// The part of `value` the running liability absorbed.
    pub applied_amount: Decimal,
    /// The part of `value` left over once the liability reached zero.
    pub unabsorbed_amount: Decimal,
}

/// The outcome of one adjustment stage against the running liability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentStageOutcome {
    /// The kind of adjustment applied in the stage.
    pub kind: AdjustmentKind,
    /// The individual items, in key order.
    pub items: Vec<AdjustmentItem>,
    /// Sum of the items' applied amounts; always `liability_before - liability_after`.
    pub total_applied: Decimal,
    /// The running liability entering the stage.
    pub liability_before: Decimal,
    /// The running liability leaving the stage, never negative.
    pub liability_after: Decimal,
    /// Sum of the items' unabsorbed amounts.
    pub unabsorbed: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_matches_stage_order() {
        assert!(AdjustmentKind::Deduction < AdjustmentKind::Reduction);
        assert!(AdjustmentKind::Reduction < AdjustmentKind::Credit);
        assert!(AdjustmentKind::Deduction.stage() < AdjustmentKind::Reduction.stage());
        assert!(AdjustmentKind::Reduction.stage() < AdjustmentKind::Credit.stage());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&AdjustmentKind::Credit).unwrap();
        assert_eq!(json, "\"credit\"");
        assert_eq!(AdjustmentKind::Credit.as_str(), "credit");
    }

    #[test]
    fn test_valuation_defaults_to_face_value() {
        assert_eq!(AdjustmentValuation::default(), AdjustmentValuation::FaceValue);
        let parsed: AdjustmentValuation = serde_json::from_str("\"average_rate\"").unwrap();
        assert_eq!(parsed, AdjustmentValuation::AverageRate);
    }
}
