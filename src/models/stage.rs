//! Pipeline stages of a tax computation run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stage of the tax computation pipeline.
///
/// Stages execute strictly in the order of [`Stage::ORDER`]; each consumes
/// only the output of the stages before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reduce raw form fields to per-category totals.
    AggregateCategories,
    /// Apply deductible allowances against taxable income.
    ApplyDeductions,
    /// Run the progressive, final-tax and capital-gain calculators.
    ComputeRegimeTaxes,
    /// Sum the regime tax lines.
    SumGrossChargeable,
    /// Add the surcharge on normal tax.
    ApplySurcharge,
    /// Apply tax reductions against gross chargeable tax.
    ApplyReductions,
    /// Apply tax credits against tax remaining after reductions.
    ApplyCredits,
    /// Raise the liability to the minimum tax floor where triggered.
    ApplyMinimumFloor,
    /// Net withholding taxes against the final chargeable tax.
    Reconcile,
}

impl Stage {
    /// All stages in execution order.
    pub const ORDER: [Stage; 9] = [
        Stage::AggregateCategories,
        Stage::ApplyDeductions,
        Stage::ComputeRegimeTaxes,
        Stage::SumGrossChargeable,
        Stage::ApplySurcharge,
        Stage::ApplyReductions,
        Stage::ApplyCredits,
        Stage::ApplyMinimumFloor,
        Stage::Reconcile,
    ];

    /// Returns the snake_case identifier of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AggregateCategories => "aggregate_categories",
            Stage::ApplyDeductions => "apply_deductions",
            Stage::ComputeRegimeTaxes => "compute_regime_taxes",
            Stage::SumGrossChargeable => "sum_gross_chargeable",
            Stage::ApplySurcharge => "apply_surcharge",
            Stage::ApplyReductions => "apply_reductions",
            Stage::ApplyCredits => "apply_credits",
            Stage::ApplyMinimumFloor => "apply_minimum_floor",
            Stage::Reconcile => "reconcile",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
