//! Computation result models for the Tax Computation Engine.
//!
//! This module contains the [`TaxComputationResult`] type and its associated
//! structures that capture every output line of a tax computation, together
//! with a complete audit trace.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AdjustmentItem, CategoryTotals, FilerStatus, Stage, TaxLineItem, TaxpayerType};

/// The portion of income falling within one progressive slab.
///
/// # Example
///
/// ```
/// use tax_engine::models::SlabTax;
/// use rust_decimal::Decimal;
///
/// let slab = SlabTax {
///     lower_bound: Decimal::new(600_000, 0),
///     upper_bound: Some(Decimal::new(1_200_000, 0)),
///     rate: Decimal::new(25, 3),
///     income_in_slab: Decimal::new(600_000, 0),
///     tax_in_slab: Decimal::new(15_000, 0),
/// };
/// assert_eq!(slab.tax_in_slab, slab.income_in_slab * slab.rate);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlabTax {
    /// Lower bound of the slab.
    pub lower_bound: Decimal,
    /// Upper bound of the slab, `None` for the unbounded top slab.
    pub upper_bound: Option<Decimal>,
    /// Marginal rate of the slab.
    pub rate: Decimal,
    /// Income falling within the slab.
    pub income_in_slab: Decimal,
    /// Unrounded tax on that income.
    pub tax_in_slab: Decimal,
}

/// A single step in the audit trace recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for a rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The pipeline stage the step belongs to.
    pub stage: Stage,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// A warning generated during calculation.
///
/// Warnings indicate oddities that don't prevent calculation but may
/// require attention, such as ignored form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level (e.g., "low", "medium", "high").
    pub severity: String,
}

/// The complete audit trace for a computation.
///
/// Contains no timestamps or timings, so two runs over the same input
/// produce identical traces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of calculation steps.
    pub steps: Vec<AuditStep>,
    /// Any warnings generated during calculation.
    pub warnings: Vec<AuditWarning>,
}

/// The complete result of a tax computation.
///
/// Every line rendered by downstream reports is an individually addressable
/// field. The result is built once at the end of a successful run; a failed
/// run produces no result at all.
///
/// Sign convention: `net_demand_or_refund` is positive when tax is owed and
/// negative when a refund is due, and always equals
/// `final_chargeable_tax - total_withheld`.
///
/// Each adjustment stage's total is the drop in liability it caused, so
/// `gross_chargeable_tax - total_reductions - total_credits` always equals
/// `tax_after_credits`. Allowed amounts the liability could not absorb are
/// reported separately as unabsorbed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComputationResult {
    /// The taxpayer the return belongs to.
    pub taxpayer_id: String,
    /// The tax year whose rate table was applied.
    pub tax_year: String,
    /// Filer status the final-tax rates were chosen for.
    pub filer_status: FilerStatus,
    /// Taxpayer type the surcharge rate was chosen for.
    pub taxpayer_type: TaxpayerType,
    /// Normalized totals of each supplied income category.
    pub categories: Vec<CategoryTotals>,

    /// Taxable employment income.
    pub income_from_salary: Decimal,
    /// Taxable income from other sources.
    pub income_from_other_sources: Decimal,
    /// Income taxed under the final-tax regime.
    pub final_tax_income: Decimal,
    /// Final-tax income above its final limit, taxed as normal income.
    pub excess_final_tax_income: Decimal,
    /// Taxable capital gains.
    pub income_from_capital_gains: Decimal,
    /// Sum of all categories' gross amounts.
    pub total_gross_income: Decimal,
    /// Sum of all categories' exempt amounts.
    pub total_exempt_income: Decimal,
    /// Sum of all categories' taxable amounts, before deductions.
    pub total_income: Decimal,

    /// Deductible allowances applied against normal income.
    pub total_deductions: Decimal,
    /// Allowed deductions left over once normal income reached zero.
    pub unabsorbed_deductions: Decimal,
    /// Normal income after deductions plus final-tax income.
    pub taxable_income_before_capital_gains: Decimal,
    /// Taxable income before capital gains plus capital gains.
    pub taxable_income_including_capital_gains: Decimal,

    /// Tax on normal income under the progressive slabs.
    pub normal_tax: Decimal,
    /// Sum of the final-tax lines.
    pub final_tax: Decimal,
    /// Sum of the capital-gain lines.
    pub capital_gain_tax: Decimal,
    /// Tax added so income above final-tax limits bears its minimum tax.
    pub excess_final_tax_top_up: Decimal,
    /// Surcharge on normal tax.
    pub surcharge: Decimal,
    /// All regime taxes plus surcharge, before reductions and credits.
    pub gross_chargeable_tax: Decimal,

    /// Tax reductions applied.
    pub total_reductions: Decimal,
    /// Tax remaining after reductions.
    pub tax_after_reductions: Decimal,
    /// Allowed reductions the liability could not absorb.
    pub unabsorbed_reductions: Decimal,
    /// Tax credits applied.
    pub total_credits: Decimal,
    /// Tax remaining after credits.
    pub tax_after_credits: Decimal,
    /// Credit value the liability could not absorb.
    pub unabsorbed_credits: Decimal,
    /// Whether the minimum tax floor raised the liability.
    pub minimum_tax_applied: bool,
    /// Amount added to reach the minimum tax floor.
    pub minimum_tax_top_up: Decimal,
    /// The final chargeable tax.
    pub final_chargeable_tax: Decimal,

    /// Tax withheld at source, per source category.
    pub withholding_by_category: BTreeMap<String, Decimal>,
    /// Total tax withheld at source.
    pub total_withheld: Decimal,
    /// Positive when tax is owed, negative when a refund is due.
    pub net_demand_or_refund: Decimal,

    /// Final chargeable tax as a percentage of taxable income including capital gains.
    pub effective_tax_rate: Decimal,
    /// Marginal slab rate on normal income, as a percentage.
    pub marginal_tax_rate: Decimal,
    /// Slab-by-slab breakdown of normal tax.
    pub slab_breakdown: Vec<SlabTax>,
    /// Every tax line produced by the regime calculators and the surcharge.
    pub tax_lines: Vec<TaxLineItem>,
    /// Every resolved adjustment, deductions first, then reductions, then credits.
    pub adjustments: Vec<AdjustmentItem>,
    /// Complete audit trace of calculation decisions.
    pub audit_trace: AuditTrace,
}

impl TaxComputationResult {
    /// Returns true if the taxpayer is due a refund.
    pub fn is_refund(&self) -> bool {
        self.net_demand_or_refund < Decimal::ZERO
    }

    /// Amount of tax still to be paid, zero when a refund is due.
    pub fn tax_demanded(&self) -> Decimal {
        self.net_demand_or_refund.max(Decimal::ZERO)
    }

    /// Amount to be refunded, zero when tax is owed.
    pub fn refund_due(&self) -> Decimal {
        (-self.net_demand_or_refund).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn create_sample_result(final_chargeable_tax: Decimal, total_withheld: Decimal) -> TaxComputationResult {
        TaxComputationResult {
            taxpayer_id: "tp_001".to_string(),
            tax_year: "2025-26".to_string(),
            filer_status: FilerStatus::Atl,
            taxpayer_type: TaxpayerType::Salaried,
            categories: vec![],
            income_from_salary: Decimal::ZERO,
            income_from_other_sources: Decimal::ZERO,
            final_tax_income: Decimal::ZERO,
            excess_final_tax_income: Decimal::ZERO,
            income_from_capital_gains: Decimal::ZERO,
            total_gross_income: Decimal::ZERO,
            total_exempt_income: Decimal::ZERO,
            total_income: Decimal::ZERO,
            total_deductions: Decimal::ZERO,
            unabsorbed_deductions: Decimal::ZERO,
            taxable_income_before_capital_gains: Decimal::ZERO,
            taxable_income_including_capital_gains: Decimal::ZERO,
            normal_tax: final_chargeable_tax,
            final_tax: Decimal::ZERO,
            capital_gain_tax: Decimal::ZERO,
            excess_final_tax_top_up: Decimal::ZERO,
            surcharge: Decimal::ZERO,
            gross_chargeable_tax: final_chargeable_tax,
            total_reductions: Decimal::ZERO,
            tax_after_reductions: final_chargeable_tax,
            unabsorbed_reductions: Decimal::ZERO,
            total_credits: Decimal::ZERO,
            tax_after_credits: final_chargeable_tax,
            unabsorbed_credits: Decimal::ZERO,
            minimum_tax_applied: false,
            minimum_tax_top_up: Decimal::ZERO,
            final_chargeable_tax,
            withholding_by_category: BTreeMap::new(),
            total_withheld,
            net_demand_or_refund: final_chargeable_tax - total_withheld,
            effective_tax_rate: Decimal::ZERO,
            marginal_tax_rate: Decimal::ZERO,
            slab_breakdown: vec![],
            tax_lines: vec![],
            adjustments: vec![],
            audit_trace: AuditTrace::default(),
        }
    }

    #[test]
    fn test_refund_when_withheld_exceeds_tax() {
        let result = create_sample_result(dec("200000"), dec("250000"));

        assert!(result.is_refund());
        assert_eq!(result.net_demand_or_refund, dec("-50000"));
        assert_eq!(result.refund_due(), dec("50000"));
        assert_eq!(result.tax_demanded(), Decimal::ZERO);
    }

    #[test]
    fn test_demand_when_tax_exceeds_withheld() {
        let result = create_sample_result(dec("300000"), dec("120000"));

        assert!(!result.is_refund());
        assert_eq!(result.tax_demanded(), dec("180000"));
        assert_eq!(result.refund_due(), Decimal::ZERO);
    }

    #[test]
    fn test_result_serializes_decimals_as_strings() {
        let result = create_sample_result(dec("52500"), dec("0"));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["final_chargeable_tax"], "52500");
        assert_eq!(json["net_demand_or_refund"], "52500");
        assert_eq!(json["filer_status"], "atl");
        assert_eq!(json["taxpayer_type"], "salaried");
    }

    #[test]
    fn test_result_roundtrips_through_json() {
        let result = create_sample_result(dec("52500"), dec("10000"));
        let json = serde_json::to_string(&result).unwrap();
        let parsed: TaxComputationResult = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, result);
    }
}
