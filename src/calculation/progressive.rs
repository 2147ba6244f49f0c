//! Progressive slab tax calculation.
//!
//! This module walks the ordered slabs of a rate table, taxing the portion of
//! income inside each slab at that slab's marginal rate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::Slab;
use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, SlabTax, Stage};

use super::rounding::round_currency;

/// Category label used for tax charged on normal (progressive) income.
pub const NORMAL_INCOME_CATEGORY: &str = "normal_income";

/// The result of a progressive tax calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressiveTaxResult {
    /// The taxable income the slabs were applied to.
    pub taxable_income: Decimal,
    /// The tax, rounded once to the currency unit.
    pub tax: Decimal,
    /// Slabs that received a non-zero portion of income.
    pub breakdown: Vec<SlabTax>,
    /// Rate of the slab the next unit of income would fall in.
    pub marginal_rate: Decimal,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Computes progressive tax on a taxable income.
///
/// Each slab taxes `min(income, upper) - lower` when positive. The slab sum is
/// rounded half-up once, after all slabs are accumulated.
///
/// # Arguments
///
/// * `taxable_income` - Normal taxable income after deductions
/// * `slabs` - Contiguous ascending slabs, the last one unbounded
/// * `decimal_places` - Currency decimal places for rounding
/// * `step_number` - The step number for audit trail sequencing
///
/// # Errors
///
/// Returns `InvariantViolation` if `taxable_income` is negative.
///
/// # Example
///
/// ```
/// use tax_engine::calculation::compute_progressive_tax;
/// use tax_engine::config::Slab;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let dec = |s: &str| Decimal::from_str(s).unwrap();
/// let slabs = vec![
///     Slab { lower: dec("0"), upper: Some(dec("600000")), rate: dec("0") },
///     Slab { lower: dec("600000"), upper: Some(dec("1200000")), rate: dec("0.025") },
///     Slab { lower: dec("1200000"), upper: Some(dec("2200000")), rate: dec("0.125") },
///     Slab { lower: dec("2200000"), upper: None, rate: dec("0.225") },
/// ];
///
/// let result = compute_progressive_tax(dec("1500000"), &slabs, 0, 1).unwrap();
/// assert_eq!(result.tax, dec("52500"));
/// ```
pub fn compute_progressive_tax(
    taxable_income: Decimal,
    slabs: &[Slab],
    decimal_places: u32,
    step_number: u32,
) -> EngineResult<ProgressiveTaxResult> {
    if taxable_income < Decimal::ZERO {
        return Err(EngineError::InvariantViolation {
            stage: Stage::ComputeRegimeTaxes,
            category: NORMAL_INCOME_CATEGORY.to_string(),
            message: format!("taxable income {} is negative", taxable_income),
        });
    }

    let mut breakdown = Vec::new();
    let mut unrounded = Decimal::ZERO;
    let mut marginal_rate = slabs.first().map(|s| s.rate).unwrap_or(Decimal::ZERO);

    for slab in slabs {
        if taxable_income < slab.lower {
            break;
        }
        // Income sitting exactly on a boundary is marginally taxed by the upper slab.
        marginal_rate = slab.rate;

        let top = slab.upper.map_or(taxable_income, |upper| taxable_income.min(upper));
        let income_in_slab = top - slab.lower;
        if income_in_slab <= Decimal::ZERO {
            continue;
        }

        let tax_in_slab = income_in_slab * slab.rate;
        unrounded += tax_in_slab;
        breakdown.push(SlabTax {
            lower_bound: slab.lower,
            upper_bound: slab.upper,
            rate: slab.rate,
            income_in_slab,
            tax_in_slab,
        });
    }

    let tax = round_currency(unrounded, decimal_places);

    let audit_step = AuditStep {
        step_number,
        rule_id: "progressive_tax".to_string(),
        rule_name: "Progressive Slab Tax".to_string(),
        stage: Stage::ComputeRegimeTaxes,
        input: serde_json::json!({
            "taxable_income": taxable_income.to_string(),
            "slab_count": slabs.len(),
        }),
        output: serde_json::json!({
            "slabs_applied": breakdown.len(),
            "unrounded_tax": unrounded.to_string(),
            "tax": tax.to_string(),
            "marginal_rate": marginal_rate.to_string(),
        }),
        reasoning: format!(
            "{} across {} slab(s) = {} (rounded from {})",
            taxable_income,
            breakdown.len(),
            tax,
            unrounded.normalize()
        ),
    };

    Ok(ProgressiveTaxResult {
        taxable_income,
        tax,
        breakdown,
        marginal_rate,
        audit_step,
    })
}
