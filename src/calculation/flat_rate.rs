//! Final (flat-rate) tax calculation.
//!
//! Income in a final-tax category is taxed at its statutory rate and is kept
//! out of the progressive slabs. A rate key may split the amount into
//! marginal tiers; income in a `minimum` tier leaves the final-tax regime and
//! joins normal income, and the normal tax it generates is topped up to its
//! tax at the tier rate.

use rust_decimal::Decimal;

use crate::config::{FinalTaxSchedule, StatusRate, TierRegime};
use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, CategoryTotals, FilerStatus, RegimeKind, Stage, TaxLineItem};

use super::rounding::round_currency;

/// The part of an amount falling inside one tier of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSlice {
    /// Where the tier starts.
    pub lower: Decimal,
    /// Where the tier ends, `None` for the top tier.
    pub upper: Option<Decimal>,
    /// The tier's rate.
    pub rate: StatusRate,
    /// The tier's regime.
    pub regime: TierRegime,
    /// Income inside the tier.
    pub income: Decimal,
}

/// Splits `amount` across the schedule's tiers, skipping tiers it never reaches.
pub fn slice_by_tiers(amount: Decimal, schedule: &FinalTaxSchedule) -> Vec<TierSlice> {
    let mut slices = Vec::new();
    let mut lower = Decimal::ZERO;

    for tier in schedule.tiers() {
        if amount <= lower {
            break;
        }
        let top = tier.upper.map_or(amount, |upper| amount.min(upper));
        slices.push(TierSlice {
            lower,
            upper: tier.upper,
            rate: tier.rate,
            regime: tier.regime,
            income: top - lower,
        });
        match tier.upper {
            Some(upper) => lower = upper,
            None => break,
        }
    }

    slices
}

/// Returns the part of `amount` that falls in minimum-regime tiers.
///
/// That income is taxed with normal income rather than at the final rate.
///
/// # Example
///
/// ```
/// use tax_engine::calculation::income_above_final_limit;
/// use tax_engine::config::FinalTaxSchedule;
/// use rust_decimal::Decimal;
///
/// let schedule: FinalTaxSchedule = serde_yaml::from_str(
///     "tiers:\n  - { upper: 5000000, rate: 0.15 }\n  - { rate: 0.15, regime: minimum }\n",
/// )
/// .unwrap();
///
/// let excess = income_above_final_limit(Decimal::from(7_000_000), &schedule);
/// assert_eq!(excess, Decimal::from(2_000_000));
/// ```
pub fn income_above_final_limit(amount: Decimal, schedule: &FinalTaxSchedule) -> Decimal {
    slice_by_tiers(amount, schedule)
        .iter()
        .filter(|slice| slice.regime == TierRegime::Minimum)
        .map(|slice| slice.income)
        .sum()
}

/// Category label of the top-up on income above final-tax limits.
pub const EXCESS_FINAL_TAX_CATEGORY: &str = "excess_final_tax_income";

/// The result of taxing one final-tax category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTaxResult {
    /// The final-tax line for the category.
    pub line: TaxLineItem,
    /// Income moved out of the final-tax regime into normal income.
    pub minimum_tax_income: Decimal,
    /// Tax at the tier rates on that income, the least its slab tax may be.
    pub minimum_tax: Decimal,
    /// The audit step recording the calculation.
    pub audit_step: AuditStep,
}

/// Computes final tax for one category.
///
/// Each tier taxes the slice of `taxable_amount` inside it at the rate for
/// `filer_status`. Final-tier taxes are summed and rounded once into the
/// category's line; minimum-tier taxes are summed and rounded once into
/// `minimum_tax`.
///
/// The schedule is looked up by the caller from the rate table, so a missing
/// rate surfaces as a configuration error before this function is reached.
///
/// # Example
///
/// ```
/// use tax_engine::calculation::compute_final_tax;
/// use tax_engine::config::{FinalTaxSchedule, StatusRate};
/// use tax_engine::models::{CategoryTotals, FilerStatus, IncomeClass};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let totals = CategoryTotals::new(
///     "dividend",
///     IncomeClass::FinalTax,
///     Decimal::from(1_000_000),
///     Decimal::ZERO,
/// );
/// let schedule = FinalTaxSchedule::Single(StatusRate::ByStatus {
///     atl: Decimal::from_str("0.15").unwrap(),
///     non_atl: Decimal::from_str("0.30").unwrap(),
/// });
///
/// let filer = compute_final_tax(&totals, &schedule, FilerStatus::Atl, 0, 1).unwrap();
/// assert_eq!(filer.line.amount, Decimal::from(150_000));
///
/// let non_filer = compute_final_tax(&totals, &schedule, FilerStatus::NonAtl, 0, 1).unwrap();
/// assert_eq!(non_filer.line.amount, Decimal::from(300_000));
/// ```
pub fn compute_final_tax(
    totals: &CategoryTotals,
    schedule: &FinalTaxSchedule,
    filer_status: FilerStatus,
    decimal_places: u32,
    step_number: u32,
) -> EngineResult<FinalTaxResult> {
    if totals.taxable_amount < Decimal::ZERO {
        return Err(EngineError::InvariantViolation {
            stage: Stage::ComputeRegimeTaxes,
            category: totals.category.clone(),
            message: format!("taxable amount {} is negative", totals.taxable_amount),
        });
    }

    let slices = slice_by_tiers(totals.taxable_amount, schedule);

    let mut final_base = Decimal::ZERO;
    let mut final_unrounded = Decimal::ZERO;
    let mut minimum_tax_income = Decimal::ZERO;
    let mut minimum_unrounded = Decimal::ZERO;
    let mut per_tier = Vec::with_capacity(slices.len());

    // Every slice is a part of taxable_amount and every rate is at most 1,
    // so none of these sums can exceed taxable_amount.
    for slice in &slices {
        let rate = slice.rate.for_status(filer_status);
        let tax = slice.income * rate;
        match slice.regime {
            TierRegime::Final => {
                final_base += slice.income;
                final_unrounded += tax;
            }
            TierRegime::Minimum => {
                minimum_tax_income += slice.income;
                minimum_unrounded += tax;
            }
        }
        per_tier.push(serde_json::json!({
            "lower": slice.lower.to_string(),
            "upper": slice.upper.map(|u| u.to_string()),
            "regime": match slice.regime {
                TierRegime::Final => "final",
                TierRegime::Minimum => "minimum",
            },
            "income": slice.income.to_string(),
            "rate": rate.to_string(),
            "tax": tax.to_string(),
        }));
    }

    let amount = round_currency(final_unrounded, decimal_places);
    let minimum_tax = round_currency(minimum_unrounded, decimal_places);

    let final_tiers: Vec<_> = schedule
        .tiers()
        .into_iter()
        .filter(|t| t.regime == TierRegime::Final)
        .collect();
    let line_rate = match final_tiers.as_slice() {
        [only] => Some(only.rate.for_status(filer_status)),
        _ => None,
    };

    let line = TaxLineItem {
        name: format!("Final tax - {}", totals.category),
        category: totals.category.clone(),
        regime: RegimeKind::Flat,
        base_amount: final_base,
        rate: line_rate,
        amount,
    };

    let reasoning = if minimum_tax_income > Decimal::ZERO {
        format!(
            "{} of '{}' taxed finally at {}; {} above the final-tax limit moves to normal income with a minimum tax of {}",
            final_base, totals.category, amount, minimum_tax_income, minimum_tax
        )
    } else {
        match line_rate {
            Some(rate) => format!(
                "{} x {} = {} final tax on '{}'",
                final_base,
                rate.normalize(),
                amount,
                totals.category
            ),
            None => format!(
                "{} of '{}' taxed across {} tier(s): {} final tax",
                final_base,
                totals.category,
                slices.len(),
                amount
            ),
        }
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "final_tax".to_string(),
        rule_name: "Final Tax at Flat Rate".to_string(),
        stage: Stage::ComputeRegimeTaxes,
        input: serde_json::json!({
            "category": totals.category,
            "taxable_amount": totals.taxable_amount.to_string(),
            "filer_status": filer_status.as_str(),
        }),
        output: serde_json::json!({
            "tiers": per_tier,
            "tax": amount.to_string(),
            "minimum_tax_income": minimum_tax_income.to_string(),
            "minimum_tax": minimum_tax.to_string(),
        }),
        reasoning,
    };

    Ok(FinalTaxResult {
        line,
        minimum_tax_income,
        minimum_tax,
        audit_step,
    })
}

/// The result of checking income above final-tax limits against its minimum tax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcessMinimumResult {
    /// Normal tax the excess income generated.
    pub attributable_tax: Decimal,
    /// Tax added so the excess bears at least its minimum tax.
    pub top_up: Decimal,
    /// The top-up line, present only when the top-up is positive.
    pub line: Option<TaxLineItem>,
    /// The audit step recording the comparison.
    pub audit_step: AuditStep,
}

/// Tops up normal tax so income above final-tax limits bears its minimum tax.
///
/// The normal tax attributable to the excess is `normal_tax` less
/// `normal_tax_without_excess`, the slab tax on normal taxable income with the
/// excess taken out. When that falls short of `minimum_tax` the difference is
/// charged as a separate line.
///
/// # Errors
///
/// Returns `InvariantViolation` if `normal_tax_without_excess` exceeds
/// `normal_tax`; slab tax never falls as income rises.
pub fn apply_excess_minimum_tax(
    excess_income: Decimal,
    minimum_tax: Decimal,
    normal_tax: Decimal,
    normal_tax_without_excess: Decimal,
    step_number: u32,
) -> EngineResult<ExcessMinimumResult> {
    if normal_tax_without_excess > normal_tax {
        return Err(EngineError::InvariantViolation {
            stage: Stage::ComputeRegimeTaxes,
            category: EXCESS_FINAL_TAX_CATEGORY.to_string(),
            message: format!(
                "normal tax without the excess {} exceeds normal tax {}",
                normal_tax_without_excess, normal_tax
            ),
        });
    }

    let attributable_tax = normal_tax - normal_tax_without_excess;
    let top_up = (minimum_tax - attributable_tax).max(Decimal::ZERO);

    let line = (top_up > Decimal::ZERO).then(|| TaxLineItem {
        name: "Minimum tax on income above final-tax limits".to_string(),
        category: EXCESS_FINAL_TAX_CATEGORY.to_string(),
        regime: RegimeKind::MinimumFloor,
        base_amount: excess_income,
        rate: None,
        amount: top_up,
    });

    let reasoning = if top_up > Decimal::ZERO {
        format!(
            "Normal tax of {} on {} above final-tax limits is below its minimum of {}; top-up {}",
            attributable_tax, excess_income, minimum_tax, top_up
        )
    } else {
        format!(
            "Normal tax of {} on {} above final-tax limits meets its minimum of {}",
            attributable_tax, excess_income, minimum_tax
        )
    };

    Ok(ExcessMinimumResult {
        attributable_tax,
        top_up,
        line,
        audit_step: AuditStep {
            step_number,
            rule_id: "excess_final_tax_minimum".to_string(),
            rule_name: "Minimum Tax on Income Above Final-Tax Limits".to_string(),
            stage: Stage::ComputeRegimeTaxes,
            input: serde_json::json!({
                "excess_income": excess_income.to_string(),
                "minimum_tax": minimum_tax.to_string(),
                "normal_tax": normal_tax.to_string(),
                "normal_tax_without_excess": normal_tax_without_excess.to_string(),
            }),
            output: serde_json::json!({
                "attributable_tax": attributable_tax.to_string(),
                "top_up": top_up.to_string(),
            }),
            reasoning,
        },
    })
}
