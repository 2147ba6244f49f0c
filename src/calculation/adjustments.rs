//! Deductions, reductions and credits.
//!
//! Each adjustment stage is a capped reduce over the claims of one kind
//! against a running liability:
//!
//! 1. Deductions against normal taxable income, before any tax is computed
//! 2. Reductions against gross chargeable tax
//! 3. Credits against the tax left after reductions
//!
//! Claims under the same key are summed and capped together, so a key's
//! allowed total never exceeds its cap. The allowed amount is then valued:
//! at face value, or as a rebate at the average rate of tax. Values are
//! absorbed by the running liability in key order until it reaches zero;
//! whatever is left is reported as unabsorbed, never silently dropped.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::{AgeOfJoiningRule, CapBase, CapRule, RateTable};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AdjustmentClaim, AdjustmentItem, AdjustmentKind, AdjustmentStageOutcome, AdjustmentValuation,
    AuditStep, AuditWarning,
};

use super::rounding::{checked_sum, round_currency};

/// Warning code for adjustments that exceeded the liability they were applied to.
pub const UNABSORBED_ADJUSTMENT_WARNING: &str = "ADJUSTMENT_UNABSORBED";

/// The values percentage caps may be taken of.
///
/// `taxable_income` is normal income before deductions during the deduction
/// stage, and taxable income including capital gains afterwards. Tax bases
/// not yet known during deductions are zero there; rate tables are validated
/// so deduction caps never reference them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapBases {
    /// Taxable income known at the stage.
    pub taxable_income: Decimal,
    /// Tax on normal income.
    pub normal_tax: Decimal,
    /// Capital-gain tax.
    pub capital_gain_tax: Decimal,
    /// Gross chargeable tax.
    pub gross_chargeable_tax: Decimal,
}

impl CapBases {
    fn value(&self, base: CapBase, running_liability: Decimal) -> Decimal {
        match base {
            CapBase::TaxableIncome => self.taxable_income,
            CapBase::NormalTax => self.normal_tax,
            CapBase::CapitalGainTax => self.capital_gain_tax,
            CapBase::GrossChargeableTax => self.gross_chargeable_tax,
            CapBase::RunningLiability => running_liability,
        }
    }

    /// Gross chargeable tax as a fraction of taxable income, at most 1.
    ///
    /// Zero when there is no taxable income.
    ///
    /// # Example
    ///
    /// ```
    /// use tax_engine::calculation::CapBases;
    /// use rust_decimal::Decimal;
    /// use std::str::FromStr;
    ///
    /// let bases = CapBases {
    ///     taxable_income: Decimal::from(1_500_000),
    ///     gross_chargeable_tax: Decimal::from(39_000),
    ///     ..Default::default()
    /// };
    /// assert_eq!(bases.average_rate(), Decimal::from_str("0.026").unwrap());
    /// ```
    pub fn average_rate(&self) -> Decimal {
        if self.taxable_income <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.gross_chargeable_tax
            .checked_div(self.taxable_income)
            .map_or(Decimal::ONE, |rate| rate.min(Decimal::ONE))
    }
}

/// The result of one adjustment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentStageResult {
    /// The stage outcome, including every resolved item.
    pub outcome: AdjustmentStageOutcome,
    /// Warnings raised by the stage.
    pub warnings: Vec<AuditWarning>,
    /// One audit step per item plus a closing summary step.
    pub audit_steps: Vec<AuditStep>,
}

/// A resolved cap and a description of how it was derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCap {
    /// The cap amount.
    pub amount: Decimal,
    /// How the cap was derived.
    pub basis: String,
}

/// Checks every claim before any stage runs.
///
/// # Errors
///
/// * `UnknownAdjustment` for a key with no registered rule
/// * `InvalidInput` for a negative claimed amount
pub fn validate_claims(claims: &[AdjustmentClaim], table: &RateTable) -> EngineResult<()> {
    for claim in claims {
        table.adjustment_rule(&claim.key)?;
        if claim.claimed_amount < Decimal::ZERO {
            return Err(EngineError::InvalidInput {
                category: claim.key.clone(),
                field: "claimed_amount".to_string(),
                message: format!("negative claim {} is not allowed", claim.claimed_amount),
            });
        }
    }
    Ok(())
}

/// Returns the percentage after applying the age-of-joining rule.
///
/// # Example
///
/// ```
/// use tax_engine::calculation::effective_percent;
/// use tax_engine::config::AgeOfJoiningRule;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let dec = |s: &str| Decimal::from_str(s).unwrap();
/// let rule = AgeOfJoiningRule {
///     min_joining_age: 41,
///     base_age: 40,
///     step_percent: dec("0.02"),
///     max_percent: dec("0.50"),
/// };
///
/// assert_eq!(effective_percent(dec("0.20"), Some(&rule), Some(35)), dec("0.20"));
/// assert_eq!(effective_percent(dec("0.20"), Some(&rule), Some(45)), dec("0.30"));
/// assert_eq!(effective_percent(dec("0.20"), Some(&rule), Some(60)), dec("0.50"));
/// ```
pub fn effective_percent(
    percent: Decimal,
    rule: Option<&AgeOfJoiningRule>,
    age_at_joining: Option<u32>,
) -> Decimal {
    match (rule, age_at_joining) {
        (Some(rule), Some(age)) if age >= rule.min_joining_age => {
            let years = Decimal::from(age.saturating_sub(rule.base_age));
            (percent + rule.step_percent * years).min(rule.max_percent)
        }
        _ => percent,
    }
}

/// Resolves a cap rule against the stage's bases.
///
/// Percentage caps are rounded half-up to the currency unit.
pub fn resolve_cap(
    rule: &CapRule,
    bases: &CapBases,
    running_liability: Decimal,
    age_at_joining: Option<u32>,
    decimal_places: u32,
) -> ResolvedCap {
    match rule {
        CapRule::Absolute { amount } => ResolvedCap {
            amount: *amount,
            basis: format!("absolute ceiling of {}", amount),
        },
        CapRule::PercentOf {
            base,
            percent,
            age_of_joining,
        } => {
            let percent = effective_percent(*percent, age_of_joining.as_ref(), age_at_joining);
            let base_value = bases.value(*base, running_liability);
            ResolvedCap {
                amount: round_currency(base_value * percent, decimal_places),
                basis: format!(
                    "{}% of {} ({})",
                    (percent * Decimal::ONE_HUNDRED).normalize(),
                    base.as_str(),
                    base_value
                ),
            }
        }
        CapRule::LesserOf { caps } => {
            let resolved: Vec<ResolvedCap> = caps
                .iter()
                .map(|c| resolve_cap(c, bases, running_liability, age_at_joining, decimal_places))
                .collect();
            let amount = resolved
                .iter()
                .map(|c| c.amount)
                .min()
                .unwrap_or(Decimal::ZERO);
            let parts: Vec<&str> = resolved.iter().map(|c| c.basis.as_str()).collect();
            ResolvedCap {
                amount,
                basis: format!("lesser of [{}]", parts.join("; ")),
            }
        }
    }
}

/// Applies every claim of one kind against the running liability.
///
/// For each key, in key order:
///
/// 1. `allowed = min(claimed, cap)`
/// 2. `value` is `allowed`, or `round(allowed × average_rate)` for
///    average-rate rules
/// 3. `applied = min(value, remaining liability)`; the rest is unabsorbed
///
/// so `liability_before - total_applied = liability_after` always holds.
///
/// # Arguments
///
/// * `kind` - The kind of adjustment this stage applies
/// * `claims` - All claims of the run; claims of other kinds are skipped
/// * `table` - The rate table holding the adjustment rules
/// * `bases` - Values available to caps and average-rate valuation at this stage
/// * `liability_before` - The running liability entering the stage
/// * `step_number` - The first step number to use for audit steps
///
/// # Errors
///
/// * `UnknownAdjustment` if a claim's key has no rule
/// * `InvalidInput` if the claims under one key, or the stage's values,
///   add up to more than `Decimal` can hold
/// * `InvariantViolation` if `liability_before` is negative
pub fn apply_adjustments(
    kind: AdjustmentKind,
    claims: &[AdjustmentClaim],
    table: &RateTable,
    bases: &CapBases,
    liability_before: Decimal,
    step_number: u32,
) -> EngineResult<AdjustmentStageResult> {
    if liability_before < Decimal::ZERO {
        return Err(EngineError::InvariantViolation {
            stage: kind.stage(),
            category: kind.as_str().to_string(),
            message: format!("liability entering the stage {} is negative", liability_before),
        });
    }

    let out_of_range = |key: &str| EngineError::InvalidInput {
        category: key.to_string(),
        field: "claimed_amount".to_string(),
        message: "claimed amounts add up to more than the supported range".to_string(),
    };

    // Sum claims per key; the first stated joining age wins.
    let mut grouped: BTreeMap<&str, (Decimal, Option<u32>)> = BTreeMap::new();
    for claim in claims {
        let rule = table.adjustment_rule(&claim.key)?;
        if rule.kind != kind {
            continue;
        }
        let entry = grouped.entry(claim.key.as_str()).or_default();
        entry.0 = entry
            .0
            .checked_add(claim.claimed_amount)
            .ok_or_else(|| out_of_range(claim.key.as_str()))?;
        entry.1 = entry.1.or(claim.age_at_joining);
    }

    let decimal_places = table.currency.decimal_places;
    let average_rate = bases.average_rate();
    let mut items = Vec::with_capacity(grouped.len());
    let mut audit_steps = Vec::with_capacity(grouped.len() + 1);
    let mut step = step_number;
    let mut remaining = liability_before;

    for (key, (claimed, age)) in grouped {
        let rule = table.adjustment_rule(key)?;
        let cap = rule
            .cap
            .as_ref()
            .map(|c| resolve_cap(c, bases, liability_before, age, decimal_places));

        let (allowed, cap_applied) = match &cap {
            Some(cap) if claimed > cap.amount => (cap.amount, true),
            _ => (claimed, false),
        };

        // The average rate is at most 1, so the product never exceeds `allowed`.
        let value = match rule.valuation {
            AdjustmentValuation::FaceValue => allowed,
            AdjustmentValuation::AverageRate => {
                round_currency(allowed * average_rate, decimal_places)
            }
        };
        let applied = value.min(remaining);
        remaining -= applied;

        let item = AdjustmentItem {
            key: key.to_string(),
            description: rule.description.clone(),
            kind,
            claimed_amount: claimed,
            cap: cap.as_ref().map(|c| c.amount),
            cap_basis: cap
                .as_ref()
                .map_or_else(|| "uncapped".to_string(), |c| c.basis.clone()),
            cap_applied,
            allowed_amount: allowed,
            valuation: rule.valuation,
            value,
            applied_amount: applied,
            unabsorbed_amount: value - applied,
        };

        let mut reasoning = if cap_applied {
            format!(
                "Claim {} for '{}' exceeds cap of {} ({}); cap applied",
                claimed, key, allowed, item.cap_basis
            )
        } else {
            format!(
                "Claim {} for '{}' within cap ({}); allowed in full",
                claimed, key, item.cap_basis
            )
        };
        if rule.valuation == AdjustmentValuation::AverageRate {
            reasoning.push_str(&format!(
                "; rebate at average rate {} is {}",
                average_rate.normalize(),
                value
            ));
        }
        if item.unabsorbed_amount > Decimal::ZERO {
            reasoning.push_str(&format!(
                "; {} absorbed, {} left unabsorbed",
                applied, item.unabsorbed_amount
            ));
        }

        audit_steps.push(AuditStep {
            step_number: step,
            rule_id: format!("{}_{}", kind.as_str(), key),
            rule_name: rule.description.clone(),
            stage: kind.stage(),
            input: serde_json::json!({
                "key": key,
                "claimed_amount": claimed.to_string(),
                "age_at_joining": age,
            }),
            output: serde_json::json!({
                "cap": item.cap.map(|c| c.to_string()),
                "cap_basis": item.cap_basis,
                "cap_applied": cap_applied,
                "allowed_amount": allowed.to_string(),
                "valuation": item.valuation,
                "value": value.to_string(),
                "applied_amount": applied.to_string(),
                "unabsorbed_amount": item.unabsorbed_amount.to_string(),
            }),
            reasoning,
        });
        step += 1;
        items.push(item);
    }

    let total_applied = liability_before - remaining;
    let liability_after = remaining;
    let unabsorbed = checked_sum(items.iter().map(|i| i.unabsorbed_amount))
        .ok_or_else(|| out_of_range(kind.as_str()))?;

    let mut warnings = Vec::new();
    if unabsorbed > Decimal::ZERO {
        warnings.push(AuditWarning {
            code: UNABSORBED_ADJUSTMENT_WARNING.to_string(),
            message: format!(
                "{}s exceed the liability of {}; {} could not be used",
                kind.as_str(),
                liability_before,
                unabsorbed
            ),
            severity: "medium".to_string(),
        });
    }

    audit_steps.push(AuditStep {
        step_number: step,
        rule_id: format!("{}_stage_total", kind.as_str()),
        rule_name: format!("Total {}s", kind.as_str()),
        stage: kind.stage(),
        input: serde_json::json!({
            "liability_before": liability_before.to_string(),
            "items": items.len(),
        }),
        output: serde_json::json!({
            "total_applied": total_applied.to_string(),
            "liability_after": liability_after.to_string(),
            "unabsorbed": unabsorbed.to_string(),
        }),
        reasoning: format!(
            "{} less {}s of {} leaves {}",
            liability_before,
            kind.as_str(),
            total_applied,
            liability_after
        ),
    });

    Ok(AdjustmentStageResult {
        outcome: AdjustmentStageOutcome {
            kind,
            items,
            total_applied,
            liability_before,
            liability_after,
            unabsorbed,
        },
        warnings,
        audit_steps,
    })
}
