//! Minimum tax floor.

use rust_decimal::Decimal;

use crate::config::MinimumTaxConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, RegimeKind, Stage, TaxLineItem};

use super::measures::IncomeMeasures;

/// The result of comparing computed tax against the minimum tax floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimumTaxResult {
    /// The tax after the floor comparison.
    pub final_tax: Decimal,
    /// Whether the floor raised the tax.
    pub applied: bool,
    /// The amount added to reach the floor.
    pub top_up: Decimal,
    /// A minimum-floor tax line, present only when the floor raised the tax.
    pub line: Option<TaxLineItem>,
    /// The audit step recording the comparison.
    pub audit_step: AuditStep,
}

/// Applies the minimum tax floor to the tax left after credits.
///
/// When qualifying income is strictly above the threshold the result is
/// `max(computed_tax, floor)`; otherwise `computed_tax` passes through.
///
/// # Errors
///
/// Returns `InvariantViolation` if `computed_tax` is negative; the credit
/// stage floors the running liability, so a negative value is a defect.
pub fn apply_minimum_tax(
    computed_tax: Decimal,
    config: Option<&MinimumTaxConfig>,
    measures: &IncomeMeasures,
    step_number: u32,
) -> EngineResult<MinimumTaxResult> {
    if computed_tax < Decimal::ZERO {
        return Err(EngineError::InvariantViolation {
            stage: Stage::ApplyMinimumFloor,
            category: "chargeable_tax".to_string(),
            message: format!("tax before minimum floor {} is negative", computed_tax),
        });
    }

    let Some(config) = config else {
        return Ok(MinimumTaxResult {
            final_tax: computed_tax,
            applied: false,
            top_up: Decimal::ZERO,
            line: None,
            audit_step: AuditStep {
                step_number,
                rule_id: "minimum_tax".to_string(),
                rule_name: "Minimum Tax Floor".to_string(),
                stage: Stage::ApplyMinimumFloor,
                input: serde_json::json!({ "configured": false, "computed_tax": computed_tax.to_string() }),
                output: serde_json::json!({ "final_tax": computed_tax.to_string() }),
                reasoning: "No minimum tax configured for this tax year".to_string(),
            },
        });
    };

    let qualifying = measures.qualifying_income(config.qualifying_income);
    let triggered = qualifying > config.threshold;
    let final_tax = if triggered {
        computed_tax.max(config.floor)
    } else {
        computed_tax
    };
    let top_up = final_tax - computed_tax;
    let applied = top_up > Decimal::ZERO;

    let line = applied.then(|| TaxLineItem {
        name: "Minimum tax top-up".to_string(),
        category: "chargeable_tax".to_string(),
        regime: RegimeKind::MinimumFloor,
        base_amount: computed_tax,
        rate: None,
        amount: top_up,
    });

    let reasoning = match (triggered, applied) {
        (false, _) => format!(
            "Qualifying income {} does not exceed threshold {}, floor not applicable",
            qualifying, config.threshold
        ),
        (true, false) => format!(
            "Computed tax {} already meets the minimum of {}",
            computed_tax, config.floor
        ),
        (true, true) => format!(
            "Computed tax {} raised to the minimum of {} (top-up {})",
            computed_tax, config.floor, top_up
        ),
    };

    Ok(MinimumTaxResult {
        final_tax,
        applied,
        top_up,
        line,
        audit_step: AuditStep {
            step_number,
            rule_id: "minimum_tax".to_string(),
            rule_name: "Minimum Tax Floor".to_string(),
            stage: Stage::ApplyMinimumFloor,
            input: serde_json::json!({
                "computed_tax": computed_tax.to_string(),
                "qualifying_income": qualifying.to_string(),
                "threshold": config.threshold.to_string(),
                "floor": config.floor.to_string(),
            }),
            output: serde_json::json!({
                "triggered": triggered,
                "applied": applied,
                "final_tax": final_tax.to_string(),
            }),
            reasoning,
        },
    })
}
