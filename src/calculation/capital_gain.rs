//! Capital-gain tax calculation.
//!
//! Gains are taxed per holding-period bucket, each at its own configured
//! rate. The bucket lines sum to the category's capital-gain tax.

use rust_decimal::Decimal;

use crate::config::RateTable;
use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, CategoryTotals, RegimeKind, Stage, TaxLineItem};

use super::rounding::{checked_sum, round_currency};

/// The result of taxing one capital-gain category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapitalGainTaxResult {
    /// One line per holding-period bucket, in bucket-key order.
    pub lines: Vec<TaxLineItem>,
    /// Sum of the rounded bucket lines.
    pub total: Decimal,
    /// The audit step recording the calculation.
    pub audit_step: AuditStep,
}

/// Computes capital-gain tax for a category's holding-period buckets.
///
/// # Errors
///
/// * `MissingRate` if a bucket has no rate in the table
/// * `InvariantViolation` if a bucket amount is negative
pub fn compute_capital_gain_tax(
    totals: &CategoryTotals,
    table: &RateTable,
    step_number: u32,
) -> EngineResult<CapitalGainTaxResult> {
    let decimal_places = table.currency.decimal_places;
    let mut lines = Vec::with_capacity(totals.buckets.len());

    for (bucket, &gain) in &totals.buckets {
        if gain < Decimal::ZERO {
            return Err(EngineError::InvariantViolation {
                stage: Stage::ComputeRegimeTaxes,
                category: totals.category.clone(),
                message: format!("gain {} in bucket '{}' is negative", gain, bucket),
            });
        }

        let rate = table.capital_gain_rate(bucket)?;
        lines.push(TaxLineItem {
            name: format!("Capital gains tax - {}", bucket),
            category: totals.category.clone(),
            regime: RegimeKind::CapitalGain,
            base_amount: gain,
            rate: Some(rate),
            amount: round_currency(gain * rate, decimal_places),
        });
    }

    let total = checked_sum(lines.iter().map(|l| l.amount)).ok_or_else(|| {
        EngineError::InvariantViolation {
            stage: Stage::ComputeRegimeTaxes,
            category: totals.category.clone(),
            message: "bucket taxes add up to more than the supported range".to_string(),
        }
    })?;

    let per_bucket: Vec<serde_json::Value> = lines
        .iter()
        .map(|l| {
            serde_json::json!({
                "line": l.name,
                "gain": l.base_amount.to_string(),
                "rate": l.rate.map(|r| r.to_string()),
                "tax": l.amount.to_string(),
            })
        })
        .collect();

    let audit_step = AuditStep {
        step_number,
        rule_id: "capital_gain_tax".to_string(),
        rule_name: "Capital Gains by Holding Period".to_string(),
        stage: Stage::ComputeRegimeTaxes,
        input: serde_json::json!({
            "category": totals.category,
            "buckets": totals.buckets,
        }),
        output: serde_json::json!({
            "lines": per_bucket,
            "total": total.to_string(),
        }),
        reasoning: format!(
            "{} bucket(s) of '{}' taxed at their holding-period rates, total {}",
            lines.len(),
            totals.category,
            total
        ),
    };

    Ok(CapitalGainTaxResult {
        lines,
        total,
        audit_step,
    })
}
