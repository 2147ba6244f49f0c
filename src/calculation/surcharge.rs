//! Surcharge calculation.
//!
//! A surcharge is an additional levy on normal tax once aggregate income
//! exceeds a threshold. Both the income measure compared against the
//! threshold and the tax the rate applies to come from the rate table, and
//! the rate may differ for salaried and non-salaried taxpayers.

use rust_decimal::Decimal;

use crate::config::{SurchargeBase, SurchargeConfig};
use crate::models::{AuditStep, RegimeKind, Stage, TaxLineItem, TaxpayerType};

use super::measures::IncomeMeasures;
use super::rounding::round_currency;

/// The tax amounts a surcharge base can be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurchargeBases {
    /// Tax on normal income.
    pub normal_tax: Decimal,
    /// Normal, final and capital-gain tax combined.
    pub regime_tax_total: Decimal,
}

/// The result of the surcharge stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurchargeResult {
    /// The surcharge, zero when not triggered.
    pub surcharge: Decimal,
    /// Whether the income exceeded the threshold.
    pub triggered: bool,
    /// The surcharge tax line, present only when triggered.
    pub line: Option<TaxLineItem>,
    /// The audit step recording the decision.
    pub audit_step: AuditStep,
}

/// Computes the surcharge for a run.
///
/// Applies only when the configured income measure is strictly greater than
/// the threshold. A rate table without a surcharge section never triggers.
///
/// # Example
///
/// ```
/// use tax_engine::calculation::{compute_surcharge, IncomeMeasures, SurchargeBases};
/// use tax_engine::config::{SurchargeBase, SurchargeConfig, SurchargeTrigger, TaxpayerTypeRate};
/// use tax_engine::models::TaxpayerType;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let config = SurchargeConfig {
///     threshold: Decimal::from(10_000_000),
///     rate: TaxpayerTypeRate::Flat(Decimal::from_str("0.10").unwrap()),
///     trigger: SurchargeTrigger::TaxableIncomeIncludingCapitalGains,
///     base: SurchargeBase::NormalTax,
/// };
/// let measures = IncomeMeasures {
///     taxable_income_including_capital_gains: Decimal::from(12_000_000),
///     ..Default::default()
/// };
/// let bases = SurchargeBases {
///     normal_tax: Decimal::from(3_000_000),
///     regime_tax_total: Decimal::from(3_500_000),
/// };
///
/// let result = compute_surcharge(Some(&config), TaxpayerType::Salaried, &measures, bases, 0, 1);
/// assert_eq!(result.surcharge, Decimal::from(300_000));
/// ```
pub fn compute_surcharge(
    config: Option<&SurchargeConfig>,
    taxpayer_type: TaxpayerType,
    measures: &IncomeMeasures,
    bases: SurchargeBases,
    decimal_places: u32,
    step_number: u32,
) -> SurchargeResult {
    let Some(config) = config else {
        return SurchargeResult {
            surcharge: Decimal::ZERO,
            triggered: false,
            line: None,
            audit_step: AuditStep {
                step_number,
                rule_id: "surcharge".to_string(),
                rule_name: "Surcharge".to_string(),
                stage: Stage::ApplySurcharge,
                input: serde_json::json!({ "configured": false }),
                output: serde_json::json!({ "surcharge": "0" }),
                reasoning: "No surcharge configured for this tax year".to_string(),
            },
        };
    };

    let income = measures.surcharge_trigger(config.trigger);
    let base_amount = match config.base {
        SurchargeBase::NormalTax => bases.normal_tax,
        SurchargeBase::RegimeTaxTotal => bases.regime_tax_total,
    };
    let rate = config.rate.for_type(taxpayer_type);
    let triggered = income > config.threshold;

    let surcharge = if triggered {
        round_currency(base_amount * rate, decimal_places)
    } else {
        Decimal::ZERO
    };

    let line = triggered.then(|| TaxLineItem {
        name: "Surcharge".to_string(),
        category: match config.base {
            SurchargeBase::NormalTax => "normal_income".to_string(),
            SurchargeBase::RegimeTaxTotal => "all_regimes".to_string(),
        },
        regime: RegimeKind::Surcharge,
        base_amount,
        rate: Some(rate),
        amount: surcharge,
    });

    let reasoning = if triggered {
        format!(
            "Income {} exceeds threshold {}: {} surcharge {} x {} = {}",
            income,
            config.threshold,
            taxpayer_type.as_str(),
            base_amount,
            rate.normalize(),
            surcharge
        )
    } else {
        format!(
            "Income {} does not exceed threshold {}, no surcharge",
            income, config.threshold
        )
    };

    SurchargeResult {
        surcharge,
        triggered,
        line,
        audit_step: AuditStep {
            step_number,
            rule_id: "surcharge".to_string(),
            rule_name: "Surcharge".to_string(),
            stage: Stage::ApplySurcharge,
            input: serde_json::json!({
                "income": income.to_string(),
                "threshold": config.threshold.to_string(),
                "taxpayer_type": taxpayer_type.as_str(),
                "rate": rate.to_string(),
                "base_amount": base_amount.to_string(),
            }),
            output: serde_json::json!({
                "triggered": triggered,
                "surcharge": surcharge.to_string(),
            }),
            reasoning,
        },
    }
}
