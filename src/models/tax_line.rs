//! Tax line items produced by the regime calculators.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The tax regime that produced a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeKind {
    /// Ascending marginal-rate slabs.
    Progressive,
    /// Flat final-tax rate.
    Flat,
    /// Top-up to the statutory minimum tax.
    MinimumFloor,
    /// Holding-period capital-gain schedule.
    CapitalGain,
    /// Surcharge on normal tax.
    Surcharge,
}

/// A named tax amount, tagged with its source category and regime.
///
/// # Example
///
/// ```
/// use tax_engine::models::{RegimeKind, TaxLineItem};
/// use rust_decimal::Decimal;
///
/// let line = TaxLineItem {
///     name: "Final tax - sukuk".to_string(),
///     category: "sukuk".to_string(),
///     regime: RegimeKind::Flat,
///     base_amount: Decimal::new(1_000_000, 0),
///     rate: Some(Decimal::new(10, 2)),
///     amount: Decimal::new(100_000, 0),
/// };
/// assert_eq!(line.regime, RegimeKind::Flat);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLineItem {
    /// Human-readable name of the line.
    pub name: String,
    /// The category (or aggregate, e.g. "normal_income") the line is charged on.
    pub category: String,
    /// The regime that produced the line.
    pub regime: RegimeKind,
    /// The amount the tax was computed on.
    pub base_amount: Decimal,
    /// The single rate applied, if the regime has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    /// The tax amount.
    pub amount: Decimal,
}
