//! Input models for a tax computation run.
//!
//! These types describe what the forms collaborator hands to the engine:
//! raw per-category field mappings, adjustment claims and withholding records.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single raw value captured by a form field.
///
/// Form capture is loosely typed: a field may arrive as a number, a numeric
/// string (possibly with thousands separators), a blank string, a checkbox
/// flag or `null`. Anything else (an object or an array) is kept as
/// [`FieldValue::Other`] so an undeclared metadata field never fails the
/// whole request. Coercion into an amount happens at the aggregator boundary.
///
/// # Example
///
/// ```
/// use tax_engine::models::FieldValue;
///
/// let value: FieldValue = serde_json::from_str("\"1,500,000\"").unwrap();
/// assert!(matches!(value, FieldValue::Text(_)));
///
/// let value: FieldValue = serde_json::from_str("null").unwrap();
/// assert_eq!(value, FieldValue::Null);
///
/// let value: FieldValue = serde_json::from_str(r#"{"saved_by": "wizard"}"#).unwrap();
/// assert!(matches!(value, FieldValue::Other(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// An explicit numeric value.
    Number(Decimal),
    /// A textual value, numeric or not.
    Text(String),
    /// A boolean flag (e.g. a yes/no checkbox).
    Flag(bool),
    /// An explicit null.
    Null,
    /// Any other JSON value, such as an object or an array.
    Other(serde_json::Value),
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Whether the taxpayer appears on the Active Taxpayers List.
///
/// Final-tax rates may differ by status; non-filers usually pay double.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilerStatus {
    /// On the Active Taxpayers List.
    #[default]
    Atl,
    /// Not on the Active Taxpayers List.
    NonAtl,
}

impl FilerStatus {
    /// Returns the snake_case identifier of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilerStatus::Atl => "atl",
            FilerStatus::NonAtl => "non_atl",
        }
    }
}

/// Whether the taxpayer is a salaried individual.
///
/// Selects the surcharge rate in years that charge salaried and
/// non-salaried taxpayers differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxpayerType {
    /// An individual whose income is mainly salary.
    #[default]
    Salaried,
    /// Any other individual, such as a business owner or professional.
    NonSalaried,
}

impl TaxpayerType {
    /// Returns the snake_case identifier of the taxpayer type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxpayerType::Salaried => "salaried",
            TaxpayerType::NonSalaried => "non_salaried",
        }
    }
}

/// The raw field mapping captured by one form: field key to value.
pub type RawFields = BTreeMap<String, FieldValue>;

/// A claimed deduction, reduction or credit.
///
/// The claim's kind is not part of the claim itself; it is determined by the
/// adjustment rule registered under `key` in the tax year's rate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentClaim {
    /// The registered adjustment key (e.g. "charitable_donations").
    pub key: String,
    /// The amount the taxpayer claims.
    pub claimed_amount: Decimal,
    /// Age at which the taxpayer joined the scheme, for age-scaled caps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_at_joining: Option<u32>,
}

/// Tax already collected at source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingRecord {
    /// The source category (e.g. "salary", "electricity").
    pub category: String,
    /// Optional free-text description of the deduction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The amount withheld.
    pub amount: Decimal,
}

/// Everything the engine needs to compute one taxpayer's return.
///
/// # Example
///
/// ```
/// use tax_engine::models::{FilerStatus, TaxReturnInput};
///
/// let input: TaxReturnInput = serde_json::from_value(serde_json::json!({
///     "taxpayer_id": "tp_001",
///     "tax_year": "2025-26",
///     "categories": {
///         "salary": { "annual_basic_salary": "2400000", "bonus": "" }
///     }
/// }))
/// .unwrap();
///
/// assert_eq!(input.categories["salary"].len(), 2);
/// assert!(input.adjustments.is_empty());
/// assert_eq!(input.filer_status, FilerStatus::Atl);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxReturnInput {
    /// Identifier of the taxpayer the return belongs to.
    pub taxpayer_id: String,
    /// The tax-year key used to select the rate table (e.g. "2025-26").
    pub tax_year: String,
    /// Active Taxpayers List status, selecting status-dependent final-tax rates.
    #[serde(default)]
    pub filer_status: FilerStatus,
    /// Salaried or non-salaried, selecting the surcharge rate.
    #[serde(default)]
    pub taxpayer_type: TaxpayerType,
    /// Raw field mappings keyed by income category name.
    #[serde(default)]
    pub categories: BTreeMap<String, RawFields>,
    /// Claimed deductions, reductions and credits.
    #[serde(default)]
    pub adjustments: Vec<AdjustmentClaim>,
    /// Taxes already collected at source.
    #[serde(default)]
    pub withholdings: Vec<WithholdingRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_field_value_accepts_json_number() {
        let value: FieldValue = serde_json::from_str("1500000").unwrap();
        assert_eq!(value, FieldValue::Number(dec("1500000")));
    }

    #[test]
    fn test_field_value_accepts_flag_and_blank() {
        let flag: FieldValue = serde_json::from_str("true").unwrap();
        assert_eq!(flag, FieldValue::Flag(true));

        let blank: FieldValue = serde_json::from_str("\"\"").unwrap();
        assert_eq!(blank, FieldValue::Text(String::new()));
    }

    #[test]
    fn test_adjustment_claim_age_is_optional() {
        let claim: AdjustmentClaim = serde_json::from_value(serde_json::json!({
            "key": "pension_fund",
            "claimed_amount": "50000"
        }))
        .unwrap();

        assert_eq!(claim.claimed_amount, dec("50000"));
        assert_eq!(claim.age_at_joining, None);
    }

    #[test]
    fn test_input_defaults_empty_collections() {
        let input: TaxReturnInput = serde_json::from_value(serde_json::json!({
            "taxpayer_id": "tp_001",
            "tax_year": "2025-26"
        }))
        .unwrap();

        assert!(input.categories.is_empty());
        assert!(input.adjustments.is_empty());
        assert!(input.withholdings.is_empty());
        assert_eq!(input.filer_status, FilerStatus::Atl);
        assert_eq!(input.taxpayer_type, TaxpayerType::Salaried);
    }

    #[test]
    fn test_field_value_keeps_objects_and_arrays() {
        let object: FieldValue = serde_json::from_str(r#"{"step": 3, "done": true}"#).unwrap();
        assert_eq!(
            object,
            FieldValue::Other(serde_json::json!({"step": 3, "done": true}))
        );

        let array: FieldValue = serde_json::from_str("[1, 2]").unwrap();
        assert!(matches!(array, FieldValue::Other(serde_json::Value::Array(_))));
    }

    #[test]
    fn test_form_metadata_object_does_not_fail_input() {
        let input: TaxReturnInput = serde_json::from_value(serde_json::json!({
            "taxpayer_id": "tp_001",
            "tax_year": "2025-26",
            "categories": {
                "salary": {
                    "annual_basic_salary": "1500000",
                    "_meta": { "saved_at": "2025-09-01", "pages": [1, 2] }
                }
            }
        }))
        .unwrap();

        assert!(matches!(input.categories["salary"]["_meta"], FieldValue::Other(_)));
    }

    #[test]
    fn test_filer_status_and_taxpayer_type_parse_snake_case() {
        let input: TaxReturnInput = serde_json::from_value(serde_json::json!({
            "taxpayer_id": "tp_001",
            "tax_year": "2025-26",
            "filer_status": "non_atl",
            "taxpayer_type": "non_salaried"
        }))
        .unwrap();

        assert_eq!(input.filer_status, FilerStatus::NonAtl);
        assert_eq!(input.taxpayer_type, TaxpayerType::NonSalaried);
        assert_eq!(input.filer_status.as_str(), "non_atl");
    }
}
