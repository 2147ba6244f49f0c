//! Category aggregation.
//!
//! Reduces a form's raw field mapping to typed [`CategoryTotals`] using the
//! category's schema. This is the only place raw form values are read; every
//! later stage works on the typed totals.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::config::{CategorySchema, FieldRole};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, AuditWarning, CategoryTotals, FieldValue, IncomeClass, RawFields, Stage,
};

use super::rounding::checked_sum;

/// Warning code for form fields the schema does not declare.
pub const UNKNOWN_FIELD_WARNING: &str = "UNKNOWN_FIELD";

/// The result of aggregating one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResult {
    /// The normalized totals.
    pub totals: CategoryTotals,
    /// Warnings for ignored fields.
    pub warnings: Vec<AuditWarning>,
    /// The audit step recording the aggregation.
    pub audit_step: AuditStep,
}

/// Coerces a raw form value into a non-negative amount.
///
/// Absent markers (`null`, `""`, whitespace, `"-"`) are zero. Thousands
/// separators and surrounding whitespace are stripped before parsing.
/// Text that still isn't a number, a yes/no flag, an object or array, or a
/// negative amount is an `InvalidInput` error naming the category and field.
///
/// # Examples
///
/// ```
/// use tax_engine::calculation::coerce_amount;
/// use tax_engine::models::FieldValue;
/// use rust_decimal::Decimal;
///
/// let amount = coerce_amount("salary", "bonus", &FieldValue::from("1,500,000")).unwrap();
/// assert_eq!(amount, Decimal::from(1_500_000));
///
/// let blank = coerce_amount("salary", "bonus", &FieldValue::from("  ")).unwrap();
/// assert_eq!(blank, Decimal::ZERO);
///
/// assert!(coerce_amount("salary", "bonus", &FieldValue::from("abc")).is_err());
/// ```
pub fn coerce_amount(category: &str, field: &str, value: &FieldValue) -> EngineResult<Decimal> {
    let invalid = |message: String| EngineError::InvalidInput {
        category: category.to_string(),
        field: field.to_string(),
        message,
    };

    let amount = match value {
        FieldValue::Null => Decimal::ZERO,
        FieldValue::Number(n) => *n,
        FieldValue::Flag(_) => {
            return Err(invalid("expected an amount, found a yes/no flag".to_string()));
        }
        FieldValue::Other(other) => {
            let found = if other.is_array() { "an array" } else { "an object" };
            return Err(invalid(format!("expected an amount, found {}", found)));
        }
        FieldValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed == "-" {
                Decimal::ZERO
            } else {
                let cleaned: String = trimmed
                    .chars()
                    .filter(|c| *c != ',' && !c.is_whitespace())
                    .collect();
                Decimal::from_str(&cleaned)
                    .map_err(|_| invalid(format!("'{}' is not a number", text)))?
            }
        }
    };

    if amount < Decimal::ZERO {
        return Err(invalid(format!("negative amount {} is not allowed", amount)));
    }

    Ok(amount)
}

/// Aggregates one category's raw fields into [`CategoryTotals`].
///
/// Taxable fields are summed into the gross amount and exempt fields into the
/// exempt amount; `derived` fields are skipped and undeclared fields are
/// skipped with a warning. For capital-gain categories the subtraction is done
/// per holding-period bucket, and the category's taxable amount is the sum of
/// the bucket amounts, each floored at zero.
///
/// # Errors
///
/// `InvalidInput` for a value that is not a non-negative amount, or when the
/// category's amounts add up to more than `Decimal` can hold.
///
/// # Arguments
///
/// * `category` - The category name
/// * `fields` - The raw field mapping from the form
/// * `schema` - The category's schema
/// * `step_number` - The step number for audit trail sequencing
pub fn aggregate_category(
    category: &str,
    fields: &RawFields,
    schema: &CategorySchema,
    step_number: u32,
) -> EngineResult<AggregationResult> {
    let mut gross = Decimal::ZERO;
    let mut exempt = Decimal::ZERO;
    let mut bucket_sums: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut counted_fields = 0usize;

    for (field, value) in fields {
        let Some(spec) = schema.fields.get(field) else {
            warnings.push(AuditWarning {
                code: UNKNOWN_FIELD_WARNING.to_string(),
                message: format!(
                    "Field '{}' is not declared for category '{}' and was ignored",
                    field, category
                ),
                severity: "low".to_string(),
            });
            continue;
        };

        if spec.role == FieldRole::Derived {
            continue;
        }

        let amount = coerce_amount(category, field, value)?;
        counted_fields += 1;

        let add = |total: &mut Decimal| -> EngineResult<()> {
            *total = total
                .checked_add(amount)
                .ok_or_else(|| out_of_range(category, field))?;
            Ok(())
        };

        let sums = spec
            .bucket
            .as_ref()
            .map(|bucket| bucket_sums.entry(bucket.clone()).or_default());

        match spec.role {
            FieldRole::Taxable => {
                add(&mut gross)?;
                if let Some((bucket_gross, _)) = sums {
                    add(bucket_gross)?;
                }
            }
            FieldRole::Exempt => {
                add(&mut exempt)?;
                if let Some((_, bucket_exempt)) = sums {
                    add(bucket_exempt)?;
                }
            }
            FieldRole::Derived => {}
        }
    }

    let totals = if schema.income_class == IncomeClass::CapitalGain {
        let buckets: BTreeMap<String, Decimal> = bucket_sums
            .into_iter()
            .map(|(bucket, (g, e))| (bucket, (g - e).max(Decimal::ZERO)))
            .collect();
        CategoryTotals {
            category: category.to_string(),
            income_class: schema.income_class,
            gross_amount: gross,
            exempt_amount: exempt,
            taxable_amount: checked_sum(buckets.values().copied())
                .ok_or_else(|| out_of_range(category, "buckets"))?,
            buckets,
        }
    } else {
        CategoryTotals::new(category, schema.income_class, gross, exempt)
    };

    let reasoning = if totals.taxable_amount.is_zero() && exempt > Decimal::ZERO {
        format!(
            "Exempt amount {} offsets gross {} for '{}'; taxable amount floored at 0",
            exempt, gross, category
        )
    } else {
        format!(
            "'{}': gross {} less exempt {} gives taxable {}",
            category, gross, exempt, totals.taxable_amount
        )
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "aggregate_category".to_string(),
        rule_name: "Category Aggregation".to_string(),
        stage: Stage::AggregateCategories,
        input: serde_json::json!({
            "category": category,
            "income_class": schema.income_class,
            "fields_supplied": fields.len(),
            "fields_counted": counted_fields,
        }),
        output: serde_json::json!({
            "gross_amount": totals.gross_amount.to_string(),
            "exempt_amount": totals.exempt_amount.to_string(),
            "taxable_amount": totals.taxable_amount.to_string(),
            "buckets": totals.buckets,
        }),
        reasoning,
    };

    Ok(AggregationResult {
        totals,
        warnings,
        audit_step,
    })
}

fn out_of_range(category: &str, field: &str) -> EngineError {
    EngineError::InvalidInput {
        category: category.to_string(),
        field: field.to_string(),
        message: "amounts add up to more than the supported range".to_string(),
    }
}
