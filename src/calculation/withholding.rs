//! Withholding reconciliation.
//!
//! Nets tax already collected at source against the final chargeable tax.
//! The sign convention is fixed here and never flipped downstream: positive
//! is tax owed, negative is a refund.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, Stage, WithholdingRecord};

use super::rounding::checked_sum;

/// The result of reconciling withholding against chargeable tax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Tax withheld per source category.
    pub by_category: BTreeMap<String, Decimal>,
    /// Total tax withheld.
    pub total_withheld: Decimal,
    /// `final_chargeable_tax - total_withheld`.
    pub net_demand_or_refund: Decimal,
    /// The audit step recording the reconciliation.
    pub audit_step: AuditStep,
}

/// Sums withholding records by category and nets them against tax.
///
/// # Errors
///
/// Returns `InvalidInput` for a negative withholding amount, or when the
/// withheld amounts add up to more than `Decimal` can hold.
///
/// # Example
///
/// ```
/// use tax_engine::calculation::reconcile_withholding;
/// use tax_engine::models::WithholdingRecord;
/// use rust_decimal::Decimal;
///
/// let records = vec![WithholdingRecord {
///     category: "salary".to_string(),
///     description: None,
///     amount: Decimal::from(250_000),
/// }];
///
/// let result = reconcile_withholding(&records, Decimal::from(200_000), 1).unwrap();
/// assert_eq!(result.net_demand_or_refund, Decimal::from(-50_000));
/// ```
pub fn reconcile_withholding(
    records: &[WithholdingRecord],
    final_chargeable_tax: Decimal,
    step_number: u32,
) -> EngineResult<ReconciliationResult> {
    let invalid = |category: &str, message: String| EngineError::InvalidInput {
        category: category.to_string(),
        field: "withholding_amount".to_string(),
        message,
    };
    let out_of_range = "withheld amounts add up to more than the supported range";

    let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();

    for record in records {
        if record.amount < Decimal::ZERO {
            return Err(invalid(
                &record.category,
                format!("negative withholding {} is not allowed", record.amount),
            ));
        }
        let total = by_category.entry(record.category.clone()).or_default();
        *total = total
            .checked_add(record.amount)
            .ok_or_else(|| invalid(&record.category, out_of_range.to_string()))?;
    }

    let total_withheld = checked_sum(by_category.values().copied())
        .ok_or_else(|| invalid("all", out_of_range.to_string()))?;
    // Both sides are non-negative, so the difference stays in range.
    let net_demand_or_refund = final_chargeable_tax - total_withheld;

    let reasoning = if net_demand_or_refund > Decimal::ZERO {
        format!(
            "Chargeable tax {} less withheld {}: {} payable",
            final_chargeable_tax, total_withheld, net_demand_or_refund
        )
    } else if net_demand_or_refund < Decimal::ZERO {
        format!(
            "Withheld {} exceeds chargeable tax {}: refund of {}",
            total_withheld, final_chargeable_tax, -net_demand_or_refund
        )
    } else {
        format!(
            "Withheld {} exactly settles chargeable tax {}",
            total_withheld, final_chargeable_tax
        )
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "withholding_reconciliation".to_string(),
        rule_name: "Withholding Reconciliation".to_string(),
        stage: Stage::Reconcile,
        input: serde_json::json!({
            "final_chargeable_tax": final_chargeable_tax.to_string(),
            "records": records.len(),
            "withheld_by_category": by_category,
        }),
        output: serde_json::json!({
            "total_withheld": total_withheld.to_string(),
            "net_demand_or_refund": net_demand_or_refund.to_string(),
        }),
        reasoning,
    };

    Ok(ReconciliationResult {
        by_category,
        total_withheld,
        net_demand_or_refund,
        audit_step,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn record(category: &str, amount: &str) -> WithholdingRecord {
        WithholdingRecord {
            category: category.to_string(),
            description: None,
            amount: dec(amount),
        }
    }

    #[test]
    fn test_refund_when_withheld_exceeds_tax() {
        let records = vec![record("salary", "250000")];
        let result = reconcile_withholding(&records, dec("200000"), 1).unwrap();

        assert_eq!(result.total_withheld, dec("250000"));
        assert_eq!(result.net_demand_or_refund, dec("-50000"));
        assert!(result.audit_step.reasoning.contains("refund of 50000"));
    }

    #[test]
    fn test_demand_when_tax_exceeds_withheld() {
        let records = vec![record("salary", "30000"), record("electricity", "12000")];
        let result = reconcile_withholding(&records, dec("52500"), 1).unwrap();

        assert_eq!(result.net_demand_or_refund, dec("10500"));
    }

    #[test]
    fn test_records_grouped_by_category() {
        let records = vec![
            record("salary", "10000"),
            record("telephone", "500"),
            record("salary", "15000"),
        ];
        let result = reconcile_withholding(&records, Decimal::ZERO, 1).unwrap();

        assert_eq!(result.by_category.len(), 2);
        assert_eq!(result.by_category["salary"], dec("25000"));
        assert_eq!(result.total_withheld, dec("25500"));
    }

    #[test]
    fn test_no_records() {
        let result = reconcile_withholding(&[], dec("1000"), 1).unwrap();

        assert_eq!(result.total_withheld, Decimal::ZERO);
        assert_eq!(result.net_demand_or_refund, dec("1000"));
    }

    #[test]
    fn test_withholding_beyond_decimal_range_rejected() {
        let records = vec![
            record("salary", "70000000000000000000000000000"),
            record("salary", "70000000000000000000000000000"),
        ];

        match reconcile_withholding(&records, Decimal::ZERO, 1) {
            Err(EngineError::InvalidInput { category, field, message }) => {
                assert_eq!(category, "salary");
                assert_eq!(field, "withholding_amount");
                assert!(message.contains("supported range"));
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_totals_across_categories_beyond_decimal_range_rejected() {
        let records = vec![
            record("salary", "70000000000000000000000000000"),
            record("electricity", "70000000000000000000000000000"),
        ];

        assert!(matches!(
            reconcile_withholding(&records, Decimal::ZERO, 1),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_negative_withholding_rejected() {
        let records = vec![record("salary", "-1")];

        match reconcile_withholding(&records, Decimal::ZERO, 1) {
            Err(EngineError::InvalidInput { category, field, .. }) => {
                assert_eq!(category, "salary");
                assert_eq!(field, "withholding_amount");
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }
}
