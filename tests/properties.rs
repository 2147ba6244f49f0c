//! Property tests for the Tax Computation Engine.
//!
//! These run the engine directly against the shipped configuration and
//! check the relationships every computation must satisfy, whatever the
//! amounts involved.

use std::sync::OnceLock;

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

use tax_engine::calculation::{compute_progressive_tax, compute_tax};
use tax_engine::config::{ConfigLoader, RateTableProvider};
use tax_engine::models::{AdjustmentKind, TaxComputationResult, TaxReturnInput};

fn loader() -> &'static ConfigLoader {
    static LOADER: OnceLock<ConfigLoader> = OnceLock::new();
    LOADER.get_or_init(|| ConfigLoader::load("./config/fbr_individual").expect("Failed to load config"))
}

fn build_input(salary: u64, sukuk: u64, gain: u64, donation: u64, withheld: u64) -> TaxReturnInput {
    serde_json::from_value(json!({
        "taxpayer_id": "tp_prop",
        "tax_year": "2025-26",
        "categories": {
            "salary": { "annual_basic_salary": salary.to_string() },
            "sukuk": { "sukuk_gross_amount": sukuk.to_string() },
            "capital_gains": { "securities_gain": gain.to_string() }
        },
        "adjustments": [
            { "key": "charitable_donations", "claimed_amount": donation.to_string() }
        ],
        "withholdings": [
            { "category": "salary", "amount": withheld.to_string() }
        ]
    }))
    .unwrap()
}

fn compute(input: &TaxReturnInput) -> TaxComputationResult {
    compute_tax(input, loader()).expect("computation should succeed")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_normal_tax_is_monotonic_in_income(a in 0u64..20_000_000, b in 0u64..20_000_000) {
        let table = loader().rate_table("2025-26").unwrap();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let low_tax = compute_progressive_tax(Decimal::from(low), &table.slabs, 0, 1).unwrap().tax;
        let high_tax = compute_progressive_tax(Decimal::from(high), &table.slabs, 0, 1).unwrap().tax;

        prop_assert!(low_tax <= high_tax, "tax({}) = {} > tax({}) = {}", low, low_tax, high, high_tax);
    }

    #[test]
    fn prop_normal_tax_has_no_jumps(income in 0u64..20_000_000) {
        let table = loader().rate_table("2025-26").unwrap();
        let here = compute_progressive_tax(Decimal::from(income), &table.slabs, 0, 1).unwrap().tax;
        let next = compute_progressive_tax(Decimal::from(income + 1), &table.slabs, 0, 1).unwrap().tax;

        // One more rupee of income never adds more than one rupee of tax.
        prop_assert!(next - here <= Decimal::ONE);
    }

    #[test]
    fn prop_allowed_adjustments_never_exceed_claim_or_cap(
        salary in 0u64..8_000_000,
        donation in 0u64..3_000_000,
    ) {
        let result = compute(&build_input(salary, 0, 0, donation, 0));

        for item in &result.adjustments {
            prop_assert!(item.allowed_amount <= item.claimed_amount);
            if let Some(cap) = item.cap {
                prop_assert!(item.allowed_amount <= cap);
            }
            prop_assert!(item.applied_amount <= item.value);
            prop_assert_eq!(item.applied_amount + item.unabsorbed_amount, item.value);
        }
    }

    #[test]
    fn prop_stage_totals_reconcile_with_liability(
        salary in 0u64..8_000_000,
        sukuk in 0u64..7_000_000,
        gain in 0u64..3_000_000,
        donation in 0u64..3_000_000,
    ) {
        let result = compute(&build_input(salary, sukuk, gain, donation, 0));

        prop_assert_eq!(
            result.gross_chargeable_tax - result.total_reductions - result.total_credits,
            result.tax_after_credits
        );
        let credit_total: Decimal = result
            .adjustments
            .iter()
            .filter(|item| item.kind == AdjustmentKind::Credit)
            .map(|item| item.applied_amount)
            .sum();
        prop_assert_eq!(credit_total, result.total_credits);
    }

    #[test]
    fn prop_liability_never_negative_and_floor_holds(
        salary in 0u64..5_000_000,
        sukuk in 0u64..2_000_000,
        donation in 0u64..2_000_000,
    ) {
        let result = compute(&build_input(salary, sukuk, 0, donation, 0));

        prop_assert!(result.tax_after_reductions >= Decimal::ZERO);
        prop_assert!(result.tax_after_credits >= Decimal::ZERO);
        prop_assert!(result.final_chargeable_tax >= result.tax_after_credits);
        if result.total_income > Decimal::from(1_200_000) {
            prop_assert!(result.final_chargeable_tax >= Decimal::from(5_000));
        }
    }

    #[test]
    fn prop_net_demand_sign_follows_withholding(
        salary in 0u64..10_000_000,
        gain in 0u64..3_000_000,
        withheld in 0u64..3_000_000,
    ) {
        let result = compute(&build_input(salary, 0, gain, 0, withheld));

        prop_assert_eq!(
            result.net_demand_or_refund,
            result.final_chargeable_tax - result.total_withheld
        );
        prop_assert_eq!(result.is_refund(), result.total_withheld > result.final_chargeable_tax);
    }

    #[test]
    fn prop_computation_is_deterministic(
        salary in 0u64..10_000_000,
        sukuk in 0u64..2_000_000,
        gain in 0u64..3_000_000,
        donation in 0u64..1_000_000,
    ) {
        let input = build_input(salary, sukuk, gain, donation, 50_000);

        prop_assert_eq!(compute(&input), compute(&input));
    }

    #[test]
    fn prop_gross_chargeable_is_sum_of_lines(
        salary in 0u64..15_000_000,
        sukuk in 0u64..8_000_000,
        gain in 0u64..3_000_000,
    ) {
        let result = compute(&build_input(salary, sukuk, gain, 0, 0));

        prop_assert_eq!(
            result.gross_chargeable_tax,
            result.normal_tax
                + result.final_tax
                + result.capital_gain_tax
                + result.excess_final_tax_top_up
                + result.surcharge
        );
    }
}
