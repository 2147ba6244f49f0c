//! Integration tests for the Tax Computation Engine.
//!
//! These tests drive the HTTP API against the shipped FBR individual
//! configuration and cover:
//! - Progressive slab tax on salary
//! - Final-tax and capital-gain regimes alongside normal income
//! - Filer-status rates and income above final-tax limits
//! - Deductions, reductions and credits with their caps
//! - Surcharge by taxpayer type and the minimum tax floor
//! - Withholding reconciliation (demand and refund)
//! - Tax-year selection
//! - Error cases

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::str::FromStr;
use tower::ServiceExt;

use tax_engine::api::{AppState, create_router};
use tax_engine::config::ConfigLoader;

// =============================================================================
// Test Helpers
// =============================================================================

fn create_router_for_test() -> Router {
    let config = ConfigLoader::load("./config/fbr_individual").expect("Failed to load config");
    create_router(AppState::new(config))
}

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn post_compute(router: Router, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/compute")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

async fn compute_ok(body: Value) -> Value {
    let (status, json) = post_compute(create_router_for_test(), body).await;
    assert_eq!(status, StatusCode::OK, "unexpected error body: {}", json);
    json["result"].clone()
}

fn create_request(tax_year: &str, categories: Value) -> Value {
    json!({
        "taxpayer_id": "tp_integration",
        "tax_year": tax_year,
        "categories": categories,
    })
}

fn salary_only(tax_year: &str, salary: &str) -> Value {
    create_request(tax_year, json!({ "salary": { "annual_basic_salary": salary } }))
}

/// Reads a decimal field that the API serializes as a string.
fn amount(value: &Value, field: &str) -> Decimal {
    let raw = value[field]
        .as_str()
        .unwrap_or_else(|| panic!("field '{}' missing or not a string in {}", field, value));
    decimal(raw)
}

fn assert_amount(result: &Value, field: &str, expected: &str) {
    assert_eq!(
        amount(result, field),
        decimal(expected),
        "field '{}' mismatch",
        field
    );
}

fn adjustment<'a>(result: &'a Value, key: &str) -> &'a Value {
    result["adjustments"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["key"] == key)
        .unwrap_or_else(|| panic!("no adjustment '{}' in result", key))
}

fn has_warning(result: &Value, code: &str) -> bool {
    result["audit_trace"]["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w["code"] == code)
}

// =============================================================================
// Progressive Slab Tax
// =============================================================================

#[tokio::test]
async fn test_salary_within_second_and_third_slabs() {
    let result = compute_ok(salary_only("2025-26", "1,500,000")).await;

    // 600,000 @ 1% + 300,000 @ 11%
    assert_amount(&result, "normal_tax", "39000");
    assert_amount(&result, "gross_chargeable_tax", "39000");
    assert_amount(&result, "final_chargeable_tax", "39000");
    assert_amount(&result, "net_demand_or_refund", "39000");
    assert_amount(&result, "effective_tax_rate", "2.60");
    assert_amount(&result, "marginal_tax_rate", "11.00");
    assert_eq!(result["minimum_tax_applied"], false);
    assert_eq!(result["slab_breakdown"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_salary_below_exemption_threshold_is_untaxed() {
    let result = compute_ok(salary_only("2025-26", "600000")).await;

    assert_amount(&result, "normal_tax", "0");
    assert_amount(&result, "final_chargeable_tax", "0");
    assert_amount(&result, "effective_tax_rate", "0");
}

#[tokio::test]
async fn test_top_slab_salary_with_surcharge() {
    let result = compute_ok(salary_only("2025-26", "12000000")).await;

    // 6,000 + 110,000 + 230,000 + 270,000 + 7,900,000 @ 35%
    assert_amount(&result, "normal_tax", "3381000");
    assert_amount(&result, "surcharge", "304290");
    assert_amount(&result, "gross_chargeable_tax", "3685290");
    assert_amount(&result, "marginal_tax_rate", "35.00");

    let surcharge_line = result["tax_lines"]
        .as_array()
        .unwrap()
        .iter()
        .find(|line| line["regime"] == "surcharge")
        .expect("surcharge line");
    assert_eq!(decimal(surcharge_line["amount"].as_str().unwrap()), decimal("304290"));
}

#[tokio::test]
async fn test_earlier_tax_year_uses_its_own_slabs() {
    let result = compute_ok(salary_only("2024-25", "1500000")).await;

    // 600,000 @ 5% + 300,000 @ 15%
    assert_amount(&result, "normal_tax", "75000");
    assert_eq!(result["tax_year"], "2024-25");
}

#[tokio::test]
async fn test_exempt_and_derived_fields() {
    let result = compute_ok(create_request(
        "2025-26",
        json!({
            "salary": {
                "annual_basic_salary": "1,400,000",
                "bonus": 200000,
                "income_exempt_from_tax": "100,000",
                "total_employment_income": "9,999,999",
                "allowances": "",
                "medical_allowance": null
            }
        }),
    ))
    .await;

    assert_amount(&result, "total_gross_income", "1600000");
    assert_amount(&result, "total_exempt_income", "100000");
    assert_amount(&result, "income_from_salary", "1500000");
    assert_amount(&result, "normal_tax", "39000");
}

#[tokio::test]
async fn test_unknown_field_is_ignored_with_warning() {
    let result = compute_ok(create_request(
        "2025-26",
        json!({ "salary": { "annual_basic_salary": "1500000", "mystery_field": "5000" } }),
    ))
    .await;

    assert_amount(&result, "income_from_salary", "1500000");
    assert!(has_warning(&result, "UNKNOWN_FIELD"));
}

// =============================================================================
// Mixed Regimes, Adjustments and Reconciliation
// =============================================================================

fn mixed_return() -> Value {
    json!({
        "taxpayer_id": "tp_mixed",
        "tax_year": "2025-26",
        "categories": {
            "salary": {
                "annual_basic_salary": "3,000,000",
                "income_exempt_from_tax": "200,000"
            },
            "other_sources": { "rent_income": "400000" },
            "sukuk": { "sukuk_gross_amount": "1000000", "sukuk_tax_amount": "100000" },
            "dividend": { "dividend_gross_amount": "200000" },
            "capital_gains": {
                "property_held_up_to_1_year": "2000000",
                "securities_gain": "800000",
                "securities_exempt_gain": "100000"
            }
        },
        "adjustments": [
            { "key": "professional_expenses", "claimed_amount": "500000" },
            { "key": "capital_gain_immovable_50", "claimed_amount": "200000" },
            { "key": "charitable_donations", "claimed_amount": "300000" }
        ],
        "withholdings": [
            { "category": "salary", "amount": "200000" },
            { "category": "profit_on_debt", "description": "Sukuk and dividend", "amount": "130000" }
        ]
    })
}

#[tokio::test]
async fn test_mixed_return_income_heads() {
    let result = compute_ok(mixed_return()).await;

    assert_amount(&result, "income_from_salary", "2800000");
    assert_amount(&result, "income_from_other_sources", "400000");
    assert_amount(&result, "final_tax_income", "1200000");
    assert_amount(&result, "income_from_capital_gains", "2700000");
    assert_amount(&result, "total_gross_income", "7400000");
    assert_amount(&result, "total_exempt_income", "300000");
    assert_amount(&result, "total_income", "7100000");
    assert_amount(&result, "total_deductions", "500000");
    assert_amount(&result, "taxable_income_before_capital_gains", "3900000");
    assert_amount(&result, "taxable_income_including_capital_gains", "6600000");
}

#[tokio::test]
async fn test_mixed_return_regime_taxes() {
    let result = compute_ok(mixed_return()).await;

    // Normal income 2,700,000 after deductions.
    assert_amount(&result, "normal_tax", "231000");
    // Sukuk 10% plus dividend 15%.
    assert_amount(&result, "final_tax", "130000");
    // Property 2,000,000 @ 15% plus securities 700,000 @ 12.5%.
    assert_amount(&result, "capital_gain_tax", "387500");
    // Income including gains stays under the surcharge threshold.
    assert_amount(&result, "surcharge", "0");
    assert_amount(&result, "gross_chargeable_tax", "748500");
}

#[tokio::test]
async fn test_mixed_return_adjustments_and_refund() {
    let result = compute_ok(mixed_return()).await;

    let reduction = adjustment(&result, "capital_gain_immovable_50");
    assert_eq!(reduction["cap_applied"], true);
    assert_eq!(decimal(reduction["applied_amount"].as_str().unwrap()), decimal("193750"));

    // The donation is worth its allowed amount at the average rate of
    // 748,500 / 6,600,000.
    let donation = adjustment(&result, "charitable_donations");
    assert_eq!(decimal(donation["cap"].as_str().unwrap()), decimal("1000000"));
    assert_eq!(donation["cap_applied"], false);
    assert_eq!(donation["valuation"], "average_rate");
    assert_eq!(decimal(donation["allowed_amount"].as_str().unwrap()), decimal("300000"));
    assert_eq!(decimal(donation["value"].as_str().unwrap()), decimal("34023"));
    assert_eq!(decimal(donation["applied_amount"].as_str().unwrap()), decimal("34023"));

    assert_amount(&result, "total_reductions", "193750");
    assert_amount(&result, "tax_after_reductions", "554750");
    assert_amount(&result, "total_credits", "34023");
    assert_amount(&result, "tax_after_credits", "520727");
    assert_amount(&result, "final_chargeable_tax", "520727");
    assert_amount(&result, "total_withheld", "330000");
    assert_amount(&result, "net_demand_or_refund", "190727");
    assert_amount(&result, "effective_tax_rate", "7.89");
    assert_amount(&result, "marginal_tax_rate", "23.00");
}

#[tokio::test]
async fn test_stage_totals_reconcile_with_liability() {
    let result = compute_ok(mixed_return()).await;

    assert_eq!(
        amount(&result, "gross_chargeable_tax")
            - amount(&result, "total_reductions")
            - amount(&result, "total_credits"),
        amount(&result, "tax_after_credits")
    );
    assert_amount(&result, "unabsorbed_reductions", "0");
    assert_amount(&result, "unabsorbed_credits", "0");
}

#[tokio::test]
async fn test_donation_credit_at_average_rate() {
    let body = json!({
        "taxpayer_id": "tp_donor",
        "tax_year": "2025-26",
        "categories": { "salary": { "annual_basic_salary": "1500000" } },
        "adjustments": [ { "key": "charitable_donations", "claimed_amount": "400000" } ]
    });
    let result = compute_ok(body).await;

    // Average rate 39,000 / 1,500,000 = 2.6%.
    let donation = adjustment(&result, "charitable_donations");
    assert_eq!(decimal(donation["cap"].as_str().unwrap()), decimal("450000"));
    assert_eq!(decimal(donation["value"].as_str().unwrap()), decimal("10400"));
    assert_amount(&result, "total_credits", "10400");
    assert_amount(&result, "tax_after_credits", "28600");
}

#[tokio::test]
async fn test_adjustments_listed_in_stage_order() {
    let result = compute_ok(mixed_return()).await;

    let kinds: Vec<&str> = result["adjustments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["kind"].as_str().unwrap())
        .collect();

    assert_eq!(kinds, vec!["deduction", "reduction", "credit"]);
}

#[tokio::test]
async fn test_audit_trace_follows_pipeline_order() {
    let result = compute_ok(mixed_return()).await;

    let steps = result["audit_trace"]["steps"].as_array().unwrap();
    let numbers: Vec<u64> = steps.iter().map(|s| s["step_number"].as_u64().unwrap()).collect();
    let expected: Vec<u64> = (1..=steps.len() as u64).collect();
    assert_eq!(numbers, expected);

    let first = steps.first().unwrap();
    let last = steps.last().unwrap();
    assert_eq!(first["stage"], "aggregate_categories");
    assert_eq!(last["stage"], "reconcile");
}

// =============================================================================
// Filer Status, Final-Tax Limits and Taxpayer Type
// =============================================================================

#[tokio::test]
async fn test_non_filer_dividend_taxed_at_higher_rate() {
    let mut body = create_request("2025-26", json!({ "dividend": { "dividend_gross_amount": "1000000" } }));
    let filer = compute_ok(body.clone()).await;
    body["filer_status"] = json!("non_atl");
    let non_filer = compute_ok(body).await;

    assert_amount(&filer, "final_tax", "150000");
    assert_amount(&non_filer, "final_tax", "300000");
    assert_eq!(non_filer["filer_status"], "non_atl");
}

#[tokio::test]
async fn test_profit_on_debt_above_limit_joins_normal_income() {
    let result = compute_ok(create_request(
        "2025-26",
        json!({ "profit_on_debt": { "profit_on_debt_gross_amount": "6000000" } }),
    ))
    .await;

    assert_amount(&result, "final_tax_income", "5000000");
    assert_amount(&result, "excess_final_tax_income", "1000000");
    assert_amount(&result, "final_tax", "750000");
    // Slab tax of 4,000 on the excess is topped up to 15% of it.
    assert_amount(&result, "normal_tax", "4000");
    assert_amount(&result, "excess_final_tax_top_up", "146000");
    assert_amount(&result, "gross_chargeable_tax", "900000");
    assert_amount(&result, "final_chargeable_tax", "900000");
}

#[tokio::test]
async fn test_non_salaried_surcharge_rate() {
    let mut body = salary_only("2025-26", "12000000");
    body["taxpayer_type"] = json!("non_salaried");
    let result = compute_ok(body).await;

    assert_amount(&result, "normal_tax", "3381000");
    assert_amount(&result, "surcharge", "338100");
    assert_eq!(result["taxpayer_type"], "non_salaried");
}

// =============================================================================
// Minimum Tax Floor
// =============================================================================

#[tokio::test]
async fn test_minimum_tax_floor_after_adjustments_exhaust_liability() {
    let body = json!({
        "taxpayer_id": "tp_floor",
        "tax_year": "2025-26",
        "categories": { "salary": { "annual_basic_salary": "1250000" } },
        "adjustments": [
            { "key": "zakat", "claimed_amount": "200000" },
            { "key": "behbood_certificates", "claimed_amount": "10000" },
            { "key": "pension_fund", "claimed_amount": "100000", "age_at_joining": 45 }
        ]
    });
    let result = compute_ok(body).await;

    // 450,000 @ 1% after zakat.
    assert_amount(&result, "normal_tax", "4500");
    // Only the liability is absorbed; the rest of the reduction is reported.
    assert_amount(&result, "total_reductions", "4500");
    assert_amount(&result, "unabsorbed_reductions", "5500");
    assert_amount(&result, "tax_after_reductions", "0");
    // Joining at 45 lifts the pension cap to 30% of taxable income.
    let pension = adjustment(&result, "pension_fund");
    assert_eq!(decimal(pension["cap"].as_str().unwrap()), decimal("315000"));
    assert_eq!(decimal(pension["value"].as_str().unwrap()), decimal("429"));
    assert_eq!(decimal(pension["applied_amount"].as_str().unwrap()), Decimal::ZERO);
    assert_amount(&result, "total_credits", "0");
    assert_amount(&result, "unabsorbed_credits", "429");
    assert_amount(&result, "tax_after_credits", "0");
    assert!(has_warning(&result, "ADJUSTMENT_UNABSORBED"));

    assert_eq!(result["minimum_tax_applied"], true);
    assert_amount(&result, "minimum_tax_top_up", "5000");
    assert_amount(&result, "final_chargeable_tax", "5000");
}

#[tokio::test]
async fn test_minimum_tax_not_triggered_below_threshold() {
    let result = compute_ok(salary_only("2025-26", "1000000")).await;

    assert_amount(&result, "normal_tax", "4000");
    assert_eq!(result["minimum_tax_applied"], false);
    assert_amount(&result, "final_chargeable_tax", "4000");
}

// =============================================================================
// Envelope and Determinism
// =============================================================================

#[tokio::test]
async fn test_envelope_carries_id_and_timestamp() {
    let (status, json) = post_compute(create_router_for_test(), mixed_return()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["calculation_id"].as_str().is_some());
    assert!(json["computed_at"].as_str().is_some());
    assert_eq!(json["engine_version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_repeated_requests_produce_identical_results() {
    let (_, first) = post_compute(create_router_for_test(), mixed_return()).await;
    let (_, second) = post_compute(create_router_for_test(), mixed_return()).await;

    assert_eq!(first["result"], second["result"]);
    assert_ne!(first["calculation_id"], second["calculation_id"]);
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_unknown_tax_year_returns_404() {
    let (status, json) = post_compute(create_router_for_test(), salary_only("1999-00", "100")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "TAX_YEAR_NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_category_returns_400() {
    let body = create_request("2025-26", json!({ "lottery": { "winnings": "1000" } }));
    let (status, json) = post_compute(create_router_for_test(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "UNKNOWN_CATEGORY");
    assert_eq!(json["category"], "lottery");
    assert_eq!(json["stage"], "aggregate_categories");
}

#[tokio::test]
async fn test_undeclared_object_field_is_ignored() {
    let result = compute_ok(create_request(
        "2025-26",
        json!({ "salary": { "annual_basic_salary": "1500000", "form_meta": { "saved": true, "pages": [1, 2] } } }),
    ))
    .await;

    assert_amount(&result, "normal_tax", "39000");
    assert!(has_warning(&result, "UNKNOWN_FIELD"));
}

#[tokio::test]
async fn test_declared_field_holding_object_returns_400() {
    let body = create_request(
        "2025-26",
        json!({ "salary": { "annual_basic_salary": { "amount": "1500000" } } }),
    );
    let (status, json) = post_compute(create_router_for_test(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert_eq!(json["category"], "salary");
}

#[tokio::test]
async fn test_amounts_beyond_decimal_range_return_400() {
    let body = create_request(
        "2025-26",
        json!({
            "salary": {
                "annual_basic_salary": "70000000000000000000000000000",
                "bonus": "70000000000000000000000000000"
            }
        }),
    );
    let (status, json) = post_compute(create_router_for_test(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert_eq!(json["stage"], "aggregate_categories");
}

#[tokio::test]
async fn test_negative_field_returns_400() {
    let (status, json) =
        post_compute(create_router_for_test(), salary_only("2025-26", "-5000")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_negative_withholding_returns_400_at_reconcile() {
    let body = json!({
        "taxpayer_id": "tp_001",
        "tax_year": "2025-26",
        "categories": { "salary": { "annual_basic_salary": "1500000" } },
        "withholdings": [ { "category": "salary", "amount": "-1" } ]
    });
    let (status, json) = post_compute(create_router_for_test(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert_eq!(json["stage"], "reconcile");
}

#[tokio::test]
async fn test_adjustment_missing_from_earlier_year_returns_422() {
    let body = json!({
        "taxpayer_id": "tp_001",
        "tax_year": "2024-25",
        "categories": { "salary": { "annual_basic_salary": "1500000" } },
        "adjustments": [ { "key": "capital_gain_immovable_75", "claimed_amount": "1000" } ]
    });
    let (status, json) = post_compute(create_router_for_test(), body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNKNOWN_ADJUSTMENT");
}

#[tokio::test]
async fn test_tax_years_endpoint() {
    let response = create_router_for_test()
        .oneshot(Request::builder().uri("/tax-years").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["tax_years"], json!(["2024-25", "2025-26"]));
}
