//! HTTP request handlers for the Tax Computation Engine API.
//!
//! This module contains the handler functions for all API endpoints.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculation::{compute_progressive_tax, compute_tax, percentage_of};
use crate::config::RateTableProvider;
use crate::models::TaxReturnInput;

use super::request::{ComputationRequest, SlabQuery};
use super::response::{
    ApiError, ApiErrorResponse, ComputationResponse, SlabBreakdownResponse, TaxYearsResponse,
};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/compute", post(compute_handler))
        .route("/tax-years", get(tax_years_handler))
        .route("/tax-years/:tax_year/slabs", get(slab_breakdown_handler))
        .with_state(state)
}

fn json_ok<T: serde::Serialize>(body: T) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}

/// Handler for POST /compute endpoint.
///
/// Accepts a taxpayer's return and responds with the full computation
/// wrapped in a [`ComputationResponse`] envelope.
async fn compute_handler(
    State(state): State<AppState>,
    payload: Result<Json<ComputationRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing computation request");

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let error = match rejection {
                JsonRejection::JsonDataError(err) => {
                    let body_text = err.body_text();
                    warn!(
                        correlation_id = %correlation_id,
                        error = %body_text,
                        "JSON data error"
                    );
                    if body_text.contains("missing field") {
                        ApiError::validation_error(body_text)
                    } else {
                        ApiError::malformed_json(body_text)
                    }
                }
                JsonRejection::JsonSyntaxError(err) => {
                    warn!(
                        correlation_id = %correlation_id,
                        error = %err,
                        "JSON syntax error"
                    );
                    ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
                }
                JsonRejection::MissingJsonContentType(_) => {
                    ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
                }
                _ => ApiError::malformed_json("Failed to parse request body"),
            };
            return ApiErrorResponse::bad_request(error).into_response();
        }
    };

    let input: TaxReturnInput = request.into();

    let start_time = Instant::now();
    match compute_tax(&input, state.config()) {
        Ok(result) => {
            info!(
                correlation_id = %correlation_id,
                taxpayer_id = %result.taxpayer_id,
                tax_year = %result.tax_year,
                final_chargeable_tax = %result.final_chargeable_tax,
                net_demand_or_refund = %result.net_demand_or_refund,
                duration_us = start_time.elapsed().as_micros(),
                "Computation completed successfully"
            );
            json_ok(ComputationResponse::new(result))
        }
        Err(err) => {
            warn!(
                correlation_id = %correlation_id,
                taxpayer_id = %input.taxpayer_id,
                error = %err,
                "Computation failed"
            );
            ApiErrorResponse::from(err).into_response()
        }
    }
}

/// Handler for GET /tax-years endpoint.
async fn tax_years_handler(State(state): State<AppState>) -> Response {
    let config = state.config();
    json_ok(TaxYearsResponse {
        jurisdiction: config.jurisdiction().code.clone(),
        tax_years: config.tax_years().into_iter().map(str::to_string).collect(),
    })
}

/// Handler for GET /tax-years/:tax_year/slabs endpoint.
///
/// Breaks an income down across the progressive slabs of one tax year,
/// for previewing normal tax outside a full computation.
async fn slab_breakdown_handler(
    State(state): State<AppState>,
    Path(tax_year): Path<String>,
    query: Result<Query<SlabQuery>, QueryRejection>,
) -> Response {
    let income = match query {
        Ok(Query(SlabQuery { income })) => income,
        Err(rejection) => {
            return ApiErrorResponse::bad_request(ApiError::validation_error(
                rejection.body_text(),
            ))
            .into_response();
        }
    };

    if income < Decimal::ZERO {
        return ApiErrorResponse::bad_request(ApiError::validation_error(format!(
            "income must not be negative, got {}",
            income
        )))
        .into_response();
    }

    let table = match state.config().rate_table(&tax_year) {
        Ok(table) => table,
        Err(err) => {
            warn!(tax_year = %tax_year, error = %err, "Slab breakdown for unknown tax year");
            return ApiErrorResponse::from(err).into_response();
        }
    };

    match compute_progressive_tax(income, &table.slabs, table.currency.decimal_places, 1) {
        Ok(result) => json_ok(SlabBreakdownResponse {
            tax_year,
            taxable_income: result.taxable_income,
            tax: result.tax,
            marginal_tax_rate: percentage_of(result.marginal_rate, Decimal::ONE),
            effective_tax_rate: percentage_of(result.tax, result.taxable_income),
            slabs: result.breakdown,
        }),
        Err(err) => ApiErrorResponse::from(err).into_response(),
    }
}
