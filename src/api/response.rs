//! Response types for the Tax Computation Engine API.
//!
//! This module defines the success envelopes and the error response
//! structures for the HTTP API.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{SlabTax, Stage, TaxComputationResult};

/// The engine version reported in computation envelopes.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Envelope around a successful computation.
///
/// The computation result itself is deterministic; the identifier and
/// timestamp are added here, at the service boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationResponse {
    /// Unique identifier of this computation.
    pub calculation_id: Uuid,
    /// When the computation was performed.
    pub computed_at: DateTime<Utc>,
    /// Version of the engine that produced the result.
    pub engine_version: String,
    /// The computation result.
    pub result: TaxComputationResult,
}

impl ComputationResponse {
    /// Wraps a result in a fresh envelope.
    pub fn new(result: TaxComputationResult) -> Self {
        Self {
            calculation_id: Uuid::new_v4(),
            computed_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            result,
        }
    }
}

/// Body of `GET /tax-years`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxYearsResponse {
    /// Jurisdiction code of the loaded configuration.
    pub jurisdiction: String,
    /// Loaded tax-year keys in ascending order.
    pub tax_years: Vec<String>,
}

/// Body of `GET /tax-years/:tax_year/slabs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlabBreakdownResponse {
    /// The tax year whose slabs were applied.
    pub tax_year: String,
    /// The income that was broken down.
    pub taxable_income: Decimal,
    /// Rounded progressive tax on that income.
    pub tax: Decimal,
    /// Marginal rate, as a percentage.
    pub marginal_tax_rate: Decimal,
    /// Tax as a percentage of income.
    pub effective_tax_rate: Decimal,
    /// Slab-by-slab breakdown.
    pub slabs: Vec<SlabTax>,
}

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// The pipeline stage that failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// The category concerned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            stage: None,
            category: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(code, message)
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// Creates a 400 response carrying the given error.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            Json(self.error),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let stage = error.stage();
        let category = error.category().map(str::to_string);
        let message = error.to_string();

        let (status, code, details) = match error.root() {
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "The engine configuration could not be read",
            ),
            EngineError::InvalidRateTable { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INVALID_RATE_TABLE",
                "A loaded rate table failed validation",
            ),
            EngineError::RateTableNotFound { .. } => (
                StatusCode::NOT_FOUND,
                "TAX_YEAR_NOT_FOUND",
                "No rate table is loaded for the requested tax year",
            ),
            EngineError::MissingRate { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "RATE_NOT_CONFIGURED",
                "The rate table has no rate for a supplied category",
            ),
            EngineError::UnknownAdjustment { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNKNOWN_ADJUSTMENT",
                "The claimed adjustment is not registered for this tax year",
            ),
            EngineError::UnknownCategory { .. } => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_CATEGORY",
                "The income category is not declared by the category schema",
            ),
            EngineError::InvalidInput { .. } => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                "A supplied value could not be read as a non-negative amount",
            ),
            EngineError::InvariantViolation { .. } | EngineError::StageFailed { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INVARIANT_VIOLATION",
                "The computation produced an impossible value",
            ),
        };

        ApiErrorResponse {
            status,
            error: ApiError {
                stage,
                category,
                ..ApiError::with_details(code, message, details)
            },
        }
    }
}
