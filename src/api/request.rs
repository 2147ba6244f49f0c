//! Request types for the Tax Computation Engine API.
//!
//! This module defines the JSON request structures for the `/compute`
//! endpoint and the query string of the slab breakdown endpoint.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    AdjustmentClaim, FilerStatus, RawFields, TaxReturnInput, TaxpayerType, WithholdingRecord,
};

/// Request body for the `/compute` endpoint.
///
/// Category field values are passed through untouched; coercion and schema
/// checks happen inside the engine so errors name the offending field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationRequest {
    /// Identifier of the taxpayer.
    pub taxpayer_id: String,
    /// The tax-year key (e.g., "2025-26").
    pub tax_year: String,
    /// Whether the taxpayer is on the active taxpayers list.
    #[serde(default)]
    pub filer_status: FilerStatus,
    /// Salaried or non-salaried, for the surcharge rate.
    #[serde(default)]
    pub taxpayer_type: TaxpayerType,
    /// Raw form fields keyed by income category.
    #[serde(default)]
    pub categories: BTreeMap<String, RawFields>,
    /// Claimed deductions, reductions and credits.
    #[serde(default)]
    pub adjustments: Vec<AdjustmentRequest>,
    /// Taxes already withheld at source.
    #[serde(default)]
    pub withholdings: Vec<WithholdingRequest>,
}

/// An adjustment claim in a computation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    /// The adjustment key registered in the rate table.
    pub key: String,
    /// The amount claimed.
    pub claimed_amount: Decimal,
    /// Age at which the taxpayer joined the scheme, where relevant.
    #[serde(default)]
    pub age_at_joining: Option<u32>,
}

/// A withholding record in a computation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithholdingRequest {
    /// The source category (e.g., "salary", "electricity").
    pub category: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// The amount withheld.
    pub amount: Decimal,
}

/// Query string for `GET /tax-years/:tax_year/slabs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlabQuery {
    /// The taxable income to break down.
    pub income: Decimal,
}

impl From<AdjustmentRequest> for AdjustmentClaim {
    fn from(req: AdjustmentRequest) -> Self {
        AdjustmentClaim {
            key: req.key,
            claimed_amount: req.claimed_amount,
            age_at_joining: req.age_at_joining,
        }
    }
}

impl From<WithholdingRequest> for WithholdingRecord {
    fn from(req: WithholdingRequest) -> Self {
        WithholdingRecord {
            category: req.category,
            description: req.description,
            amount: req.amount,
        }
    }
}

impl From<ComputationRequest> for TaxReturnInput {
    fn from(req: ComputationRequest) -> Self {
        TaxReturnInput {
            taxpayer_id: req.taxpayer_id,
            tax_year: req.tax_year,
            filer_status: req.filer_status,
            taxpayer_type: req.taxpayer_type,
            categories: req.categories,
            adjustments: req.adjustments.into_iter().map(Into::into).collect(),
            withholdings: req.withholdings.into_iter().map(Into::into).collect(),
        }
    }
}
