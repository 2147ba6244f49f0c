//! HTTP API module for the Tax Computation Engine.
//!
//! This module exposes the engine over REST: full return computations,
//! the list of loaded tax years, and per-year slab breakdowns.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{AdjustmentRequest, ComputationRequest, SlabQuery, WithholdingRequest};
pub use response::{
    ApiError, ApiErrorResponse, ComputationResponse, ENGINE_VERSION, SlabBreakdownResponse,
    TaxYearsResponse,
};
pub use state::AppState;
