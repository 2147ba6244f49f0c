//! Core data models for the Tax Computation Engine.
//!
//! This module contains all the domain models used throughout the engine.

mod adjustment;
mod category;
mod computation_result;
mod input;
mod stage;
mod tax_line;

pub use adjustment::{AdjustmentItem, AdjustmentKind, AdjustmentStageOutcome, AdjustmentValuation};
pub use category::{CategoryTotals, IncomeClass};
pub use computation_result::{AuditStep, AuditTrace, AuditWarning, SlabTax, TaxComputationResult};
pub use input::{
    AdjustmentClaim, FieldValue, FilerStatus, RawFields, TaxReturnInput, TaxpayerType,
    WithholdingRecord,
};
pub use stage::Stage;
pub use tax_line::{RegimeKind, TaxLineItem};
