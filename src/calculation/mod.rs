//! Calculation logic for the Tax Computation Engine.
//!
//! This module contains the category aggregators, the regime calculators
//! (progressive slabs, flat final tax, capital gains, surcharge and the
//! minimum tax floor), the capped adjustment applier, withholding
//! reconciliation, and the orchestrator that runs them in order.

mod adjustments;
mod aggregation;
mod capital_gain;
mod flat_rate;
mod measures;
mod minimum_tax;
mod orchestrator;
mod progressive;
mod rounding;
mod surcharge;
mod withholding;

pub use adjustments::{
    AdjustmentStageResult, CapBases, ResolvedCap, UNABSORBED_ADJUSTMENT_WARNING,
    apply_adjustments, effective_percent, resolve_cap, validate_claims,
};
pub use aggregation::{AggregationResult, UNKNOWN_FIELD_WARNING, aggregate_category, coerce_amount};
pub use capital_gain::{CapitalGainTaxResult, compute_capital_gain_tax};
pub use flat_rate::{
    EXCESS_FINAL_TAX_CATEGORY, ExcessMinimumResult, FinalTaxResult, TierSlice,
    apply_excess_minimum_tax, compute_final_tax, income_above_final_limit, slice_by_tiers,
};
pub use measures::IncomeMeasures;
pub use minimum_tax::{MinimumTaxResult, apply_minimum_tax};
pub use orchestrator::compute_tax;
pub use progressive::{NORMAL_INCOME_CATEGORY, ProgressiveTaxResult, compute_progressive_tax};
pub use rounding::{PERCENTAGE_DECIMAL_PLACES, checked_sum, percentage_of, round_currency};
pub use surcharge::{SurchargeBases, SurchargeResult, compute_surcharge};
pub use withholding::{ReconciliationResult, reconcile_withholding};
