//! Configuration loading and management for the Tax Computation Engine.
//!
//! This module provides functionality to load tax configurations from YAML files,
//! including jurisdiction metadata, the income category schema and per-year rate
//! tables.
//!
//! # Example
//!
//! ```no_run
//! use tax_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/fbr_individual").unwrap();
//! println!("Loaded jurisdiction: {}", config.jurisdiction().name);
//! ```

mod loader;
mod provider;
mod types;

pub use loader::ConfigLoader;
pub use provider::RateTableProvider;
pub use types::{
    AdjustmentRule, AgeOfJoiningRule, CapBase, CapRule, CapitalGainBucket, CategorySchema,
    CurrencyConfig, FieldRole, FieldSpec, FinalTaxSchedule, FinalTaxTier, JurisdictionMetadata,
    MinimumTaxConfig, QualifyingIncome, RateTable, Slab, StatusRate, SurchargeBase,
    SurchargeConfig, SurchargeTrigger, TaxConfig, TaxSchema, TaxpayerTypeRate, TierRegime,
};
