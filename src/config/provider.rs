//! The seam between the engine and its source of rates.

use crate::error::EngineResult;

use super::types::{RateTable, TaxSchema};

/// Supplies rate tables and the category schema to the engine.
///
/// The engine only ever reads through this trait, so a table can be served
/// from YAML files, a database or a fixture built in a test. Implementations
/// must return the same table for the same tax year for the lifetime of the
/// provider.
pub trait RateTableProvider {
    /// Returns the rate table for a tax-year key.
    ///
    /// Fails with `RateTableNotFound` when the year is not loaded.
    fn rate_table(&self, tax_year: &str) -> EngineResult<&RateTable>;

    /// Returns the category schema shared by all tax years.
    fn schema(&self) -> &TaxSchema;
}
