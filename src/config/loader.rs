//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading tax
//! configurations from YAML files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

use super::provider::RateTableProvider;
use super::types::{JurisdictionMetadata, RateTable, TaxConfig, TaxSchema};

/// Loads and provides access to tax configuration.
///
/// The `ConfigLoader` reads YAML configuration files from a directory,
/// validates every rate table, and serves them by tax year.
///
/// # Directory Structure
///
/// The configuration directory should have the following structure:
/// ```text
/// config/fbr_individual/
/// ├── jurisdiction.yaml   # Jurisdiction metadata
/// ├── categories.yaml     # Income categories and their form fields
/// └── rates/
///     ├── 2024-25.yaml    # Rate table per tax year
///     └── 2025-26.yaml
/// ```
///
/// # Example
///
/// ```no_run
/// use tax_engine::config::{ConfigLoader, RateTableProvider};
///
/// let loader = ConfigLoader::load("./config/fbr_individual").unwrap();
///
/// let table = loader.rate_table("2025-26").unwrap();
/// println!("Slabs: {}", table.slabs.len());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: TaxConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration directory (e.g., "./config/fbr_individual")
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - Any required file is missing
    /// - Any file contains invalid YAML
    /// - The category schema or a rate table fails validation
    /// - Two rate files declare the same tax year
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tax_engine::config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::load("./config/fbr_individual")?;
    /// # Ok::<(), tax_engine::error::EngineError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let metadata = Self::load_yaml::<JurisdictionMetadata>(&path.join("jurisdiction.yaml"))?;

        let schema = Self::load_yaml::<TaxSchema>(&path.join("categories.yaml"))?;

        let rate_tables = Self::load_rates(&path.join("rates"))?;

        info!(
            jurisdiction = %metadata.code,
            categories = schema.categories.len(),
            tax_years = rate_tables.len(),
            "Tax configuration loaded"
        );

        Self::from_parts(metadata, schema, rate_tables.into_values().collect())
    }

    /// Builds a loader from already-parsed parts, validating every table.
    ///
    /// Useful for tests and for callers that source rate tables elsewhere.
    pub fn from_parts(
        metadata: JurisdictionMetadata,
        schema: TaxSchema,
        tables: Vec<RateTable>,
    ) -> EngineResult<Self> {
        schema
            .validate()
            .map_err(|message| EngineError::ConfigParseError {
                path: "categories.yaml".to_string(),
                message,
            })?;

        let mut rate_tables = BTreeMap::new();
        for table in tables {
            table.validate()?;
            if rate_tables.contains_key(&table.tax_year) {
                return Err(EngineError::InvalidRateTable {
                    tax_year: table.tax_year.clone(),
                    message: "tax year is declared by more than one rate table".to_string(),
                });
            }
            rate_tables.insert(table.tax_year.clone(), table);
        }

        Ok(Self {
            config: TaxConfig::new(metadata, schema, rate_tables),
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads all rate files from the rates directory, keyed by file path.
    fn load_rates(rates_dir: &Path) -> EngineResult<BTreeMap<String, RateTable>> {
        let rates_dir_str = rates_dir.display().to_string();

        if !rates_dir.exists() {
            return Err(EngineError::ConfigNotFound {
                path: rates_dir_str,
            });
        }

        let entries = fs::read_dir(rates_dir).map_err(|_| EngineError::ConfigNotFound {
            path: rates_dir_str.clone(),
        })?;

        let mut rates = BTreeMap::new();

        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: rates_dir_str.clone(),
            })?;

            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                let table = Self::load_yaml::<RateTable>(&path)?;
                debug!(tax_year = %table.tax_year, path = %path.display(), "Loaded rate table");
                rates.insert(path.display().to_string(), table);
            }
        }

        if rates.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no rate files found)", rates_dir_str),
            });
        }

        Ok(rates)
    }

    /// Returns the underlying tax configuration.
    pub fn config(&self) -> &TaxConfig {
        &self.config
    }

    /// Returns the jurisdiction metadata.
    pub fn jurisdiction(&self) -> &JurisdictionMetadata {
        self.config.jurisdiction()
    }

    /// Returns the loaded tax-year keys in ascending order.
    pub fn tax_years(&self) -> Vec<&str> {
        self.config.rate_tables().keys().map(String::as_str).collect()
    }
}

impl RateTableProvider for ConfigLoader {
    fn rate_table(&self, tax_year: &str) -> EngineResult<&RateTable> {
        self.config
            .rate_tables()
            .get(tax_year)
            .ok_or_else(|| EngineError::RateTableNotFound {
                tax_year: tax_year.to_string(),
            })
    }

    fn schema(&self) -> &TaxSchema {
        self.config.schema()
    }
}
