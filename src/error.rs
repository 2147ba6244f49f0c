//! Error types for the Tax Computation Engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while computing a tax return.
//! Every error falls into one of three classes (see [`ErrorKind`]):
//! configuration gaps, malformed input, or internal invariant violations.

use thiserror::Error;

use crate::models::Stage;

/// The broad class of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A rate table, schema or adjustment rule is missing or invalid.
    Configuration,
    /// Taxpayer input could not be coerced into a valid amount.
    Input,
    /// An internal computation step produced an impossible value.
    InvariantViolation,
}

/// The main error type for the Tax Computation Engine.
///
/// All operations in the engine return this error type. Errors raised inside
/// a pipeline stage reach the caller wrapped in [`EngineError::StageFailed`],
/// which names the failing stage and, where known, the category.
///
/// # Example
///
/// ```
/// use tax_engine::error::EngineError;
///
/// let error = EngineError::MissingRate {
///     tax_year: "2025-26".to_string(),
///     key: "sukuk".to_string(),
/// };
/// assert_eq!(error.to_string(), "No rate configured for 'sukuk' in tax year 2025-26");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// No rate table is loaded for the requested tax year.
    #[error("No rate table loaded for tax year {tax_year}")]
    RateTableNotFound {
        /// The tax-year key that was requested.
        tax_year: String,
    },

    /// A rate required by the return is absent from the rate table.
    #[error("No rate configured for '{key}' in tax year {tax_year}")]
    MissingRate {
        /// The tax year of the rate table.
        tax_year: String,
        /// The final-tax category or capital-gain bucket key.
        key: String,
    },

    /// A rate table or category schema failed validation.
    #[error("Invalid rate table for tax year {tax_year}: {message}")]
    InvalidRateTable {
        /// The tax year of the offending table.
        tax_year: String,
        /// What made the table invalid.
        message: String,
    },

    /// An adjustment claim used a key with no registered rule.
    #[error("Unknown adjustment '{key}' for tax year {tax_year}")]
    UnknownAdjustment {
        /// The tax year of the rate table consulted.
        tax_year: String,
        /// The unregistered adjustment key.
        key: String,
    },

    /// An input category is not declared in the category schema.
    #[error("Unknown income category: {category}")]
    UnknownCategory {
        /// The undeclared category name.
        category: String,
    },

    /// A field value could not be coerced into a non-negative amount.
    #[error("Invalid value for field '{field}' in category '{category}': {message}")]
    InvalidInput {
        /// The category containing the field.
        category: String,
        /// The offending field.
        field: String,
        /// A description of what made the value invalid.
        message: String,
    },

    /// A computation step produced a value outside its legal range.
    #[error("Invariant violated during {stage} for '{category}': {message}")]
    InvariantViolation {
        /// The stage in which the violation was detected.
        stage: Stage,
        /// The category or aggregate line concerned.
        category: String,
        /// A description of the violation.
        message: String,
    },

    /// An error raised while executing a pipeline stage.
    #[error("Stage {stage} failed{}: {source}", category.as_deref().map(|c| format!(" for '{}'", c)).unwrap_or_default())]
    StageFailed {
        /// The stage that failed.
        stage: Stage,
        /// The category being processed, if the failure is category-specific.
        category: Option<String>,
        /// The underlying error.
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Tags this error with the pipeline stage (and category) it occurred in.
    ///
    /// Errors that already carry a stage are returned unchanged.
    pub fn at_stage(self, stage: Stage, category: Option<&str>) -> Self {
        match self {
            EngineError::StageFailed { .. } | EngineError::InvariantViolation { .. } => self,
            other => EngineError::StageFailed {
                stage,
                category: category.map(str::to_string),
                source: Box::new(other),
            },
        }
    }

    /// Returns the broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ConfigNotFound { .. }
            | EngineError::ConfigParseError { .. }
            | EngineError::RateTableNotFound { .. }
            | EngineError::MissingRate { .. }
            | EngineError::InvalidRateTable { .. }
            | EngineError::UnknownAdjustment { .. } => ErrorKind::Configuration,
            EngineError::UnknownCategory { .. } | EngineError::InvalidInput { .. } => {
                ErrorKind::Input
            }
            EngineError::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            EngineError::StageFailed { source, .. } => source.kind(),
        }
    }

    /// Returns the stage the error occurred in, if it was raised by the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::StageFailed { stage, .. } | EngineError::InvariantViolation { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }

    /// Returns the category the error concerns, if known.
    pub fn category(&self) -> Option<&str> {
        match self {
            EngineError::StageFailed {
                category: Some(category),
                ..
            } => Some(category),
            EngineError::StageFailed { source, .. } => source.category(),
            EngineError::InvariantViolation { category, .. }
            | EngineError::UnknownCategory { category }
            | EngineError::InvalidInput { category, .. } => Some(category),
            EngineError::MissingRate { key, .. } | EngineError::UnknownAdjustment { key, .. } => {
                Some(key)
            }
            _ => None,
        }
    }

    /// Returns the innermost error, unwrapping any stage tagging.
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
