//! Normalized per-category income totals.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The income class of a category, which decides the tax regime it falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeClass {
    /// Salary and employment income, taxed under the progressive slabs.
    Employment,
    /// Rent and other-source income, taxed under the progressive slabs.
    OtherSources,
    /// Income taxed at a flat final rate, excluded from the slabs.
    FinalTax,
    /// Capital gains, taxed per holding-period bucket.
    CapitalGain,
}

impl IncomeClass {
    /// Returns true if the class is taxed under the progressive slabs.
    pub fn is_progressive(&self) -> bool {
        matches!(self, IncomeClass::Employment | IncomeClass::OtherSources)
    }

    /// Returns the snake_case identifier of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeClass::Employment => "employment",
            IncomeClass::OtherSources => "other_sources",
            IncomeClass::FinalTax => "final_tax",
            IncomeClass::CapitalGain => "capital_gain",
        }
    }
}

/// The normalized totals of one income category.
///
/// Produced once per run by a category aggregator and never mutated
/// afterwards. `taxable_amount` is never negative.
///
/// # Example
///
/// ```
/// use tax_engine::models::{CategoryTotals, IncomeClass};
/// use rust_decimal::Decimal;
///
/// let totals = CategoryTotals::new(
///     "salary",
///     IncomeClass::Employment,
///     Decimal::new(1_000_000, 0),
///     Decimal::new(1_200_000, 0),
/// );
/// assert_eq!(totals.taxable_amount, Decimal::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    /// The category name.
    pub category: String,
    /// The income class of the category.
    pub income_class: IncomeClass,
    /// Sum of the category's taxable fields.
    pub gross_amount: Decimal,
    /// Sum of the category's exempt fields.
    pub exempt_amount: Decimal,
    /// Gross less exempt, floored at zero.
    pub taxable_amount: Decimal,
    /// Taxable amount per capital-gain holding-period bucket.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub buckets: BTreeMap<String, Decimal>,
}

impl CategoryTotals {
    /// Creates totals for a category without bucket breakdown.
    ///
    /// The taxable amount is `max(0, gross - exempt)`.
    pub fn new(
        category: impl Into<String>,
        income_class: IncomeClass,
        gross_amount: Decimal,
        exempt_amount: Decimal,
    ) -> Self {
        Self {
            category: category.into(),
            income_class,
            gross_amount,
            exempt_amount,
            taxable_amount: (gross_amount - exempt_amount).max(Decimal::ZERO),
            buckets: BTreeMap::new(),
        }
    }
}
