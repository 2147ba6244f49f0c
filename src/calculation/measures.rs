//! Income measures used by the surcharge and minimum-tax triggers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{QualifyingIncome, SurchargeTrigger};

/// The aggregate income figures a run has established after deductions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeMeasures {
    /// Sum of all categories' taxable amounts, before deductions.
    pub total_income: Decimal,
    /// Normal income after deductions plus final-tax income.
    pub taxable_income_before_capital_gains: Decimal,
    /// Taxable income before capital gains plus capital gains.
    pub taxable_income_including_capital_gains: Decimal,
}

impl IncomeMeasures {
    /// The income compared against the surcharge threshold.
    pub fn surcharge_trigger(&self, trigger: SurchargeTrigger) -> Decimal {
        match trigger {
            SurchargeTrigger::TaxableIncomeIncludingCapitalGains => {
                self.taxable_income_including_capital_gains
            }
            SurchargeTrigger::TaxableIncomeExcludingCapitalGains => {
                self.taxable_income_before_capital_gains
            }
        }
    }

    /// The income compared against the minimum tax threshold.
    pub fn qualifying_income(&self, measure: QualifyingIncome) -> Decimal {
        match measure {
            QualifyingIncome::TotalIncome => self.total_income,
            QualifyingIncome::TaxableIncomeIncludingCapitalGains => {
                self.taxable_income_including_capital_gains
            }
        }
    }
}
