//! Configuration types for tax computation.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files: jurisdiction metadata,
//! the per-category field schema, and the per-tax-year rate tables.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{AdjustmentKind, AdjustmentValuation, FilerStatus, IncomeClass, TaxpayerType};

/// Metadata about the tax jurisdiction.
#[derive(Debug, Clone, Deserialize)]
pub struct JurisdictionMetadata {
    /// Short code of the configuration (e.g., "FBR-IND").
    pub code: String,
    /// The human-readable name of the regime.
    pub name: String,
    /// The authority that publishes the rates.
    pub authority: String,
    /// URL to the official rate documentation.
    pub source_url: String,
}

/// Currency settings used for rounding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrencyConfig {
    /// ISO currency code.
    pub code: String,
    /// Number of decimal places of the smallest currency unit.
    pub decimal_places: u32,
}

/// The role a form field plays in its category's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Added to the category's gross amount.
    Taxable,
    /// Subtracted from the gross amount.
    Exempt,
    /// Calculated by the form itself; ignored by the engine.
    Derived,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldSpecRepr {
    Role(FieldRole),
    Detailed {
        role: FieldRole,
        #[serde(default)]
        bucket: Option<String>,
    },
}

/// Declaration of one form field.
///
/// In YAML a field is either a bare role (`bonus: taxable`) or a mapping
/// naming the capital-gain bucket (`{ role: taxable, bucket: securities }`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "FieldSpecRepr")]
pub struct FieldSpec {
    /// The field's role.
    pub role: FieldRole,
    /// Capital-gain holding-period bucket the field belongs to.
    pub bucket: Option<String>,
}

impl From<FieldSpecRepr> for FieldSpec {
    fn from(repr: FieldSpecRepr) -> Self {
        match repr {
            FieldSpecRepr::Role(role) => FieldSpec { role, bucket: None },
            FieldSpecRepr::Detailed { role, bucket } => FieldSpec { role, bucket },
        }
    }
}

impl FieldSpec {
    /// Creates a field spec with no bucket.
    pub fn new(role: FieldRole) -> Self {
        Self { role, bucket: None }
    }

    /// Creates a capital-gain field spec in the given bucket.
    pub fn in_bucket(role: FieldRole, bucket: impl Into<String>) -> Self {
        Self {
            role,
            bucket: Some(bucket.into()),
        }
    }
}

/// The schema of one income category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySchema {
    /// A description of the category.
    pub description: String,
    /// The income class, which selects the tax regime.
    pub income_class: IncomeClass,
    /// Final-tax rate key, defaulting to the category name.
    #[serde(default)]
    pub rate_key: Option<String>,
    /// Map of field key to field declaration.
    pub fields: BTreeMap<String, FieldSpec>,
}

impl CategorySchema {
    /// Returns the key used to look up this category's final-tax rate.
    pub fn rate_key<'a>(&'a self, category: &'a str) -> &'a str {
        self.rate_key.as_deref().unwrap_or(category)
    }
}

/// Category schema file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxSchema {
    /// Map of category name to its schema.
    pub categories: BTreeMap<String, CategorySchema>,
}

impl TaxSchema {
    /// Checks the schema for structural mistakes.
    ///
    /// Capital-gain fields that contribute to totals must name a bucket,
    /// other classes must not, and every category needs a taxable field.
    pub fn validate(&self) -> Result<(), String> {
        for (name, category) in &self.categories {
            if !category
                .fields
                .values()
                .any(|f| f.role == FieldRole::Taxable)
            {
                return Err(format!("category '{}' declares no taxable field", name));
            }

            for (field, spec) in &category.fields {
                let counted = spec.role != FieldRole::Derived;
                match (category.income_class, &spec.bucket) {
                    (IncomeClass::CapitalGain, None) if counted => {
                        return Err(format!(
                            "capital-gain field '{}.{}' must name a holding-period bucket",
                            name, field
                        ));
                    }
                    (class, Some(_)) if class != IncomeClass::CapitalGain => {
                        return Err(format!(
                            "field '{}.{}' names a bucket but its category is not a capital-gain category",
                            name, field
                        ));
                    }
                    _ => {}
                }
            }

            if category.rate_key.is_some() && category.income_class != IncomeClass::FinalTax {
                return Err(format!(
                    "category '{}' sets a rate_key but is not a final-tax category",
                    name
                ));
            }
        }
        Ok(())
    }
}

/// One progressive tax slab.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Slab {
    /// Income at which the slab starts.
    pub lower: Decimal,
    /// Income at which the slab ends, `None` for the top slab.
    #[serde(default)]
    pub upper: Option<Decimal>,
    /// Marginal rate applied inside the slab.
    pub rate: Decimal,
}

/// A rate that may depend on the taxpayer's filer status.
///
/// In YAML either a bare rate (`0.15`) or `{ atl: 0.15, non_atl: 0.30 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StatusRate {
    /// One rate for every filer status.
    Flat(Decimal),
    /// Separate rates for filers on and off the Active Taxpayers List.
    ByStatus {
        /// Rate for taxpayers on the list.
        atl: Decimal,
        /// Rate for taxpayers not on the list.
        non_atl: Decimal,
    },
}

impl StatusRate {
    /// Returns the rate that applies to `status`.
    pub fn for_status(&self, status: FilerStatus) -> Decimal {
        match (self, status) {
            (StatusRate::Flat(rate), _) => *rate,
            (StatusRate::ByStatus { atl, .. }, FilerStatus::Atl) => *atl,
            (StatusRate::ByStatus { non_atl, .. }, FilerStatus::NonAtl) => *non_atl,
        }
    }

    fn rates(&self) -> Vec<Decimal> {
        match self {
            StatusRate::Flat(rate) => vec![*rate],
            StatusRate::ByStatus { atl, non_atl } => vec![*atl, *non_atl],
        }
    }
}

/// The regime income inside a final-tax tier falls under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierRegime {
    /// Taxed at the tier rate in full discharge of liability.
    #[default]
    Final,
    /// Moved to normal income, whose slab tax on it is topped up to the tier rate.
    Minimum,
}

/// One marginal tier of a final-tax schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FinalTaxTier {
    /// Income at which the tier ends, `None` for the top tier.
    #[serde(default)]
    pub upper: Option<Decimal>,
    /// Rate applied to income inside the tier.
    pub rate: StatusRate,
    /// The regime of income inside the tier.
    #[serde(default)]
    pub regime: TierRegime,
}

/// The final-tax rates of one rate key.
///
/// In YAML either a single [`StatusRate`] or a mapping with `tiers`, each
/// tier starting where the previous one ends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FinalTaxSchedule {
    /// Marginal tiers in ascending order, the last one unbounded.
    Tiered {
        /// The tiers.
        tiers: Vec<FinalTaxTier>,
    },
    /// One rate for the whole amount.
    Single(StatusRate),
}

impl FinalTaxSchedule {
    /// Returns the schedule as tiers; a single rate is one unbounded final tier.
    pub fn tiers(&self) -> Vec<FinalTaxTier> {
        match self {
            FinalTaxSchedule::Tiered { tiers } => tiers.clone(),
            FinalTaxSchedule::Single(rate) => vec![FinalTaxTier {
                upper: None,
                rate: *rate,
                regime: TierRegime::Final,
            }],
        }
    }

    fn check(&self) -> Result<(), String> {
        let tiers = self.tiers();
        let last_index = tiers.len().checked_sub(1).ok_or("lists no tiers")?;
        let mut lower = Decimal::ZERO;
        for (i, tier) in tiers.iter().enumerate() {
            if tier.rate.rates().into_iter().any(|r| !is_fraction(r)) {
                return Err(format!("tier {} rate is outside [0, 1]", i + 1));
            }
            match tier.upper {
                Some(upper) if upper <= lower => {
                    return Err(format!(
                        "tier {} upper bound {} does not exceed {}",
                        i + 1,
                        upper,
                        lower
                    ));
                }
                Some(upper) if i != last_index => lower = upper,
                Some(_) => return Err("top tier must be unbounded".to_string()),
                None if i != last_index => {
                    return Err(format!("only the top tier may be unbounded (tier {})", i + 1));
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// A capital-gain holding-period bucket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CapitalGainBucket {
    /// The holding period the bucket covers (e.g., "held up to 1 year").
    pub holding_period: String,
    /// Rate applied to gains in the bucket.
    pub rate: Decimal,
}

/// The income measure compared against the surcharge threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurchargeTrigger {
    /// Taxable income including capital gains.
    #[default]
    TaxableIncomeIncludingCapitalGains,
    /// Taxable income excluding capital gains.
    TaxableIncomeExcludingCapitalGains,
}

/// The tax the surcharge rate is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurchargeBase {
    /// Normal (progressive) tax only.
    #[default]
    NormalTax,
    /// Normal, final and capital-gain tax combined.
    RegimeTaxTotal,
}

/// A rate that may depend on whether the taxpayer is salaried.
///
/// In YAML either a bare rate or `{ salaried: 0.09, non_salaried: 0.10 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TaxpayerTypeRate {
    /// One rate for every taxpayer type.
    Flat(Decimal),
    /// Separate rates for salaried and non-salaried taxpayers.
    ByType {
        /// Rate for salaried taxpayers.
        salaried: Decimal,
        /// Rate for everyone else.
        non_salaried: Decimal,
    },
}

impl TaxpayerTypeRate {
    /// Returns the rate that applies to `taxpayer_type`.
    pub fn for_type(&self, taxpayer_type: TaxpayerType) -> Decimal {
        match (self, taxpayer_type) {
            (TaxpayerTypeRate::Flat(rate), _) => *rate,
            (TaxpayerTypeRate::ByType { salaried, .. }, TaxpayerType::Salaried) => *salaried,
            (TaxpayerTypeRate::ByType { non_salaried, .. }, TaxpayerType::NonSalaried) => {
                *non_salaried
            }
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            TaxpayerTypeRate::Flat(rate) => is_fraction(*rate),
            TaxpayerTypeRate::ByType {
                salaried,
                non_salaried,
            } => is_fraction(*salaried) && is_fraction(*non_salaried),
        }
    }
}

/// Surcharge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SurchargeConfig {
    /// Income above which the surcharge applies.
    pub threshold: Decimal,
    /// Surcharge rate, possibly by taxpayer type.
    pub rate: TaxpayerTypeRate,
    /// The income measure compared against the threshold.
    #[serde(default)]
    pub trigger: SurchargeTrigger,
    /// The tax the rate is applied to.
    #[serde(default)]
    pub base: SurchargeBase,
}

/// The income measure compared against the minimum tax threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifyingIncome {
    /// Total income after exemptions, before deductions.
    #[default]
    TotalIncome,
    /// Taxable income including capital gains.
    TaxableIncomeIncludingCapitalGains,
}

/// Minimum tax floor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MinimumTaxConfig {
    /// The minimum tax payable when triggered.
    pub floor: Decimal,
    /// Qualifying income above which the floor applies.
    pub threshold: Decimal,
    /// The income measure compared against the threshold.
    #[serde(default)]
    pub qualifying_income: QualifyingIncome,
}

/// A named base a percentage cap is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapBase {
    /// Taxable income known at the stage: normal income before deductions
    /// for the deduction stage, taxable income including capital gains for
    /// the reduction and credit stages.
    TaxableIncome,
    /// Normal (progressive) tax.
    NormalTax,
    /// Capital-gain tax.
    CapitalGainTax,
    /// Gross chargeable tax.
    GrossChargeableTax,
    /// The running liability entering the stage.
    RunningLiability,
}

impl CapBase {
    /// Returns the snake_case identifier of the base.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapBase::TaxableIncome => "taxable_income",
            CapBase::NormalTax => "normal_tax",
            CapBase::CapitalGainTax => "capital_gain_tax",
            CapBase::GrossChargeableTax => "gross_chargeable_tax",
            CapBase::RunningLiability => "running_liability",
        }
    }

    /// Returns true if the base is known when adjustments of `kind` are applied.
    pub fn is_available_for(&self, kind: AdjustmentKind) -> bool {
        match kind {
            AdjustmentKind::Deduction => {
                matches!(self, CapBase::TaxableIncome | CapBase::RunningLiability)
            }
            AdjustmentKind::Reduction | AdjustmentKind::Credit => true,
        }
    }
}

/// Raises a percentage cap for taxpayers who joined a scheme late in life.
///
/// When `age_at_joining >= min_joining_age`, the percentage grows by
/// `step_percent` for each year of `age_at_joining` above `base_age`,
/// up to `max_percent`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgeOfJoiningRule {
    /// Youngest joining age the rule applies to.
    pub min_joining_age: u32,
    /// Age above which each year earns an increment.
    pub base_age: u32,
    /// Increment per year.
    pub step_percent: Decimal,
    /// Ceiling of the raised percentage.
    pub max_percent: Decimal,
}

/// How the cap of an adjustment is derived.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapRule {
    /// A fixed ceiling.
    Absolute {
        /// The ceiling amount.
        amount: Decimal,
    },
    /// A percentage of a named base.
    PercentOf {
        /// The base the percentage is taken of.
        base: CapBase,
        /// The percentage, as a fraction (0.30 for 30%).
        percent: Decimal,
        /// Optional age-of-joining increment.
        #[serde(default)]
        age_of_joining: Option<AgeOfJoiningRule>,
    },
    /// The lowest of several caps.
    LesserOf {
        /// The candidate caps.
        caps: Vec<CapRule>,
    },
}

impl CapRule {
    fn validate(&self, kind: AdjustmentKind) -> Result<(), String> {
        match self {
            CapRule::Absolute { amount } => {
                if *amount < Decimal::ZERO {
                    return Err(format!("absolute cap {} is negative", amount));
                }
            }
            CapRule::PercentOf {
                base,
                percent,
                age_of_joining,
            } => {
                if !is_fraction(*percent) {
                    return Err(format!("cap percent {} is outside [0, 1]", percent));
                }
                if !base.is_available_for(kind) {
                    return Err(format!(
                        "cap base '{}' is not known when {}s are applied",
                        base.as_str(),
                        kind.as_str()
                    ));
                }
                if let Some(rule) = age_of_joining {
                    if !is_fraction(rule.step_percent) || !is_fraction(rule.max_percent) {
                        return Err("age-of-joining percentages must be within [0, 1]".to_string());
                    }
                    if rule.max_percent < *percent {
                        return Err(format!(
                            "age-of-joining maximum {} is below the base percent {}",
                            rule.max_percent, percent
                        ));
                    }
                }
            }
            CapRule::LesserOf { caps } => {
                if caps.is_empty() {
                    return Err("lesser_of cap lists no caps".to_string());
                }
                for cap in caps {
                    cap.validate(kind)?;
                }
            }
        }
        Ok(())
    }
}

/// A registered deduction, reduction or credit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdjustmentRule {
    /// When the adjustment is applied.
    pub kind: AdjustmentKind,
    /// A description of the adjustment.
    pub description: String,
    /// The cap, or `None` for an uncapped adjustment.
    #[serde(default)]
    pub cap: Option<CapRule>,
    /// How the allowed amount is valued against the liability.
    #[serde(default)]
    pub valuation: AdjustmentValuation,
}

/// The rate table of one tax year.
///
/// Loaded once and shared read-only by every computation for that year.
#[derive(Debug, Clone, Deserialize)]
pub struct RateTable {
    /// The tax-year key (e.g., "2025-26").
    pub tax_year: String,
    /// A description of the table's source.
    #[serde(default)]
    pub description: String,
    /// Currency settings.
    pub currency: CurrencyConfig,
    /// Progressive slabs in ascending order.
    pub slabs: Vec<Slab>,
    /// Map of final-tax rate key to its rate schedule.
    #[serde(default)]
    pub final_tax_rates: BTreeMap<String, FinalTaxSchedule>,
    /// Map of capital-gain bucket key to bucket.
    #[serde(default)]
    pub capital_gain_buckets: BTreeMap<String, CapitalGainBucket>,
    /// Minimum tax floor, if the year has one.
    #[serde(default)]
    pub minimum_tax: Option<MinimumTaxConfig>,
    /// Surcharge, if the year has one.
    #[serde(default)]
    pub surcharge: Option<SurchargeConfig>,
    /// Map of adjustment key to rule.
    #[serde(default)]
    pub adjustments: BTreeMap<String, AdjustmentRule>,
}

fn is_fraction(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE
}

impl RateTable {
    /// Gets the rate schedule for a final-tax key.
    pub fn final_tax_schedule(&self, key: &str) -> EngineResult<&FinalTaxSchedule> {
        self.final_tax_rates
            .get(key)
            .ok_or_else(|| EngineError::MissingRate {
                tax_year: self.tax_year.clone(),
                key: key.to_string(),
            })
    }

    /// Gets the rate for a capital-gain bucket.
    pub fn capital_gain_rate(&self, bucket: &str) -> EngineResult<Decimal> {
        self.capital_gain_buckets
            .get(bucket)
            .map(|b| b.rate)
            .ok_or_else(|| EngineError::MissingRate {
                tax_year: self.tax_year.clone(),
                key: bucket.to_string(),
            })
    }

    /// Gets the rule registered for an adjustment key.
    pub fn adjustment_rule(&self, key: &str) -> EngineResult<&AdjustmentRule> {
        self.adjustments
            .get(key)
            .ok_or_else(|| EngineError::UnknownAdjustment {
                tax_year: self.tax_year.clone(),
                key: key.to_string(),
            })
    }

    /// Validates the table's internal consistency.
    ///
    /// Slabs must start at zero, be contiguous and ascending, and end with a
    /// single unbounded slab. Every rate must lie within `[0, 1]`.
    pub fn validate(&self) -> EngineResult<()> {
        self.check().map_err(|message| EngineError::InvalidRateTable {
            tax_year: self.tax_year.clone(),
            message,
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.currency.decimal_places > 6 {
            return Err(format!(
                "currency decimal places {} exceeds 6",
                self.currency.decimal_places
            ));
        }

        let first = self.slabs.first().ok_or("no progressive slabs configured")?;
        if first.lower != Decimal::ZERO {
            return Err(format!("first slab starts at {} instead of 0", first.lower));
        }

        let last_index = self.slabs.len() - 1;
        for (i, slab) in self.slabs.iter().enumerate() {
            if !is_fraction(slab.rate) {
                return Err(format!("slab {} rate {} is outside [0, 1]", i + 1, slab.rate));
            }
            match slab.upper {
                Some(upper) if upper <= slab.lower => {
                    return Err(format!(
                        "slab {} upper bound {} does not exceed lower bound {}",
                        i + 1,
                        upper,
                        slab.lower
                    ));
                }
                Some(_) if i == last_index => {
                    return Err("top slab must be unbounded".to_string());
                }
                None if i != last_index => {
                    return Err(format!("only the top slab may be unbounded (slab {})", i + 1));
                }
                _ => {}
            }
            if let Some(next) = self.slabs.get(i + 1) {
                if slab.upper != Some(next.lower) {
                    return Err(format!(
                        "slab {} ends at {:?} but slab {} starts at {}",
                        i + 1,
                        slab.upper,
                        i + 2,
                        next.lower
                    ));
                }
            }
        }

        for (key, schedule) in &self.final_tax_rates {
            schedule
                .check()
                .map_err(|message| format!("final-tax rate '{}': {}", key, message))?;
        }

        for (key, bucket) in &self.capital_gain_buckets {
            if !is_fraction(bucket.rate) {
                return Err(format!(
                    "capital-gain bucket '{}' rate {} is outside [0, 1]",
                    key, bucket.rate
                ));
            }
        }

        if let Some(surcharge) = &self.surcharge {
            if surcharge.threshold < Decimal::ZERO || !surcharge.rate.is_valid() {
                return Err("surcharge threshold must be non-negative and rate within [0, 1]".to_string());
            }
        }

        if let Some(minimum) = &self.minimum_tax {
            if minimum.floor < Decimal::ZERO || minimum.threshold < Decimal::ZERO {
                return Err("minimum tax floor and threshold must be non-negative".to_string());
            }
        }

        for (key, rule) in &self.adjustments {
            if rule.valuation == AdjustmentValuation::AverageRate
                && rule.kind == AdjustmentKind::Deduction
            {
                return Err(format!(
                    "adjustment '{}': deductions cannot be valued at the average rate",
                    key
                ));
            }
            if let Some(cap) = &rule.cap {
                cap.validate(rule.kind)
                    .map_err(|message| format!("adjustment '{}': {}", key, message))?;
            }
        }

        Ok(())
    }
}

/// The complete tax configuration loaded from YAML files.
///
/// Aggregates the jurisdiction metadata, the category schema and every
/// loaded rate table, keyed by tax year.
#[derive(Debug, Clone)]
pub struct TaxConfig {
    /// Jurisdiction metadata.
    metadata: JurisdictionMetadata,
    /// Category schema shared by all tax years.
    schema: TaxSchema,
    /// Rate tables keyed by tax year.
    rate_tables: BTreeMap<String, RateTable>,
}

impl TaxConfig {
    /// Creates a new TaxConfig from its component parts.
    pub fn new(
        metadata: JurisdictionMetadata,
        schema: TaxSchema,
        rate_tables: BTreeMap<String, RateTable>,
    ) -> Self {
        Self {
            metadata,
            schema,
            rate_tables,
        }
    }

    /// Returns the jurisdiction metadata.
    pub fn jurisdiction(&self) -> &JurisdictionMetadata {
        &self.metadata
    }

    /// Returns the category schema.
    pub fn schema(&self) -> &TaxSchema {
        &self.schema
    }

    /// Returns all rate tables.
    pub fn rate_tables(&self) -> &BTreeMap<String, RateTable> {
        &self.rate_tables
    }
}
