//! The tax computation pipeline.
//!
//! Runs the stages in their fixed legal order:
//!
//! ```text
//! AggregateCategories → ApplyDeductions → ComputeRegimeTaxes →
//! SumGrossChargeable → ApplySurcharge → ApplyReductions → ApplyCredits →
//! ApplyMinimumFloor → Reconcile
//! ```
//!
//! Each stage reads only the typed output of the stages before it. Any error
//! aborts the run and is returned tagged with the failing stage; a partial
//! result is never produced.
//!
//! Totals are added with checked arithmetic. Input amounts that add up past
//! the decimal range reject the return; tax amounts that do so are an
//! invariant violation.

use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::config::{RateTable, RateTableProvider, TaxSchema};
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::models::{
    AdjustmentKind, AuditStep, AuditTrace, AuditWarning, CategoryTotals, IncomeClass, RegimeKind,
    Stage, TaxComputationResult, TaxLineItem, TaxReturnInput,
};

use super::adjustments::{CapBases, apply_adjustments, validate_claims};
use super::aggregation::aggregate_category;
use super::capital_gain::compute_capital_gain_tax;
use super::flat_rate::{
    EXCESS_FINAL_TAX_CATEGORY, apply_excess_minimum_tax, compute_final_tax,
    income_above_final_limit,
};
use super::measures::IncomeMeasures;
use super::minimum_tax::apply_minimum_tax;
use super::progressive::{NORMAL_INCOME_CATEGORY, compute_progressive_tax};
use super::rounding::{checked_sum, percentage_of};
use super::surcharge::{SurchargeBases, compute_surcharge};
use super::withholding::reconcile_withholding;

/// Tags an error with a stage, keeping the category it already names.
fn in_stage(stage: Stage) -> impl Fn(EngineError) -> EngineError {
    move |err| {
        let category = err.category().map(str::to_string);
        err.at_stage(stage, category.as_deref())
    }
}

/// Accumulates audit steps and warnings with sequential step numbers.
#[derive(Debug, Default)]
struct TraceBuilder {
    steps: Vec<AuditStep>,
    warnings: Vec<AuditWarning>,
}

impl TraceBuilder {
    fn next_step(&self) -> u32 {
        self.steps.len() as u32 + 1
    }

    fn push(&mut self, step: AuditStep) {
        self.steps.push(step);
    }

    fn extend(&mut self, steps: Vec<AuditStep>, warnings: Vec<AuditWarning>) {
        self.steps.extend(steps);
        self.warnings.extend(warnings);
    }

    fn finish(self) -> AuditTrace {
        AuditTrace {
            steps: self.steps,
            warnings: self.warnings,
        }
    }
}

/// Adds up amounts derived from the return's inputs.
fn input_total(line: &str, amounts: impl IntoIterator<Item = Decimal>) -> EngineResult<Decimal> {
    checked_sum(amounts).ok_or_else(|| EngineError::InvalidInput {
        category: line.to_string(),
        field: "amount".to_string(),
        message: "amounts add up to more than the supported range".to_string(),
    })
}

/// Adds up tax amounts, each bounded by the income it is charged on.
fn tax_total(
    stage: Stage,
    line: &str,
    amounts: impl IntoIterator<Item = Decimal>,
) -> EngineResult<Decimal> {
    checked_sum(amounts).ok_or_else(|| EngineError::InvariantViolation {
        stage,
        category: line.to_string(),
        message: "tax adds up to more than the supported range".to_string(),
    })
}

/// Sums the taxable amounts of every category in an income class.
fn class_total(categories: &[CategoryTotals], class: IncomeClass) -> EngineResult<Decimal> {
    input_total(
        class.as_str(),
        categories
            .iter()
            .filter(|c| c.income_class == class)
            .map(|c| c.taxable_amount),
    )
}

/// Looks up the final-tax rate key of a category.
fn final_rate_key<'a>(schema: &'a TaxSchema, category: &'a str) -> &'a str {
    schema
        .categories
        .get(category)
        .map_or(category, |s| s.rate_key(category))
}

/// Computes a complete tax return.
///
/// The rate table for `input.tax_year` is fetched from `provider` before any
/// stage runs, so an unknown tax year fails with an untagged
/// `RateTableNotFound`. Every other failure is tagged with its stage.
///
/// Running the same input against the same rate table always yields an
/// identical result.
///
/// # Example
///
/// ```no_run
/// use tax_engine::calculation::compute_tax;
/// use tax_engine::config::ConfigLoader;
/// use tax_engine::models::TaxReturnInput;
///
/// let loader = ConfigLoader::load("./config/fbr_individual")?;
/// let input: TaxReturnInput = serde_json::from_value(serde_json::json!({
///     "taxpayer_id": "tp_001",
///     "tax_year": "2025-26",
///     "categories": { "salary": { "annual_basic_salary": "1,500,000" } }
/// }))
/// .unwrap();
///
/// let result = compute_tax(&input, &loader)?;
/// println!("Net demand: {}", result.net_demand_or_refund);
/// # Ok::<(), tax_engine::error::EngineError>(())
/// ```
pub fn compute_tax<P: RateTableProvider + ?Sized>(
    input: &TaxReturnInput,
    provider: &P,
) -> EngineResult<TaxComputationResult> {
    let table = provider.rate_table(&input.tax_year)?;

    match run_pipeline(input, table, provider.schema()) {
        Ok(result) => {
            info!(
                taxpayer_id = %result.taxpayer_id,
                tax_year = %result.tax_year,
                final_chargeable_tax = %result.final_chargeable_tax,
                net_demand_or_refund = %result.net_demand_or_refund,
                "Tax computation completed"
            );
            Ok(result)
        }
        Err(err) => {
            if err.kind() == ErrorKind::InvariantViolation {
                error!(
                    taxpayer_id = %input.taxpayer_id,
                    tax_year = %input.tax_year,
                    stage = ?err.stage(),
                    error = %err,
                    "Invariant violated during tax computation"
                );
            } else {
                debug!(
                    taxpayer_id = %input.taxpayer_id,
                    stage = ?err.stage(),
                    error = %err,
                    "Tax computation rejected"
                );
            }
            Err(err)
        }
    }
}

fn run_pipeline(
    input: &TaxReturnInput,
    table: &RateTable,
    schema: &TaxSchema,
) -> EngineResult<TaxComputationResult> {
    let decimal_places = table.currency.decimal_places;
    let mut trace = TraceBuilder::default();

    // AggregateCategories
    let mut categories = Vec::with_capacity(input.categories.len());
    for (name, fields) in &input.categories {
        let category_schema = schema
            .categories
            .get(name)
            .ok_or_else(|| EngineError::UnknownCategory {
                category: name.clone(),
            })
            .map_err(in_stage(Stage::AggregateCategories))?;

        let aggregated = aggregate_category(name, fields, category_schema, trace.next_step())
            .map_err(in_stage(Stage::AggregateCategories))?;
        trace.extend(vec![aggregated.audit_step], aggregated.warnings);
        categories.push(aggregated.totals);
    }

    let aggregate_totals = || -> EngineResult<_> {
        let gross = input_total("total_gross_income", categories.iter().map(|c| c.gross_amount))?;
        let exempt = input_total("total_exempt_income", categories.iter().map(|c| c.exempt_amount))?;
        let taxable = input_total("total_income", categories.iter().map(|c| c.taxable_amount))?;
        Ok((gross, exempt, taxable))
    };
    let (total_gross_income, total_exempt_income, total_income) =
        aggregate_totals().map_err(in_stage(Stage::AggregateCategories))?;
    let income_from_salary = class_total(&categories, IncomeClass::Employment)
        .map_err(in_stage(Stage::AggregateCategories))?;
    let income_from_other_sources = class_total(&categories, IncomeClass::OtherSources)
        .map_err(in_stage(Stage::AggregateCategories))?;
    let income_from_capital_gains = class_total(&categories, IncomeClass::CapitalGain)
        .map_err(in_stage(Stage::AggregateCategories))?;

    // Final-tax income above a category's final limit is taxed as normal
    // income. A missing schedule counts no excess here and fails when the
    // category is taxed.
    let excess_final_tax_income = input_total(
        EXCESS_FINAL_TAX_CATEGORY,
        categories
            .iter()
            .filter(|c| c.income_class == IncomeClass::FinalTax)
            .filter_map(|c| {
                let rate_key = final_rate_key(schema, &c.category);
                table
                    .final_tax_rates
                    .get(rate_key)
                    .map(|schedule| income_above_final_limit(c.taxable_amount, schedule))
            }),
    )
    .map_err(in_stage(Stage::AggregateCategories))?;
    let final_tax_income = class_total(&categories, IncomeClass::FinalTax)
        .map_err(in_stage(Stage::AggregateCategories))?
        - excess_final_tax_income;

    debug!(
        stage = %Stage::AggregateCategories,
        categories = categories.len(),
        total_income = %total_income,
        "Categories aggregated"
    );

    // ApplyDeductions
    validate_claims(&input.adjustments, table).map_err(in_stage(Stage::ApplyDeductions))?;

    let normal_income = input_total(
        "normal_income",
        [income_from_salary, income_from_other_sources, excess_final_tax_income],
    )
    .map_err(in_stage(Stage::ApplyDeductions))?;
    let deductions = apply_adjustments(
        AdjustmentKind::Deduction,
        &input.adjustments,
        table,
        &CapBases {
            taxable_income: normal_income,
            ..CapBases::default()
        },
        normal_income,
        trace.next_step(),
    )
    .map_err(in_stage(Stage::ApplyDeductions))?;
    trace.extend(deductions.audit_steps, deductions.warnings);
    let deductions = deductions.outcome;
    let normal_taxable_income = deductions.liability_after;

    debug!(
        stage = %Stage::ApplyDeductions,
        total_deductions = %deductions.total_applied,
        normal_taxable_income = %normal_taxable_income,
        "Deductions applied"
    );

    // ComputeRegimeTaxes
    let progressive =
        compute_progressive_tax(normal_taxable_income, &table.slabs, decimal_places, trace.next_step())
            .map_err(in_stage(Stage::ComputeRegimeTaxes))?;
    trace.push(progressive.audit_step);
    let normal_tax = progressive.tax;

    let mut tax_lines = vec![TaxLineItem {
        name: "Normal income tax".to_string(),
        category: NORMAL_INCOME_CATEGORY.to_string(),
        regime: RegimeKind::Progressive,
        base_amount: normal_taxable_income,
        rate: None,
        amount: normal_tax,
    }];

    let mut final_tax = Decimal::ZERO;
    let mut capital_gain_tax = Decimal::ZERO;

    let mut excess_minimum_tax = Decimal::ZERO;
    let regime_sum = |line: &str, a: Decimal, b: Decimal| {
        tax_total(Stage::ComputeRegimeTaxes, line, [a, b])
    };

    for totals in &categories {
        let tag = |err: EngineError| {
            err.at_stage(Stage::ComputeRegimeTaxes, Some(totals.category.as_str()))
        };

        match totals.income_class {
            IncomeClass::FinalTax => {
                let rate_key = final_rate_key(schema, &totals.category);
                let schedule = table.final_tax_schedule(rate_key).map_err(tag)?;
                let result = compute_final_tax(
                    totals,
                    schedule,
                    input.filer_status,
                    decimal_places,
                    trace.next_step(),
                )
                .map_err(tag)?;
                final_tax = regime_sum("final_tax", final_tax, result.line.amount)?;
                excess_minimum_tax =
                    regime_sum(EXCESS_FINAL_TAX_CATEGORY, excess_minimum_tax, result.minimum_tax)?;
                tax_lines.push(result.line);
                trace.push(result.audit_step);
            }
            IncomeClass::CapitalGain => {
                let result =
                    compute_capital_gain_tax(totals, table, trace.next_step()).map_err(tag)?;
                capital_gain_tax = regime_sum("capital_gain_tax", capital_gain_tax, result.total)?;
                tax_lines.extend(result.lines);
                trace.push(result.audit_step);
            }
            IncomeClass::Employment | IncomeClass::OtherSources => {}
        }
    }

    let mut excess_final_tax_top_up = Decimal::ZERO;
    if excess_final_tax_income > Decimal::ZERO {
        let without_excess = compute_progressive_tax(
            (normal_taxable_income - excess_final_tax_income).max(Decimal::ZERO),
            &table.slabs,
            decimal_places,
            trace.next_step(),
        )
        .map_err(in_stage(Stage::ComputeRegimeTaxes))?;
        let excess = apply_excess_minimum_tax(
            excess_final_tax_income,
            excess_minimum_tax,
            normal_tax,
            without_excess.tax,
            trace.next_step(),
        )
        .map_err(in_stage(Stage::ComputeRegimeTaxes))?;
        trace.push(excess.audit_step);
        tax_lines.extend(excess.line);
        excess_final_tax_top_up = excess.top_up;
    }

    debug!(
        stage = %Stage::ComputeRegimeTaxes,
        normal_tax = %normal_tax,
        final_tax = %final_tax,
        capital_gain_tax = %capital_gain_tax,
        excess_final_tax_top_up = %excess_final_tax_top_up,
        "Regime taxes computed"
    );

    // SumGrossChargeable
    let regime_tax_total = tax_total(
        Stage::SumGrossChargeable,
        "regime_tax_total",
        [normal_tax, final_tax, capital_gain_tax, excess_final_tax_top_up],
    )?;
    let income_measures = || -> EngineResult<_> {
        let before = input_total(
            "taxable_income_before_capital_gains",
            [normal_taxable_income, final_tax_income],
        )?;
        let including = input_total(
            "taxable_income_including_capital_gains",
            [before, income_from_capital_gains],
        )?;
        Ok(IncomeMeasures {
            total_income,
            taxable_income_before_capital_gains: before,
            taxable_income_including_capital_gains: including,
        })
    };
    let measures = income_measures().map_err(in_stage(Stage::SumGrossChargeable))?;

    trace.push(AuditStep {
        step_number: trace.next_step(),
        rule_id: "sum_regime_taxes".to_string(),
        rule_name: "Sum of Regime Taxes".to_string(),
        stage: Stage::SumGrossChargeable,
        input: serde_json::json!({
            "normal_tax": normal_tax.to_string(),
            "final_tax": final_tax.to_string(),
            "capital_gain_tax": capital_gain_tax.to_string(),
            "excess_final_tax_top_up": excess_final_tax_top_up.to_string(),
        }),
        output: serde_json::json!({
            "regime_tax_total": regime_tax_total.to_string(),
            "taxable_income_before_capital_gains": measures.taxable_income_before_capital_gains.to_string(),
            "taxable_income_including_capital_gains": measures.taxable_income_including_capital_gains.to_string(),
        }),
        reasoning: format!(
            "{} normal + {} final + {} capital gains + {} excess top-up = {}",
            normal_tax, final_tax, capital_gain_tax, excess_final_tax_top_up, regime_tax_total
        ),
    });

    // ApplySurcharge
    let surcharge = compute_surcharge(
        table.surcharge.as_ref(),
        input.taxpayer_type,
        &measures,
        SurchargeBases {
            normal_tax,
            regime_tax_total,
        },
        decimal_places,
        trace.next_step(),
    );
    trace.push(surcharge.audit_step);
    tax_lines.extend(surcharge.line);
    let gross_chargeable_tax = tax_total(
        Stage::ApplySurcharge,
        "gross_chargeable_tax",
        [regime_tax_total, surcharge.surcharge],
    )?;

    debug!(
        stage = %Stage::ApplySurcharge,
        surcharge = %surcharge.surcharge,
        gross_chargeable_tax = %gross_chargeable_tax,
        "Surcharge applied"
    );

    // ApplyReductions
    let tax_bases = CapBases {
        taxable_income: measures.taxable_income_including_capital_gains,
        normal_tax,
        capital_gain_tax,
        gross_chargeable_tax,
    };

    let reductions = apply_adjustments(
        AdjustmentKind::Reduction,
        &input.adjustments,
        table,
        &tax_bases,
        gross_chargeable_tax,
        trace.next_step(),
    )
    .map_err(in_stage(Stage::ApplyReductions))?;
    trace.extend(reductions.audit_steps, reductions.warnings);
    let reductions = reductions.outcome;

    debug!(
        stage = %Stage::ApplyReductions,
        total_reductions = %reductions.total_applied,
        tax_after_reductions = %reductions.liability_after,
        "Reductions applied"
    );

    // ApplyCredits
    let credits = apply_adjustments(
        AdjustmentKind::Credit,
        &input.adjustments,
        table,
        &tax_bases,
        reductions.liability_after,
        trace.next_step(),
    )
    .map_err(in_stage(Stage::ApplyCredits))?;
    trace.extend(credits.audit_steps, credits.warnings);
    let credits = credits.outcome;

    debug!(
        stage = %Stage::ApplyCredits,
        total_credits = %credits.total_applied,
        tax_after_credits = %credits.liability_after,
        "Credits applied"
    );

    // ApplyMinimumFloor
    let minimum = apply_minimum_tax(
        credits.liability_after,
        table.minimum_tax.as_ref(),
        &measures,
        trace.next_step(),
    )
    .map_err(in_stage(Stage::ApplyMinimumFloor))?;
    trace.push(minimum.audit_step);
    tax_lines.extend(minimum.line);
    let final_chargeable_tax = minimum.final_tax;

    debug!(
        stage = %Stage::ApplyMinimumFloor,
        minimum_tax_applied = minimum.applied,
        final_chargeable_tax = %final_chargeable_tax,
        "Minimum tax floor evaluated"
    );

    // Reconcile
    let reconciliation =
        reconcile_withholding(&input.withholdings, final_chargeable_tax, trace.next_step())
            .map_err(in_stage(Stage::Reconcile))?;
    trace.push(reconciliation.audit_step);

    debug!(
        stage = %Stage::Reconcile,
        total_withheld = %reconciliation.total_withheld,
        net_demand_or_refund = %reconciliation.net_demand_or_refund,
        "Withholding reconciled"
    );

    let mut adjustments = deductions.items;
    adjustments.extend(reductions.items);
    adjustments.extend(credits.items);

    Ok(TaxComputationResult {
        taxpayer_id: input.taxpayer_id.clone(),
        tax_year: table.tax_year.clone(),
        filer_status: input.filer_status,
        taxpayer_type: input.taxpayer_type,
        categories,
        income_from_salary,
        income_from_other_sources,
        final_tax_income,
        excess_final_tax_income,
        income_from_capital_gains,
        total_gross_income,
        total_exempt_income,
        total_income,
        total_deductions: deductions.total_applied,
        unabsorbed_deductions: deductions.unabsorbed,
        taxable_income_before_capital_gains: measures.taxable_income_before_capital_gains,
        taxable_income_including_capital_gains: measures.taxable_income_including_capital_gains,
        normal_tax,
        final_tax,
        capital_gain_tax,
        excess_final_tax_top_up,
        surcharge: surcharge.surcharge,
        gross_chargeable_tax,
        total_reductions: reductions.total_applied,
        tax_after_reductions: reductions.liability_after,
        unabsorbed_reductions: reductions.unabsorbed,
        total_credits: credits.total_applied,
        tax_after_credits: credits.liability_after,
        unabsorbed_credits: credits.unabsorbed,
        minimum_tax_applied: minimum.applied,
        minimum_tax_top_up: minimum.top_up,
        final_chargeable_tax,
        withholding_by_category: reconciliation.by_category,
        total_withheld: reconciliation.total_withheld,
        net_demand_or_refund: reconciliation.net_demand_or_refund,
        effective_tax_rate: percentage_of(
            final_chargeable_tax,
            measures.taxable_income_including_capital_gains,
        ),
        marginal_tax_rate: percentage_of(progressive.marginal_rate, Decimal::ONE),
        slab_breakdown: progressive.breakdown,
        tax_lines,
        adjustments,
        audit_trace: trace.finish(),
    })
}
