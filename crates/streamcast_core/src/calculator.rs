//! Cash-flow projection and valuation.
//!
//! [`Calculator`] projects every stream month by month in dependency order,
//! nets the result, and values it as NPV or IRR, either deterministically or
//! across Monte-Carlo iterations.

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use rustc_hash::FxHashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{DistributionError, EngineError, IrrError};
use crate::model::{
    CalculationMode, CashflowMonthStats, DeterministicResult, IrrMonteCarloResult, Model,
    MonteCarloResult, NpvMonteCarloResult, Stream, StreamType,
};
use crate::solvers::{self, SolverConfig, SolverError};
use crate::stats;
use crate::terminal_value;

/// Monte-Carlo iterations are run in batches of this size, each batch with
/// its own deterministic rng. Results are identical parallel or sequential.
pub const MC_BATCH_SIZE: usize = 100;

/// IRR search bracket, as a monthly rate.
const IRR_MIN_MONTHLY_RATE: f64 = -0.5;
const IRR_MAX_MONTHLY_RATE: f64 = 10.0;

/// NPV of monthly cash flows at a monthly discount rate, month 0 undiscounted.
#[must_use]
pub fn npv_at_monthly_rate(cashflows: &[f64], monthly_rate: f64) -> f64 {
    cashflows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + monthly_rate).powi(t as i32))
        .sum()
}

/// NPV of monthly cash flows at an annual discount rate (applied as
/// `annual / 12` per month).
#[must_use]
pub fn calculate_npv(cashflows: &[f64], annual_rate: f64) -> f64 {
    npv_at_monthly_rate(cashflows, annual_rate / 12.0)
}

/// Annualized IRR of monthly cash flows.
///
/// Finds the monthly rate in `[-0.5, 10.0]` where NPV crosses zero, then
/// multiplies by 12. Cash flows must contain both positive and negative
/// values; otherwise no rate can zero the NPV.
pub fn calculate_irr(cashflows: &[f64]) -> Result<f64, IrrError> {
    let has_positive = cashflows.iter().any(|&cf| cf > 0.0);
    let has_negative = cashflows.iter().any(|&cf| cf < 0.0);
    if !has_positive || !has_negative {
        return Err(IrrError::NoSignChange);
    }

    let config = SolverConfig {
        tolerance: 1e-10,
        max_iterations: 1000,
    };
    let objective = |rate: f64| -> Result<f64, std::convert::Infallible> {
        Ok(npv_at_monthly_rate(cashflows, rate))
    };
    match solvers::brent(objective, IRR_MIN_MONTHLY_RATE, IRR_MAX_MONTHLY_RATE, &config) {
        Ok(result) => Ok(result.root * 12.0),
        Err(SolverError::Objective(e)) => match e {},
        Err(_) => Err(IrrError::NoSolution),
    }
}

/// Output of one Monte-Carlo iteration: the net cash-flow path and the
/// headline metric (`None` when an IRR could not be found).
struct Iteration {
    cashflows: Vec<f64>,
    metric: Option<f64>,
}

/// Projects and values one model. Borrows the model; never mutates it.
pub struct Calculator<'m> {
    model: &'m Model,
    n_months: usize,
}

impl<'m> Calculator<'m> {
    #[must_use]
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            n_months: model.settings.forecast_months,
        }
    }

    /// The global annual escalation rate for one run; 0 when unset.
    fn realize_escalation<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        deterministic: bool,
    ) -> Result<f64, DistributionError> {
        match &self.model.settings.escalation_rate {
            Some(dist) => dist.realize(rng, deterministic, None),
            None => Ok(0.0),
        }
    }

    /// Project a root stream over its active window.
    ///
    /// The base amount is realized fresh every month (unlike child amounts),
    /// then shaped by the adoption curve and compound escalation relative to
    /// the stream's own start. Cost streams are forced negative after
    /// filling.
    fn project_root<R: Rng + ?Sized>(
        &self,
        stream: &Stream,
        rng: &mut R,
        deterministic: bool,
        escalation: f64,
    ) -> Result<Vec<f64>, DistributionError> {
        let mut values = vec![0.0; self.n_months];

        let window_end = stream
            .end_month
            .map_or(self.n_months, |e| (e + 1).min(self.n_months));
        let monthly_escalation = 1.0 + escalation / 12.0;

        for month in stream.start_month..window_end {
            let mut value = if stream.uses_unit_economics() {
                // Both knobs are Some here; guarded by uses_unit_economics.
                let mut base = 1.0;
                if let Some(unit_value) = &stream.unit_value {
                    base *= unit_value.realize(rng, deterministic, Some(month))?;
                }
                if let Some(market_units) = &stream.market_units {
                    base *= market_units.realize(rng, deterministic, Some(month))?;
                }
                base
            } else {
                stream.amount.realize(rng, deterministic, Some(month))?
            };
            if let Some(curve) = &stream.adoption_curve {
                value *= curve.realize(rng, deterministic, Some(month))?;
            }
            value *= monthly_escalation.powi((month - stream.start_month) as i32);
            values[month] = value;
        }

        if stream.stream_type == StreamType::Cost {
            for v in &mut values {
                *v = -v.abs();
            }
        }
        Ok(values)
    }

    /// Project a child stream from its parent's realized cash flows.
    ///
    /// Each nonzero parent month spawns an event chain anchored at
    /// `parent_month + trigger_delay`, recurring every `periodicity_months`
    /// when set. Event magnitudes scale the parent's magnitude in ratio mode
    /// or stand alone in absolute mode; either way the per-event amount is
    /// realized once per run. Events land only inside the child's own active
    /// window, with escalation compounding from the child's start.
    fn project_child<R: Rng + ?Sized>(
        &self,
        child: &Stream,
        parent_cashflows: &[f64],
        rng: &mut R,
        deterministic: bool,
        escalation: f64,
    ) -> Result<Vec<f64>, DistributionError> {
        let mut values = vec![0.0; self.n_months];

        let amount = child.amount.realize(rng, deterministic, None)?;
        let window_end = child
            .end_month
            .map_or(self.n_months, |e| (e + 1).min(self.n_months));
        let monthly_escalation = 1.0 + escalation / 12.0;

        for (parent_month, parent_cf) in parent_cashflows.iter().enumerate() {
            let parent_magnitude = parent_cf.abs();
            if parent_magnitude == 0.0 {
                continue;
            }
            let event_base = if child.amount_is_ratio {
                parent_magnitude * amount * child.conversion_rate
            } else {
                amount * child.conversion_rate
            };

            let anchor = parent_month + child.trigger_delay_months;
            let mut event_month = anchor;
            loop {
                if event_month >= window_end {
                    break;
                }
                if event_month >= child.start_month {
                    let escalated = event_base
                        * monthly_escalation.powi((event_month - child.start_month) as i32);
                    values[event_month] += escalated;
                }
                match child.periodicity_months {
                    Some(p) if p > 0 => event_month += p,
                    _ => break,
                }
            }
        }

        if child.stream_type == StreamType::Cost {
            for v in &mut values {
                *v = -v.abs();
            }
        }
        Ok(values)
    }

    /// One full projection: every stream in dependency order, then the net.
    ///
    /// A child whose parent is missing projects to all zeros rather than
    /// failing; `Model::validate` is where dangling parents are reported.
    pub fn run_single<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        deterministic: bool,
    ) -> Result<(Vec<f64>, FxHashMap<String, Vec<f64>>), EngineError> {
        let order = self.model.execution_order()?;
        let escalation = self.realize_escalation(rng, deterministic)?;

        let mut details: FxHashMap<String, Vec<f64>> = FxHashMap::default();
        for id in &order {
            let Some(stream) = self.model.stream(id) else {
                continue;
            };
            let projected = match &stream.parent_stream_id {
                Some(parent_id) => match details.get(parent_id.as_str()) {
                    Some(parent_cashflows) => {
                        // Clone keeps the borrow checker out of the map while
                        // we insert the child's row.
                        let parent_cashflows = parent_cashflows.clone();
                        self.project_child(stream, &parent_cashflows, rng, deterministic, escalation)?
                    }
                    None => vec![0.0; self.n_months],
                },
                None => self.project_root(stream, rng, deterministic, escalation)?,
            };
            details.insert(id.clone(), projected);
        }

        let mut net = vec![0.0; self.n_months];
        for cashflows in details.values() {
            for (month, cf) in cashflows.iter().enumerate() {
                net[month] += cf;
            }
        }
        Ok((net, details))
    }

    /// Present value of the terminal values of all perpetual streams, from
    /// one run's per-stream details.
    fn total_terminal_value(
        &self,
        perpetual_ids: &[String],
        details: &FxHashMap<String, Vec<f64>>,
        discount_rate: f64,
    ) -> f64 {
        let growth = self.model.settings.terminal_growth_rate;
        perpetual_ids
            .iter()
            .filter_map(|id| details.get(id))
            .filter_map(|cashflows| cashflows.last())
            .map(|&final_cf| {
                terminal_value::calculate_terminal_value(
                    final_cf,
                    discount_rate,
                    growth,
                    self.n_months,
                )
            })
            .sum()
    }

    /// Single run with every distribution at its deterministic value.
    pub fn run_deterministic(&self) -> Result<DeterministicResult, EngineError> {
        self.model.validate()?;
        self.run_deterministic_unvalidated()
    }

    /// Deterministic run without the validation pass.
    ///
    /// Override runs (tornado, breakeven) pin a parameter on a clone and may
    /// legitimately probe a discount rate at or below the growth rate; the
    /// terminal value contributes 0 there and the run itself stays
    /// well-defined, so the discount-vs-growth validation must not abort
    /// the analysis.
    pub(crate) fn run_deterministic_unvalidated(
        &self,
    ) -> Result<DeterministicResult, EngineError> {
        log::debug!(
            "deterministic run: {} streams over {} months",
            self.model.len(),
            self.n_months
        );

        // Rng is untouched on a deterministic run; seed is irrelevant.
        let mut rng = SmallRng::seed_from_u64(0);
        let (cashflows, stream_details) = self.run_single(&mut rng, true)?;

        let (irr, irr_error) = match calculate_irr(&cashflows) {
            Ok(irr) => (Some(irr), None),
            Err(e) => (None, Some(e.to_string())),
        };

        match self.model.settings.calculation_mode {
            CalculationMode::Npv => {
                let discount_rate = self.model.settings.discount_rate.deterministic(None);
                let perpetual_ids = terminal_value::identify_perpetual_streams(self.model);
                let tv = self.total_terminal_value(&perpetual_ids, &stream_details, discount_rate);
                let npv = calculate_npv(&cashflows, discount_rate) + tv;
                Ok(DeterministicResult {
                    mode: "deterministic".to_string(),
                    calculation_mode: CalculationMode::Npv,
                    npv: Some(npv),
                    irr,
                    irr_error,
                    terminal_value: Some(tv),
                    discount_rate: Some(discount_rate),
                    cashflows,
                    stream_details,
                })
            }
            CalculationMode::Irr => Ok(DeterministicResult {
                mode: "deterministic".to_string(),
                calculation_mode: CalculationMode::Irr,
                npv: None,
                irr,
                irr_error,
                terminal_value: None,
                discount_rate: None,
                cashflows,
                stream_details,
            }),
        }
    }

    /// One Monte-Carlo iteration from its own seed.
    fn mc_iteration(&self, iter_seed: u64, perpetual_ids: &[String]) -> Result<Iteration, EngineError> {
        let mut rng = SmallRng::seed_from_u64(iter_seed);
        let (cashflows, details) = self.run_single(&mut rng, false)?;

        let metric = match self.model.settings.calculation_mode {
            CalculationMode::Npv => {
                let growth = self.model.settings.terminal_growth_rate;
                let mut discount_rate = self
                    .model
                    .settings
                    .discount_rate
                    .sample(&mut rng, None)?;
                // A sampled rate at or below growth would blow up the
                // perpetuity; clamp just above it.
                if discount_rate <= growth {
                    discount_rate = growth + 0.001;
                }
                let tv = self.total_terminal_value(perpetual_ids, &details, discount_rate);
                Some(calculate_npv(&cashflows, discount_rate) + tv)
            }
            CalculationMode::Irr => calculate_irr(&cashflows).ok(),
        };
        Ok(Iteration { cashflows, metric })
    }

    /// All iterations for one batch. Each batch derives per-iteration seeds
    /// from its own rng, so results do not depend on scheduling.
    fn mc_batch(
        &self,
        batch: usize,
        batch_size: usize,
        seed: u64,
        perpetual_ids: &[String],
    ) -> Result<Vec<Iteration>, EngineError> {
        let mut batch_rng = SmallRng::seed_from_u64(seed.wrapping_add(batch as u64));
        let mut iterations = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let iter_seed = batch_rng.next_u64();
            iterations.push(self.mc_iteration(iter_seed, perpetual_ids)?);
        }
        Ok(iterations)
    }

    /// Monte-Carlo run. `iterations` is clamped to at least 1; `seed` makes
    /// the whole run reproducible.
    pub fn run_monte_carlo(
        &self,
        iterations: usize,
        seed: u64,
    ) -> Result<MonteCarloResult, EngineError> {
        self.model.validate()?;
        let iterations = iterations.max(1);
        log::debug!(
            "monte carlo run: {} iterations, seed {}",
            iterations,
            seed
        );

        let perpetual_ids = terminal_value::identify_perpetual_streams(self.model);
        let n_batches = iterations.div_ceil(MC_BATCH_SIZE);
        let batch_sizes: Vec<(usize, usize)> = (0..n_batches)
            .map(|batch| {
                let start = batch * MC_BATCH_SIZE;
                (batch, MC_BATCH_SIZE.min(iterations - start))
            })
            .collect();

        #[cfg(feature = "parallel")]
        let batches: Result<Vec<Vec<Iteration>>, EngineError> = batch_sizes
            .par_iter()
            .map(|&(batch, size)| self.mc_batch(batch, size, seed, &perpetual_ids))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let batches: Result<Vec<Vec<Iteration>>, EngineError> = batch_sizes
            .iter()
            .map(|&(batch, size)| self.mc_batch(batch, size, seed, &perpetual_ids))
            .collect();
        let all: Vec<Iteration> = batches?.into_iter().flatten().collect();

        let monthly_cashflow_stats = self.monthly_stats(&all);

        match self.model.settings.calculation_mode {
            CalculationMode::Npv => {
                // Every NPV-mode iteration yields a metric.
                let npvs: Vec<f64> = all.iter().filter_map(|it| it.metric).collect();
                let mut sorted = npvs.clone();
                sorted.sort_by(f64::total_cmp);
                Ok(MonteCarloResult::Npv(NpvMonteCarloResult {
                    iterations,
                    npv_mean: stats::mean(&npvs),
                    npv_median: stats::percentile_of_sorted(&sorted, 0.5),
                    npv_std: stats::std_dev(&npvs),
                    npv_p10: stats::percentile_of_sorted(&sorted, 0.10),
                    npv_p25: stats::percentile_of_sorted(&sorted, 0.25),
                    npv_p75: stats::percentile_of_sorted(&sorted, 0.75),
                    npv_p90: stats::percentile_of_sorted(&sorted, 0.90),
                    npv_distribution: npvs,
                    monthly_cashflow_stats,
                }))
            }
            CalculationMode::Irr => {
                let irrs: Vec<f64> = all.iter().filter_map(|it| it.metric).collect();
                let irr_failed_count = all.len() - irrs.len();
                let mut sorted = irrs.clone();
                sorted.sort_by(f64::total_cmp);
                let stat = |v: f64| if irrs.is_empty() { None } else { Some(v) };
                Ok(MonteCarloResult::Irr(IrrMonteCarloResult {
                    iterations,
                    irr_mean: stat(stats::mean(&irrs)),
                    irr_median: stat(stats::percentile_of_sorted(&sorted, 0.5)),
                    irr_std: stat(stats::std_dev(&irrs)),
                    irr_p10: stat(stats::percentile_of_sorted(&sorted, 0.10)),
                    irr_p25: stat(stats::percentile_of_sorted(&sorted, 0.25)),
                    irr_p75: stat(stats::percentile_of_sorted(&sorted, 0.75)),
                    irr_p90: stat(stats::percentile_of_sorted(&sorted, 0.90)),
                    irr_distribution: irrs,
                    irr_failed_count,
                    monthly_cashflow_stats,
                }))
            }
        }
    }

    /// Per-month fan-chart statistics across iterations.
    fn monthly_stats(&self, iterations: &[Iteration]) -> Vec<CashflowMonthStats> {
        let mut out = Vec::with_capacity(self.n_months);
        let mut column = Vec::with_capacity(iterations.len());
        for month in 0..self.n_months {
            column.clear();
            column.extend(iterations.iter().map(|it| it.cashflows[month]));
            let mean = stats::mean(&column);
            column.sort_by(f64::total_cmp);
            out.push(CashflowMonthStats {
                month,
                mean,
                median: stats::percentile_of_sorted(&column, 0.5),
                p10: stats::percentile_of_sorted(&column, 0.10),
                p90: stats::percentile_of_sorted(&column, 0.90),
            });
        }
        out
    }
}
