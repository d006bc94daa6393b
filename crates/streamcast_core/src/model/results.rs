//! Result types returned by the calculation entry points.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::CalculationMode;

/// Output of a deterministic run: a single cash-flow path plus the headline
/// metric for the active calculation mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeterministicResult {
    pub mode: String,
    pub calculation_mode: CalculationMode,
    /// Total NPV including terminal values. `None` in IRR mode.
    pub npv: Option<f64>,
    /// Annualized IRR. `None` when the cash flows admit no IRR.
    pub irr: Option<f64>,
    /// Why the IRR could not be computed, when `irr` is `None`.
    pub irr_error: Option<String>,
    /// Present value of the terminal values of perpetual streams. `None` in
    /// IRR mode.
    pub terminal_value: Option<f64>,
    /// The deterministic annual discount rate used. `None` in IRR mode.
    pub discount_rate: Option<f64>,
    /// Net monthly cash flows over the forecast horizon.
    pub cashflows: Vec<f64>,
    /// Per-stream monthly cash flows, keyed by stream id.
    pub stream_details: FxHashMap<String, Vec<f64>>,
}

/// Per-month summary across Monte-Carlo iterations, for fan charts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CashflowMonthStats {
    pub month: usize,
    pub mean: f64,
    pub median: f64,
    pub p10: f64,
    pub p90: f64,
}

/// Monte-Carlo output in NPV mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpvMonteCarloResult {
    pub iterations: usize,
    pub npv_mean: f64,
    pub npv_median: f64,
    pub npv_std: f64,
    pub npv_p10: f64,
    pub npv_p25: f64,
    pub npv_p75: f64,
    pub npv_p90: f64,
    /// Raw per-iteration NPVs, for histograms.
    pub npv_distribution: Vec<f64>,
    pub monthly_cashflow_stats: Vec<CashflowMonthStats>,
}

/// Monte-Carlo output in IRR mode. IRR statistics are computed over the
/// iterations whose cash flows admitted an IRR; `irr_failed_count` tallies
/// the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrMonteCarloResult {
    pub iterations: usize,
    pub irr_mean: Option<f64>,
    pub irr_median: Option<f64>,
    pub irr_std: Option<f64>,
    pub irr_p10: Option<f64>,
    pub irr_p25: Option<f64>,
    pub irr_p75: Option<f64>,
    pub irr_p90: Option<f64>,
    pub irr_distribution: Vec<f64>,
    pub irr_failed_count: usize,
    pub monthly_cashflow_stats: Vec<CashflowMonthStats>,
}

/// Monte-Carlo output, shaped by the model's calculation mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonteCarloResult {
    Npv(NpvMonteCarloResult),
    Irr(IrrMonteCarloResult),
}

impl MonteCarloResult {
    #[must_use]
    pub fn iterations(&self) -> usize {
        match self {
            MonteCarloResult::Npv(r) => r.iterations,
            MonteCarloResult::Irr(r) => r.iterations,
        }
    }

    #[must_use]
    pub fn monthly_cashflow_stats(&self) -> &[CashflowMonthStats] {
        match self {
            MonteCarloResult::Npv(r) => &r.monthly_cashflow_stats,
            MonteCarloResult::Irr(r) => &r.monthly_cashflow_stats,
        }
    }

    #[must_use]
    pub fn as_npv(&self) -> Option<&NpvMonteCarloResult> {
        match self {
            MonteCarloResult::Npv(r) => Some(r),
            MonteCarloResult::Irr(_) => None,
        }
    }

    #[must_use]
    pub fn as_irr(&self) -> Option<&IrrMonteCarloResult> {
        match self {
            MonteCarloResult::Irr(r) => Some(r),
            MonteCarloResult::Npv(_) => None,
        }
    }
}

/// One bar of a tornado chart: the NPV swing caused by moving a single
/// parameter between its P10 and P90 while holding everything else at its
/// deterministic value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoParameter {
    pub parameter_name: String,
    pub stream_name: String,
    /// `|npv_high - npv_low|`; the sort key.
    pub swing: f64,
    pub npv_low: f64,
    pub npv_high: f64,
    pub p10_value: f64,
    pub p90_value: f64,
}

/// Tornado sensitivity output: bars sorted by descending swing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoResult {
    pub baseline_npv: f64,
    pub parameters: Vec<TornadoParameter>,
}

/// Breakeven solve output. A failed search (no bracket, no convergence, or
/// unknown parameter) is reported here with `found: false`, not as an
/// error. The identity fields echo which parameter was solved; an unknown
/// parameter carries only `found` and `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakevenResult {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakeven_value: Option<f64>,
    /// The parameter's deterministic value before solving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_value: Option<f64>,
    pub target_npv: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
