//! Distribution specifications and their sampling/valuation semantics.
//!
//! Every uncertain quantity in a model (amounts, rates, adoption curves) is a
//! [`Distribution`]. Each kind supports three views:
//! - a random sample,
//! - a single deterministic representative value,
//! - an empirical percentile.
//!
//! `Logistic` and `Linear` are adoption curves rather than random processes:
//! they yield the month's *incremental* adoption, and their increments sum to
//! `amplitude` over time (S-curve total adoption, or a linear ramp reaching
//! `amplitude` after `1/rate` periods). Callers must treat them as
//! month-indexed factors.

use rand::Rng;
use rand_distr::Distribution as _;
use serde::{Deserialize, Serialize};

use crate::error::DistributionError;
use crate::stats;

/// Sample count behind empirical percentiles. P10/P90-based analyses rely on
/// this exact constant for stable results.
pub const PERCENTILE_SAMPLES: usize = 10_000;

fn default_amplitude() -> f64 {
    1.0
}

/// A parametrized rule for producing either a random sample or a single
/// representative value. Immutable: replaced, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Distribution {
    #[serde(rename = "FIXED")]
    Fixed { value: f64 },
    #[serde(rename = "NORMAL")]
    Normal { mean: f64, std: f64 },
    #[serde(rename = "LOGNORMAL")]
    LogNormal { mean: f64, std: f64 },
    #[serde(rename = "UNIFORM")]
    Uniform { min: f64, max: f64 },
    #[serde(rename = "TRIANGULAR")]
    Triangular { min: f64, likely: f64, max: f64 },
    #[serde(rename = "LOGISTIC")]
    Logistic {
        midpoint: f64,
        steepness: f64,
        #[serde(default = "default_amplitude")]
        amplitude: f64,
    },
    #[serde(rename = "LINEAR")]
    Linear {
        rate: f64,
        #[serde(default = "default_amplitude")]
        amplitude: f64,
    },
}

/// One month of a distribution preview: a point value for deterministic
/// kinds, or a mean with a P10/P90 band for stochastic kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreviewPoint {
    Value { month: usize, value: f64 },
    Band {
        month: usize,
        mean: f64,
        p10: f64,
        p90: f64,
    },
}

impl Distribution {
    /// Whether this distribution collapses to a single known value.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Distribution::Fixed { .. })
    }

    /// Whether sampling produces spread around the deterministic value.
    /// Adoption curves (`Logistic`, `Linear`) have none.
    #[must_use]
    pub fn has_spread(&self) -> bool {
        !matches!(
            self,
            Distribution::Fixed { .. } | Distribution::Logistic { .. } | Distribution::Linear { .. }
        )
    }

    /// Incremental logistic adoption at `month`:
    /// `amplitude * steepness * s(m) * (1 - s(m))` with
    /// `s(m) = sigmoid(steepness * (m - midpoint))`.
    fn logistic_increment(midpoint: f64, steepness: f64, amplitude: f64, month: usize) -> f64 {
        let s = 1.0 / (1.0 + (-steepness * (month as f64 - midpoint)).exp());
        amplitude * steepness * s * (1.0 - s)
    }

    /// Draw one random sample.
    ///
    /// `month` only matters for the month-indexed adoption kinds; a
    /// `Logistic` without a month is 0.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        month: Option<usize>,
    ) -> Result<f64, DistributionError> {
        match self {
            Distribution::Fixed { value } => Ok(*value),
            Distribution::Normal { mean, std } => rand_distr::Normal::new(*mean, *std)
                .map(|d| d.sample(rng))
                .map_err(|_| DistributionError::InvalidParameters {
                    kind: "NORMAL",
                    reason: "std must be non-negative and finite",
                }),
            Distribution::LogNormal { mean, std } => rand_distr::LogNormal::new(*mean, *std)
                .map(|d| d.sample(rng))
                .map_err(|_| DistributionError::InvalidParameters {
                    kind: "LOGNORMAL",
                    reason: "std must be non-negative and finite",
                }),
            Distribution::Uniform { min, max } => rand_distr::Uniform::new_inclusive(*min, *max)
                .map(|d| d.sample(rng))
                .map_err(|_| DistributionError::InvalidParameters {
                    kind: "UNIFORM",
                    reason: "min must not exceed max",
                }),
            Distribution::Triangular { min, likely, max } => {
                rand_distr::Triangular::new(*min, *max, *likely)
                    .map(|d| d.sample(rng))
                    .map_err(|_| DistributionError::InvalidParameters {
                        kind: "TRIANGULAR",
                        reason: "requires min <= likely <= max with min < max",
                    })
            }
            // Adoption curves are deterministic in the month, never random.
            Distribution::Logistic { .. } | Distribution::Linear { .. } => {
                Ok(self.deterministic(month))
            }
        }
    }

    /// The single representative value used by deterministic runs.
    #[must_use]
    pub fn deterministic(&self, month: Option<usize>) -> f64 {
        match self {
            Distribution::Fixed { value } => *value,
            Distribution::Normal { mean, .. } => *mean,
            Distribution::LogNormal { mean, std } => (mean + std * std / 2.0).exp(),
            Distribution::Uniform { min, max } => (min + max) / 2.0,
            Distribution::Triangular { min, likely, max } => (min + likely + max) / 3.0,
            Distribution::Logistic {
                midpoint,
                steepness,
                amplitude,
            } => match month {
                Some(m) => Self::logistic_increment(*midpoint, *steepness, *amplitude, m),
                None => 0.0,
            },
            Distribution::Linear { rate, amplitude } => amplitude * rate,
        }
    }

    /// Either a fresh sample or the deterministic value, depending on mode.
    pub fn realize<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        deterministic: bool,
        month: Option<usize>,
    ) -> Result<f64, DistributionError> {
        if deterministic {
            Ok(self.deterministic(month))
        } else {
            self.sample(rng, month)
        }
    }

    /// Empirical percentile, `q` in `[0, 1]`.
    ///
    /// Kinds without spread return their deterministic value directly;
    /// everything else takes the percentile of [`PERCENTILE_SAMPLES`] draws.
    pub fn percentile<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        q: f64,
        month: Option<usize>,
    ) -> Result<f64, DistributionError> {
        if !self.has_spread() {
            return Ok(self.deterministic(month));
        }
        let mut samples = Vec::with_capacity(PERCENTILE_SAMPLES);
        for _ in 0..PERCENTILE_SAMPLES {
            samples.push(self.sample(rng, month)?);
        }
        samples.sort_by(f64::total_cmp);
        Ok(stats::percentile_of_sorted(&samples, q))
    }

    /// Month-indexed preview over `[0, months)`, restricted to the active
    /// window `[start_month, end_month]` (end inclusive; absent end runs
    /// through the horizon). Outside the window every value is forced to 0.
    pub fn preview_timeseries<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        months: usize,
        start_month: usize,
        end_month: Option<usize>,
    ) -> Result<Vec<PreviewPoint>, DistributionError> {
        let active_end = end_month.map_or(months, |e| e + 1);
        let is_active = |m: usize| m >= start_month && m < active_end;

        match self {
            Distribution::Logistic { .. } => Ok((0..months)
                .map(|m| PreviewPoint::Value {
                    month: m,
                    value: if is_active(m) {
                        self.deterministic(Some(m))
                    } else {
                        0.0
                    },
                })
                .collect()),
            Distribution::Linear { .. } | Distribution::Fixed { .. } => {
                let value = self.deterministic(None);
                Ok((0..months)
                    .map(|m| PreviewPoint::Value {
                        month: m,
                        value: if is_active(m) { value } else { 0.0 },
                    })
                    .collect())
            }
            _ => {
                let mut samples = Vec::with_capacity(PERCENTILE_SAMPLES);
                for _ in 0..PERCENTILE_SAMPLES {
                    samples.push(self.sample(rng, None)?);
                }
                let mean = stats::mean(&samples);
                samples.sort_by(f64::total_cmp);
                let p10 = stats::percentile_of_sorted(&samples, 0.10);
                let p90 = stats::percentile_of_sorted(&samples, 0.90);
                Ok((0..months)
                    .map(|m| {
                        if is_active(m) {
                            PreviewPoint::Band {
                                month: m,
                                mean,
                                p10,
                                p90,
                            }
                        } else {
                            PreviewPoint::Band {
                                month: m,
                                mean: 0.0,
                                p10: 0.0,
                                p90: 0.0,
                            }
                        }
                    })
                    .collect())
            }
        }
    }
}
