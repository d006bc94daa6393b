//! Tornado sensitivity analysis.
//!
//! Ranks each uncertain parameter by how much the deterministic NPV swings
//! when that parameter alone is pinned at its P10 and P90 while everything
//! else stays at its deterministic value.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::calculator::Calculator;
use crate::error::EngineError;
use crate::model::{Distribution, Model, TornadoParameter, TornadoResult};

/// Pseudo stream id for model-level settings parameters.
pub const SETTINGS_STREAM_ID: &str = "__settings__";
/// Display name for the settings pseudo stream.
pub const SETTINGS_STREAM_NAME: &str = "Model Settings";

/// Tornado charts keep at most this many bars.
pub const MAX_TORNADO_PARAMETERS: usize = 15;

/// Which model field an uncertain parameter overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    DiscountRate,
    EscalationRate,
    Amount,
    UnitValue,
    MarketUnits,
}

/// One overridable uncertain input, with enough identity to label a tornado
/// bar and enough typing to substitute a fixed value for it.
#[derive(Debug, Clone)]
pub struct UncertainParameter {
    pub stream_id: String,
    pub stream_name: String,
    pub parameter_name: String,
    pub kind: ParameterKind,
    pub distribution: Distribution,
}

/// Borrows a model and derives sensitivity views from it. Overrides are
/// applied to clones; the borrowed model is never touched.
pub struct SensitivityAnalyzer<'m> {
    model: &'m Model,
}

impl<'m> SensitivityAnalyzer<'m> {
    #[must_use]
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    /// Every parameter with spread: model-level rates first, then stream
    /// parameters in display order. Unit-economics streams expose their two
    /// factors instead of the unused amount.
    #[must_use]
    pub fn identify_uncertain_parameters(&self) -> Vec<UncertainParameter> {
        let mut params = Vec::new();

        if self.model.settings.discount_rate.has_spread() {
            params.push(UncertainParameter {
                stream_id: SETTINGS_STREAM_ID.to_string(),
                stream_name: SETTINGS_STREAM_NAME.to_string(),
                parameter_name: "Discount Rate".to_string(),
                kind: ParameterKind::DiscountRate,
                distribution: self.model.settings.discount_rate.clone(),
            });
        }
        if let Some(escalation) = &self.model.settings.escalation_rate {
            if escalation.has_spread() {
                params.push(UncertainParameter {
                    stream_id: SETTINGS_STREAM_ID.to_string(),
                    stream_name: SETTINGS_STREAM_NAME.to_string(),
                    parameter_name: "Escalation Rate".to_string(),
                    kind: ParameterKind::EscalationRate,
                    distribution: escalation.clone(),
                });
            }
        }

        for stream in self.model.streams() {
            if stream.uses_unit_economics() {
                if let Some(unit_value) = &stream.unit_value {
                    if unit_value.has_spread() {
                        params.push(UncertainParameter {
                            stream_id: stream.id.clone(),
                            stream_name: stream.name.clone(),
                            parameter_name: format!("{} - Unit Value", stream.name),
                            kind: ParameterKind::UnitValue,
                            distribution: unit_value.clone(),
                        });
                    }
                }
                if let Some(market_units) = &stream.market_units {
                    if market_units.has_spread() {
                        params.push(UncertainParameter {
                            stream_id: stream.id.clone(),
                            stream_name: stream.name.clone(),
                            parameter_name: format!("{} - Market Units", stream.name),
                            kind: ParameterKind::MarketUnits,
                            distribution: market_units.clone(),
                        });
                    }
                }
            } else if stream.amount.has_spread() {
                let label = if stream.is_child() && stream.amount_is_ratio {
                    format!("{} - Price Ratio", stream.name)
                } else {
                    format!("{} - Amount", stream.name)
                };
                params.push(UncertainParameter {
                    stream_id: stream.id.clone(),
                    stream_name: stream.name.clone(),
                    parameter_name: label,
                    kind: ParameterKind::Amount,
                    distribution: stream.amount.clone(),
                });
            }
        }

        params
    }

    /// Deterministic NPV with one parameter pinned to `value`.
    ///
    /// The model is cloned and the parameter's distribution replaced by a
    /// FIXED one, so repeated overrides never interfere. The pinned run
    /// skips validation: a discount rate pinned at or below the growth rate
    /// is a legitimate probe whose terminal value is simply 0.
    pub fn npv_with_override(
        &self,
        param: &UncertainParameter,
        value: f64,
    ) -> Result<f64, EngineError> {
        let mut model = self.model.clone();
        let fixed = Distribution::Fixed { value };
        match param.kind {
            ParameterKind::DiscountRate => model.settings.discount_rate = fixed,
            ParameterKind::EscalationRate => model.settings.escalation_rate = Some(fixed),
            ParameterKind::Amount => {
                if let Some(stream) = model.stream_mut(&param.stream_id) {
                    stream.amount = fixed;
                }
            }
            ParameterKind::UnitValue => {
                if let Some(stream) = model.stream_mut(&param.stream_id) {
                    stream.unit_value = Some(fixed);
                }
            }
            ParameterKind::MarketUnits => {
                if let Some(stream) = model.stream_mut(&param.stream_id) {
                    stream.market_units = Some(fixed);
                }
            }
        }
        let result = Calculator::new(&model).run_deterministic_unvalidated()?;
        Ok(result.npv.unwrap_or(0.0))
    }

    /// Full tornado analysis: bars sorted by descending swing, truncated to
    /// [`MAX_TORNADO_PARAMETERS`]. `seed` fixes the empirical P10/P90 draws.
    pub fn run_tornado_analysis(&self, seed: u64) -> Result<TornadoResult, EngineError> {
        let params = self.identify_uncertain_parameters();
        if params.is_empty() {
            return Ok(TornadoResult {
                baseline_npv: 0.0,
                parameters: Vec::new(),
            });
        }

        let baseline = Calculator::new(self.model).run_deterministic()?;
        let baseline_npv = baseline.npv.unwrap_or(0.0);
        log::debug!(
            "tornado analysis: {} uncertain parameters, baseline npv {}",
            params.len(),
            baseline_npv
        );

        let mut bars = Vec::with_capacity(params.len());
        for param in &params {
            let mut rng = SmallRng::seed_from_u64(seed);
            let p10_value = param.distribution.percentile(&mut rng, 0.10, None)?;
            let p90_value = param.distribution.percentile(&mut rng, 0.90, None)?;
            let npv_at_p10 = self.npv_with_override(param, p10_value)?;
            let npv_at_p90 = self.npv_with_override(param, p90_value)?;
            // A parameter can move NPV in either direction (discount rate up
            // pushes NPV down); bars always report low <= high.
            bars.push(TornadoParameter {
                parameter_name: param.parameter_name.clone(),
                stream_name: param.stream_name.clone(),
                swing: (npv_at_p90 - npv_at_p10).abs(),
                npv_low: npv_at_p10.min(npv_at_p90),
                npv_high: npv_at_p10.max(npv_at_p90),
                p10_value,
                p90_value,
            });
        }

        bars.sort_by(|a, b| b.swing.total_cmp(&a.swing));
        bars.truncate(MAX_TORNADO_PARAMETERS);
        Ok(TornadoResult {
            baseline_npv,
            parameters: bars,
        })
    }
}
