//! Breakeven solving: the single-parameter value at which NPV hits a target.

use crate::error::EngineError;
use crate::model::{BreakevenResult, Model};
use crate::sensitivity::{ParameterKind, SensitivityAnalyzer, UncertainParameter};
use crate::solvers::{self, SolverConfig, SolverError};

/// Breakeven search settings: looser than IRR since every objective
/// evaluation is a full model run.
const BREAKEVEN_CONFIG: SolverConfig = SolverConfig {
    tolerance: 1e-6,
    max_iterations: 200,
};

/// Solves one parameter of a borrowed model for a target NPV.
pub struct BreakevenSolver<'m> {
    model: &'m Model,
    analyzer: SensitivityAnalyzer<'m>,
}

impl<'m> BreakevenSolver<'m> {
    #[must_use]
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            analyzer: SensitivityAnalyzer::new(model),
        }
    }

    /// Every parameter a breakeven can be solved for. Unlike the tornado
    /// set, FIXED parameters are included: a known value can still be asked
    /// "what would it have to be".
    #[must_use]
    pub fn solvable_parameters(&self) -> Vec<UncertainParameter> {
        let mut params = self.analyzer.identify_uncertain_parameters();

        if self.model.settings.discount_rate.is_fixed() {
            params.push(UncertainParameter {
                stream_id: crate::sensitivity::SETTINGS_STREAM_ID.to_string(),
                stream_name: crate::sensitivity::SETTINGS_STREAM_NAME.to_string(),
                parameter_name: "Discount Rate".to_string(),
                kind: ParameterKind::DiscountRate,
                distribution: self.model.settings.discount_rate.clone(),
            });
        }

        for stream in self.model.streams() {
            if stream.uses_unit_economics() {
                if let Some(unit_value) = &stream.unit_value {
                    if unit_value.is_fixed() {
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
                    if market_units.is_fixed() {
                        params.push(UncertainParameter {
                            stream_id: stream.id.clone(),
                            stream_name: stream.name.clone(),
                            parameter_name: format!("{} - Market Units", stream.name),
                            kind: ParameterKind::MarketUnits,
                            distribution: market_units.clone(),
                        });
                    }
                }
            } else if stream.amount.is_fixed() {
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

        let mut seen: Vec<(String, String)> = Vec::new();
        params.retain(|p| {
            let key = (p.stream_id.clone(), p.parameter_name.clone());
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
        params
    }

    /// Search bracket per parameter kind. Rates get fixed economic ranges;
    /// amounts search from zero to a multiple of the current value.
    fn bracket(param: &UncertainParameter) -> (f64, f64) {
        match param.kind {
            ParameterKind::DiscountRate => (0.001, 1.0),
            ParameterKind::EscalationRate => (-0.5, 1.0),
            _ => {
                let current = param.distribution.deterministic(None);
                if current == 0.0 {
                    (0.0, 100_000.0)
                } else {
                    (0.0, 10.0 * current.abs())
                }
            }
        }
    }

    /// Solve the named parameter of the named stream for `target_npv`.
    ///
    /// The model is validated once up front; the probe runs themselves are
    /// not re-validated, so a discount-rate search may legitimately probe
    /// below the growth rate (terminal value contributes 0 there).
    /// Unsolvable cases (unknown parameter, no crossing in the bracket, no
    /// convergence) come back as `found: false` with a message; only engine
    /// failures inside the objective are errors.
    pub fn solve(
        &self,
        stream_id: &str,
        parameter_name: &str,
        target_npv: f64,
    ) -> Result<BreakevenResult, EngineError> {
        self.model.validate()?;
        let Some(param) = self
            .solvable_parameters()
            .into_iter()
            .find(|p| p.stream_id == stream_id && p.parameter_name == parameter_name)
        else {
            return Ok(BreakevenResult {
                found: false,
                parameter_name: None,
                stream_name: None,
                stream_id: None,
                breakeven_value: None,
                original_value: None,
                target_npv,
                error: Some(format!(
                    "Parameter '{parameter_name}' not found for stream '{stream_id}'"
                )),
            });
        };

        let original_value = param.distribution.deterministic(None);
        let (lo, hi) = Self::bracket(&param);
        log::debug!(
            "breakeven solve: {} on [{}, {}], target npv {}",
            param.parameter_name,
            lo,
            hi,
            target_npv
        );

        let objective = |value: f64| -> Result<f64, EngineError> {
            Ok(self.analyzer.npv_with_override(&param, value)? - target_npv)
        };

        let identity = |error: Option<String>| BreakevenResult {
            found: false,
            parameter_name: Some(param.parameter_name.clone()),
            stream_name: Some(param.stream_name.clone()),
            stream_id: Some(param.stream_id.clone()),
            breakeven_value: None,
            original_value: Some(original_value),
            target_npv,
            error,
        };

        match solvers::brent(objective, lo, hi, &BREAKEVEN_CONFIG) {
            Ok(result) => Ok(BreakevenResult {
                found: true,
                breakeven_value: Some(result.root),
                ..identity(None)
            }),
            Err(SolverError::InvalidBracket { .. }) => Ok(identity(Some(
                "no breakeven in search range: NPV does not cross the target".to_string(),
            ))),
            Err(SolverError::ConvergenceFailed { iterations, .. }) => Ok(identity(Some(format!(
                "breakeven search did not converge after {iterations} iterations"
            )))),
            Err(SolverError::Objective(e)) => Err(e),
        }
    }
}
