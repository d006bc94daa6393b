//! Core valuation engine: monthly cash-flow projection over a stream
//! dependency graph, valued as NPV or IRR, deterministically or by
//! Monte-Carlo simulation, with tornado sensitivity and breakeven solving
//! on top.
//!
//! Typical flow: build a [`Model`] of [`Stream`]s, `validate` it, then run a
//! [`Calculator`] over it.
//!
//! ```
//! use streamcast_core::{
//!     Calculator, Distribution, Model, ModelSettings, Stream, StreamType,
//! };
//!
//! let mut model = Model::new("saas", ModelSettings::default());
//! model.add_stream(Stream::new(
//!     "subs",
//!     "Subscriptions",
//!     StreamType::Revenue,
//!     0,
//!     Distribution::Fixed { value: 10_000.0 },
//! ));
//! model.add_stream(
//!     Stream::new(
//!         "hosting",
//!         "Hosting",
//!         StreamType::Cost,
//!         0,
//!         Distribution::Fixed { value: 0.2 },
//!     )
//!     .with_parent("subs"),
//! );
//!
//! let result = Calculator::new(&model).run_deterministic().unwrap();
//! assert!(result.npv.unwrap() > 0.0);
//! ```

#![warn(clippy::all)]

pub mod breakeven;
pub mod calculator;
pub mod error;
pub mod model;
pub mod sensitivity;
pub mod solvers;
pub mod stats;
pub mod terminal_value;

pub use breakeven::BreakevenSolver;
pub use calculator::{calculate_irr, calculate_npv, Calculator, MC_BATCH_SIZE};
pub use error::{DistributionError, EngineError, IrrError, ModelError};
pub use model::{
    BreakevenResult, CalculationMode, CashflowMonthStats, DeterministicResult, Distribution,
    IrrMonteCarloResult, Model, ModelSettings, ModelSnapshot, MonteCarloResult,
    NpvMonteCarloResult, PreviewPoint, Stream, StreamType, TornadoParameter, TornadoResult,
    PERCENTILE_SAMPLES,
};
pub use sensitivity::{
    ParameterKind, SensitivityAnalyzer, UncertainParameter, MAX_TORNADO_PARAMETERS,
    SETTINGS_STREAM_ID,
};
pub use terminal_value::{calculate_terminal_value, identify_perpetual_streams};

#[cfg(test)]
mod tests;
