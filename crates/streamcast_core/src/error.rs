use std::fmt;

/// Errors raised by model mutation and validation.
///
/// Validation errors are caller-correctable: the engine surfaces them before
/// any calculation proceeds and never auto-corrects the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A mutation referenced a stream id that is not in the model.
    StreamNotFound(String),
    /// A child stream references a parent id that does not resolve.
    DanglingParent { stream: String, parent: String },
    /// A conversion rate outside `[0, 1]`.
    InvalidConversionRate { stream: String, rate: f64 },
    /// A reorder list that does not name every stream exactly once.
    InvalidOrder(String),
    /// The parent/child relation contains a cycle.
    CircularDependency,
    /// In NPV mode the deterministic discount rate must exceed the
    /// terminal growth rate.
    DiscountNotAboveGrowth { discount_rate: f64, growth_rate: f64 },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::StreamNotFound(id) => write!(f, "stream '{id}' not found"),
            ModelError::DanglingParent { stream, parent } => {
                write!(f, "stream '{stream}' references non-existent parent '{parent}'")
            }
            ModelError::InvalidConversionRate { stream, rate } => {
                write!(
                    f,
                    "conversion rate for stream '{stream}' must be between 0 and 1, got {rate}"
                )
            }
            ModelError::InvalidOrder(msg) => write!(f, "invalid stream order: {msg}"),
            ModelError::CircularDependency => {
                write!(f, "circular dependency detected among streams")
            }
            ModelError::DiscountNotAboveGrowth {
                discount_rate,
                growth_rate,
            } => {
                write!(
                    f,
                    "discount rate ({discount_rate}) must be greater than terminal growth rate ({growth_rate})"
                )
            }
        }
    }
}

impl std::error::Error for ModelError {}

/// Errors raised when a distribution cannot be sampled.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionError {
    InvalidParameters {
        kind: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for DistributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionError::InvalidParameters { kind, reason } => {
                write!(f, "invalid {kind} distribution parameters: {reason}")
            }
        }
    }
}

impl std::error::Error for DistributionError {}

/// IRR calculation failure.
///
/// Non-convergence is a reportable outcome, not a bug: results carry it as
/// `irr: None` plus a reason string and never default the IRR to a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrrError {
    NoSignChange,
    NoSolution,
}

impl fmt::Display for IrrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrrError::NoSignChange => {
                write!(
                    f,
                    "no sign change in cashflows (need both positive and negative values)"
                )
            }
            IrrError::NoSolution => {
                write!(f, "IRR solver could not find a solution in the search range")
            }
        }
    }
}

impl std::error::Error for IrrError {}

/// Umbrella error for calculation entry points.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Model(ModelError),
    Distribution(DistributionError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Model(e) => write!(f, "{e}"),
            EngineError::Distribution(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Model(e) => Some(e),
            EngineError::Distribution(e) => Some(e),
        }
    }
}

impl From<ModelError> for EngineError {
    fn from(e: ModelError) -> Self {
        EngineError::Model(e)
    }
}

impl From<DistributionError> for EngineError {
    fn from(e: DistributionError) -> Self {
        EngineError::Distribution(e)
    }
}
