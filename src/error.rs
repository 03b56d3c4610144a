use thiserror::Error;

/// Errors surfaced by the planner.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("{what}: expected length {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid bounds: {reason}")]
    InvalidBounds { reason: String },

    #[error("invalid weights: {reason}")]
    InvalidWeights { reason: &'static str },

    #[error("invalid model: {reason}")]
    InvalidModel { reason: &'static str },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("optimization failed: {reason}")]
    OptimizationFailure { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
