//! Error types for the Tranz simulation engine.
//!
//! This module provides a unified error type [`EngineError`] that covers
//! all error conditions raised by the sparse storage, the pivoting solver,
//! the parallel load view, and the time integration layer.

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Unified error type for all engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ============ Structural Errors ============
    /// Index outside of a fixed container size
    #[error("Index {index} is out of range (length {length})")]
    OutOfRange { index: usize, length: usize },

    /// Dimension of an argument does not match the system
    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A handle that no longer refers to a live element
    #[error("Invalid element handle: {message}")]
    InvalidHandle { message: String },

    // ============ Numerical Errors ============
    /// No admissible pivot could be found
    #[error("Singular matrix - no admissible pivot for row {row}")]
    Singular { row: usize },

    /// Substitution requested before factorization
    #[error("Solver is not factored")]
    NotFactored,

    // ============ Convergence Errors ============
    /// Newton-Raphson iteration did not converge
    #[error("Newton-Raphson did not converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// The transient step was cut below the minimum twice in a row
    #[error("Timestep too small at t = {time:.6e}: {delta:.3e}")]
    TimestepTooSmall { time: f64, delta: f64 },

    // ============ Misuse Errors ============
    /// Operation not available through a parallel view
    #[error("Operation '{operation}' is not supported on a parallel solver view")]
    AccessNotSupported { operation: &'static str },

    /// Integration order outside of what the method supports
    #[error("Invalid integration order {order}")]
    InvalidOrder { order: usize },

    /// Retry with a timestep larger than the one that failed
    #[error("The timestep can only shrink when retrying ({delta:.3e} > {current:.3e})")]
    InvalidRetry { delta: f64, current: f64 },

    /// Time stepping requested before the method was initialized
    #[error("The integration method has not been initialized")]
    NotInitialized,

    /// Invalid configuration value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

impl EngineError {
    /// Create an out-of-range error
    pub fn out_of_range(index: usize, length: usize) -> Self {
        Self::OutOfRange { index, length }
    }

    /// Create a size mismatch error
    pub fn size_mismatch(expected: usize, actual: usize) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Create an invalid handle error
    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::InvalidHandle {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
        }
    }

    /// Whether the transient driver may recover by cutting the timestep.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Singular { .. } | Self::ConvergenceFailure { .. }
        )
    }
}
