//! Error types for the sorter.
//!
//! Every fallible operation in the library returns [`Result<T>`]. Nothing is retried:
//! the computations are deterministic, so a failure is reported to the immediate caller
//! and no partial output is produced.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SorterError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SorterError {
    /// The wire payload is not parseable, or a value has the wrong shape or type.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// A required model, parameter, or column is absent.
    #[error("missing key '{key}' in {context}")]
    MissingKey { key: String, context: String },

    /// A scalar was requested but the entry is a one-row table that cannot be read as one.
    #[error("parameter '{name}' is not a scalar: single row with keys {keys:?}")]
    AmbiguousScalar { name: String, keys: Vec<String> },

    /// Smoothing was requested for a maturity whose coarse strikes do not bracket the output grid.
    #[error("cannot interpolate maturity {maturity} at strike {strike}: {message}")]
    InterpolationDomain {
        maturity: f64,
        strike: f64,
        message: String,
    },

    /// A derived quantity came out NaN or infinite.
    #[error("non-finite {quantity}: {value}")]
    Computation { quantity: String, value: f64 },

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl SorterError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn missing(key: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingKey {
            key: key.into(),
            context: context.into(),
        }
    }

    pub fn computation(quantity: impl Into<String>, value: f64) -> Self {
        Self::Computation {
            quantity: quantity.into(),
            value,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Fail with [`SorterError::Computation`] unless `value` is finite.
pub(crate) fn ensure_finite(quantity: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SorterError::computation(quantity, value))
    }
}
