//! Error types for the frontier sampler.

use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, FrontierError>;

#[derive(Error, Debug)]
pub enum FrontierError {
    /// Price provider unreachable, unknown ticker or no usable rows.
    #[error("Data fetch failed ({source_name}): {message}")]
    DataFetch {
        source_name: String,
        message: String,
    },

    /// Not enough aligned rows (or trials) to compute a statistic.
    #[error("Insufficient data for {context}: need at least {required}, got {available}")]
    DataInsufficient {
        context: String,
        required: usize,
        available: usize,
    },

    /// Quadratic form over the covariance matrix came out negative.
    #[error("Negative portfolio variance {variance:e}; covariance matrix is corrupt or ill-conditioned")]
    NegativeVariance { variance: f64 },

    /// No trial in the run has a defined Sharpe ratio.
    #[error("No scorable trials: {trials} trials, none with a defined Sharpe ratio")]
    NoScorableTrials { trials: usize },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parse error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Persistence error: {message}")]
    Persist { message: String },
}

impl FrontierError {
    pub fn data_fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataFetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn insufficient_data(context: impl Into<String>, required: usize, available: usize) -> Self {
        Self::DataInsufficient {
            context: context.into(),
            required,
            available,
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn persist(message: impl Into<String>) -> Self {
        Self::Persist {
            message: message.into(),
        }
    }
}

#[cfg(feature = "python")]
impl From<FrontierError> for pyo3::PyErr {
    fn from(err: FrontierError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
