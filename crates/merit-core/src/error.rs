//! Unified error type for the merit workspace
//!
//! Every crate in the workspace reports failures through [`MeritError`] so that
//! a dispatch run surfaces one error type at its boundary regardless of whether
//! the problem came from input parsing, curve construction or the solver loop.
//!
//! # Example
//!
//! ```ignore
//! use merit_core::{MeritError, MeritResult};
//!
//! fn run(path: &str) -> MeritResult<()> {
//!     let table = load_generator_table(path)?;
//!     let order = MeritOrderBuilder::new(table, options)?.build()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all merit operations.
#[derive(Error, Debug)]
pub enum MeritError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed input data: missing per-bucket fields, bad fractions,
    /// non-monotonic cumulative capacity
    #[error("Validation error: {0}")]
    Validation(String),

    /// A strict curve was queried outside the range it was built over
    #[error("Domain error: {value} lies outside [{lower}, {upper}]")]
    Domain { value: f64, lower: f64, upper: f64 },

    /// Configuration errors, including non-finite curve construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Demand is missing for an hour that must be dispatched
    #[error("Missing demand at {timestamp}")]
    MissingDemand { timestamp: String },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using MeritError.
pub type MeritResult<T> = Result<T, MeritError>;

impl From<anyhow::Error> for MeritError {
    fn from(err: anyhow::Error) -> Self {
        MeritError::Other(format!("{err:#}"))
    }
}

impl From<String> for MeritError {
    fn from(s: String) -> Self {
        MeritError::Other(s)
    }
}

impl From<&str> for MeritError {
    fn from(s: &str) -> Self {
        MeritError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for MeritError {
    fn from(err: serde_json::Error) -> Self {
        MeritError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for MeritError {
    fn from(err: serde_yaml::Error) -> Self {
        MeritError::Parse(err.to_string())
    }
}
