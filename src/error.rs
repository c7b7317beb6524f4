//! Error types for the ICC engine.

use thiserror::Error;

/// Errors surfaced by ingestion, estimation and inference.
///
/// Negative variance components and undefined point estimates are not errors:
/// they are recovered locally and reported through flags on the results.
#[derive(Debug, Error)]
pub enum IccError {
    /// Caller supplied something the engine cannot analyse - permanent.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The incidence structure leaves a quantity inestimable (empty subject,
    /// rater seen on a single subject, zero degrees of freedom, ...).
    #[error("degenerate design: {message}")]
    DegenerateDesign { message: String },

    /// Malformed ratings file.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// IO error while reading a ratings file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// A reference distribution could not be constructed.
    #[error("distribution error: {0}")]
    Distribution(String),
}

impl IccError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a degenerate design error.
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateDesign {
            message: message.into(),
        }
    }

    /// Create a parse error for a 1-indexed line.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a distribution error.
    pub fn distribution(message: impl Into<String>) -> Self {
        Self::Distribution(message.into())
    }

    /// Whether the error comes from the shape of the data rather than the call.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateDesign { .. })
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::DegenerateDesign { .. } => "degenerate_design",
            Self::Parse { .. } => "parse_error",
            Self::Io(_) => "io_error",
            Self::Config(_) => "config_error",
            Self::Distribution(_) => "distribution_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, IccError>;
