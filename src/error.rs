//! Error types
//!
//! Construction problems (bad coefficient vectors, bad layout selectors) are
//! `ConfigurationError`s. Evaluation itself never fails.

use thiserror::Error;

use crate::rules::TargetType;

/// Raised while building rulesets or preparing a page, never while scoring.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("{target} ruleset expects {expected} coefficients, got {actual}")]
    CoefficientCount {
        target: TargetType,
        expected: usize,
        actual: usize,
    },

    #[error("invalid layout selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid base URL {0:?}")]
    InvalidBaseUrl(String),
}

/// Errors surfaced by the request-level entry points.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("failed to parse request JSON: {0}")]
    Request(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
