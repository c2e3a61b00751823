// Error types for partfuzz

use thiserror::Error;

/// Errors raised while compiling rules, mutating components and exporting results.
///
/// Only `UnsupportedCombination` and rule/request setup errors abort a rule
/// invocation. `InvalidKey`, `Build` and `Expression` are absorbed by the
/// engine as per-key skips.
#[derive(Error, Debug)]
pub enum FuzzError {
    /// The key is not present in the component anymore
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Component state could not be serialized into a request
    #[error("build error: {0}")]
    Build(String),

    /// Analyzers cannot be paired with multiple-payload mode
    #[error("analyzers are not supported with multiple payloads")]
    UnsupportedCombination,

    /// Template expression could not be fully resolved
    #[error("expression error: {0}")]
    Expression(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<regex::Error> for FuzzError {
    fn from(err: regex::Error) -> Self {
        FuzzError::InvalidRule(format!("bad regex: {}", err))
    }
}
