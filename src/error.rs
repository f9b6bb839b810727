//! Error types shared across the pipeline stages.

use std::time::Duration;

use thiserror::Error;

/// Maximum accepted source size, in characters.
pub const MAX_SOURCE_CHARS: usize = 1_000_000;

/// Maximum accepted filename length, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// A request was rejected before any work was done.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source text is empty")]
    EmptySource,

    #[error("source text has {len} characters (maximum {max})")]
    SourceTooLarge { len: usize, max: usize },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("could not determine language: no language tag given and filename {0:?} is not recognized")]
    UndeterminedLanguage(Option<String>),

    #[error("caller identity is required")]
    MissingCaller,

    #[error("filename has {len} characters (maximum {max})")]
    FilenameTooLong { len: usize, max: usize },

    #[error("unknown test framework: {0}")]
    UnknownFramework(String),

    #[error("framework {framework} cannot generate tests for {language}")]
    IncompatibleFramework { framework: String, language: String },
}

/// Failure of a single call to the test body generator.
///
/// None of these abort a suite; the affected target falls back to templates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("generator rate limit exceeded")]
    RateLimited,

    #[error("generator call timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generator returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("generator is disabled")]
    Disabled,
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SynthesisError::Unavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            SynthesisError::InvalidResponse(err.to_string())
        } else {
            SynthesisError::Unavailable(err.to_string())
        }
    }
}

/// Persistence failures. Callers may retry.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors surfaced by the analysis → synthesis → coverage pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("analysis {id} did not complete: {reason}")]
    AnalysisNotCompleted { id: String, reason: String },

    #[error("test suite {0} does not belong to analysis {1}")]
    SuiteMismatch(String, String),
}

impl PipelineError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_retryable() {
        let err = PipelineError::from(StoreError::Unavailable("down".to_string()));
        assert!(err.is_retryable());

        let err = PipelineError::from(ValidationError::EmptySource);
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_messages_name_the_limit() {
        let err = ValidationError::SourceTooLarge {
            len: 1_000_001,
            max: MAX_SOURCE_CHARS,
        };
        assert!(err.to_string().contains("1000000"));
    }
}
