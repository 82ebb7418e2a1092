use serde::Serialize;
use thiserror::Error;

use crate::platform::Platform;

/// Why a single platform could not produce its artifact.
///
/// These never escape an issuance on their own; the orchestrator records
/// them per platform and only surfaces them inside
/// [`Error::AllPlatformsFailed`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum PlatformError {
    /// Credentials or signing material are missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The artifact could not be built, signed or stored.
    #[error("generation error: {0}")]
    Generation(String),
}

/// A recorded failure for one platform during an issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformFailure {
    pub platform: Platform,
    pub error: PlatformError,
}

impl std::fmt::Display for PlatformFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.platform, self.error)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{platform} is misconfigured: {reason}")]
    Configuration { platform: Platform, reason: String },

    #[error("pass generation failed on every platform: {}", join_failures(.0))]
    AllPlatformsFailed(Vec<PlatformFailure>),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("QR encoding error: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Storage(_))
    }
}

fn join_failures(failures: &[PlatformFailure]) -> String {
    if failures.is_empty() {
        return "no platforms configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_platforms_failed_message_lists_each_platform() {
        let err = Error::AllPlatformsFailed(vec![
            PlatformFailure {
                platform: Platform::Apple,
                error: PlatformError::Configuration("certificate missing".to_string()),
            },
            PlatformFailure {
                platform: Platform::Google,
                error: PlatformError::Generation("bad key".to_string()),
            },
        ]);

        let message = err.to_string();
        assert!(message.contains("apple: configuration error: certificate missing"));
        assert!(message.contains("google: generation error: bad key"));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::Conflict("serial taken".to_string()).is_retryable());
        assert!(Error::Storage("connection reset".to_string()).is_retryable());
        assert!(!Error::not_found("design", "abc").is_retryable());
        assert!(!Error::AllPlatformsFailed(vec![]).is_retryable());
    }
}
