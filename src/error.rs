//! Request-facing error taxonomy.
//!
//! Providers, stores, and configuration return `anyhow::Result` internally.
//! At the controller boundary every failure is folded into a [`RagError`],
//! which the HTTP layer maps onto a status code and error envelope.
//!
//! | Kind | Meaning | Retryable |
//! |------|---------|-----------|
//! | [`Configuration`](RagError::Configuration) | a required credential or provider is missing | no |
//! | [`IndexUnavailable`](RagError::IndexUnavailable) | embedding or index backend unreachable | yes |
//! | [`ModelLoading`](RagError::ModelLoading) | generation backend not serving yet | yes |
//! | [`Failed`](RagError::Failed) | anything else | no |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("model is loading, retry shortly: {0}")]
    ModelLoading(String),

    #[error("{0}")]
    Failed(String),
}

impl RagError {
    /// Whether a caller should wait and try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IndexUnavailable(_) | Self::ModelLoading(_))
    }

    /// Short machine-readable label, used in logs and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::ModelLoading(_) => "model_loading",
            Self::Failed(_) => "internal",
        }
    }

    pub(crate) fn index(err: impl std::fmt::Display) -> Self {
        Self::IndexUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(RagError::ModelLoading("warming up".into()).is_retryable());
        assert!(RagError::IndexUnavailable("down".into()).is_retryable());
        assert!(!RagError::Configuration("no key".into()).is_retryable());
        assert!(!RagError::Failed("boom".into()).is_retryable());
    }

    #[test]
    fn test_anyhow_becomes_failed_with_context() {
        let err = anyhow::anyhow!("inner").context("outer");
        match RagError::from(err) {
            RagError::Failed(msg) => assert_eq!(msg, "outer: inner"),
            other => panic!("unexpected kind: {:?}", other),
        }
    }
}
