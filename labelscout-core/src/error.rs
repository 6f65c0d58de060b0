use std::time::Duration;

use thiserror::Error;

/// Failure reported by an external collaborator (database, AI, scraper, probe).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("client misconfigured: {0}")]
    Configuration(String),
}

#[cfg(feature = "network")]
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Terminal outcome of a pipeline run that did not produce a score.
///
/// Each variant maps 1:1 onto a caller-visible status. Persistence failures
/// are deliberately absent: they are reported as a flag on a successful run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Malformed barcode, URL or request body. The caller must fix the input.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// The client exhausted its request window.
    #[error("rate limit exceeded, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// No identity or product page could be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// Liveness probe or transport failure against the resolved URL.
    #[error("upstream unreachable: {reason}")]
    UpstreamUnreachable {
        reason: String,
        status: Option<u16>,
    },

    /// An upstream call exceeded its deadline.
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// The scraping or AI service answered with a failure envelope.
    #[error("upstream error ({service}): {body}")]
    UpstreamError {
        service: &'static str,
        status: Option<u16>,
        body: String,
    },

    /// Unexpected failure anywhere in the chain.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable machine-readable code for this outcome.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "INVALID_INPUT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::UpstreamUnreachable { .. } => "UPSTREAM_UNREACHABLE",
            Self::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            Self::UpstreamError { .. } => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::UpstreamUnreachable { .. }
                | Self::UpstreamTimeout(_)
                | Self::UpstreamError { .. }
        )
    }

    pub(crate) fn upstream(service: &'static str, err: ClientError) -> Self {
        match err {
            ClientError::Status { status, body } => Self::UpstreamError {
                service,
                status: Some(status),
                body,
            },
            ClientError::Timeout(after) => {
                Self::UpstreamTimeout(format!("{service} did not answer within {after:?}"))
            }
            other => Self::UpstreamError {
                service,
                status: None,
                body: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
