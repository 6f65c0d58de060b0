//! Candidate URL validation: syntax first, then a liveness probe.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};
use url::Url;

use crate::clients::LivenessProbe;
use crate::error::ClientError;

/// Outcome of the VALIDATE_URL stage. Only `Valid` continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlCheck {
    Valid(Url),
    /// Not an absolute http(s) URL.
    Invalid(String),
    /// The page answered, but not with a usable status.
    Unreachable { status: u16 },
    /// The probe itself failed or ran out of time.
    TransportFailure(String),
}

/// Parse `candidate` as an absolute http(s) URL.
pub fn parse_candidate(candidate: &str) -> Result<Url, String> {
    let url = Url::parse(candidate.trim()).map_err(|e| format!("malformed URL: {e}"))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err("URL has no host".to_string()),
        other => Err(format!("unsupported scheme: {other}")),
    }
}

/// Whether a probe status means the page is gone or failing.
pub fn is_unreachable_status(status: u16) -> bool {
    !(200..300).contains(&status) || status == 404 || status == 410
}

pub struct UrlValidator {
    probe: Arc<dyn LivenessProbe>,
    timeout: Duration,
}

impl UrlValidator {
    pub fn new(probe: Arc<dyn LivenessProbe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn validate(&self, candidate: &str) -> UrlCheck {
        let url = match parse_candidate(candidate) {
            Ok(url) => url,
            Err(reason) => {
                warn!(reason = %reason, "Candidate URL rejected");
                return UrlCheck::Invalid(reason);
            }
        };

        let probed = tokio::time::timeout(self.timeout, self.probe.probe(&url))
            .await
            .unwrap_or(Err(ClientError::Timeout(self.timeout)));

        match probed {
            Ok(status) if is_unreachable_status(status) => {
                warn!(status, "Candidate URL not reachable");
                UrlCheck::Unreachable { status }
            }
            Ok(status) => {
                debug!(status, "Candidate URL is live");
                UrlCheck::Valid(url)
            }
            Err(e) => {
                warn!(error = %e, "Liveness probe failed");
                UrlCheck::TransportFailure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLivenessProbe;

    fn validator(probe: MockLivenessProbe) -> (UrlValidator, Arc<MockLivenessProbe>) {
        let probe = Arc::new(probe);
        (UrlValidator::new(probe.clone(), Duration::from_secs(5)), probe)
    }

    #[test]
    fn test_parse_candidate() {
        assert!(parse_candidate("https://acme.com/whey").is_ok());
        assert!(parse_candidate(" http://acme.com ").is_ok());
        assert!(parse_candidate("acme.com/whey").is_err());
        assert!(parse_candidate("ftp://acme.com/whey").is_err());
        assert!(parse_candidate("mailto:a@acme.com").is_err());
    }

    #[test]
    fn test_unreachable_statuses() {
        assert!(!is_unreachable_status(200));
        assert!(!is_unreachable_status(204));
        assert!(is_unreachable_status(404));
        assert!(is_unreachable_status(410));
        assert!(is_unreachable_status(500));
        assert!(is_unreachable_status(301));
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_probed() {
        let (validator, probe) = validator(MockLivenessProbe::ok());
        assert!(matches!(validator.validate("not a url").await, UrlCheck::Invalid(_)));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_live_url() {
        let (validator, _) = validator(MockLivenessProbe::ok());
        let check = validator.validate("https://acme.com/whey").await;
        assert_eq!(
            check,
            UrlCheck::Valid(Url::parse("https://acme.com/whey").unwrap())
        );
    }

    #[tokio::test]
    async fn test_gone_url() {
        let (validator, _) = validator(MockLivenessProbe::status(410));
        assert_eq!(
            validator.validate("https://acme.com/old").await,
            UrlCheck::Unreachable { status: 410 }
        );
    }

    #[tokio::test]
    async fn test_probe_failure() {
        let (validator, _) = validator(MockLivenessProbe::failing(ClientError::Transport(
            "dns error".into(),
        )));
        assert!(matches!(
            validator.validate("https://nowhere.invalid").await,
            UrlCheck::TransportFailure(_)
        ));
    }
}
