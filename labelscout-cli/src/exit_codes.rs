//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a bad barcode from a flaky upstream without parsing
//! stderr.

use labelscout_core::{BarcodeError, ClientError, PipelineError, PipelineFailure};

use crate::input::InputError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Invalid barcode, URL or arguments.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Input file missing, or nothing found for the barcode.
/// Maps to EX_NOINPUT from sysexits.h.
pub const NOT_FOUND: i32 = 66;

/// Upstream service unreachable or answering with errors.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// Internal software error.
/// Maps to EX_SOFTWARE from sysexits.h.
pub const INTERNAL_ERROR: i32 = 70;

/// Rate limited or timed out; retrying later may succeed.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TEMP_FAIL: i32 = 75;

/// Missing credentials or bad service configuration.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            code: classify(err),
            message: Some(format!("{err:#}")),
        }
    }
}

/// Map a pipeline outcome onto its exit code.
pub fn for_pipeline_error(error: &PipelineError) -> i32 {
    match error {
        PipelineError::InputInvalid(_) => USAGE_ERROR,
        PipelineError::NotFound(_) => NOT_FOUND,
        PipelineError::RateLimited { .. } | PipelineError::UpstreamTimeout(_) => TEMP_FAIL,
        PipelineError::UpstreamUnreachable { .. } | PipelineError::UpstreamError { .. } => {
            UNAVAILABLE
        }
        PipelineError::Internal(_) => INTERNAL_ERROR,
    }
}

fn classify(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(failure) = cause.downcast_ref::<PipelineFailure>() {
            return for_pipeline_error(&failure.error);
        }
        if cause.downcast_ref::<BarcodeError>().is_some() {
            return USAGE_ERROR;
        }
        if let Some(input) = cause.downcast_ref::<InputError>() {
            return match input {
                InputError::Read { .. } | InputError::NoUrl => NOT_FOUND,
            };
        }
        if let Some(client) = cause.downcast_ref::<ClientError>() {
            return match client {
                ClientError::Configuration(_) => CONFIG_ERROR,
                ClientError::Timeout(_) => TEMP_FAIL,
                _ => UNAVAILABLE,
            };
        }
    }
    GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use labelscout_core::Stage;

    use super::*;

    fn failure(error: PipelineError) -> anyhow::Error {
        anyhow::Error::new(PipelineFailure {
            stage: Stage::Resolve,
            error,
            upc: None,
            product_url: None,
        })
    }

    #[test]
    fn test_pipeline_errors_map_to_sysexits() {
        assert_eq!(
            ExitCode::from_anyhow(&failure(PipelineError::NotFound("x".into()))).code,
            NOT_FOUND
        );
        assert_eq!(
            ExitCode::from_anyhow(&failure(PipelineError::RateLimited {
                retry_after: Duration::from_secs(5)
            }))
            .code,
            TEMP_FAIL
        );
        assert_eq!(
            ExitCode::from_anyhow(&failure(PipelineError::UpstreamError {
                service: "scraper",
                status: Some(500),
                body: String::new(),
            }))
            .code,
            UNAVAILABLE
        );
    }

    #[test]
    fn test_context_does_not_hide_cause() {
        let err = anyhow::Error::new(BarcodeError::Empty).context("Invalid barcode");
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);

        let err = anyhow::Error::new(ClientError::Configuration("missing key".into()))
            .context("Failed to build upstream clients");
        assert_eq!(ExitCode::from_anyhow(&err).code, CONFIG_ERROR);
    }

    #[test]
    fn test_unknown_errors_are_general() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
