use crate::pipeline::Field;
use thiserror::Error;

/// Failures raised while fetching a page of candidates.
///
/// None of these abort a batch: the orchestrator logs them and treats the
/// call as having produced zero results.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network failure talking to the provider
    #[error("{method}: request failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Provider answered with a non-success status
    #[error("{method}: provider returned status {status}")]
    Status {
        method: &'static str,
        status: reqwest::StatusCode,
    },

    /// Call exceeded its time budget
    #[error("{method}: timed out after {seconds}s")]
    Timeout { method: &'static str, seconds: u64 },

    /// Embedded data was malformed
    #[error("{method}: could not parse response: {reason}")]
    Parse { method: &'static str, reason: String },

    /// Anti-bot wall (CAPTCHA or access denied page)
    #[error("{method}: blocked by provider ({reason})")]
    Blocked { method: &'static str, reason: String },

    /// Headless browser could not be driven
    #[error("{method}: browser error: {reason}")]
    Browser { method: &'static str, reason: String },

    /// Every fetch method failed or came back empty for a region
    #[error("no records for region {region} after {methods} method(s)")]
    Exhausted { region: String, methods: usize },
}

impl ScrapeError {
    /// Classify a reqwest error, separating timeouts from other transport failures.
    pub fn transport(method: &'static str, source: reqwest::Error, timeout_secs: u64) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                method,
                seconds: timeout_secs,
            }
        } else {
            Self::Transport { method, source }
        }
    }

    pub fn parse(method: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            method,
            reason: reason.into(),
        }
    }
}

/// Why a raw value could not be coerced into its canonical type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoerceError {
    #[error("expected a number, got {0}")]
    NotNumeric(String),

    #[error("negative value {0}")]
    Negative(f64),

    #[error("value {0} out of range")]
    OutOfRange(f64),

    #[error("empty string")]
    Empty,

    #[error("unrecognized date {0}")]
    NotADate(String),

    #[error("expected text, got {0}")]
    NotText(String),
}

/// Reason a candidate listing was dropped by the record builder.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("required field {field} {reason}")]
pub struct Rejection {
    pub field: Field,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("is missing")]
    Missing,

    #[error("is invalid: {0}")]
    Invalid(#[from] CoerceError),

    #[error("is not an object")]
    NotAnObject,
}
