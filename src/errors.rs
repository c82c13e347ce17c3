pub use anyhow::{anyhow, bail, Context, Error, Result};
pub use log::{debug, error, info, warn};

/// Failures while turning an upstream response into normalized records
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed response ({what}): {reason}")]
    MalformedResponse { what: &'static str, reason: String },
    #[error("No policy matches the matched mapping rule (policy_id={policy_id:?})")]
    PolicyNotFound { policy_id: String },
}

impl ParseError {
    pub fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        ParseError::MalformedResponse {
            what,
            reason: reason.into(),
        }
    }
}
