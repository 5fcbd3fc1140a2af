//! Response size guarding.
//!
//! # Data Flow
//! ```text
//! handler response (ResponseEnvelope) + RequestContext
//!     → assessment.rs (approximate size, thresholds → SizeBand)
//!     → capability.rs (Accept sentinel / handle-large-response)
//!     → handler.rs (ResponseSizeGuard: offload, rewrite, log)
//!       or observer.rs (ContentLengthObserver: log only)
//!     → Classification
//! ```
//!
//! # States
//! ```text
//! START → measure → PASS | WARN | ERROR_ACCEPTED | ERROR_HANDLED_413 | ERROR_REJECTED_413
//! ```
//! Every state is terminal; nothing carries over between invocations.
//!
//! # Design Decisions
//! - Fail open: an internal failure leaves the handler response untouched
//! - Rewrites are computed first and committed last
//! - A response already carrying the sentinel content type is never reprocessed

pub mod assessment;
pub mod capability;
pub mod handler;
pub mod message;
pub mod observer;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::envelope::{RequestContext, ResponseEnvelope};

pub use assessment::{SizeAssessment, SizeBand, Thresholds};
pub use capability::ClientCapabilities;
pub use handler::{GuardSettings, ResponseSizeGuard};
pub use message::{ErrorMessage, GroupBy};
pub use observer::ContentLengthObserver;

/// Terminal outcome of one hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Below the warn threshold, or nothing to do.
    Pass,
    /// Between warn and error thresholds; logged, body untouched.
    Warn,
    /// Over the error threshold; body replaced by a reference envelope.
    ErrorAccepted,
    /// Over the error threshold; 413 for a client that acknowledged it.
    ErrorHandled,
    /// Over the error threshold; 413 with guidance for a client without opt-in.
    ErrorRejected,
    /// Over the error threshold in observe-only mode; logged, body untouched.
    LimitExceeded,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::ErrorAccepted => "error_accepted",
            Self::ErrorHandled => "error_handled",
            Self::ErrorRejected => "error_rejected",
            Self::LimitExceeded => "limit_exceeded",
        }
    }

    /// Whether the hook changed the response.
    pub fn is_rewrite(&self) -> bool {
        matches!(
            self,
            Self::ErrorAccepted | Self::ErrorHandled | Self::ErrorRejected
        )
    }
}

/// Internal failures of a hook. Never surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("failed to serialize rewritten body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("thresholds are not comparable (warn {warn_mb} MB, error {error_mb} MB)")]
    InvalidThresholds { warn_mb: f64, error_mb: f64 },
}

/// A post-processing hook run after the handler, before the response is sent.
#[async_trait]
pub trait ResponseHook: Send + Sync {
    async fn after(&self, ctx: &RequestContext, response: &mut ResponseEnvelope) -> Classification;
}

pub(crate) fn check_assessment(assessment: &SizeAssessment) -> Result<(), GuardError> {
    if assessment.warn_threshold_mb.is_nan() || assessment.error_threshold_mb.is_nan() {
        return Err(GuardError::InvalidThresholds {
            warn_mb: assessment.warn_threshold_mb,
            error_mb: assessment.error_threshold_mb,
        });
    }
    Ok(())
}
