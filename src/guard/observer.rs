//! Observe-only content length monitoring.
//!
//! Measures like the guard but never offloads or rewrites: it only logs
//! WARN between the thresholds and ERROR above the error threshold.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::guard::assessment::{SizeAssessment, SizeBand, Thresholds};
use crate::guard::{check_assessment, Classification, ResponseHook};
use crate::http::envelope::{RequestContext, ResponseEnvelope};
use crate::observability::{metrics, Logger, TracingLogger};

pub struct ContentLengthObserver {
    thresholds: Thresholds,
    logger: Arc<dyn Logger>,
}

impl ContentLengthObserver {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Classify without touching the response.
    pub fn observe(&self, ctx: &RequestContext, response: &ResponseEnvelope) -> Classification {
        let assessment = SizeAssessment::measure(response, &self.thresholds);
        if let Err(e) = check_assessment(&assessment) {
            self.logger.warn(
                "[content-length observer] failed to execute, this requires immediate attention.",
                &json!({ "error": e.to_string(), "request": ctx.log_context() }),
            );
            return Classification::Pass;
        }

        let fields = json!({
            "content_length": assessment.approx_bytes,
            "request": ctx.log_context(),
            "response_size_mb": assessment.size_mb_display(),
        });

        let classification = match assessment.band() {
            SizeBand::BelowWarn => Classification::Pass,
            SizeBand::Warn => {
                self.logger.warn("Large response detected", &fields);
                Classification::Warn
            }
            SizeBand::Error => {
                self.logger.error("Large response detected (limit exceeded)", &fields);
                Classification::LimitExceeded
            }
        };

        metrics::record_classification(classification.as_str(), assessment.approx_mb);
        classification
    }
}

#[async_trait]
impl ResponseHook for ContentLengthObserver {
    async fn after(&self, ctx: &RequestContext, response: &mut ResponseEnvelope) -> Classification {
        self.observe(ctx, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemoryLogger;
    use axum::http::StatusCode;
    use tracing::Level;

    fn observer() -> (ContentLengthObserver, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        let observer =
            ContentLengthObserver::new(Thresholds::new(0.5, 0.9, 1.0)).with_logger(logger.clone());
        (observer, logger)
    }

    #[tokio::test]
    async fn test_levels_by_band() {
        let (observer, logger) = observer();
        let ctx = RequestContext::default();

        let mut small = ResponseEnvelope::new(StatusCode::OK, "tiny");
        assert_eq!(observer.after(&ctx, &mut small).await, Classification::Pass);

        let mut medium = ResponseEnvelope::new(StatusCode::OK, "a".repeat(600 * 1024));
        assert_eq!(observer.after(&ctx, &mut medium).await, Classification::Warn);

        let mut large = ResponseEnvelope::new(StatusCode::OK, "a".repeat(1_048_576));
        let original = large.clone();
        assert_eq!(
            observer.after(&ctx, &mut large).await,
            Classification::LimitExceeded
        );
        assert_eq!(large, original);

        assert_eq!(logger.count(Level::WARN), 1);
        let errors = logger.at(Level::ERROR);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].fields["response_size_mb"], "1.00");
    }
}
