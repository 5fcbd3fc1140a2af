//! The large-response handler.
//!
//! # Responsibilities
//! - Classify the response size against warn/error thresholds
//! - Offload oversized payloads (best effort)
//! - Rewrite to a reference envelope or a 413 depending on client capabilities
//!
//! # Design Decisions
//! - Offload happens before the rewrite, sequentially, inside the request
//! - A client that acknowledged the 413 never triggers an offload on the error path
//! - Status code is preserved when rewriting to a reference

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::schema::GuardConfig;
use crate::guard::assessment::{SizeAssessment, SizeBand, Thresholds};
use crate::guard::capability::ClientCapabilities;
use crate::guard::message::{ErrorMessage, GroupBy};
use crate::guard::{check_assessment, Classification, GuardError, ResponseHook};
use crate::http::envelope::{RequestContext, ResponseEnvelope};
use crate::observability::{metrics, Logger, TracingLogger};
use crate::offload::{safe_store, OffloadRequest, PayloadOffloader};
use crate::protocol::{
    large_response_handled_info, large_response_user_info, LARGE_RESPONSE_MIME_TYPE,
    OFFLOAD_CONTENT_TYPE, PAYLOAD_REF_PROPERTY,
};

const PAYLOAD_TOO_LARGE: u16 = 413;

/// Static guard configuration.
#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub thresholds: Thresholds,
    pub output_bucket: String,
    pub error_message: ErrorMessage,
    pub group_by: GroupBy,
    pub mime_type: String,
    pub ref_property: String,
}

impl GuardSettings {
    pub fn new(thresholds: Thresholds, output_bucket: impl Into<String>) -> Self {
        Self {
            thresholds,
            output_bucket: output_bucket.into(),
            error_message: ErrorMessage::Default,
            group_by: GroupBy::All,
            mime_type: LARGE_RESPONSE_MIME_TYPE.to_string(),
            ref_property: PAYLOAD_REF_PROPERTY.to_string(),
        }
    }

    pub fn with_error_message(mut self, message: ErrorMessage) -> Self {
        self.error_message = message;
        self
    }

    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }
}

impl From<&GuardConfig> for GuardSettings {
    fn from(config: &GuardConfig) -> Self {
        Self {
            thresholds: Thresholds::new(
                config.threshold_warn,
                config.threshold_error,
                config.size_limit_in_mb,
            ),
            output_bucket: config.output_bucket.clone(),
            error_message: config.custom_error_message.clone().into(),
            group_by: config
                .group_by_header
                .clone()
                .map_or(GroupBy::All, GroupBy::Header),
            mime_type: config.mime_type.clone(),
            ref_property: config.ref_property.clone(),
        }
    }
}

/// Changes to apply once a decision is final.
struct Rewrite {
    status_code: Option<u16>,
    body: String,
}

/// Post-hook that offloads and rewrites oversized responses.
pub struct ResponseSizeGuard {
    settings: GuardSettings,
    offloader: Arc<dyn PayloadOffloader>,
    logger: Arc<dyn Logger>,
}

impl ResponseSizeGuard {
    pub fn new(settings: GuardSettings, offloader: Arc<dyn PayloadOffloader>) -> Self {
        Self {
            settings,
            offloader,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    async fn try_after(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseEnvelope,
    ) -> Result<(Classification, SizeAssessment), GuardError> {
        let assessment = SizeAssessment::measure(response, &self.settings.thresholds);
        check_assessment(&assessment)?;

        if response
            .content_type()
            .is_some_and(|ct| ct.eq_ignore_ascii_case(&self.settings.mime_type))
        {
            tracing::debug!(request_id = ?ctx.request_id, "Response already carries a payload reference");
            return Ok((Classification::Pass, assessment));
        }

        let band = assessment.band();
        if band == SizeBand::BelowWarn {
            return Ok((Classification::Pass, assessment));
        }

        let caps = ClientCapabilities::from_headers(&ctx.headers, &self.settings.mime_type);
        let user_info = large_response_user_info(&self.settings.mime_type);

        if band == SizeBand::Warn {
            let reference = if caps.handles_rejection {
                None
            } else {
                self.offload(ctx, &response.body).await
            };
            self.logger.warn(
                &format!("Large response detected. {user_info}"),
                &self.fields(ctx, &assessment, Some(&reference)),
            );
            return Ok((Classification::Warn, assessment));
        }

        let (classification, rewrite) = if caps.accepts_reference {
            let reference = self.offload(ctx, &response.body).await;
            let mut envelope = serde_json::Map::new();
            envelope.insert(self.settings.ref_property.clone(), json!(reference));
            let body = serde_json::to_string(&envelope)?;

            self.logger.info(
                &format!(
                    "Large response detected (limit exceeded). Rewriting response with {{ {} }}",
                    self.settings.ref_property
                ),
                &self.fields(ctx, &assessment, Some(&reference)),
            );
            (
                Classification::ErrorAccepted,
                Rewrite {
                    status_code: None,
                    body,
                },
            )
        } else if caps.handles_rejection {
            let message = self
                .settings
                .error_message
                .resolve(ctx, large_response_handled_info);
            let body = serde_json::to_string(&json!({
                "meta": { "content_length_mb": assessment.size_mb_display() },
                "message": message,
            }))?;

            self.logger.info(
                "Large response detected (limit exceeded). Client signaled that it can handle large responses via 413. Rewriting response with { meta, message }",
                &self.fields(ctx, &assessment, None),
            );
            (
                Classification::ErrorHandled,
                Rewrite {
                    status_code: Some(PAYLOAD_TOO_LARGE),
                    body,
                },
            )
        } else {
            let reference = self.offload(ctx, &response.body).await;
            let message = self
                .settings
                .error_message
                .resolve(ctx, || user_info.clone());
            let body = serde_json::to_string(&json!({ "message": message }))?;

            self.logger.error(
                &format!("Large response detected (limit exceeded). {user_info}"),
                &self.fields(ctx, &assessment, Some(&reference)),
            );
            (
                Classification::ErrorRejected,
                Rewrite {
                    status_code: Some(PAYLOAD_TOO_LARGE),
                    body,
                },
            )
        };

        response.body = rewrite.body;
        response.is_base64_encoded = false;
        if let Some(status_code) = rewrite.status_code {
            response.status_code = status_code;
        }
        if classification != Classification::ErrorRejected {
            response
                .headers
                .insert("content-type", self.settings.mime_type.clone());
        }

        Ok((classification, assessment))
    }

    async fn offload(&self, ctx: &RequestContext, body: &str) -> Option<String> {
        let group_id = self.settings.group_by.group_id(ctx);
        safe_store(
            self.offloader.as_ref(),
            self.logger.as_ref(),
            OffloadRequest {
                bucket: &self.settings.output_bucket,
                group_id: &group_id,
                request_id: ctx.request_id.as_deref(),
                content: body,
                content_type: OFFLOAD_CONTENT_TYPE,
            },
        )
        .await
        .url
    }

    fn fields(
        &self,
        ctx: &RequestContext,
        assessment: &SizeAssessment,
        reference: Option<&Option<String>>,
    ) -> Value {
        let mut fields = json!({
            "content_length": assessment.approx_bytes,
            "request": ctx.log_context(),
            "response_size_mb": assessment.size_mb_display(),
        });
        if let Some(reference) = reference {
            fields[self.settings.ref_property.as_str()] = json!(reference);
        }
        fields
    }
}

#[async_trait]
impl ResponseHook for ResponseSizeGuard {
    async fn after(&self, ctx: &RequestContext, response: &mut ResponseEnvelope) -> Classification {
        match self.try_after(ctx, response).await {
            Ok((classification, assessment)) => {
                metrics::record_classification(classification.as_str(), assessment.approx_mb);
                classification
            }
            Err(e) => {
                self.logger.warn(
                    "[large-response guard] failed to execute, this requires immediate attention.",
                    &json!({ "error": e.to_string(), "request": ctx.log_context() }),
                );
                Classification::Pass
            }
        }
    }
}
