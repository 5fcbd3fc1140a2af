//! Resolver options and their three-layer merge.
//!
//! ```text
//! built-in defaults  <  global options  <  per-call options
//! ```
//! Later layers win field by field (shallow merge).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::client::dereference::Dereferencer;
use crate::config::schema::ResolverConfig;
use crate::observability::{Logger, TracingLogger};
use crate::protocol::{DEBUG_ENV_VAR, LARGE_RESPONSE_MIME_TYPE, PAYLOAD_REF_PROPERTY};

/// Partial resolver options; `None` defers to the layer below.
#[derive(Clone, Default)]
pub struct ResolverOptions {
    pub enabled: Option<bool>,
    pub debug: Option<bool>,
    pub header_flag: Option<String>,
    pub ref_property: Option<String>,
    pub dereferencer: Option<Arc<dyn Dereferencer>>,
    pub error_payload: Option<Value>,
    pub logger: Option<Arc<dyn Logger>>,
    /// Mutes the warning about an unset `enabled` (global layer only).
    pub disable_warnings: Option<bool>,
}

impl ResolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn header_flag(mut self, header_flag: impl Into<String>) -> Self {
        self.header_flag = Some(header_flag.into());
        self
    }

    pub fn ref_property(mut self, ref_property: impl Into<String>) -> Self {
        self.ref_property = Some(ref_property.into());
        self
    }

    pub fn dereferencer(mut self, dereferencer: Arc<dyn Dereferencer>) -> Self {
        self.dereferencer = Some(dereferencer);
        self
    }

    pub fn error_payload(mut self, payload: Value) -> Self {
        self.error_payload = Some(payload);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn disable_warnings(mut self, disable: bool) -> Self {
        self.disable_warnings = Some(disable);
        self
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&self, other: &ResolverOptions) -> ResolverOptions {
        ResolverOptions {
            enabled: other.enabled.or(self.enabled),
            debug: other.debug.or(self.debug),
            header_flag: other.header_flag.clone().or_else(|| self.header_flag.clone()),
            ref_property: other.ref_property.clone().or_else(|| self.ref_property.clone()),
            dereferencer: other.dereferencer.clone().or_else(|| self.dereferencer.clone()),
            error_payload: other.error_payload.clone().or_else(|| self.error_payload.clone()),
            logger: other.logger.clone().or_else(|| self.logger.clone()),
            disable_warnings: other.disable_warnings.or(self.disable_warnings),
        }
    }
}

impl From<&ResolverConfig> for ResolverOptions {
    fn from(config: &ResolverConfig) -> Self {
        ResolverOptions {
            enabled: config.enabled,
            debug: config.debug,
            header_flag: Some(config.header_flag.clone()),
            ref_property: Some(config.ref_property.clone()),
            disable_warnings: Some(config.disable_warnings),
            ..ResolverOptions::default()
        }
    }
}

impl fmt::Debug for ResolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverOptions")
            .field("enabled", &self.enabled)
            .field("debug", &self.debug)
            .field("header_flag", &self.header_flag)
            .field("ref_property", &self.ref_property)
            .field("dereferencer", &self.dereferencer.as_ref().map(|_| ".."))
            .field("error_payload", &self.error_payload)
            .field("logger", &self.logger.as_ref().map(|_| ".."))
            .field("disable_warnings", &self.disable_warnings)
            .finish()
    }
}

/// Fully resolved options for one call.
#[derive(Clone)]
pub struct EffectiveOptions {
    pub enabled: bool,
    pub debug: bool,
    pub header_flag: String,
    pub ref_property: String,
    pub dereferencer: Arc<dyn Dereferencer>,
    pub error_payload: Option<Value>,
    pub logger: Arc<dyn Logger>,
}

impl EffectiveOptions {
    /// Merge the layers. Anything still unset takes the built-in default:
    /// disabled, sentinel header flag, `$payload_ref`, tracing logger, and
    /// debug from the environment toggle.
    pub fn resolve(
        global: &ResolverOptions,
        per_call: Option<&ResolverOptions>,
        default_dereferencer: &Arc<dyn Dereferencer>,
    ) -> Self {
        let merged = match per_call {
            Some(per_call) => global.merge(per_call),
            None => global.clone(),
        };

        EffectiveOptions {
            enabled: merged.enabled.unwrap_or(false),
            debug: is_debug_enabled(merged.debug),
            header_flag: merged
                .header_flag
                .unwrap_or_else(|| LARGE_RESPONSE_MIME_TYPE.to_string()),
            ref_property: merged
                .ref_property
                .unwrap_or_else(|| PAYLOAD_REF_PROPERTY.to_string()),
            dereferencer: merged
                .dereferencer
                .unwrap_or_else(|| default_dereferencer.clone()),
            error_payload: merged.error_payload,
            logger: merged.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
        }
    }
}

/// Explicit setting first, then the `LARGE_RESPONSE_DEBUG` toggle.
pub fn is_debug_enabled(explicit: Option<bool>) -> bool {
    explicit.unwrap_or_else(|| {
        std::env::var(DEBUG_ENV_VAR)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::dereference::{dereference_fn, DereferenceError};
    use serde_json::json;

    fn noop() -> Arc<dyn Dereferencer> {
        dereference_fn(|_| async { Ok::<_, DereferenceError>(Value::Null) })
    }

    #[test]
    fn test_builtin_defaults() {
        let options = EffectiveOptions::resolve(&ResolverOptions::new().debug(false), None, &noop());
        assert!(!options.enabled);
        assert!(!options.debug);
        assert_eq!(options.header_flag, "application/large-response.vnd+json");
        assert_eq!(options.ref_property, "$payload_ref");
        assert!(options.error_payload.is_none());
    }

    #[test]
    fn test_per_call_overrides_global() {
        let global = ResolverOptions::new()
            .enabled(true)
            .ref_property("_ref")
            .error_payload(json!({ "global": true }));
        let per_call = ResolverOptions::new()
            .enabled(false)
            .error_payload(json!({ "call": true }));

        let options = EffectiveOptions::resolve(&global, Some(&per_call), &noop());
        assert!(!options.enabled);
        assert_eq!(options.ref_property, "_ref");
        assert_eq!(options.error_payload, Some(json!({ "call": true })));
    }

    #[test]
    fn test_unset_per_call_fields_keep_global() {
        let global = ResolverOptions::new().enabled(true).header_flag("x/flag");
        let options = EffectiveOptions::resolve(&global, Some(&ResolverOptions::new()), &noop());
        assert!(options.enabled);
        assert_eq!(options.header_flag, "x/flag");
    }

    #[test]
    fn test_explicit_debug_wins() {
        assert!(is_debug_enabled(Some(true)));
        assert!(!is_debug_enabled(Some(false)));
    }

    #[test]
    fn test_debug_falls_back_to_env_toggle() {
        std::env::set_var(DEBUG_ENV_VAR, "1");
        assert!(is_debug_enabled(None));
        std::env::set_var(DEBUG_ENV_VAR, "true");
        assert!(is_debug_enabled(None));
        assert!(!is_debug_enabled(Some(false)));

        std::env::set_var(DEBUG_ENV_VAR, "yes");
        assert!(!is_debug_enabled(None));
        std::env::remove_var(DEBUG_ENV_VAR);
        assert!(!is_debug_enabled(None));
    }

    #[test]
    fn test_from_config() {
        let mut config = ResolverConfig::default();
        config.enabled = Some(true);
        config.ref_property = "_ref".into();

        let options = ResolverOptions::from(&config);
        assert_eq!(options.enabled, Some(true));
        assert_eq!(options.ref_property.as_deref(), Some("_ref"));
        assert_eq!(options.disable_warnings, Some(false));
    }
}
