//! Lazily evaluated providers: the 413 message and the offload grouping key.

use std::fmt;
use std::sync::Arc;

use crate::http::envelope::RequestContext;
use crate::protocol::DEFAULT_GROUP;

type ContextFn<T> = Arc<dyn Fn(&RequestContext) -> T + Send + Sync>;

/// Message placed in a 413 body. Only evaluated when the error path is taken.
#[derive(Clone, Default)]
pub enum ErrorMessage {
    /// Use the built-in text for the branch taken.
    #[default]
    Default,
    Literal(String),
    Dynamic(ContextFn<String>),
}

impl ErrorMessage {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Resolve the message, using `fallback` for [`ErrorMessage::Default`].
    pub fn resolve(&self, ctx: &RequestContext, fallback: impl FnOnce() -> String) -> String {
        match self {
            Self::Default => fallback(),
            Self::Literal(message) => message.clone(),
            Self::Dynamic(f) => f(ctx),
        }
    }
}

impl From<Option<String>> for ErrorMessage {
    fn from(message: Option<String>) -> Self {
        message.map_or(Self::Default, Self::Literal)
    }
}

impl fmt::Debug for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Literal(m) => f.debug_tuple("Literal").field(m).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// How offloaded objects are grouped in storage.
#[derive(Clone, Default)]
pub enum GroupBy {
    /// Everything under `"all"`.
    #[default]
    All,
    /// The authorizer identity.
    Identity,
    /// The value of a request header.
    Header(String),
    Custom(ContextFn<Option<String>>),
}

impl GroupBy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Group key for a request; empty or missing keys become `"all"`.
    pub fn group_id(&self, ctx: &RequestContext) -> String {
        let group = match self {
            Self::All => None,
            Self::Identity => ctx.identity.clone(),
            Self::Header(name) => ctx
                .headers
                .get(name)
                .map(str::to_string)
                .or_else(|| ctx.identity.clone()),
            Self::Custom(f) => f(ctx),
        };
        group
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP.to_string())
    }
}

impl fmt::Debug for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Identity => f.write_str("Identity"),
            Self::Header(h) => f.debug_tuple("Header").field(h).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_variants() {
        let ctx = RequestContext::default().with_request_id("r-9");
        let fallback = || "fallback".to_string();

        assert_eq!(ErrorMessage::Default.resolve(&ctx, fallback), "fallback");
        assert_eq!(
            ErrorMessage::Literal("custom".into()).resolve(&ctx, fallback),
            "custom"
        );
        let dynamic = ErrorMessage::dynamic(|ctx| format!("too big: {:?}", ctx.request_id));
        assert_eq!(dynamic.resolve(&ctx, fallback), "too big: Some(\"r-9\")");
    }

    #[test]
    fn test_group_by() {
        let ctx = RequestContext::new([("x-org-id", "red-redington")].into_iter().collect())
            .with_identity("user-1");

        assert_eq!(GroupBy::All.group_id(&ctx), "all");
        assert_eq!(GroupBy::Identity.group_id(&ctx), "user-1");
        assert_eq!(GroupBy::Header("X-Org-Id".into()).group_id(&ctx), "red-redington");
        assert_eq!(GroupBy::Header("x-missing".into()).group_id(&ctx), "user-1");
        assert_eq!(GroupBy::custom(|_| Some(String::new())).group_id(&ctx), "all");
        assert_eq!(GroupBy::Identity.group_id(&RequestContext::default()), "all");
    }
}
