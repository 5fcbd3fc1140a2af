//! Large response handling for HTTP APIs.
//!
//! The server side measures each buffered response and, past the configured
//! thresholds, offloads the payload and rewrites the response to a reference
//! or a 413. The client side advertises support for references and fetches
//! the real payload back.

pub mod client;
pub mod config;
pub mod guard;
pub mod http;
pub mod observability;
pub mod offload;
pub mod protocol;

pub use client::{ReferenceResolver, ResolverOptions};
pub use config::schema::LargeResponseConfig;
pub use guard::{Classification, ResponseHook, ResponseSizeGuard};
pub use http::{HttpServer, LargeResponseLayer};
