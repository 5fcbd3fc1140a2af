//! Client-side reference resolution.
//!
//! # Data Flow
//! ```text
//! RequestBuilder
//!     → resolver.rs on_request (Accept: sentinel when enabled)
//!     → reqwest
//!     → resolver.rs on_response (sentinel content type + truthy reference?)
//!     → dereference.rs (fetch the payload behind the reference)
//!     → ClientResponse with the real payload
//! ```

pub mod dereference;
pub mod options;
pub mod resolver;

pub use dereference::{dereference_fn, DereferenceError, Dereferencer, HttpDereferencer};
pub use options::{EffectiveOptions, ResolverOptions};
pub use resolver::{ClientResponse, ReferenceResolver, ResolveError};
