//! HTTP integration subsystem.
//!
//! # Data Flow
//! ```text
//! request
//!     → tower-http request id / trace / timeout
//!     → layer.rs (capture RequestContext)
//!     → application handler
//!     → layer.rs (buffer into envelope.rs, run the hook, rebuild)
//!     → client
//! ```

pub mod envelope;
pub mod headers;
pub mod layer;
pub mod server;

pub use envelope::{Identity, RequestContext, ResponseEnvelope};
pub use headers::Headers;
pub use layer::{apply_hook, LargeResponseLayer, LargeResponseService};
pub use server::HttpServer;
