//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! guard / offload / client:
//!     → logger.rs (injected Logger capability, TracingLogger by default)
//!     → metrics.rs (counters, histograms)
//!
//! Binaries:
//!     → logging.rs (tracing subscriber setup)
//!     → metrics.rs (Prometheus exporter)
//! ```
//!
//! # Design Decisions
//! - The core never reaches for a global logger; it receives one
//! - Metrics are cheap (atomic increments) and safe without a recorder

pub mod logger;
pub mod logging;
pub mod metrics;

pub use logger::{LogRecord, Logger, MemoryLogger, TracingLogger};
