//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LargeResponseConfig (validated, immutable)
//!     → turned into GuardSettings / offloader / ResolverOptions at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    GuardConfig, GuardMode, LargeResponseConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    OffloadBackend, OffloadConfig, ResolverConfig,
};
pub use validation::{validate_config, ValidationError};
