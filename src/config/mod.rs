//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI flag overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once by HttpServer::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the migration policy changes at
//!   runtime, through the admin endpoints
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, BackendsConfig, ListenerConfig, MigrationConfig,
    ObservabilityConfig, ProxyConfig, SecurityConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
