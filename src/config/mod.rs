//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! TOML file → loader.rs → schema.rs types → validation.rs → accepted
//! ```
//!
//! The accepted configuration is an immutable startup snapshot; nothing
//! reloads it at runtime.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, resolve_config, ConfigError};
pub use schema::{
    AuthConfig, CredsAuthConfig, GatewayConfig, HeaderAuthConfig, ListenerConfig,
    ObservabilityConfig,
};
pub use validation::{validate_config, ValidationError};
