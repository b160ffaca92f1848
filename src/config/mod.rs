//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into a GatewaySnapshot
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server compiles a new snapshot and swaps it atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Environment is explicit in the file, never read from ambient state at request time

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, DiagnosticsConfig, Environment, ForwardingConfig, GatewayConfig, JwtConfig,
    KeyConfig, ListenerConfig, LoadBalancing, LogFormat, ObservabilityConfig, PolicyConfig,
    RouteConfig, TargetConfig,
};
pub use validation::{validate_config, ValidationError};
