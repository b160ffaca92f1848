//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::auth::policy::ClaimPredicate;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment. Diagnostics are refused in production.
    pub environment: Environment,

    /// Listener configuration (bind address, request deadline).
    pub listener: ListenerConfig,

    /// Bearer token validation parameters.
    pub jwt: JwtConfig,

    /// Named authorization policies.
    pub policies: Vec<PolicyConfig>,

    /// Policy every authenticated request must satisfy.
    pub default_policy: String,

    /// Route definitions mapping requests to downstream targets.
    pub routes: Vec<RouteConfig>,

    /// Outbound client settings.
    pub forwarding: ForwardingConfig,

    /// Validation result cache.
    pub cache: CacheConfig,

    /// Non-production diagnostics.
    pub diagnostics: DiagnosticsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            listener: ListenerConfig::default(),
            jwt: JwtConfig::default(),
            policies: vec![PolicyConfig::bearer()],
            default_policy: "Bearer".to_string(),
            routes: Vec::new(),
            forwarding: ForwardingConfig::default(),
            cache: CacheConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
        };
        f.write_str(name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Overall deadline for one inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// JWT validation parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected entry of the `aud` claim.
    pub audience: String,

    /// Signing algorithm tokens must use.
    pub algorithm: Algorithm,

    /// Where the verification key comes from.
    pub key: KeyConfig,

    /// Tolerance applied to `exp` and `nbf`, in seconds.
    pub clock_skew_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            audience: String::new(),
            algorithm: Algorithm::HS256,
            key: KeyConfig::default(),
            clock_skew_secs: 0,
        }
    }
}

/// Reference to the token verification key.
#[derive(Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyConfig {
    /// Shared HMAC secret given inline.
    Secret { value: String },
    /// Shared HMAC secret read from an environment variable.
    SecretEnv { var: String },
    /// RSA or EC public key in a PEM file.
    PublicKeyPem { path: PathBuf },
}

impl Default for KeyConfig {
    fn default() -> Self {
        KeyConfig::SecretEnv {
            var: "GATEWAY_JWT_SECRET".to_string(),
        }
    }
}

// Secrets stay out of `{:?}` output.
impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyConfig::Secret { .. } => f.write_str("Secret { value: <redacted> }"),
            KeyConfig::SecretEnv { var } => f.debug_struct("SecretEnv").field("var", var).finish(),
            KeyConfig::PublicKeyPem { path } => {
                f.debug_struct("PublicKeyPem").field("path", path).finish()
            }
        }
    }
}

/// A named authorization policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Policy name referenced by routes.
    pub name: String,

    /// Accepted authentication schemes.
    #[serde(default = "default_schemes")]
    pub schemes: Vec<String>,

    /// Claim predicates that must all hold.
    #[serde(default)]
    pub require: Vec<ClaimPredicate>,
}

impl PolicyConfig {
    /// The policy the gateway ships with: any authenticated bearer passes.
    pub fn bearer() -> Self {
        Self {
            name: "Bearer".to_string(),
            schemes: default_schemes(),
            require: Vec::new(),
        }
    }
}

fn default_schemes() -> Vec<String> {
    vec!["Bearer".to_string()]
}

/// Route configuration mapping requests to downstream targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Upstream path template (e.g., "/api/courses/**").
    pub upstream_path: String,

    /// Downstream path template. Defaults to the upstream template.
    #[serde(default)]
    pub downstream_path: Option<String>,

    /// Host header to match (case-insensitive, port ignored).
    #[serde(default)]
    pub host: Option<String>,

    /// Accepted methods. Empty means any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Downstream targets.
    pub targets: Vec<TargetConfig>,

    /// Target selection strategy. Required with more than one target.
    #[serde(default)]
    pub load_balancing: Option<LoadBalancing>,

    /// Authorization policy name.
    #[serde(default)]
    pub policy: Option<String>,

    /// Explicitly allow requests without credentials.
    #[serde(default)]
    pub anonymous: bool,

    /// Drop the inbound `Authorization` header before forwarding.
    #[serde(default)]
    pub strip_authorization: bool,

    /// Per-attempt downstream deadline. Falls back to `forwarding.default_timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Extra attempts for idempotent requests after connect/timeout failures.
    #[serde(default)]
    pub retries: u32,
}

/// A downstream target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// URL scheme. Only "http" is supported.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Host name or IP address.
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Maximum concurrent requests in flight to this target.
    #[serde(default = "default_max_target_conns")]
    pub max_connections: usize,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_max_target_conns() -> usize {
    100
}

/// Target selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancing {
    RoundRobin,
    LeastConnections,
    Random,
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Per-attempt deadline when a route sets none.
    pub default_timeout_ms: u64,

    /// How long idle pooled connections are kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Upper bound of idle pooled connections per target.
    pub pool_max_idle_per_host: usize,

    /// Base delay for retry backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for retry backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Largest GET/HEAD body buffered so it can be replayed on retry.
    pub max_replay_body_bytes: usize,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            default_timeout_ms: 30_000,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 1_000,
            max_replay_body_bytes: 64 * 1024,
        }
    }
}

/// Validation result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable caching of successful validations.
    pub enabled: bool,

    /// Maximum cached tokens.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// Non-production diagnostics.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log full tokens on rejection and put failure detail in response bodies.
    pub debug: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
