//! Immutable gateway snapshots.
//!
//! # Responsibilities
//! - Compile a validated configuration into everything a request needs
//! - Publish snapshots atomically
//!
//! # Design Decisions
//! - A request loads the current snapshot once and uses it end to end, so a
//!   concurrent reload never mixes old and new tables
//! - Reload builds the new snapshot completely before swapping; a failed
//!   build leaves the current snapshot in place
//! - Each snapshot owns a fresh validation cache
//! - Reloads are serialized; generations count published snapshots only

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::auth::{KeyError, PolicySet, TokenValidator, ValidationCache, ValidationRules};
use crate::config::schema::{Environment, GatewayConfig};
use crate::config::validation::{join_errors, validate_config, ValidationError};
use crate::routing::{RouteError, RouteTable};

/// Errors building a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("configuration is invalid: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("failed to load signing key: {0}")]
    Key(#[from] KeyError),

    #[error("failed to compile routes: {0}")]
    Route(#[from] RouteError),
}

/// Everything one request reads, frozen.
#[derive(Debug)]
pub struct GatewaySnapshot {
    /// Increases by one with every successful build.
    pub generation: u64,
    pub environment: Environment,
    pub validator: TokenValidator,
    pub cache: Option<ValidationCache>,
    pub policies: PolicySet,
    pub default_policy: String,
    pub routes: RouteTable,
    /// Full tokens in audit events and `detail` in rejection bodies.
    pub diagnostics: bool,
}

impl GatewaySnapshot {
    pub fn build(config: &GatewayConfig, generation: u64) -> Result<Self, SnapshotError> {
        validate_config(config).map_err(SnapshotError::Invalid)?;

        let rules = ValidationRules::from_config(&config.jwt)?;
        let routes = RouteTable::compile(&config.routes, &config.forwarding)?;
        let cache = config
            .cache
            .enabled
            .then(|| ValidationCache::new(config.cache.max_entries));

        Ok(Self {
            generation,
            environment: config.environment,
            validator: TokenValidator::new(rules),
            cache,
            policies: PolicySet::from_configs(&config.policies),
            default_policy: config.default_policy.clone(),
            routes,
            diagnostics: config.diagnostics.debug && !config.environment.is_production(),
        })
    }
}

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<GatewaySnapshot>,
    reloading: Mutex<()>,
}

impl SnapshotStore {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, SnapshotError> {
        let snapshot = GatewaySnapshot::build(config, 1)?;
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            reloading: Mutex::new(()),
        })
    }

    /// The snapshot to use for one request.
    pub fn load(&self) -> Arc<GatewaySnapshot> {
        self.current.load_full()
    }

    /// Build from `config` and swap it in. Returns the new generation.
    /// A failed build does not use up a generation number.
    pub fn reload(&self, config: &GatewayConfig) -> Result<u64, SnapshotError> {
        // Held across build and store so two reloads cannot share a number.
        let _reloading = self.reloading.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.current.load().generation + 1;
        let snapshot = GatewaySnapshot::build(config, generation)?;
        self.current.store(Arc::new(snapshot));
        Ok(generation)
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{KeyConfig, RouteConfig, TargetConfig};
    use axum::http::Method;

    fn config(route_path: &str) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.jwt.issuer = "Online_Course_Admin".into();
        config.jwt.audience = "Online_Course_Users".into();
        config.jwt.key = KeyConfig::Secret {
            value: "snapshot-secret".into(),
        };
        config.routes.push(RouteConfig {
            name: "courses".into(),
            upstream_path: route_path.into(),
            downstream_path: None,
            host: None,
            methods: Vec::new(),
            targets: vec![TargetConfig {
                scheme: "http".into(),
                host: "courses-svc".into(),
                port: 8080,
                max_connections: 10,
            }],
            load_balancing: None,
            policy: Some("Bearer".into()),
            anonymous: false,
            strip_authorization: false,
            timeout_ms: None,
            retries: 0,
        });
        config
    }

    #[test]
    fn test_reload_swaps_whole_snapshot() {
        let store = SnapshotStore::from_config(&config("/api/courses/**")).unwrap();
        let before = store.load();
        assert_eq!(before.generation, 1);

        let generation = store.reload(&config("/v2/courses/**")).unwrap();
        assert_eq!(generation, 2);
        let after = store.load();

        // The old snapshot stays intact for whoever still holds it.
        assert!(before.routes.resolve(&Method::GET, "/api/courses/1", None).is_some());
        assert!(after.routes.resolve(&Method::GET, "/api/courses/1", None).is_none());
        assert!(after.routes.resolve(&Method::GET, "/v2/courses/1", None).is_some());
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let store = SnapshotStore::from_config(&config("/api/**")).unwrap();
        let mut broken = config("/api/**");
        broken.jwt.issuer.clear();

        assert!(matches!(store.reload(&broken), Err(SnapshotError::Invalid(_))));
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_rejected_reload_does_not_skip_a_generation() {
        let store = SnapshotStore::from_config(&config("/api/**")).unwrap();
        let mut broken = config("/api/**");
        broken.jwt.issuer.clear();

        assert!(store.reload(&broken).is_err());
        assert!(store.reload(&broken).is_err());
        assert_eq!(store.reload(&config("/v2/**")).unwrap(), 2);
        assert_eq!(store.load().generation, 2);
    }

    #[test]
    fn test_concurrent_reloads_get_distinct_generations() {
        let store = Arc::new(SnapshotStore::from_config(&config("/api/**")).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.reload(&config("/api/**")).unwrap())
            })
            .collect();

        let mut generations: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        generations.sort_unstable();
        assert_eq!(generations, (2..=9).collect::<Vec<_>>());
        assert_eq!(store.generation(), 9);
    }

    #[test]
    fn test_diagnostics_never_on_in_production() {
        let mut dev = config("/api/**");
        dev.environment = Environment::Development;
        dev.diagnostics.debug = true;
        assert!(GatewaySnapshot::build(&dev, 1).unwrap().diagnostics);

        dev.cache.enabled = false;
        assert!(GatewaySnapshot::build(&dev, 1).unwrap().cache.is_none());
    }
}
