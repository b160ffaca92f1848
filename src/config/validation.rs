//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing policies)
//! - Validate value ranges and templates
//! - Refuse implicit behavior (multi-target routes without a strategy)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::routing::template::{PathTemplate, TemplateError};

/// Upper bound for `routes[].retries`.
pub const MAX_RETRIES: u32 = 5;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("jwt.{0} must not be empty")]
    MissingJwtField(&'static str),

    #[error("diagnostics.debug is not allowed in the production environment")]
    DebugInProduction,

    #[error("{0} must be greater than zero")]
    ZeroSetting(&'static str),

    #[error("policy '{0}' is defined more than once")]
    DuplicatePolicy(String),

    #[error("policy '{0}' accepts no authentication scheme")]
    NoSchemes(String),

    #[error("default_policy '{0}' is not defined")]
    UnknownDefaultPolicy(String),

    #[error("route '{0}' is defined more than once")]
    DuplicateRoute(String),

    #[error("route '{route}': {source}")]
    Template {
        route: String,
        #[source]
        source: TemplateError,
    },

    #[error("route '{route}': invalid method '{method}'")]
    Method { route: String, method: String },

    #[error("route '{0}' has no targets")]
    NoTargets(String),

    #[error("route '{0}' has several targets but no load_balancing strategy")]
    ImplicitStrategy(String),

    #[error("route '{route}': unsupported target scheme '{scheme}'")]
    TargetScheme { route: String, scheme: String },

    #[error("route '{route}': target '{host}' is invalid")]
    Target { route: String, host: String },

    #[error("route '{0}' must either name a policy or be marked anonymous")]
    Unprotected(String),

    #[error("route '{0}' names a policy and is marked anonymous")]
    AmbiguousProtection(String),

    #[error("route '{route}' references unknown policy '{policy}'")]
    UnknownPolicy { route: String, policy: String },

    #[error("route '{route}': retries {retries} exceeds the maximum of {max}")]
    TooManyRetries { route: String, retries: u32, max: u32 },

    #[error("route '{0}': timeout_ms must be greater than zero")]
    ZeroTimeout(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.jwt.issuer.trim().is_empty() {
        errors.push(ValidationError::MissingJwtField("issuer"));
    }
    if config.jwt.audience.trim().is_empty() {
        errors.push(ValidationError::MissingJwtField("audience"));
    }

    if config.diagnostics.debug && config.environment.is_production() {
        errors.push(ValidationError::DebugInProduction);
    }

    // A zero deadline would fail every request.
    for (setting, value) in [
        ("listener.request_timeout_secs", config.listener.request_timeout_secs),
        ("forwarding.connect_timeout_ms", config.forwarding.connect_timeout_ms),
        ("forwarding.default_timeout_ms", config.forwarding.default_timeout_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroSetting(setting));
        }
    }

    let mut policies = HashSet::new();
    for policy in &config.policies {
        if !policies.insert(policy.name.as_str()) {
            errors.push(ValidationError::DuplicatePolicy(policy.name.clone()));
        }
        if policy.schemes.is_empty() {
            errors.push(ValidationError::NoSchemes(policy.name.clone()));
        }
    }
    if !policies.contains(config.default_policy.as_str()) {
        errors.push(ValidationError::UnknownDefaultPolicy(
            config.default_policy.clone(),
        ));
    }

    let mut routes = HashSet::new();
    for route in &config.routes {
        let name = &route.name;
        if !routes.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(name.clone()));
        }

        let template_error = |source| ValidationError::Template {
            route: name.clone(),
            source,
        };
        match PathTemplate::parse(&route.upstream_path) {
            Ok(upstream) => {
                if let Some(downstream) = &route.downstream_path {
                    match PathTemplate::parse(downstream) {
                        Ok(downstream) => {
                            if let Err(e) = downstream.is_satisfied_by(&upstream) {
                                errors.push(template_error(e));
                            }
                        }
                        Err(e) => errors.push(template_error(e)),
                    }
                }
            }
            Err(e) => errors.push(template_error(e)),
        }

        for method in &route.methods {
            if parse_method(method).is_none() {
                errors.push(ValidationError::Method {
                    route: name.clone(),
                    method: method.clone(),
                });
            }
        }

        if route.targets.is_empty() {
            errors.push(ValidationError::NoTargets(name.clone()));
        }
        if route.targets.len() > 1 && route.load_balancing.is_none() {
            errors.push(ValidationError::ImplicitStrategy(name.clone()));
        }
        for target in &route.targets {
            if !target.scheme.eq_ignore_ascii_case("http") {
                errors.push(ValidationError::TargetScheme {
                    route: name.clone(),
                    scheme: target.scheme.clone(),
                });
            }
            if target.host.trim().is_empty() || target.port == 0 || target.max_connections == 0 {
                errors.push(ValidationError::Target {
                    route: name.clone(),
                    host: target.host.clone(),
                });
            }
        }

        match (&route.policy, route.anonymous) {
            (None, false) => errors.push(ValidationError::Unprotected(name.clone())),
            (Some(_), true) => errors.push(ValidationError::AmbiguousProtection(name.clone())),
            (Some(policy), false) if !policies.contains(policy.as_str()) => {
                errors.push(ValidationError::UnknownPolicy {
                    route: name.clone(),
                    policy: policy.clone(),
                });
            }
            _ => {}
        }

        if route.retries > MAX_RETRIES {
            errors.push(ValidationError::TooManyRetries {
                route: name.clone(),
                retries: route.retries,
                max: MAX_RETRIES,
            });
        }
        if route.timeout_ms == Some(0) {
            errors.push(ValidationError::ZeroTimeout(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render a list of validation errors on one line.
pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse a configured method name. `ANY` and `*` are not methods; an empty
/// list already means "any".
pub fn parse_method(method: &str) -> Option<Method> {
    let upper = method.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return None;
    }
    Method::from_bytes(upper.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{
        Environment, LoadBalancing, PolicyConfig, RouteConfig, TargetConfig,
    };

    fn target(port: u16) -> TargetConfig {
        TargetConfig {
            scheme: "http".into(),
            host: "127.0.0.1".into(),
            port,
            max_connections: 10,
        }
    }

    fn route(name: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            upstream_path: "/api/**".into(),
            downstream_path: None,
            host: None,
            methods: Vec::new(),
            targets: vec![target(9000)],
            load_balancing: None,
            policy: Some("Bearer".into()),
            anonymous: false,
            strip_authorization: false,
            timeout_ms: None,
            retries: 0,
        }
    }

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.jwt.issuer = "issuer".into();
        config.jwt.audience = "audience".into();
        config.routes.push(route("api"));
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = valid_config();
        config.jwt.issuer.clear();
        config.listener.bind_address = "nowhere".into();
        config.routes[0].targets.clear();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::MissingJwtField("issuer")));
        assert!(errors.contains(&ValidationError::NoTargets("api".into())));
    }

    #[test]
    fn test_multiple_targets_require_explicit_strategy() {
        let mut config = valid_config();
        config.routes[0].targets.push(target(9001));
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::ImplicitStrategy("api".into())])
        );

        config.routes[0].load_balancing = Some(LoadBalancing::RoundRobin);
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_route_protection_must_be_explicit() {
        let mut config = valid_config();
        config.routes[0].policy = None;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::Unprotected("api".into())])
        );

        config.routes[0].anonymous = true;
        assert_eq!(validate_config(&config), Ok(()));

        config.routes[0].policy = Some("Bearer".into());
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::AmbiguousProtection("api".into())])
        );
    }

    #[test]
    fn test_unknown_policies_rejected() {
        let mut config = valid_config();
        config.routes[0].policy = Some("Admins".into());
        config.default_policy = "Missing".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::UnknownDefaultPolicy("Missing".into())));
        assert!(errors.contains(&ValidationError::UnknownPolicy {
            route: "api".into(),
            policy: "Admins".into()
        }));

        config.policies.push(PolicyConfig {
            name: "Admins".into(),
            schemes: vec!["Bearer".into()],
            require: Vec::new(),
        });
        config.default_policy = "Bearer".into();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_debug_refused_in_production() {
        let mut config = valid_config();
        config.diagnostics.debug = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::DebugInProduction])
        );

        config.environment = Environment::Development;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_downstream_template_checked_against_upstream() {
        let mut config = valid_config();
        config.routes[0].upstream_path = "/api/{id}".into();
        config.routes[0].downstream_path = Some("/internal/{other}".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::Template { .. }));
    }

    #[test]
    fn test_methods_and_limits() {
        let mut config = valid_config();
        config.routes[0].methods = vec!["get".into(), "".into()];
        config.routes[0].retries = MAX_RETRIES + 1;
        config.routes[0].timeout_ms = Some(0);
        config.routes[0].targets[0].scheme = "https".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(parse_method("get"), Some(Method::GET));
    }

    #[test]
    fn test_zero_deadlines_rejected() {
        let mut config = valid_config();
        config.listener.request_timeout_secs = 0;
        config.forwarding.connect_timeout_ms = 0;
        config.forwarding.default_timeout_ms = 0;

        assert_eq!(
            validate_config(&config),
            Err(vec![
                ValidationError::ZeroSetting("listener.request_timeout_secs"),
                ValidationError::ZeroSetting("forwarding.connect_timeout_ms"),
                ValidationError::ZeroSetting("forwarding.default_timeout_ms"),
            ])
        );

        config.listener.request_timeout_secs = 1;
        config.forwarding.connect_timeout_ms = 1;
        config.forwarding.default_timeout_ms = 1;
        assert_eq!(validate_config(&config), Ok(()));
    }
}
