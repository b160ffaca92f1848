//! Route lookup.
//!
//! # Responsibilities
//! - Compile route configuration into an ordered table
//! - Return the single most specific matching route, or nothing
//! - Answer whether an unauthenticated request may proceed
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Routes sorted once by descending specificity; stable, so ties keep
//!   declaration order and the first-declared route wins
//! - O(n) scan, first match wins (acceptable for typical route counts)
//! - Explicit `None` rather than a silent default route

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::{ForwardingConfig, RouteConfig};
use crate::config::validation::parse_method;
use crate::load_balancer::TargetPool;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, MethodMatcher, RequestTarget};
use crate::routing::template::{Captures, PathTemplate, Specificity, TemplateError};

/// Errors compiling the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route '{route}': {source}")]
    Template {
        route: String,
        #[source]
        source: TemplateError,
    },

    #[error("route '{route}': invalid method '{method}'")]
    Method { route: String, method: String },

    #[error("route '{route}': invalid target: {source}")]
    Target {
        route: String,
        #[source]
        source: url::ParseError,
    },
}

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub upstream: PathTemplate,
    pub downstream: PathTemplate,
    pub host: Option<String>,
    /// Policy to evaluate after resolution. `None` only for anonymous routes.
    pub policy: Option<String>,
    pub anonymous: bool,
    pub strip_authorization: bool,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Extra attempts for GET/HEAD after connect or timeout failures.
    pub retries: u32,
    pub targets: TargetPool,
    conditions: AndMatcher,
    specificity: Specificity,
}

impl Route {
    fn compile(config: &RouteConfig, forwarding: &ForwardingConfig) -> Result<Self, RouteError> {
        let template_error = |source| RouteError::Template {
            route: config.name.clone(),
            source,
        };

        let upstream = PathTemplate::parse(&config.upstream_path).map_err(template_error)?;
        let downstream = match &config.downstream_path {
            Some(raw) => {
                let downstream = PathTemplate::parse(raw).map_err(template_error)?;
                downstream.is_satisfied_by(&upstream).map_err(template_error)?;
                downstream
            }
            None => upstream.clone(),
        };

        let mut conditions: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            conditions.push(Box::new(HostMatcher::new(host.clone())));
        }
        if !config.methods.is_empty() {
            let methods = config
                .methods
                .iter()
                .map(|m| {
                    parse_method(m).ok_or_else(|| RouteError::Method {
                        route: config.name.clone(),
                        method: m.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            conditions.push(Box::new(MethodMatcher::new(methods)));
        }

        let targets = TargetPool::new(&config.targets, config.load_balancing).map_err(|source| {
            RouteError::Target {
                route: config.name.clone(),
                source,
            }
        })?;

        let timeout_ms = config.timeout_ms.unwrap_or(forwarding.default_timeout_ms);

        Ok(Self {
            name: config.name.clone(),
            specificity: upstream.specificity(),
            upstream,
            downstream,
            host: config.host.clone(),
            policy: config.policy.clone(),
            anonymous: config.anonymous,
            strip_authorization: config.strip_authorization,
            timeout: Duration::from_millis(timeout_ms),
            retries: config.retries,
            targets,
            conditions: AndMatcher::new(conditions),
        })
    }

    fn matches(&self, req: &RequestTarget<'_>) -> Option<Captures> {
        if !self.conditions.matches(req) {
            return None;
        }
        self.upstream.matches(req.path)
    }

    fn rank(&self) -> (Specificity, bool) {
        (self.specificity, self.host.is_some())
    }
}

/// A resolved route and the values its template captured.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub captures: Captures,
}

/// Compiled, ordered route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    /// Anonymous routes only, same order.
    anonymous: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn compile(
        configs: &[RouteConfig],
        forwarding: &ForwardingConfig,
    ) -> Result<Self, RouteError> {
        let mut routes = configs
            .iter()
            .map(|c| Route::compile(c, forwarding).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        // Stable: equal ranks keep declaration order.
        routes.sort_by(|a, b| b.rank().cmp(&a.rank()));
        let anonymous = routes.iter().filter(|r| r.anonymous).cloned().collect();

        Ok(Self { routes, anonymous })
    }

    /// The most specific route matching the request.
    pub fn resolve(&self, method: &Method, path: &str, host: Option<&str>) -> Option<RouteMatch> {
        let req = RequestTarget { method, path, host };
        self.routes.iter().find_map(|route| {
            route.matches(&req).map(|captures| RouteMatch {
                route: route.clone(),
                captures,
            })
        })
    }

    /// Whether some anonymous route matches the request.
    ///
    /// Protected routes are not evaluated, so a more specific protected route
    /// may still win at resolution; callers re-check the resolved route.
    pub fn permits_anonymous(&self, method: &Method, path: &str, host: Option<&str>) -> bool {
        let req = RequestTarget { method, path, host };
        self.anonymous.iter().any(|route| route.matches(&req).is_some())
    }

    /// Route names in match order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TargetConfig;

    fn route(name: &str, upstream: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            upstream_path: upstream.into(),
            downstream_path: None,
            host: None,
            methods: Vec::new(),
            targets: vec![TargetConfig {
                scheme: "http".into(),
                host: "127.0.0.1".into(),
                port: 9000,
                max_connections: 10,
            }],
            load_balancing: None,
            policy: Some("Bearer".into()),
            anonymous: false,
            strip_authorization: false,
            timeout_ms: None,
            retries: 0,
        }
    }

    fn table(routes: Vec<RouteConfig>) -> RouteTable {
        RouteTable::compile(&routes, &ForwardingConfig::default()).unwrap()
    }

    fn resolved(table: &RouteTable, method: Method, path: &str) -> Option<String> {
        table
            .resolve(&method, path, None)
            .map(|m| m.route.name.clone())
    }

    #[test]
    fn test_most_specific_wins_regardless_of_order() {
        let forward = vec![
            route("catch-all", "/**"),
            route("api", "/api/**"),
            route("courses", "/api/courses/**"),
            route("course", "/api/courses/{id}"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        for routes in [forward, reversed] {
            let t = table(routes);
            assert_eq!(resolved(&t, Method::GET, "/api/courses/7").as_deref(), Some("course"));
            assert_eq!(
                resolved(&t, Method::GET, "/api/courses/7/lessons").as_deref(),
                Some("courses")
            );
            assert_eq!(resolved(&t, Method::GET, "/api/users").as_deref(), Some("api"));
            assert_eq!(resolved(&t, Method::GET, "/health").as_deref(), Some("catch-all"));
        }
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let t = table(vec![route("first", "/api/{a}"), route("second", "/api/{b}")]);
        assert_eq!(resolved(&t, Method::GET, "/api/x").as_deref(), Some("first"));
        assert_eq!(t.names().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_no_match() {
        let t = table(vec![route("courses", "/api/courses/**")]);
        assert!(t.resolve(&Method::GET, "/unknown", None).is_none());
    }

    #[test]
    fn test_methods_filter() {
        let mut read_only = route("read", "/api/items/{id}");
        read_only.methods = vec!["GET".into(), "head".into()];
        let t = table(vec![read_only, route("write", "/api/**")]);

        assert_eq!(resolved(&t, Method::HEAD, "/api/items/3").as_deref(), Some("read"));
        assert_eq!(resolved(&t, Method::POST, "/api/items/3").as_deref(), Some("write"));
    }

    #[test]
    fn test_host_bound_beats_agnostic_on_equal_templates() {
        let mut bound = route("bound", "/api/**");
        bound.host = Some("Tenant.Example.com".into());
        let t = table(vec![route("agnostic", "/api/**"), bound]);

        let hit = t.resolve(&Method::GET, "/api/x", Some("tenant.example.com:8080"));
        assert_eq!(hit.unwrap().route.name, "bound");
        let hit = t.resolve(&Method::GET, "/api/x", Some("other.example.com"));
        assert_eq!(hit.unwrap().route.name, "agnostic");
        let hit = t.resolve(&Method::GET, "/api/x", None);
        assert_eq!(hit.unwrap().route.name, "agnostic");
    }

    #[test]
    fn test_captures_and_timeout_defaults() {
        let mut courses = route("courses", "/api/courses/{id}/{*rest}");
        courses.timeout_ms = Some(250);
        let t = table(vec![courses, route("other", "/other")]);

        let m = t.resolve(&Method::GET, "/api/courses/9/a/b", None).unwrap();
        assert_eq!(m.captures.get("id"), Some("9"));
        assert_eq!(m.captures.rest(), Some("a/b"));
        assert_eq!(m.route.timeout, Duration::from_millis(250));

        let other = t.resolve(&Method::GET, "/other", None).unwrap();
        assert_eq!(other.route.timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn test_permits_anonymous() {
        let mut public = route("public", "/api/public/**");
        public.policy = None;
        public.anonymous = true;
        let t = table(vec![route("api", "/api/**"), public]);

        assert!(t.permits_anonymous(&Method::GET, "/api/public/docs", None));
        assert!(!t.permits_anonymous(&Method::GET, "/api/private", None));
        assert!(!t.permits_anonymous(&Method::GET, "/nowhere", None));

        // a protected route more specific than the anonymous one still wins
        let mut admin = route("admin", "/api/public/admin");
        admin.policy = Some("Bearer".into());
        let mut public = route("public", "/api/public/**");
        public.policy = None;
        public.anonymous = true;
        let t = table(vec![public, admin]);
        assert!(t.permits_anonymous(&Method::GET, "/api/public/admin", None));
        let resolved = t.resolve(&Method::GET, "/api/public/admin", None).unwrap();
        assert!(!resolved.route.anonymous);
    }

    #[test]
    fn test_invalid_template_fails_compile() {
        let err = RouteTable::compile(&[route("bad", "api")], &ForwardingConfig::default())
            .unwrap_err();
        assert!(matches!(err, RouteError::Template { .. }));
    }
}
