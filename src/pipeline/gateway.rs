//! Per-request orchestration.
//!
//! # Data Flow
//! ```text
//! Received             dot segments resolved in the path
//!   → Authenticating   credentials → cache → validator
//!   → Authorizing      default policy
//!   → Routing          resolve, then the route's own policy
//!   → Forwarding       Forward::forward
//!   → Responded        | Rejected* (first failure wins)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};

use crate::auth::{mask_token, unix_now, ClaimsSet, Credentials, Decision};
use crate::forwarding::{Forward, ProxyRequest};
use crate::http::request::{normalize_uri, request_host, request_id};
use crate::http::response::rejection_response;
use crate::observability::audit::{AuditEvent, AuditSink};
use crate::observability::metrics;
use crate::pipeline::rejection::Rejection;
use crate::pipeline::snapshot::{GatewaySnapshot, SnapshotStore};
use crate::pipeline::stage::{Stage, StageTrace};

/// Response plus the path the request took through the pipeline.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub response: Response<Body>,
    pub trace: StageTrace,
    /// Name of the resolved route, if resolution succeeded.
    pub route: Option<String>,
}

/// Authenticate, authorize, route and forward.
#[derive(Clone)]
pub struct GatewayPipeline {
    snapshots: Arc<SnapshotStore>,
    forwarder: Arc<dyn Forward>,
    audit: Arc<dyn AuditSink>,
}

/// Per-request bookkeeping threaded through the stages.
struct Progress {
    trace: StageTrace,
    request_id: String,
    route: Option<String>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        if let Err(e) = self.trace.advance(stage) {
            tracing::error!(request_id = %self.request_id, error = %e, "Pipeline stage out of order");
        }
    }
}

impl GatewayPipeline {
    pub fn new(
        snapshots: Arc<SnapshotStore>,
        forwarder: Arc<dyn Forward>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            snapshots,
            forwarder,
            audit,
        }
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    pub async fn handle(&self, request: Request<Body>, client_addr: Option<SocketAddr>) -> Response<Body> {
        self.handle_traced(request, client_addr).await.response
    }

    pub async fn handle_traced(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> PipelineOutcome {
        let start = Instant::now();
        let snapshot = self.snapshots.load();
        let method = request.method().clone();
        let mut progress = Progress {
            trace: StageTrace::new(),
            request_id: request_id(request.headers()),
            route: None,
        };

        let response = match self.run(&snapshot, &mut progress, request, client_addr).await {
            Ok(response) => {
                progress.enter(Stage::Responded);
                response
            }
            Err(rejection) => {
                progress.enter(rejection.terminal_stage());
                tracing::info!(
                    request_id = %progress.request_id,
                    generation = snapshot.generation,
                    status = rejection.status().as_u16(),
                    reason = rejection.code(),
                    "Request rejected"
                );
                rejection_response(&rejection, snapshot.diagnostics)
            }
        };

        metrics::record_request(
            method.as_str(),
            response.status().as_u16(),
            progress.route.as_deref().unwrap_or("none"),
            progress.trace.current().as_str(),
            start,
        );

        PipelineOutcome {
            response,
            trace: progress.trace,
            route: progress.route,
        }
    }

    async fn run(
        &self,
        snapshot: &GatewaySnapshot,
        progress: &mut Progress,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, Rejection> {
        // Everything past this point sees only the resolved path.
        let request = normalize_path(request, &progress.request_id)?;
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let host = request_host(request.headers(), request.uri()).map(str::to_string);

        progress.enter(Stage::Authenticating);
        let claims = match Credentials::from_headers(request.headers()) {
            Credentials::Bearer(token) => Some(self.authenticate(snapshot, token, &progress.request_id)?),
            Credentials::Unsupported => {
                self.audit.emit(AuditEvent::TokenRejected {
                    request_id: progress.request_id.clone(),
                    reason: Rejection::UnsupportedScheme.code(),
                    token: String::new(),
                });
                return Err(Rejection::UnsupportedScheme);
            }
            Credentials::Missing => {
                if !snapshot.routes.permits_anonymous(&method, &path, host.as_deref()) {
                    self.credentials_missing(&progress.request_id, &path);
                    return Err(Rejection::MissingCredentials);
                }
                None
            }
        };

        if let Some(claims) = &claims {
            progress.enter(Stage::Authorizing);
            self.authorize(snapshot, &snapshot.default_policy, claims, &progress.request_id)?;
        }

        progress.enter(Stage::Routing);
        let Some(matched) = snapshot.routes.resolve(&method, &path, host.as_deref()) else {
            self.audit.emit(AuditEvent::RouteMiss {
                request_id: progress.request_id.clone(),
                method: method.to_string(),
                path,
            });
            return Err(Rejection::RouteNotFound);
        };
        progress.route = Some(matched.route.name.clone());

        match (&claims, &matched.route.policy) {
            (None, _) if !matched.route.anonymous => {
                self.credentials_missing(&progress.request_id, &path);
                return Err(Rejection::MissingCredentials);
            }
            (Some(claims), Some(policy)) if *policy != snapshot.default_policy => {
                self.authorize(snapshot, policy, claims, &progress.request_id)?;
            }
            _ => {}
        }

        progress.enter(Stage::Forwarding);
        let proxy_request =
            ProxyRequest::from_request(request, progress.request_id.clone(), client_addr);
        self.forwarder
            .forward(&matched, proxy_request)
            .await
            .map_err(Rejection::Forward)
    }

    /// Validate a bearer token, consulting the snapshot's cache first.
    fn authenticate(
        &self,
        snapshot: &GatewaySnapshot,
        token: &str,
        request_id: &str,
    ) -> Result<ClaimsSet, Rejection> {
        let now = unix_now();

        if let Some(hit) = snapshot.cache.as_ref().and_then(|c| c.get(token, now)) {
            self.token_validated(request_id, &hit.claims, true);
            return Ok(hit.claims);
        }

        match snapshot.validator.validate_at(token, now) {
            Ok(valid) => {
                if let Some(cache) = &snapshot.cache {
                    cache.insert(token, &valid, now);
                }
                self.token_validated(request_id, &valid.claims, false);
                Ok(valid.claims)
            }
            Err(error) => {
                let shown = if snapshot.diagnostics {
                    token.to_string()
                } else {
                    mask_token(token)
                };
                metrics::record_token_validation(error.code(), false);
                self.audit.emit(AuditEvent::TokenRejected {
                    request_id: request_id.to_string(),
                    reason: error.code(),
                    token: shown,
                });
                Err(Rejection::Token(error))
            }
        }
    }

    /// Evaluate one named policy. Unknown names deny.
    fn authorize(
        &self,
        snapshot: &GatewaySnapshot,
        policy: &str,
        claims: &ClaimsSet,
        request_id: &str,
    ) -> Result<(), Rejection> {
        let decision = snapshot.policies.authorize(policy, claims);
        self.audit.emit(AuditEvent::AuthorizationDecided {
            request_id: request_id.to_string(),
            policy: policy.to_string(),
            outcome: decision.outcome(),
            reason: match &decision {
                Decision::Allow => None,
                Decision::Deny(reason) => Some(reason.to_string()),
            },
        });
        match decision {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(Rejection::PolicyDenied(reason)),
        }
    }

    fn token_validated(&self, request_id: &str, claims: &ClaimsSet, cached: bool) {
        metrics::record_token_validation("valid", cached);
        self.audit.emit(AuditEvent::TokenValidated {
            request_id: request_id.to_string(),
            subject: claims.subject().map(str::to_string),
            cached,
        });
    }

    fn credentials_missing(&self, request_id: &str, path: &str) {
        self.audit.emit(AuditEvent::CredentialsMissing {
            request_id: request_id.to_string(),
            path: path.to_string(),
        });
    }
}

/// Resolve `.` and `..` segments so `/public/../private` cannot borrow
/// the anonymous rule of `/public`.
fn normalize_path(request: Request<Body>, request_id: &str) -> Result<Request<Body>, Rejection> {
    match normalize_uri(request.uri()) {
        Ok(None) => Ok(request),
        Ok(Some(uri)) => {
            tracing::debug!(
                request_id = %request_id,
                original = %request.uri().path(),
                normalized = %uri.path(),
                "Resolved dot segments in request path"
            );
            let (mut parts, body) = request.into_parts();
            parts.uri = uri;
            Ok(Request::from_parts(parts, body))
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                path = %request.uri().path(),
                error = %e,
                "Request path could not be normalized"
            );
            Err(Rejection::RouteNotFound)
        }
    }
}
