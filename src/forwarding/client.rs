//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Own the pooled hyper client shared by every route
//! - Run the attempt loop: select target, send under deadline, retry
//! - Report each failed attempt as an audit event
//!
//! # Design Decisions
//! - Outbound requests are HTTP/1.1 regardless of the inbound version
//! - Only GET/HEAD bodies of known, bounded size are buffered; every other
//!   body streams through once and disables retry
//! - One deadline per attempt covers response headers and body; the target
//!   slot is held until the body ends

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Method, Request, Response, Uri, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;

use crate::config::schema::ForwardingConfig;
use crate::forwarding::body::DeadlineBody;
use crate::forwarding::headers::{self, UpstreamContext};
use crate::forwarding::rewrite::downstream_path_and_query;
use crate::forwarding::{Forward, ForwardError, ProxyRequest};
use crate::load_balancer::TargetGuard;
use crate::observability::audit::{AuditEvent, AuditSink};
use crate::observability::metrics;
use crate::resilience::{is_idempotent, with_deadline, Backoff, RetryPolicy};
use crate::routing::RouteMatch;

/// Request body as it will be sent on each attempt.
enum Payload {
    /// Buffered; cloned for every attempt.
    Replayable(Bytes),
    /// Streamed; only the first attempt gets it.
    Streaming(Option<Body>),
}

impl Payload {
    fn next_body(&mut self) -> Body {
        match self {
            Payload::Replayable(bytes) => Body::from(bytes.clone()),
            Payload::Streaming(body) => body.take().unwrap_or_else(Body::empty),
        }
    }

    fn is_replayable(&self) -> bool {
        matches!(self, Payload::Replayable(_))
    }
}

/// Everything of the inbound request except its body.
struct RequestHead {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    request_id: String,
    client_addr: Option<SocketAddr>,
}

/// Forwards over a pooled `hyper-util` client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    backoff: Backoff,
    max_replay_body_bytes: usize,
    audit: Arc<dyn AuditSink>,
}

impl HttpForwarder {
    pub fn new(config: &ForwardingConfig, audit: Arc<dyn AuditSink>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Self {
            client,
            backoff: Backoff::from_config(config),
            max_replay_body_bytes: config.max_replay_body_bytes,
            audit,
        }
    }

    /// Buffer GET/HEAD bodies whose size is known and within the replay bound.
    async fn payload(
        &self,
        head: &RequestHead,
        body: Body,
        retries: u32,
    ) -> Result<Payload, ForwardError> {
        if retries == 0 || !is_idempotent(&head.method) {
            return Ok(Payload::Streaming(Some(body)));
        }

        let bounded = body
            .size_hint()
            .upper()
            .is_some_and(|upper| upper <= self.max_replay_body_bytes as u64);
        if !bounded {
            return Ok(Payload::Streaming(Some(body)));
        }

        axum::body::to_bytes(body, self.max_replay_body_bytes)
            .await
            .map(Payload::Replayable)
            .map_err(|e| ForwardError::RequestBody {
                reason: e.to_string(),
            })
    }

    async fn attempt(
        &self,
        matched: &RouteMatch,
        request: &RequestHead,
        guard: TargetGuard,
        body: Body,
    ) -> Result<Response<Body>, ForwardError> {
        let route = &matched.route;
        let target = guard.target().clone();
        let deadline = Instant::now() + route.timeout;

        let path_and_query =
            downstream_path_and_query(matched, &request.uri).map_err(|e| {
                ForwardError::DownstreamError {
                    target: target.authority(),
                    reason: format!("invalid downstream path: {}", e),
                }
            })?;
        let uri = Uri::builder()
            .scheme(target.scheme.as_str())
            .authority(target.authority().as_str())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ForwardError::DownstreamError {
                target: target.authority(),
                reason: format!("invalid downstream uri: {}", e),
            })?;

        let mut outbound = Request::new(body);
        *outbound.method_mut() = request.method.clone();
        *outbound.uri_mut() = uri;
        *outbound.version_mut() = Version::HTTP_11;
        *outbound.headers_mut() = request.headers.clone();
        headers::prepare_upstream(
            outbound.headers_mut(),
            &target,
            &UpstreamContext {
                request_id: &request.request_id,
                client_addr: request.client_addr,
                strip_authorization: route.strip_authorization,
            },
        );

        tracing::debug!(
            request_id = %request.request_id,
            route = %route.name,
            target = %target,
            uri = %outbound.uri(),
            "Forwarding request"
        );

        match with_deadline(route.timeout, self.client.request(outbound)).await {
            Err(_) => Err(ForwardError::Timeout {
                target: target.authority(),
                timeout: route.timeout,
            }),
            Ok(Err(e)) if e.is_connect() => Err(ForwardError::ConnectFailed {
                target: target.authority(),
            }),
            Ok(Err(e)) => Err(ForwardError::DownstreamError {
                target: target.authority(),
                reason: e.to_string(),
            }),
            Ok(Ok(response)) => {
                let mut response = response.map(|incoming| {
                    Body::new(DeadlineBody::new(
                        Body::new(incoming),
                        deadline,
                        route.timeout,
                        guard,
                    ))
                });
                headers::prepare_downstream(response.headers_mut(), &request.request_id);
                Ok(response)
            }
        }
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(
        &self,
        matched: &RouteMatch,
        request: ProxyRequest,
    ) -> Result<Response<Body>, ForwardError> {
        let route = &matched.route;
        let ProxyRequest {
            method,
            uri,
            headers,
            body,
            request_id,
            client_addr,
        } = request;
        let request = RequestHead {
            method,
            uri,
            headers,
            request_id,
            client_addr,
        };
        let mut payload = match self.payload(&request, body, route.retries).await {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    route = %route.name,
                    error = %error,
                    "Request body could not be read"
                );
                return Err(error);
            }
        };
        let policy = RetryPolicy::new(&request.method, route.retries, payload.is_replayable());

        let mut attempt = 0;
        loop {
            attempt += 1;

            let Some(guard) = route.targets.acquire() else {
                let error = ForwardError::Saturated {
                    route: route.name.clone(),
                };
                self.audit.emit(AuditEvent::ForwardFailed {
                    request_id: request.request_id.clone(),
                    route: route.name.clone(),
                    attempts: attempt,
                    error: error.code(),
                });
                return Err(error);
            };

            let body = payload.next_body();
            let error = match self.attempt(matched, &request, guard, body).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            tracing::warn!(
                request_id = %request.request_id,
                route = %route.name,
                attempt,
                error = %error,
                "Forward attempt failed"
            );
            self.audit.emit(AuditEvent::ForwardAttemptFailed {
                request_id: request.request_id.clone(),
                route: route.name.clone(),
                attempt,
                error: error.code(),
                target: match &error {
                    ForwardError::ConnectFailed { target }
                    | ForwardError::Timeout { target, .. }
                    | ForwardError::DownstreamError { target, .. } => target.clone(),
                    ForwardError::Saturated { .. } | ForwardError::RequestBody { .. } => {
                        String::new()
                    }
                },
            });

            if policy.allows(attempt, &error) {
                let delay = self.backoff.delay(attempt);
                metrics::record_forward_retry(&route.name, error.code());
                tracing::info!(
                    request_id = %request.request_id,
                    route = %route.name,
                    attempt,
                    delay = ?delay,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            self.audit.emit(AuditEvent::ForwardFailed {
                request_id: request.request_id.clone(),
                route: route.name.clone(),
                attempts: attempt,
                error: error.code(),
            });
            return Err(error);
        }
    }
}
