//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router: one fallback handler feeding the pipeline
//! - Wire up middleware (request ID, tracing, overall deadline)
//! - Apply configuration updates by swapping snapshots
//! - Serve until the shutdown signal fires
//!
//! # Design Decisions
//! - No static Axum routes; route resolution belongs to the pipeline
//! - The outbound client is built once; reloads replace routes, keys and
//!   policies but not pool settings

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::GatewayConfig;
use crate::forwarding::{Forward, HttpForwarder};
use crate::observability::audit::{AuditSink, TracingAuditSink};
use crate::pipeline::{GatewayPipeline, SnapshotError, SnapshotStore};

/// The gateway's HTTP front end.
pub struct GatewayServer {
    pipeline: GatewayPipeline,
    request_timeout: Duration,
}

impl GatewayServer {
    /// Build with the production forwarder and the tracing audit sink.
    pub fn new(config: &GatewayConfig) -> Result<Self, SnapshotError> {
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
        let forwarder = Arc::new(HttpForwarder::new(&config.forwarding, audit.clone()));
        Self::with_parts(config, forwarder, audit)
    }

    /// Build with caller-supplied forwarding and audit implementations.
    pub fn with_parts(
        config: &GatewayConfig,
        forwarder: Arc<dyn Forward>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, SnapshotError> {
        let snapshots = Arc::new(SnapshotStore::from_config(config)?);
        Ok(Self {
            pipeline: GatewayPipeline::new(snapshots, forwarder, audit),
            request_timeout: Duration::from_secs(config.listener.request_timeout_secs),
        })
    }

    pub fn snapshots(&self) -> Arc<SnapshotStore> {
        self.pipeline.snapshots().clone()
    }

    /// The Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(self.pipeline.clone())
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Every configuration received on `updates` is compiled into a new
    /// snapshot; one that fails to build is logged and dropped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let store = self.snapshots();
        tracing::info!(
            address = %addr,
            generation = store.generation(),
            routes = store.load().routes.len(),
            "Gateway starting"
        );

        let reloader = tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                match store.reload(&config) {
                    Ok(generation) => tracing::info!(
                        generation,
                        routes = config.routes.len(),
                        "Configuration reloaded"
                    ),
                    Err(e) => tracing::error!(
                        error = %e,
                        generation = store.generation(),
                        "Rejected configuration update. Keeping current snapshot."
                    ),
                }
            }
        });

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        reloader.abort();
        served?;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Every request lands here.
async fn gateway_handler(
    State(pipeline): State<GatewayPipeline>,
    request: Request<Body>,
) -> Response<Body> {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    pipeline.handle(request, client_addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{KeyConfig, RouteConfig, TargetConfig};
    use crate::http::request::X_REQUEST_ID;
    use crate::observability::audit::ChannelAuditSink;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server() -> GatewayServer {
        let mut config = GatewayConfig::default();
        config.jwt.issuer = "Online_Course_Admin".into();
        config.jwt.audience = "Online_Course_Users".into();
        config.jwt.key = KeyConfig::Secret {
            value: "server-secret".into(),
        };
        config.routes.push(RouteConfig {
            name: "courses".into(),
            upstream_path: "/api/courses/**".into(),
            downstream_path: None,
            host: None,
            methods: Vec::new(),
            targets: vec![TargetConfig {
                scheme: "http".into(),
                host: "127.0.0.1".into(),
                port: 9,
                max_connections: 1,
            }],
            load_balancing: None,
            policy: Some("Bearer".into()),
            anonymous: false,
            strip_authorization: false,
            timeout_ms: None,
            retries: 0,
        });

        let (sink, _rx) = ChannelAuditSink::new();
        let audit: Arc<dyn AuditSink> = Arc::new(sink);
        let forwarder = Arc::new(HttpForwarder::new(&config.forwarding, audit.clone()));
        GatewayServer::with_parts(&config, forwarder, audit).unwrap()
    }

    #[tokio::test]
    async fn test_rejection_carries_generated_request_id() {
        let response = server()
            .router()
            .oneshot(Request::get("/api/courses").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_client_request_id_is_echoed() {
        let response = server()
            .router()
            .oneshot(
                Request::get("/nowhere")
                    .header(X_REQUEST_ID, "client-chosen-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "client-chosen-id");
    }
}
