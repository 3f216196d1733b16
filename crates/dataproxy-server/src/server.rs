use std::net::SocketAddr;

use async_graphql::dynamic::Schema;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::{Router, http::Request};
use dataproxy_graphql::{GraphQLState, graphql_handler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::middleware::{ApiKey, EnvelopeOptions};
use crate::{bootstrap, handlers, metrics, middleware as app_middleware};

pub struct DataProxyServer {
    addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
    app: Router,
}

/// Builds the proxy router around an already synthesized schema.
///
/// Every path except `/healthz` reaches the GraphQL handler: the ORM client
/// posts to `/<version>/<schema-hash>/graphql`.
pub fn build_app(cfg: &AppConfig, schema: Schema) -> Router {
    let api_key = ApiKey::new(cfg.auth.api_key.as_deref().unwrap_or_default());
    let envelope = EnvelopeOptions {
        log_bodies: !cfg.server.production,
    };

    Router::new()
        .fallback(graphql_handler)
        .with_state(GraphQLState::new(schema))
        // order: auth -> envelope -> handler
        .layer(from_fn_with_state(envelope, app_middleware::error_envelope))
        .layer(from_fn_with_state(api_key, app_middleware::authenticate))
        // health is unauthenticated
        .route("/healthz", get(handlers::healthz))
        .layer(from_fn(app_middleware::track_metrics))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                let req_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.target = %req.uri(),
                    request_id = %req_id
                )
            }),
        )
        // outside the trace layer so spans carry the id
        .layer(from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes))
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Runs the startup sequence and assembles the server.
    pub async fn build(self) -> anyhow::Result<DataProxyServer> {
        if self.config.metrics.enabled {
            metrics::init_metrics();
        }

        let schema = bootstrap::schema(&self.config).await?;
        let app = build_app(&self.config, schema);

        Ok(DataProxyServer {
            addr: self.config.addr(),
            metrics_addr: self
                .config
                .metrics
                .enabled
                .then(|| self.config.metrics_addr()),
            app,
        })
    }
}

impl DataProxyServer {
    pub async fn run(self) -> anyhow::Result<()> {
        if let Some(addr) = self.metrics_addr {
            tokio::spawn(async move {
                if let Err(e) = metrics::serve_metrics(addr).await {
                    tracing::error!(error = %e, "metrics listener failed");
                }
            });
        }

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("data proxy listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
