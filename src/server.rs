//! HTTP front: every request goes through the interceptor router.

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::response::Response;
use gatekeep_interceptors::adapters::http::handle_with_router;
use gatekeep_interceptors::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bootstrap::Gateway;
use crate::config::GatewayConfig;
use crate::plugins::{LogsPlugin, PermissionsPlugin, UsersPlugin};

/// Idle limiter buckets are dropped this often.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ServeState {
    pub router: Arc<Router>,
    pub request_timeout: Duration,
}

/// Registers the bundled plugins and wraps the standard guard chain around their
/// routes and the proxy fallback.
pub async fn assemble(
    config: &GatewayConfig,
    gateway: &Gateway,
    logs: Arc<LogsPlugin>,
    upstream: Arc<dyn Upstream>,
) -> Result<Router, InterceptError> {
    let mut host = PluginHost::new();
    host.register(Arc::new(UsersPlugin::new(Arc::clone(&gateway.users))))
        .register(Arc::new(PermissionsPlugin::new(Arc::clone(
            &gateway.permissions,
        ))))
        .register(logs);

    let layout = ChainLayout::standard(
        gateway.facade.clone(),
        Arc::new(Classifier::new()),
        config.server.trust_forwarded_for,
    );
    host.build(layout, proxy_handler(upstream)).await
}

pub fn http_app(state: ServeState) -> axum::Router {
    axum::Router::new()
        .fallback(gateway_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn gateway_handler(
    State(state): State<ServeState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    req: Request<Body>,
) -> Response {
    let remote = connect.map(|ConnectInfo(addr)| addr.ip());
    handle_with_router(req, remote, &state.router, state.request_timeout).await
}

/// Drops limiter buckets that no longer hold any admissions.
pub fn spawn_limiter_pruning(gateway: &Gateway) -> tokio::task::JoinHandle<()> {
    let limiter = Arc::clone(&gateway.limiter);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let pruned = limiter.prune_idle();
            if pruned > 0 {
                tracing::debug!(target: "gatekeep::auth", pruned, tracked = limiter.len(), "pruned idle rate limit buckets");
            }
        }
    })
}

pub async fn serve(config: GatewayConfig, gateway: Gateway, upstream: Arc<dyn Upstream>) -> Result<()> {
    let logs = Arc::new(LogsPlugin::new(&config.logs));
    let router = assemble(&config, &gateway, logs, upstream)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to assemble the request chain")?;
    for (method, path) in router.paths() {
        tracing::debug!(method, path, "route");
    }

    let pruning = spawn_limiter_pruning(&gateway);
    let app = http_app(ServeState {
        router: Arc::new(router),
        request_timeout: config.server.request_timeout,
    });

    let listener = TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    info!("gateway listening on http://{}", config.server.listen);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server exited unexpectedly")?;

    pruning.abort();
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
