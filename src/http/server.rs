//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Drive each request through the routing pipeline:
//!   tenant → version → deployment path → outbound request → dispatch
//! - Graceful shutdown, cancelling in-flight dispatches

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{tenant_host, ProxyRequestBuilder};
use crate::http::response::{DispatchError, ProxyDispatcher, ProxyError};
use crate::routing::{self, BackendPathResolver, VersionLookupError, VersionResolver};

/// Error raised while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    VersionLookup(#[from] VersionLookupError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub versions: Arc<VersionResolver>,
    pub deployments: Arc<BackendPathResolver>,
    pub requests: Arc<ProxyRequestBuilder>,
    pub dispatcher: Arc<ProxyDispatcher>,
    pub shutdown: CancellationToken,
}

/// HTTP server for the tenant router.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    shutdown: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Cancelling `shutdown` stops the server and every in-flight request.
    pub fn new(config: ProxyConfig, shutdown: CancellationToken) -> Result<Self, ServerError> {
        let state = AppState {
            versions: Arc::new(VersionResolver::new(&config.version_lookup)?),
            deployments: Arc::new(BackendPathResolver::from_config(&config.deployments)),
            requests: Arc::new(ProxyRequestBuilder::new(
                config.backend.host.clone(),
                config.backend.path_base.clone(),
            )),
            dispatcher: Arc::new(ProxyDispatcher::new(
                config.backend.host.clone(),
                &config.timeouts,
            )),
            shutdown: shutdown.clone(),
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            shutdown,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.host,
            path_base = %self.config.backend.path_base,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(self.shutdown.cancelled_owned())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Resolves the tenant's version and deployment, then forwards the request.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // 1. Tenant
    let Some(tenant_host) = tenant_host(request.headers()) else {
        tracing::warn!(request_id = %request_id, peer = %peer, "Request received without X-Tenant-Host header");
        return ProxyError::MissingTenantHost.into_response();
    };

    match routing::classify(&tenant_host) {
        Ok(environment) => tracing::info!(
            request_id = %request_id,
            tenant_host = %tenant_host,
            environment = %environment,
            method = %request.method(),
            path = %request.uri().path(),
            "Request received"
        ),
        Err(e) => tracing::warn!(
            request_id = %request_id,
            tenant_host = %tenant_host,
            error = %e,
            "Request received for unrecognised tenant domain"
        ),
    }

    // 2. Version
    let Some(version) = state.versions.resolve(&tenant_host).await else {
        tracing::warn!(request_id = %request_id, tenant_host = %tenant_host, "Version could not be determined");
        return ProxyError::VersionNotFound { tenant_host }.into_response();
    };
    tracing::info!(request_id = %request_id, tenant_host = %tenant_host, version = %version, "Version determined");

    // 3. Deployment path
    let resolved_path = state.deployments.clone().resolve_blocking(version.clone()).await;
    if resolved_path.is_none() {
        tracing::warn!(
            request_id = %request_id,
            tenant_host = %tenant_host,
            version = %version,
            "No deployment path found, forwarding without resolved path"
        );
    }

    // 4. Outbound request
    let outbound = match state
        .requests
        .build(request, version.as_str(), resolved_path.as_deref())
    {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::error!(request_id = %request_id, tenant_host = %tenant_host, version = %version, error = %e, "Failed to build outbound request");
            return ProxyError::from(e).into_response();
        }
    };
    let target = outbound.uri().to_string();
    tracing::info!(request_id = %request_id, target = %target, "Proxying request");

    // 5. Dispatch
    let cancel = state.shutdown.child_token();
    match state.dispatcher.dispatch(outbound, &cancel).await {
        Ok(response) => {
            tracing::info!(
                request_id = %request_id,
                tenant_host = %tenant_host,
                version = %version,
                target = %target,
                status = %response.status(),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "Proxied request"
            );
            response
        }
        Err(e) => {
            let elapsed_ms = start_time.elapsed().as_millis() as u64;
            match &e {
                DispatchError::Cancelled => tracing::warn!(
                    request_id = %request_id,
                    tenant_host = %tenant_host,
                    version = %version,
                    elapsed_ms,
                    "Request cancelled during backend request"
                ),
                DispatchError::Timeout => tracing::error!(
                    request_id = %request_id,
                    tenant_host = %tenant_host,
                    version = %version,
                    target = %target,
                    elapsed_ms,
                    "Proxy timeout"
                ),
                DispatchError::Transport { source, .. } => tracing::error!(
                    request_id = %request_id,
                    tenant_host = %tenant_host,
                    version = %version,
                    target = %target,
                    error = %source,
                    elapsed_ms,
                    "Proxy connection error"
                ),
                DispatchError::Unexpected(source) => tracing::error!(
                    request_id = %request_id,
                    tenant_host = %tenant_host,
                    version = %version,
                    target = %target,
                    error = %source,
                    elapsed_ms,
                    "Unexpected error during proxy"
                ),
            }
            ProxyError::from(e).into_response()
        }
    }
}
