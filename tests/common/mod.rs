//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app_router::{HttpServer, ProxyConfig, Shutdown};
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// What a mock service saw.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Requests recorded by a mock service.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<RecordedRequest>>>);

impl Recorder {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<RecordedRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> RecordedRequest {
        self.0.lock().unwrap().last().cloned().expect("no request recorded")
    }

    async fn record(&self, request: Request<Body>) {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        self.0.lock().unwrap().push(RecordedRequest {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start a mock version-lookup service.
///
/// `answer` maps a tenant host to the status and JSON body to return.
pub async fn start_lookup<F>(answer: F) -> (SocketAddr, Recorder)
where
    F: Fn(&str) -> (u16, String) + Clone + Send + Sync + 'static,
{
    let recorder = Recorder::default();
    let rec = recorder.clone();
    let router = Router::new().fallback(move |request: Request<Body>| {
        let rec = rec.clone();
        let answer = answer.clone();
        async move {
            let host = request
                .uri()
                .path()
                .strip_prefix("/get_version/")
                .and_then(|rest| rest.strip_suffix('/'))
                .unwrap_or_default()
                .to_string();
            rec.record(request).await;
            let (status, body) = answer(&host);
            (
                StatusCode::from_u16(status).unwrap(),
                [("content-type", "application/json")],
                body,
            )
                .into_response()
        }
    });
    (serve(router).await, recorder)
}

/// Lookup service answering every tenant with `release`.
pub async fn start_fixed_lookup(release: &'static str) -> (SocketAddr, Recorder) {
    start_lookup(move |_| (200, format!(r#"{{"version":"{release}"}}"#))).await
}

/// Start a mock backend that records requests and answers after `delay`.
///
/// Responds `201` with a text body and a repeated `set-cookie` header.
pub async fn start_backend(delay: Duration) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let rec = recorder.clone();
    let router = Router::new().fallback(move |request: Request<Body>| {
        let rec = rec.clone();
        async move {
            rec.record(request).await;
            tokio::time::sleep(delay).await;
            let mut headers = HeaderMap::new();
            headers.insert("content-type", "text/plain".parse().unwrap());
            headers.insert("x-backend", "mock".parse().unwrap());
            headers.append("set-cookie", "a=1".parse().unwrap());
            headers.append("set-cookie", "b=2".parse().unwrap());
            (StatusCode::CREATED, headers, "backend says hi").into_response()
        }
    });
    (serve(router).await, recorder)
}

/// Start a raw TCP backend that reads the request then hangs up without
/// answering. Returns the number of connections it accepted.
pub async fn start_hangup_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (addr, accepted)
}

/// Config pointing at the given lookup service and backend.
pub fn router_config(lookup: SocketAddr, backend: SocketAddr, deployment_root: &std::path::Path) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.host = backend.to_string();
    config.version_lookup.api_url = format!("http://{lookup}");
    config.version_lookup.token = "secret".into();
    config.deployments.root = deployment_root.to_path_buf();
    config
}

/// Start the router on an ephemeral port.
pub async fn start_router(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, shutdown.token()).unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
