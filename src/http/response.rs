//! Backend dispatch and response relay.
//!
//! # Responsibilities
//! - Send the outbound request, relay status, headers and body
//! - Stop relaying once the request is cancelled
//! - Map pipeline and backend failures to HTTP status codes
//!
//! # Design Decisions
//! - Response headers are relayed as soon as they arrive; the body streams
//! - Exactly one attempt per request, no retries
//! - Backend timeouts result in 504 Gateway Timeout
//! - Caller cancellation results in 499

use std::error::Error as StdError;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio_util::sync::CancellationToken;

use crate::config::TimeoutConfig;
use crate::http::request::BuildError;

/// Non-standard status for a request the client closed.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Failure while talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("error connecting to backend service ({backend_host})")]
    Transport {
        backend_host: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
    #[error("backend service timed out")]
    Timeout,
    #[error("request cancelled by client")]
    Cancelled,
    #[error("unexpected error while routing the request")]
    Unexpected(#[source] BoxError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Transport { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Cancelled => client_closed_request(),
            DispatchError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Outcome of a request that could not be relayed from the backend.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("X-Tenant-Host header missing")]
    MissingTenantHost,
    #[error("version not found for host {tenant_host}")]
    VersionNotFound { tenant_host: String },
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingTenantHost => StatusCode::BAD_REQUEST,
            ProxyError::VersionNotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::Build(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Dispatch(e) => e.status(),
        }
    }

    /// Short caller-facing message. Never carries internal paths.
    pub fn message(&self) -> String {
        match self {
            ProxyError::MissingTenantHost => "X-Tenant-Host header missing.".to_string(),
            ProxyError::VersionNotFound { tenant_host } => {
                format!("Version not found for host {tenant_host}.")
            }
            ProxyError::Dispatch(DispatchError::Transport { backend_host, .. }) => {
                format!("Error connecting to backend service ({backend_host}).")
            }
            ProxyError::Dispatch(DispatchError::Timeout) => "Backend service timed out.".to_string(),
            ProxyError::Dispatch(DispatchError::Cancelled) => String::new(),
            ProxyError::Build(_) | ProxyError::Dispatch(DispatchError::Unexpected(_)) => {
                "An unexpected error occurred while routing the request.".to_string()
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

/// Sends requests to the backend and relays responses.
#[derive(Debug, Clone)]
pub struct ProxyDispatcher {
    client: Client<HttpConnector, Body>,
    backend_host: String,
    timeout: Duration,
}

impl ProxyDispatcher {
    pub fn new(backend_host: impl Into<String>, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.pool_idle_secs))
            .build(connector);

        Self {
            client,
            backend_host: backend_host.into(),
            timeout: Duration::from_secs(timeouts.backend_secs),
        }
    }

    /// Send `request` and relay the backend response.
    ///
    /// Resolves once response headers arrive; the body keeps streaming from
    /// the backend until it ends or `cancel` fires.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        let pending = tokio::time::timeout(self.timeout, self.client.request(request));

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            outcome = pending => match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(self.classify(e)),
                Err(_elapsed) => return Err(DispatchError::Timeout),
            },
        };

        let (parts, body) = response.into_parts();
        let stream = Body::new(body)
            .into_data_stream()
            .take_until(cancel.clone().cancelled_owned());

        Ok(Response::from_parts(parts, Body::from_stream(stream)))
    }

    fn classify(&self, error: hyper_util::client::legacy::Error) -> DispatchError {
        if error.is_connect() && caused_by_timeout(&error) {
            return DispatchError::Timeout;
        }
        if caused_by_user(&error) {
            return DispatchError::Unexpected(Box::new(error));
        }
        DispatchError::Transport {
            backend_host: self.backend_host.clone(),
            source: error,
        }
    }
}

fn sources<'a>(error: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&e| e.source())
}

fn caused_by_timeout(error: &(dyn StdError + 'static)) -> bool {
    sources(error).any(|e| {
        e.downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
    })
}

/// Errors on our side of the exchange, e.g. the inbound body failing.
fn caused_by_user(error: &(dyn StdError + 'static)) -> bool {
    sources(error).any(|e| e.downcast_ref::<hyper::Error>().is_some_and(hyper::Error::is_user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn dispatcher(backend_secs: u64) -> ProxyDispatcher {
        ProxyDispatcher::new(
            "backend.local",
            &TimeoutConfig {
                backend_secs,
                ..Default::default()
            },
        )
    }

    fn get(addr: std::net::SocketAddr) -> Request<Body> {
        Request::builder()
            .uri(format!("http://{addr}/60843/"))
            .body(Body::empty())
            .unwrap()
    }

    /// Backend that accepts connections and never answers.
    async fn silent_backend() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        addr
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ProxyError::MissingTenantHost.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::VersionNotFound { tenant_host: "a".into() }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ProxyError::from(DispatchError::Timeout).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ProxyError::from(DispatchError::Cancelled).status().as_u16(), 499);
        assert_eq!(
            ProxyError::from(DispatchError::Unexpected("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ProxyError::MissingTenantHost.message(), "X-Tenant-Host header missing.");
        assert_eq!(
            ProxyError::VersionNotFound { tenant_host: "test@ayudalabs.com".into() }.message(),
            "Version not found for host test@ayudalabs.com."
        );
        assert_eq!(ProxyError::from(DispatchError::Timeout).message(), "Backend service timed out.");
        assert_eq!(ProxyError::from(DispatchError::Cancelled).message(), "");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connect failed")]
    struct Wrapped(#[source] std::io::Error);

    #[test]
    fn test_timeout_found_anywhere_in_source_chain() {
        let nested = Wrapped(std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline"));
        assert_eq!(sources(&nested).count(), 2);
        assert!(caused_by_timeout(&nested));

        let refused = Wrapped(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(!caused_by_timeout(&refused));
        assert!(!caused_by_user(&refused));
    }

    #[tokio::test]
    async fn test_cancelled_before_headers() {
        let addr = silent_backend().await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = dispatcher(30).dispatch(get(addr), &cancel).await.unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
        assert_eq!(err.status().as_u16(), 499);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_waits() {
        let addr = silent_backend().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = dispatcher(30).dispatch(get(addr), &cancel).await.unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
    }

    #[tokio::test]
    async fn test_backend_timeout() {
        let addr = silent_backend().await;
        let err = dispatcher(1)
            .dispatch(get(addr), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Timeout));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = dispatcher(5)
            .dispatch(get(addr), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport { ref backend_host, .. } if backend_host == "backend.local"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_relay_stops_after_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nX-Backend: yes\r\n\r\n5\r\nhello\r\n")
                .await
                .unwrap();
            // Never finish the body.
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let cancel = CancellationToken::new();
        let response = dispatcher(5).dispatch(get(addr), &cancel).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-backend"], "yes");

        let mut stream = response.into_body().into_data_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"hello");

        cancel.cancel();
        assert!(stream.next().await.is_none());
    }
}
