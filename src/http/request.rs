//! Request handling and transformation.
//!
//! # Responsibilities
//! - Extract the tenant host from the inbound request
//! - Rewrite the target URL (`http://<backend>/<version><path><query>`)
//! - Filter hop-by-hop and pseudo headers
//! - Stream the inbound body through when one is declared
//!
//! # Design Decisions
//! - Header values are forwarded as-is, never re-parsed
//! - An inbound `X-Ayuda-Resolved-Path` never reaches the backend; only
//!   the path resolved here is sent
//! - No network I/O happens here

use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri};

/// Header carrying the tenant identity.
pub const X_TENANT_HOST: &str = "x-tenant-host";

/// Header carrying the resolved deployment path to the backend.
pub const X_AYUDA_RESOLVED_PATH: HeaderName = HeaderName::from_static("x-ayuda-resolved-path");

/// Header names never forwarded, regardless of body presence.
const HOP_BY_HOP: &[&str] = &["host", "connection", "transfer-encoding", "keep-alive", "upgrade"];

/// Error building the outbound request.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid target URI `{uri}`: {source}")]
    InvalidTarget {
        uri: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },
    #[error("failed to build outbound request: {0}")]
    Request(#[from] axum::http::Error),
}

/// The tenant host of a request, if present and non-empty.
pub fn tenant_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_TENANT_HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// True when the request declares a positive `Content-Length`.
pub fn declares_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

/// Whether an inbound header may be forwarded to the backend.
pub fn is_forwardable(name: &HeaderName, has_body: bool) -> bool {
    if *name == X_AYUDA_RESOLVED_PATH {
        return false;
    }
    // `HeaderName` is always lowercase.
    let name = name.as_str();
    if name.starts_with(':') || HOP_BY_HOP.contains(&name) {
        return false;
    }
    has_body || !name.starts_with("content-")
}

/// Builds outbound backend requests.
#[derive(Debug, Clone)]
pub struct ProxyRequestBuilder {
    backend_host: String,
    path_base: String,
}

impl ProxyRequestBuilder {
    pub fn new(backend_host: impl Into<String>, path_base: impl Into<String>) -> Self {
        let path_base = path_base.into().trim_end_matches('/').to_string();
        Self {
            backend_host: backend_host.into().trim_end_matches('/').to_string(),
            path_base,
        }
    }

    /// Inbound path with the mount prefix removed.
    ///
    /// The prefix matches ASCII case-insensitively at a segment boundary;
    /// other paths pass through unchanged.
    pub fn forwarded_path<'a>(&self, path: &'a str) -> &'a str {
        let base = self.path_base.as_str();
        if base.is_empty() {
            return if path.is_empty() { "/" } else { path };
        }

        match path.get(..base.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(base) => {
                let rest = &path[base.len()..];
                if rest.is_empty() {
                    "/"
                } else if rest.starts_with('/') {
                    rest
                } else {
                    path
                }
            }
            _ => path,
        }
    }

    /// `http://<backend>/<version><path><query>`
    pub fn target_uri(&self, version: &str, inbound: &Uri) -> Result<Uri, BuildError> {
        let path = self.forwarded_path(inbound.path());
        let uri = match inbound.query() {
            Some(query) => format!("http://{}/{}{}?{}", self.backend_host, version, path, query),
            None => format!("http://{}/{}{}", self.backend_host, version, path),
        };
        uri.parse().map_err(|source| BuildError::InvalidTarget { uri, source })
    }

    /// Reconstruct `inbound` as a request to the backend serving `version`.
    pub fn build(
        &self,
        inbound: Request<Body>,
        version: &str,
        resolved_path: Option<&Path>,
    ) -> Result<Request<Body>, BuildError> {
        let (parts, body) = inbound.into_parts();
        let target = self.target_uri(version, &parts.uri)?;
        let has_body = declares_body(&parts.headers);

        let mut builder = Request::builder().method(parts.method).uri(target);

        if let Some(headers) = builder.headers_mut() {
            for (name, value) in parts.headers.iter() {
                if is_forwardable(name, has_body) {
                    headers.append(name.clone(), value.clone());
                }
            }

            if let Some(path) = resolved_path {
                let path = path.to_string_lossy();
                match HeaderValue::from_bytes(path.as_bytes()) {
                    Ok(value) => {
                        headers.insert(X_AYUDA_RESOLVED_PATH, value);
                    }
                    Err(_) => {
                        // Paths with control characters cannot travel in a header.
                        tracing::warn!(path = %path, "Resolved path is not a valid header value");
                    }
                }
            }
        }

        let body = if has_body { body } else { Body::empty() };
        Ok(builder.body(body)?)
    }
}
