//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, pipeline)
//!     → [routing layer resolves version + deployment path]
//!     → request.rs (target URL, header filtering, body pass-through)
//!     → response.rs (dispatch, relay, error → status mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ProxyRequestBuilder, X_AYUDA_RESOLVED_PATH, X_TENANT_HOST};
pub use response::{DispatchError, ProxyDispatcher, ProxyError};
pub use server::{AppState, HttpServer, ServerError};
