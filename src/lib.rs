//! Tenant-aware reverse proxy.
//!
//! Routes each request to the backend deployment serving the calling
//! tenant's software version.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
