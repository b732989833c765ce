//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! X-Tenant-Host
//!     → tenant.rs (environment category, logged only)
//!     → version.rs (lookup service → routable version, or absent)
//!     → deployment.rs (environment roots → deployment path, or absent)
//!     → Return: version + optional path for the request builder
//! ```
//!
//! # Design Decisions
//! - Misses are values (`Option`), not errors
//! - Environment priority is injected and immutable at runtime
//! - Deterministic: iteration order is the priority order

pub mod deployment;
pub mod tenant;
pub mod version;

pub use deployment::{BackendPathResolver, EnvironmentPriority};
pub use tenant::{classify, InvalidTenantHost, TenantEnvironment};
pub use version::{ResolvedVersion, VersionLookupError, VersionResolver};
