//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → tower-http TraceLayer (per-request spans)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log line of a request
//! - Tenant host, version and target URL logged on every outcome

pub mod logging;
