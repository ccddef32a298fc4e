//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request path produces:
//!     → logging.rs (structured log events, EnvFilter)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (per-request span carrying the request ID)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to the span, so every event inherits it
//! - Metric calls are no-ops until a recorder is installed
//! - Tokens and passwords never appear as fields

pub mod logging;
pub mod metrics;
pub mod tracing;
