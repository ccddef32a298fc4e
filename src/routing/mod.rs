//! Path routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound path (/app/api/v1/me?acc=2)
//!     → mount.rs (strip mount → /api/v1/me, drop slot parameter)
//!     → matcher.rs (API sub-path or SPA page?)
//!     → upstream URL / rewritten Location / script hints
//! ```
//!
//! # Design Decisions
//! - Matchers compiled at startup, immutable at runtime
//! - No regex in hot path (prefix and segment checks only)
//! - API paths never carry the slot parameter; the SPA calls them directly

pub mod matcher;
pub mod mount;

pub use matcher::{ApiPathMatcher, PathMatcher};
pub use mount::MountPoint;
