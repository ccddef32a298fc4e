//! Upstream communication subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound headers + session namespace
//!     → headers.rs (sanitize, synthesize, rebuild Cookie)
//!     → auth.rs (resolve token once, broadcast to every variant)
//!     → client.rs (single call)            for GET and friends
//!     → redirect.rs (manual 3xx walk)      for POST / PUT
//!     → UpstreamResponse (status, headers, buffered body)
//! ```
//!
//! # Design Decisions
//! - One shared client, automatic redirects disabled
//! - Bodies are buffered: the response path rewrites HTML and must drop
//!   Content-Length anyway
//! - No automatic retries except the narrowly scoped login verb fallback

pub mod auth;
pub mod client;
pub mod headers;
pub mod redirect;

pub use auth::AuthToken;
pub use client::{build_client, UpstreamOrigin, UpstreamResponse};
pub use headers::{HeaderBuilder, UpstreamHeaders};
pub use redirect::{RedirectWalker, WalkRequest, WalkResult};
