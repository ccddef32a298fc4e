//! Session multiplexing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (?acc=N, Cookie: S2_sid=..; cf_clearance=..)
//!     → namespace.rs (slot → "S<N>_" prefix)
//!     → jar.rs (session-scoped cookie set, prefix stripped)
//!     → upstream Cookie header
//!
//! Upstream response (Set-Cookie: sid=..; Domain=..; Secure)
//!     → cookie.rs (parse, strip Domain/Secure, emit prefixed + plain)
//!     → client Set-Cookie entries
//! ```
//!
//! # Design Decisions
//! - No server-side session store: the browser's cookie store is the state
//! - Isolation comes from cookie-name prefixes only, no locking
//! - Rewriting is a pure function of (cookie, transport, namespace)

pub mod cookie;
pub mod jar;
pub mod namespace;

pub use cookie::{rewrite_set_cookie, SetCookie};
pub use jar::{CookieJar, InboundCookies};
pub use namespace::{Namespace, SlotId};
