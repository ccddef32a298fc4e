//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, dispatch)
//!     → request.rs (slot, upstream path, transport security)
//!     → upstream (header builder, single call or redirect walk)
//!     → response.rs (strip, Location, Set-Cookie, no-store)
//!     → rewrite (HTML only)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestTarget, UuidRequestId, X_REQUEST_ID};
pub use response::ResponseNormalizer;
pub use server::{GatewayContext, HttpServer, ServerError};
