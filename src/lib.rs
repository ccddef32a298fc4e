//! Multiplexed SPA reverse-proxy gateway.
//!
//! Embeds one third-party single-page application under a mount path and
//! lets several independent sessions (slots) against it share one browser.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rewrite;
pub mod routing;
pub mod session;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
