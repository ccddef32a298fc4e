//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the upstream origin and mount path are usable
//! - Validate value ranges (timeouts > 0, sentinel status)
//! - Detect duplicate credential slots
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.origin) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                errors.push(ValidationError::new(
                    "upstream.origin",
                    "scheme must be http or https",
                ));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::new("upstream.origin", "missing host"));
            }
        }
        Err(e) => errors.push(ValidationError::new(
            "upstream.origin",
            format!("invalid URL: {}", e),
        )),
    }

    let mount = &config.mount.path;
    if !mount.starts_with('/') || mount.ends_with('/') || mount.len() < 2 {
        errors.push(ValidationError::new(
            "mount.path",
            "must start with '/', must not end with '/' and must not be '/'",
        ));
    }

    if config.mount.slot_param.is_empty() {
        errors.push(ValidationError::new("mount.slot_param", "must not be empty"));
    }

    if config.redirects.max_redirects == 0 {
        errors.push(ValidationError::new(
            "redirects.max_redirects",
            "must be at least 1",
        ));
    }

    let sentinel = config.redirects.sentinel_status;
    if !(100..=999).contains(&sentinel) || (300..400).contains(&sentinel) {
        errors.push(ValidationError::new(
            "redirects.sentinel_status",
            "must be a non-3xx status code between 100 and 999",
        ));
    }

    if config.timeouts.connect_secs == 0
        || config.timeouts.request_secs == 0
        || config.timeouts.redirect_walk_secs == 0
    {
        errors.push(ValidationError::new("timeouts", "all timeouts must be > 0"));
    }

    for variant in &config.upstream.auth_headers {
        if axum::http::HeaderName::from_bytes(variant.name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "upstream.auth_headers",
                format!("'{}' is not a valid header name", variant.name),
            ));
        }
    }

    let mut seen = HashSet::new();
    for creds in &config.credentials {
        if creds.slot == 0 {
            errors.push(ValidationError::new("credentials.slot", "slots start at 1"));
        } else if !seen.insert(creds.slot) {
            errors.push(ValidationError::new(
                "credentials.slot",
                format!("slot {} configured twice", creds.slot),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
