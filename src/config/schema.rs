//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// The embedded third-party application.
    pub upstream: UpstreamConfig,

    /// Where the upstream is exposed on this host.
    pub mount: MountConfig,

    /// Client-side SPA behaviour driven by the injected scripts.
    pub spa: SpaConfig,

    /// Manual redirect walking for state-changing calls.
    pub redirects: RedirectConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Per-slot credentials for the auto-fill script.
    pub credentials: Vec<SlotCredentials>,
}

impl GatewayConfig {
    /// Credentials configured for a slot, if any.
    pub fn credentials_for(&self, slot: u32) -> Option<&SlotCredentials> {
        self.credentials.iter().find(|c| c.slot == slot)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// One entry of the auth header broadcast list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthHeaderVariant {
    /// Header name, lowercase.
    pub name: String,

    /// Optional scheme written before the token (e.g. "Bearer").
    #[serde(default)]
    pub scheme: Option<String>,
}

impl AuthHeaderVariant {
    fn new(name: &str, scheme: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            scheme: scheme.map(str::to_string),
        }
    }
}

/// Upstream application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Origin of the embedded application (e.g. "https://app.example.com").
    pub origin: String,

    /// Path prefixes served by the upstream JSON API.
    /// Versioned first segments (`/v1`, `/v2`, ...) always count as API paths.
    pub api_prefixes: Vec<String>,

    /// Unprefixed cookies forwarded for every slot.
    pub essential_cookies: Vec<String>,

    /// Cookies emitted to the client under their real name only.
    pub excluded_cookies: Vec<String>,

    /// Cookie holding a JSON document with the auth token.
    pub token_cookie: String,

    /// Field of the JSON document holding the token.
    pub token_field: String,

    /// Cookie used directly as the token when the JSON cookie is absent.
    pub secondary_token_cookie: String,

    /// Every header the upstream may read the token from.
    pub auth_headers: Vec<AuthHeaderVariant>,

    /// Headers added when the caller did not supply them.
    pub default_headers: BTreeMap<String, String>,

    /// Login endpoints eligible for the PUT to POST fallback.
    pub login_paths: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let default_headers = [
            ("accept-language", "en-US,en;q=0.9"),
            ("x-platform", "web"),
            ("x-locale", "en-US"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            origin: "https://upstream.example".to_string(),
            api_prefixes: vec!["/api".to_string()],
            essential_cookies: vec!["cf_clearance".to_string(), "__cf_bm".to_string()],
            excluded_cookies: vec!["cf_clearance".to_string(), "__cf_bm".to_string()],
            token_cookie: "auth".to_string(),
            token_field: "access_token".to_string(),
            secondary_token_cookie: "token".to_string(),
            auth_headers: vec![
                AuthHeaderVariant::new("authorization", Some("Bearer")),
                AuthHeaderVariant::new("x-access-token", None),
                AuthHeaderVariant::new("x-auth-token", None),
                AuthHeaderVariant::new("access-token", None),
            ],
            default_headers,
            login_paths: vec![
                "/api/auth/login".to_string(),
                "/api/v1/auth/login".to_string(),
            ],
        }
    }
}

/// Mount point of the upstream on this host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MountConfig {
    /// Path prefix, no trailing slash (e.g. "/app").
    pub path: String,

    /// Query parameter selecting the session slot.
    pub slot_param: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            path: "/app".to_string(),
            slot_param: "acc".to_string(),
        }
    }
}

/// Client-side routing hints for the injected scripts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpaConfig {
    /// Route the SPA is forced to on first load (login screen).
    pub entry_route: String,

    /// Route reached once a session exists.
    pub authenticated_route: String,

    /// Cookie whose appearance signals an authenticated session.
    pub session_cookie: String,

    /// Poll interval of the loader overlay and session watcher.
    pub poll_interval_ms: u64,

    /// Show the loading overlay on the entry route.
    pub overlay_enabled: bool,

    /// Auto-fill attempts before giving up.
    pub autofill_max_attempts: u32,

    /// Delay between auto-fill attempts.
    pub autofill_interval_ms: u64,
}

impl Default for SpaConfig {
    fn default() -> Self {
        Self {
            entry_route: "/login".to_string(),
            authenticated_route: "/dashboard".to_string(),
            session_cookie: "session".to_string(),
            poll_interval_ms: 500,
            overlay_enabled: true,
            autofill_max_attempts: 60,
            autofill_interval_ms: 500,
        }
    }
}

/// Redirect walking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Maximum number of redirects followed in one walk.
    pub max_redirects: u32,

    /// Status returned when the walk exceeds `max_redirects`.
    pub sentinel_status: u16,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            sentinel_status: 599,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Wall-clock bound of a whole redirect walk in seconds.
    pub redirect_walk_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 60,
            redirect_walk_secs: 30,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,

    /// Treat `x-forwarded-proto: https` as a secure transport.
    pub trust_forwarded_proto: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            trust_forwarded_proto: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Login credentials for one slot.
#[derive(Clone, Deserialize, Serialize)]
pub struct SlotCredentials {
    pub slot: u32,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SlotCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotCredentials")
            .field("slot", &self.slot)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            origin = "https://chat.example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.origin, "https://chat.example.org");
        assert_eq!(config.mount.path, "/app");
        assert_eq!(config.mount.slot_param, "acc");
        assert_eq!(config.redirects.max_redirects, 5);
        assert_eq!(config.redirects.sentinel_status, 599);
        assert_eq!(config.upstream.auth_headers.len(), 4);
    }

    #[test]
    fn credentials_are_looked_up_by_slot() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[credentials]]
            slot = 2
            email = "two@example.com"
            password = "hunter2"
            "#,
        )
        .unwrap();

        assert!(config.credentials_for(1).is_none());
        assert_eq!(config.credentials_for(2).unwrap().email, "two@example.com");
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = SlotCredentials {
            slot: 1,
            email: "a@b.c".into(),
            password: "secret".into(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret"));
    }
}
