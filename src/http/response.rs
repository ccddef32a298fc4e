//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip headers that stop being true once the body is rewritten
//! - Strip CSP so the injected scripts can run
//! - Rewrite Location into the mount, carrying the slot
//! - Double every Set-Cookie into namespaced + plain entries
//! - Forbid caching of anything served through the gateway
//!
//! # Design Decisions
//! - Bodies are buffered, so length and encoding headers are always dropped
//! - Locations on foreign hosts and relative Locations pass through untouched

use axum::http::{header, HeaderMap, HeaderValue};
use url::Url;

use crate::routing::MountPoint;
use crate::session::{rewrite_set_cookie, Namespace};
use crate::upstream::UpstreamOrigin;

const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "content-encoding",
    "content-length",
    "content-security-policy",
    "content-security-policy-report-only",
    "transfer-encoding",
    "connection",
    "keep-alive",
];

/// Normalizes upstream response headers for one inbound request.
pub struct ResponseNormalizer<'a> {
    pub mount: &'a MountPoint,
    pub origin: &'a UpstreamOrigin,
    pub namespace: &'a Namespace,
    pub secure_transport: bool,
    pub excluded_cookies: &'a [String],
}

impl ResponseNormalizer<'_> {
    pub fn normalize(&self, upstream: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(upstream.len() + 2);

        for (name, value) in upstream {
            if STRIPPED_RESPONSE_HEADERS.contains(&name.as_str())
                || name == header::SET_COOKIE
                || name == header::LOCATION
            {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        if let Some(location) = upstream.get(header::LOCATION) {
            let rewritten = location
                .to_str()
                .ok()
                .and_then(|raw| self.rewrite_location(raw))
                .and_then(|raw| HeaderValue::from_str(&raw).ok());
            headers.insert(header::LOCATION, rewritten.unwrap_or_else(|| location.clone()));
        }

        for raw in upstream.get_all(header::SET_COOKIE) {
            let Ok(raw) = raw.to_str() else {
                tracing::debug!("Dropping non-UTF-8 Set-Cookie");
                continue;
            };
            for entry in rewrite_set_cookie(raw, self.secure_transport, self.namespace, self.excluded_cookies) {
                if let Ok(value) = HeaderValue::from_str(&entry) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers
    }

    /// Gateway form of an upstream Location, or `None` to keep it as-is.
    pub fn rewrite_location(&self, location: &str) -> Option<String> {
        let location = location.trim();
        let root_relative = location.starts_with('/') && !location.starts_with("//");
        if root_relative && self.mount.is_mounted(location) {
            return None;
        }

        let absolute = location.starts_with("//") || Url::parse(location).is_ok();
        if !root_relative && !absolute {
            return None;
        }

        let url = self.origin.resolve(location).ok()?;
        if !self.origin.is_upstream(&url) {
            return None;
        }

        let mut out = self
            .mount
            .proxy_path(url.path(), url.query(), self.namespace.slot());
        if let Some(fragment) = url.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        Some(out)
    }
}
