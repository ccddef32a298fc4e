//! Outbound header construction.
//!
//! # Responsibilities
//! - Pass inbound headers through, minus topology and hop-by-hop headers
//! - Pin Origin/Referer to the upstream and mark requests same-origin XHR
//! - Rebuild the client-IP chain from the inbound forwarded-for chain
//! - Rebuild the Cookie header from the session's own cookies
//! - Resolve the auth token and broadcast it
//! - Fill in device/locale headers the upstream insists on
//!
//! # Design Decisions
//! - The inbound Cookie header is never forwarded as-is; other sessions'
//!   cookies share the same browser store
//! - `accept-encoding: identity` so response bodies can be rewritten

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::UpstreamConfig;
use crate::session::{CookieJar, InboundCookies, Namespace};
use crate::upstream::auth::{apply_token, AuthToken, TokenResolver, TokenSource};
use crate::upstream::client::UpstreamOrigin;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Headers that reveal proxy topology or only make sense on one hop.
const STRIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "cdn-loop",
    "true-client-ip",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-forwarded-port",
    "forwarded",
    "via",
    "x-request-id",
    "cookie",
    X_FORWARDED_FOR,
    X_REAL_IP,
];

/// Everything needed to issue calls for one inbound request.
#[derive(Debug, Clone)]
pub struct UpstreamHeaders {
    /// Complete outbound header set, Cookie included.
    pub headers: HeaderMap,
    /// The session-scoped cookies behind the Cookie header.
    pub jar: CookieJar,
    pub token_source: Option<TokenSource>,
}

/// Builds upstream header sets for one configuration.
pub struct HeaderBuilder<'a> {
    config: &'a UpstreamConfig,
    origin: &'a UpstreamOrigin,
}

impl<'a> HeaderBuilder<'a> {
    pub fn new(config: &'a UpstreamConfig, origin: &'a UpstreamOrigin) -> Self {
        Self { config, origin }
    }

    pub fn build(
        &self,
        inbound: &HeaderMap,
        peer: Option<IpAddr>,
        namespace: &Namespace,
    ) -> UpstreamHeaders {
        let mut headers = inbound.clone();
        for name in STRIPPED_HEADERS {
            headers.remove(*name);
        }

        if let Some(chain) = forwarded_chain(inbound, peer) {
            insert_str(&mut headers, X_REAL_IP, &chain[0]);
            insert_str(&mut headers, X_FORWARDED_FOR, &chain.join(", "));
        }

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        insert_str(&mut headers, "origin", self.origin.as_str());
        insert_str(&mut headers, "referer", &format!("{}/", self.origin.as_str()));
        headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
        headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));

        let browser = InboundCookies::from_headers(inbound);
        let jar = browser.scoped(namespace, &self.config.essential_cookies);
        if let Some(cookie) = jar.header_value() {
            insert_str(&mut headers, "cookie", &cookie);
        }

        let resolved = TokenResolver::new(self.config).resolve(inbound, &jar, &browser, namespace.slot());
        let token: Option<&AuthToken> = resolved.as_ref().map(|(t, _)| t);
        apply_token(&mut headers, token, &self.config.auth_headers);

        for (name, value) in &self.config.default_headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            if headers.contains_key(&name) {
                continue;
            }
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(name, value);
            }
        }

        UpstreamHeaders {
            headers,
            jar,
            token_source: resolved.map(|(_, source)| source),
        }
    }
}

/// Client-IP chain: inbound forwarded-for entries, else `x-real-ip`, else the peer.
fn forwarded_chain(inbound: &HeaderMap, peer: Option<IpAddr>) -> Option<Vec<String>> {
    let chain: Vec<String> = inbound
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();
    if !chain.is_empty() {
        return Some(chain);
    }

    let real_ip = inbound
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match (real_ip, peer) {
        (Some(ip), _) => Some(vec![ip.to_string()]),
        (None, Some(peer)) => Some(vec![peer.to_string()]),
        (None, None) => None,
    }
}

fn insert_str(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
