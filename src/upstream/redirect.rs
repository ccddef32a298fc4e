//! Manual redirect walking for state-changing calls.
//!
//! # Algorithm
//! ```text
//! loop (at most max_redirects + 1 calls):
//!     Cookie  ← working jar
//!     Referer ← current hop origin
//!     send (no automatic redirects)
//!     every Set-Cookie → accumulated list + working jar
//!     3xx + Location on upstream host → next hop, same method and body
//!     anything else                    → terminal response + accumulated cookies
//! budget exhausted → sentinel status, empty body
//! ```
//!
//! # Design Decisions
//! - The original verb is replayed on every hop; upstream login flows expect it
//! - The working jar is separate from the namespaced cookies the browser gets
//! - Locations leaving the upstream host end the walk instead of being followed
//! - The whole walk has a wall-clock deadline

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Client;
use url::Url;

use crate::config::AuthHeaderVariant;
use crate::error::GatewayError;
use crate::session::{CookieJar, SetCookie};
use crate::upstream::client::{send, UpstreamOrigin, UpstreamResponse};

/// Headers kept when replaying a failed login with the alternate verb.
const MINIMAL_HEADERS: &[&str] = &[
    "content-type",
    "accept",
    "accept-language",
    "user-agent",
    "origin",
    "referer",
    "cookie",
];

/// One state-changing call to walk.
#[derive(Debug, Clone)]
pub struct WalkRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub jar: CookieJar,
    pub body: Bytes,
}

/// Result of a walk. `response.headers` carries every Set-Cookie seen on the
/// way, in arrival order.
#[derive(Debug, Clone)]
pub struct WalkResult {
    pub response: UpstreamResponse,
    /// Redirects followed.
    pub hops: u32,
    pub budget_exceeded: bool,
}

/// Drives redirect walks against one upstream.
pub struct RedirectWalker<'a> {
    client: &'a Client,
    origin: &'a UpstreamOrigin,
    max_redirects: u32,
    sentinel: StatusCode,
    deadline: Duration,
}

impl<'a> RedirectWalker<'a> {
    pub fn new(
        client: &'a Client,
        origin: &'a UpstreamOrigin,
        max_redirects: u32,
        sentinel: StatusCode,
        deadline: Duration,
    ) -> Self {
        Self {
            client,
            origin,
            max_redirects,
            sentinel,
            deadline,
        }
    }

    /// Walk a request, bounded by the wall-clock deadline.
    pub async fn walk(&self, request: WalkRequest) -> Result<WalkResult, GatewayError> {
        match tokio::time::timeout(self.deadline, self.walk_hops(request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.deadline.as_secs())),
        }
    }

    /// Walk a login call; if PUT fails, replay it once as POST with the
    /// minimal header set.
    pub async fn walk_login(
        &self,
        request: WalkRequest,
        auth_headers: &[AuthHeaderVariant],
    ) -> Result<WalkResult, GatewayError> {
        let fallback = (request.method == Method::PUT).then(|| WalkRequest {
            method: Method::POST,
            headers: minimal_headers(&request.headers, auth_headers),
            ..request.clone()
        });

        let first = self.walk(request).await;
        let Some(fallback) = fallback else {
            return first;
        };
        if !self.login_failed(&first) {
            return first;
        }

        match &first {
            Ok(result) => tracing::info!(
                status = result.response.status.as_u16(),
                "Login via PUT rejected, retrying with POST"
            ),
            Err(e) => tracing::info!(error = %e, "Login via PUT failed, retrying with POST"),
        }
        self.walk(fallback).await
    }

    fn login_failed(&self, outcome: &Result<WalkResult, GatewayError>) -> bool {
        match outcome {
            Ok(result) => {
                let status = result.response.status;
                !result.budget_exceeded
                    && status != self.sentinel
                    && (status.is_client_error() || status.is_server_error())
            }
            Err(e) => e.is_transport(),
        }
    }

    async fn walk_hops(&self, request: WalkRequest) -> Result<WalkResult, GatewayError> {
        let WalkRequest {
            method,
            mut url,
            headers,
            mut jar,
            body,
        } = request;
        let mut accumulated: Vec<HeaderValue> = Vec::new();
        let mut hops = 0u32;

        loop {
            let mut hop_headers = headers.clone();
            match jar.header_value().and_then(|c| HeaderValue::from_str(&c).ok()) {
                Some(cookie) => {
                    hop_headers.insert(header::COOKIE, cookie);
                }
                None => {
                    hop_headers.remove(header::COOKIE);
                }
            }
            if let Ok(referer) = HeaderValue::from_str(&format!("{}/", url.origin().ascii_serialization())) {
                hop_headers.insert(header::REFERER, referer);
            }

            let response = send(self.client, method.clone(), url.clone(), hop_headers, body.clone()).await?;

            for raw in response.headers.get_all(header::SET_COOKIE) {
                accumulated.push(raw.clone());
                if let Some(cookie) = raw.to_str().ok().and_then(SetCookie::parse) {
                    jar.store(&cookie);
                }
            }

            let next = response
                .status
                .is_redirection()
                .then(|| response.location())
                .flatten()
                .and_then(|location| self.origin.resolve(location).ok())
                .filter(|next| self.origin.is_upstream(next));

            let Some(next) = next else {
                tracing::debug!(hops, status = response.status.as_u16(), "Redirect walk finished");
                return Ok(WalkResult {
                    response: merge_cookies(response, accumulated),
                    hops,
                    budget_exceeded: false,
                });
            };

            if hops >= self.max_redirects {
                tracing::warn!(
                    max_redirects = self.max_redirects,
                    url = %url,
                    "Redirect budget exceeded"
                );
                return Ok(WalkResult {
                    response: self.sentinel_response(accumulated),
                    hops,
                    budget_exceeded: true,
                });
            }

            tracing::debug!(hop = hops + 1, from = %url, to = %next, "Following redirect");
            hops += 1;
            url = next;
        }
    }

    fn sentinel_response(&self, accumulated: Vec<HeaderValue>) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        for cookie in accumulated {
            headers.append(header::SET_COOKIE, cookie);
        }
        UpstreamResponse {
            status: self.sentinel,
            headers,
            body: Bytes::new(),
        }
    }
}

/// Replace a response's own Set-Cookie entries with everything accumulated.
fn merge_cookies(mut response: UpstreamResponse, accumulated: Vec<HeaderValue>) -> UpstreamResponse {
    response.headers.remove(header::SET_COOKIE);
    for cookie in accumulated {
        response.headers.append(header::SET_COOKIE, cookie);
    }
    response
}

/// Headers kept for the login verb fallback: content negotiation, origin
/// pinning, cookies and the auth variants.
pub fn minimal_headers(headers: &HeaderMap, auth_headers: &[AuthHeaderVariant]) -> HeaderMap {
    let mut out = HeaderMap::new();
    let keep = MINIMAL_HEADERS
        .iter()
        .copied()
        .chain(auth_headers.iter().map(|v| v.name.as_str()));
    for name in keep {
        for value in headers.get_all(name) {
            if let Ok(name) = header::HeaderName::from_bytes(name.as_bytes()) {
                out.append(name, value.clone());
            }
        }
    }
    out
}

/// Whether an upstream path is a login endpoint eligible for the fallback.
pub fn is_login_path(path: &str, login_paths: &[String]) -> bool {
    let path = path.trim_end_matches('/');
    login_paths
        .iter()
        .any(|p| p.trim_end_matches('/') == path)
}
