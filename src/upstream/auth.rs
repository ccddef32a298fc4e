//! Auth token resolution and broadcast.
//!
//! # Resolution Order
//! 1. An explicit auth header supplied by the caller
//! 2. The token field of the JSON auth cookie (raw or percent-encoded)
//! 3. The secondary token cookie, used as-is
//!
//! Cookies are read from the session-scoped jar. Only the default slot may
//! fall back to the browser's un-namespaced copy, which mirrors whichever
//! session wrote last, and only while no other slot holds a namespaced copy.

use std::fmt;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::{AuthHeaderVariant, UpstreamConfig};
use crate::session::{CookieJar, InboundCookies, Namespace, SlotId};

/// An opaque bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Where a token was found, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    JsonCookie,
    SecondaryCookie,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Header => "header",
            TokenSource::JsonCookie => "json_cookie",
            TokenSource::SecondaryCookie => "secondary_cookie",
        }
    }
}

/// Resolves the token for one inbound request.
pub struct TokenResolver<'a> {
    config: &'a UpstreamConfig,
}

impl<'a> TokenResolver<'a> {
    pub fn new(config: &'a UpstreamConfig) -> Self {
        Self { config }
    }

    pub fn resolve(
        &self,
        inbound: &HeaderMap,
        session: &CookieJar,
        browser: &InboundCookies,
        slot: SlotId,
    ) -> Option<(AuthToken, TokenSource)> {
        if let Some(token) = self.from_headers(inbound) {
            return Some((token, TokenSource::Header));
        }

        let namespace = Namespace::for_slot(slot);
        let cookie = |name: &str| -> Option<String> {
            session
                .get(name)
                .or_else(|| {
                    let unclaimed =
                        slot.is_default() && !browser.claimed_by_other_slot(name, &namespace);
                    unclaimed.then(|| browser.get(name)).flatten()
                })
                .map(str::to_string)
        };

        if let Some(token) = cookie(&self.config.token_cookie)
            .and_then(|raw| token_from_json(&raw, &self.config.token_field))
        {
            return Some((token, TokenSource::JsonCookie));
        }

        cookie(&self.config.secondary_token_cookie)
            .and_then(AuthToken::new)
            .map(|t| (t, TokenSource::SecondaryCookie))
    }

    fn from_headers(&self, inbound: &HeaderMap) -> Option<AuthToken> {
        self.config.auth_headers.iter().find_map(|variant| {
            let value = inbound.get(variant.name.as_str())?.to_str().ok()?;
            AuthToken::new(strip_scheme(value, variant.scheme.as_deref()))
        })
    }
}

fn strip_scheme<'v>(value: &'v str, scheme: Option<&str>) -> &'v str {
    let value = value.trim();
    let Some(scheme) = scheme else {
        return value;
    };
    match value.split_once(' ') {
        Some((head, rest)) if head.eq_ignore_ascii_case(scheme) => rest.trim(),
        None if value.eq_ignore_ascii_case(scheme) => "",
        _ => value,
    }
}

/// Extract `field` from a JSON cookie value, accepting percent-encoding.
pub fn token_from_json(raw: &str, field: &str) -> Option<AuthToken> {
    let parse = |text: &str| -> Option<AuthToken> {
        let doc: serde_json::Value = serde_json::from_str(text).ok()?;
        doc.get(field)?.as_str().and_then(AuthToken::new)
    };

    let trimmed = raw.trim().trim_matches('"');
    parse(trimmed).or_else(|| {
        let decoded = urlencoding::decode(trimmed).ok()?;
        parse(&decoded)
    })
}

/// Write the token into every variant, or drop empty variants when there is
/// no token.
pub fn apply_token(headers: &mut HeaderMap, token: Option<&AuthToken>, variants: &[AuthHeaderVariant]) {
    for variant in variants {
        let Ok(name) = HeaderName::from_bytes(variant.name.as_bytes()) else {
            continue;
        };

        match token {
            Some(token) => {
                let rendered = match &variant.scheme {
                    Some(scheme) => format!("{} {}", scheme, token.as_str()),
                    None => token.as_str().to_string(),
                };
                match HeaderValue::from_str(&rendered) {
                    Ok(value) => {
                        headers.insert(name, value);
                    }
                    Err(_) => {
                        tracing::warn!(header = %variant.name, "Token is not a valid header value");
                    }
                }
            }
            None => {
                let empty = headers
                    .get(&name)
                    .map(|v| {
                        v.to_str()
                            .map(|s| strip_scheme(s, variant.scheme.as_deref()).is_empty())
                            .unwrap_or(false)
                    })
                    .unwrap_or(false);
                if empty {
                    headers.remove(&name);
                }
            }
        }
    }
}
