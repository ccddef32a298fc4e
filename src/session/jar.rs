//! Request-side cookie handling.
//!
//! `InboundCookies` is the browser's whole cookie store as sent on one request;
//! `CookieJar` is the slice of it one session may forward upstream, and the
//! working jar of a redirect walk.

use axum::http::{header, HeaderMap};

use crate::session::cookie::SetCookie;
use crate::session::namespace::{split_namespaced, Namespace};

/// All `name=value` pairs from the inbound `Cookie` header(s).
#[derive(Debug, Clone, Default)]
pub struct InboundCookies {
    pairs: Vec<(String, String)>,
}

impl InboundCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let pairs = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .collect();
        Self { pairs }
    }

    /// Look up an un-namespaced cookie by its exact name. Last one wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Cookies the given session may send upstream: its own namespaced
    /// cookies (prefix stripped) plus the essential unprefixed ones.
    pub fn scoped(&self, namespace: &Namespace, essential: &[String]) -> CookieJar {
        let mut jar = CookieJar::new();

        for (name, value) in &self.pairs {
            if essential.iter().any(|e| e == name) {
                jar.set(name, value);
            }
        }
        // Namespaced copies override an essential cookie of the same name.
        for (name, value) in &self.pairs {
            if let Some(stripped) = namespace.strip(name) {
                jar.set(stripped, value);
            }
        }

        jar
    }

    /// Whether another slot holds a namespaced copy of `name`.
    ///
    /// The plain copy of such a cookie mirrors whichever slot wrote last, so
    /// it cannot be attributed to `namespace`.
    pub fn claimed_by_other_slot(&self, name: &str, namespace: &Namespace) -> bool {
        self.pairs.iter().any(|(n, _)| {
            split_namespaced(n)
                .is_some_and(|(slot, bare)| bare == name && slot != namespace.slot())
        })
    }
}

fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Ordered name → value cookie set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cookie, keeping its original position on replace.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Apply an upstream `Set-Cookie` to the jar.
    pub fn store(&mut self, cookie: &SetCookie) {
        if cookie.is_removal() {
            self.remove(cookie.name());
        } else {
            self.set(cookie.name(), cookie.value());
        }
    }

    /// Serialize as a `Cookie` header value; `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

}
