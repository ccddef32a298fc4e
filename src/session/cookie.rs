//! Set-Cookie parsing and client-facing rewriting.
//!
//! # Responsibilities
//! - Parse upstream `Set-Cookie` values into name, value and attributes
//! - Bind cookies to the gateway host (drop `Domain`)
//! - Make cookies usable over plain HTTP (drop `Secure`, `SameSite=None` → `Lax`)
//! - Emit each cookie under the session prefix and under its real name
//!
//! # Design Decisions
//! - Attribute order and unknown attributes are preserved
//! - Values are never decoded or re-encoded
//! - Unparsable values pass through untouched

use std::fmt;

use crate::session::namespace::Namespace;

/// One `; Name[=Value]` attribute of a Set-Cookie header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttribute {
    pub name: String,
    pub value: Option<String>,
}

impl CookieAttribute {
    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A parsed `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    attributes: Vec<CookieAttribute>,
}

impl SetCookie {
    /// Parse a raw header value. Returns `None` when there is no `name=value`
    /// pair or the name is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut segments = raw.split(';');
        let (name, value) = segments.next()?.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let attributes = segments
            .map(str::trim)
            .filter(|attr| !attr.is_empty())
            .map(|attr| match attr.split_once('=') {
                Some((n, v)) => CookieAttribute {
                    name: n.trim().to_string(),
                    value: Some(v.trim().to_string()),
                },
                None => CookieAttribute {
                    name: attr.to_string(),
                    value: None,
                },
            })
            .collect();

        Some(Self {
            name: name.to_string(),
            value: value.trim().to_string(),
            attributes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether a flag or valued attribute is present.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.is(name))
    }

    /// Value of an attribute, if present with a value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.is(name))
            .and_then(|a| a.value.as_deref())
    }

    pub fn max_age(&self) -> Option<i64> {
        self.attribute("Max-Age").and_then(|v| v.parse().ok())
    }

    /// True when the upstream asks the client to delete the cookie.
    pub fn is_removal(&self) -> bool {
        self.value.is_empty() || self.max_age().is_some_and(|age| age <= 0)
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|a| !a.is(name));
    }

    /// Copy of this cookie under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Rebind the cookie to whatever host serves it, and relax transport
    /// requirements when that host is reached over plain HTTP.
    pub fn localize(&mut self, secure_transport: bool) {
        self.remove_attribute("Domain");
        if secure_transport {
            return;
        }

        self.remove_attribute("Secure");
        for attr in self.attributes.iter_mut().filter(|a| a.is("SameSite")) {
            if attr
                .value
                .as_deref()
                .is_some_and(|v| v.eq_ignore_ascii_case("none"))
            {
                attr.value = Some("Lax".to_string());
            }
        }
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        for attr in &self.attributes {
            match &attr.value {
                Some(v) => write!(f, "; {}={}", attr.name, v)?,
                None => write!(f, "; {}", attr.name)?,
            }
        }
        Ok(())
    }
}

/// Rewrite one upstream `Set-Cookie` value into the entries sent to the client.
///
/// Every cookie is emitted as two independent values, namespaced first,
/// except names listed in `excluded` which keep their real name only.
pub fn rewrite_set_cookie(
    raw: &str,
    secure_transport: bool,
    namespace: &Namespace,
    excluded: &[String],
) -> Vec<String> {
    let Some(mut cookie) = SetCookie::parse(raw) else {
        return vec![raw.to_string()];
    };

    cookie.localize(secure_transport);

    if excluded.iter().any(|name| name == cookie.name()) {
        return vec![cookie.to_string()];
    }

    let scoped = cookie.renamed(namespace.apply(cookie.name()));
    vec![scoped.to_string(), cookie.to_string()]
}
