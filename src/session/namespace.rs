//! Slot selection and cookie-name namespacing.

use std::fmt;

use url::form_urlencoded;

/// A client-chosen session slot. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    /// Slot used when the client does not select one.
    pub const DEFAULT: SlotId = SlotId(1);

    /// Build a slot, mapping 0 to the default slot.
    pub fn new(raw: u32) -> Self {
        if raw == 0 {
            Self::DEFAULT
        } else {
            Self(raw)
        }
    }

    /// Parse a raw parameter value. Anything that is not a positive integer
    /// resolves to the default slot.
    pub fn parse(raw: &str) -> Self {
        raw.trim().parse::<u32>().map(Self::new).unwrap_or(Self::DEFAULT)
    }

    /// Read the slot from a raw query string.
    pub fn from_query(query: Option<&str>, param: &str) -> Self {
        query
            .and_then(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .find(|(k, _)| k == param)
                    .map(|(_, v)| Self::parse(&v))
            })
            .unwrap_or(Self::DEFAULT)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cookie-name prefix scoping one slot's cookies (`S<slot>_`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    slot: SlotId,
    prefix: String,
}

impl Namespace {
    pub fn for_slot(slot: SlotId) -> Self {
        Self {
            slot,
            prefix: format!("S{}_", slot),
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix a cookie name.
    pub fn apply(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Strip this namespace from a cookie name.
    /// Returns `None` for names outside the namespace.
    pub fn strip<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix.as_str())
            .filter(|rest| !rest.is_empty())
    }
}

/// Split a namespaced cookie name into its slot and bare name.
///
/// `S12_sid` → `(12, "sid")`. Names without a well-formed prefix give `None`.
pub fn split_namespaced(name: &str) -> Option<(SlotId, &str)> {
    let rest = name.strip_prefix('S')?;
    let (digits, bare) = rest.split_once('_')?;
    if digits.is_empty() || bare.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let slot = digits.parse::<u32>().ok().filter(|n| *n > 0)?;
    Some((SlotId::new(slot), bare))
}

/// Remove every occurrence of `param` from a raw query string.
/// Returns `None` when nothing remains.
pub fn strip_query_param(query: Option<&str>, param: &str) -> Option<String> {
    // Pairs are kept verbatim so the upstream sees its own encoding.
    let kept: Vec<&str> = query?
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let raw_key = pair.split('=').next().unwrap_or_default();
            form_urlencoded::parse(raw_key.as_bytes())
                .next()
                .map(|(key, _)| key != param)
                .unwrap_or(true)
        })
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("&"))
    }
}
