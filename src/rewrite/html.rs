//! Static HTML rewrites and script placement.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::routing::MountPoint;

/// Root-relative URL attributes. The leading whitespace keeps `src` from
/// matching inside `data-src`.
static URL_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(\s(?:src|href|action|poster|data-src|formaction)\s*=\s*)(?:"(/[^"]*)"|'(/[^']*)')"#,
    )
    .expect("valid attribute pattern")
});

static CSP_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*http-equiv\s*=\s*["']?content-security-policy[^>]*>"#)
        .expect("valid CSP meta pattern")
});

static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("valid head pattern"));

static HEAD_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</head\s*>").expect("valid head close pattern"));

static HTML_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<html(?:\s[^>]*)?>").expect("valid html pattern"));

/// Rewrites absolute references to the upstream origin into mount paths.
#[derive(Debug)]
pub struct OriginRewriter {
    pattern: Regex,
}

impl OriginRewriter {
    /// Matches `https://host`, `http://host` and `//host`, with an optional
    /// port, only where the host ends (so `host.evil` is left alone).
    pub fn new(upstream_host: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r#"(?i)(?:https?:)?//{}(?::\d+)?([/"'?#\s)<>\\]|$)"#,
            regex::escape(upstream_host)
        ))?;
        Ok(Self { pattern })
    }

    pub fn rewrite(&self, html: &str, mount: &str) -> String {
        self.pattern
            .replace_all(html, |caps: &Captures| {
                let tail = caps.get(1).map_or("", |m| m.as_str());
                format!("{}{}", mount, tail)
            })
            .into_owned()
    }
}

/// Prefix root-relative URL attributes with the mount path.
pub fn rewrite_url_attributes(html: &str, mount: &MountPoint) -> String {
    URL_ATTRIBUTE
        .replace_all(html, |caps: &Captures| {
            let lead = &caps[1];
            let (value, quote) = match (caps.get(2), caps.get(3)) {
                (Some(v), _) => (v.as_str(), '"'),
                (None, Some(v)) => (v.as_str(), '\''),
                (None, None) => return caps[0].to_string(),
            };
            if value.starts_with("//") {
                return caps[0].to_string();
            }
            format!("{lead}{quote}{}{quote}", mount.prefix(value))
        })
        .into_owned()
}

/// Delete CSP `<meta http-equiv>` tags, report-only included.
pub fn strip_csp_meta(html: &str) -> String {
    CSP_META.replace_all(html, "").into_owned()
}

/// Place the early block right after `<head…>` and the late block before
/// `</head>`. Without a head both go after `<html…>`, else at the start.
pub fn inject(html: &str, early: &str, late: &str) -> String {
    let mut out = String::with_capacity(html.len() + early.len() + late.len());

    if let Some(open) = HEAD_OPEN.find(html) {
        let after_open = open.end();
        out.push_str(&html[..after_open]);
        out.push_str(early);
        match HEAD_CLOSE.find_at(html, after_open) {
            Some(close) => {
                out.push_str(&html[after_open..close.start()]);
                out.push_str(late);
                out.push_str(&html[close.start()..]);
            }
            None => {
                out.push_str(late);
                out.push_str(&html[after_open..]);
            }
        }
        return out;
    }

    let at = HTML_OPEN.find(html).map_or(0, |m| m.end());
    out.push_str(&html[..at]);
    out.push_str(early);
    out.push_str(late);
    out.push_str(&html[at..]);
    out
}
