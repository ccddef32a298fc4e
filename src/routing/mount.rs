//! Mapping between gateway paths and upstream paths.

use url::form_urlencoded;

use crate::config::MountConfig;
use crate::routing::matcher::{ApiPathMatcher, PathMatcher};
use crate::session::SlotId;

/// The path prefix the upstream is exposed under, plus the slot selector.
#[derive(Debug)]
pub struct MountPoint {
    path: String,
    slot_param: String,
    api: ApiPathMatcher,
}

impl MountPoint {
    pub fn new(config: &MountConfig, api_prefixes: &[String]) -> Self {
        Self {
            path: config.path.trim_end_matches('/').to_string(),
            slot_param: config.slot_param.clone(),
            api: ApiPathMatcher::from_prefixes(api_prefixes),
        }
    }

    /// Mount path without trailing slash (e.g. `/app`).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn slot_param(&self) -> &str {
        &self.slot_param
    }

    /// Whether a gateway path lies under the mount.
    pub fn is_mounted(&self, path: &str) -> bool {
        match path.strip_prefix(&self.path) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        }
    }

    /// Upstream path for a gateway path (`/app/x` → `/x`, `/app` → `/`).
    pub fn upstream_path(&self, path: &str) -> String {
        if !self.is_mounted(path) {
            return path.to_string();
        }
        let rest = &path[self.path.len()..];
        if rest.is_empty() {
            "/".to_string()
        } else {
            rest.to_string()
        }
    }

    /// Whether an upstream path is an API call rather than an SPA page.
    pub fn is_api_path(&self, upstream_path: &str) -> bool {
        self.api.matches(upstream_path)
    }

    /// Prefix a root-relative reference with the mount path, unless it is
    /// already mounted.
    pub fn prefix(&self, reference: &str) -> String {
        if self.is_mounted(reference) {
            reference.to_string()
        } else {
            format!("{}{}", self.path, reference)
        }
    }

    /// Gateway path for an upstream path and query. Non-API paths carry the
    /// slot parameter, added only when absent.
    pub fn proxy_path(&self, upstream_path: &str, query: Option<&str>, slot: SlotId) -> String {
        let mut out = self.prefix(upstream_path);
        let query = query.filter(|q| !q.is_empty());

        let needs_slot = !self.is_api_path(upstream_path) && !self.has_slot_param(query);
        match (query, needs_slot) {
            (Some(q), true) => {
                out.push('?');
                out.push_str(q);
                out.push('&');
                out.push_str(&self.slot_pair(slot));
            }
            (Some(q), false) => {
                out.push('?');
                out.push_str(q);
            }
            (None, true) => {
                out.push('?');
                out.push_str(&self.slot_pair(slot));
            }
            (None, false) => {}
        }
        out
    }

    fn has_slot_param(&self, query: Option<&str>) -> bool {
        query.is_some_and(|q| {
            form_urlencoded::parse(q.as_bytes()).any(|(k, _)| k == self.slot_param.as_str())
        })
    }

    fn slot_pair(&self, slot: SlotId) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.slot_param, &slot.to_string())
            .finish()
    }
}
