//! Path classification.
//!
//! # Responsibilities
//! - Match configured API path prefixes (segment aware)
//! - Match versioned first segments (`/v1`, `/v2/...`)
//! - Combine conditions with OR semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/api` matches `/api` and `/api/...` but not `/apiary`

/// Trait for matching upstream paths against conditions.
pub trait PathMatcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches a path prefix on segment boundaries.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing slash is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl PathMatcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Matches a first segment of the form `v<digits>`.
#[derive(Debug, Clone, Default)]
pub struct VersionedSegmentMatcher;

impl PathMatcher for VersionedSegmentMatcher {
    fn matches(&self, path: &str) -> bool {
        let first = path.trim_start_matches('/').split('/').next().unwrap_or_default();
        match first.strip_prefix('v') {
            Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }
}

/// Classifies upstream paths as API calls (OR over its matchers).
#[derive(Debug)]
pub struct ApiPathMatcher {
    matchers: Vec<Box<dyn PathMatcher>>,
}

impl ApiPathMatcher {
    pub fn new(matchers: Vec<Box<dyn PathMatcher>>) -> Self {
        Self { matchers }
    }

    /// Configured prefixes plus versioned segments.
    pub fn from_prefixes(prefixes: &[String]) -> Self {
        let mut matchers: Vec<Box<dyn PathMatcher>> = prefixes
            .iter()
            .filter(|p| !p.trim_end_matches('/').is_empty())
            .map(|p| Box::new(PathPrefixMatcher::new(p.as_str())) as Box<dyn PathMatcher>)
            .collect();
        matchers.push(Box::new(VersionedSegmentMatcher));
        Self::new(matchers)
    }
}

impl PathMatcher for ApiPathMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}
