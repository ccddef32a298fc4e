//! HTML rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream HTML (UTF-8)
//!     → html.rs (origin URLs → mount, root-relative attributes, CSP meta)
//!     → scripts.rs (early block after <head>, runtime + loader before </head>)
//!     → autofill.rs (only when the slot has credentials)
//!     → rewritten document
//! ```
//!
//! # Design Decisions
//! - Each step is isolated: a failing step is logged and skipped
//! - A failure of the whole pass serves the original bytes
//! - Regexes over a parser: documents are only patched, never re-serialized

pub mod autofill;
pub mod html;
pub mod scripts;

use axum::body::Bytes;
use thiserror::Error;

use crate::config::{SlotCredentials, SpaConfig};
use crate::observability::metrics;
use crate::routing::MountPoint;
use crate::session::Namespace;

pub use autofill::{AutofillPlan, FieldMatcher};
pub use html::OriginRewriter;
pub use scripts::ScriptConfig;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("document is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("script config could not be serialized: {0}")]
    Script(#[from] serde_json::Error),
}

/// Per-request inputs to the rewrite.
pub struct RewriteContext<'a> {
    pub mount: &'a MountPoint,
    pub namespace: &'a Namespace,
    pub api_prefixes: &'a [String],
    pub spa: &'a SpaConfig,
    pub credentials: Option<&'a SlotCredentials>,
}

/// HTML rewriter compiled for one upstream host.
#[derive(Debug)]
pub struct HtmlRewriter {
    upstream_host: String,
    origins: OriginRewriter,
}

impl HtmlRewriter {
    pub fn new(upstream_host: &str) -> Result<Self, RewriteError> {
        Ok(Self {
            upstream_host: upstream_host.to_ascii_lowercase(),
            origins: OriginRewriter::new(upstream_host)?,
        })
    }

    /// Rewrite a document. Only a non-UTF-8 body fails the whole pass.
    pub fn rewrite(&self, body: &[u8], ctx: &RewriteContext<'_>) -> Result<String, RewriteError> {
        let document = std::str::from_utf8(body)?;
        let mount = ctx.mount.path();

        let document = self.origins.rewrite(document, mount);
        let document = html::rewrite_url_attributes(&document, ctx.mount);
        let document = html::strip_csp_meta(&document);

        let config = ScriptConfig::new(
            ctx.mount,
            ctx.namespace,
            &self.upstream_host,
            ctx.api_prefixes,
            ctx.spa,
        );
        let early = step("early_script", scripts::early_block(&config));

        let mut late = step("runtime_script", scripts::runtime_block(&config));
        late.push_str(&step("loader_script", scripts::loader_block(&config)));
        if let Some(credentials) = ctx.credentials {
            late.push_str(&step(
                "autofill_script",
                AutofillPlan::new(credentials, ctx.spa).render(),
            ));
        }

        Ok(html::inject(&document, &early, &late))
    }

    /// Rewrite, or hand back the original bytes if the pass fails.
    pub fn rewrite_or_original(&self, body: Bytes, ctx: &RewriteContext<'_>) -> Bytes {
        match self.rewrite(&body, ctx) {
            Ok(document) => {
                metrics::record_rewrite("rewritten");
                Bytes::from(document)
            }
            Err(e) => {
                tracing::warn!(error = %e, slot = %ctx.namespace.slot(), "HTML rewrite failed, serving original");
                metrics::record_rewrite("failed");
                body
            }
        }
    }
}

fn step(name: &'static str, result: Result<String, serde_json::Error>) -> String {
    result.unwrap_or_else(|e| {
        tracing::warn!(step = name, error = %e, "Rewrite step skipped");
        String::new()
    })
}
