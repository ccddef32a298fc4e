//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router: `/` redirect plus catch-alls under the mount
//! - Wire up middleware (request ID, tracing)
//! - Bind to a plain TCP listener or serve TLS through axum-server
//! - Dispatch: single upstream call, or redirect walk for POST/PUT
//! - Normalize headers and rewrite HTML on the way back
//! - Swap the configuration snapshot on hot reload
//!
//! # Design Decisions
//! - One `GatewayContext` per configuration; requests load it once and keep
//!   using that snapshot even if a reload lands mid-request
//! - The mount path is baked into the routes, so reloads cannot move it
//! - Whole-request deadline enforced in the handler so it maps to 504

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, request::Parts, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::any,
    Router,
};
use http_body_util::LengthLimitError;
use reqwest::Client;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{is_secure_transport, request_id, RequestTarget, UuidRequestId};
use crate::http::response::ResponseNormalizer;
use crate::observability::metrics;
use crate::observability::tracing::GatewayMakeSpan;
use crate::rewrite::{HtmlRewriter, RewriteContext, RewriteError};
use crate::routing::MountPoint;
use crate::session::Namespace;
use crate::upstream::client::send;
use crate::upstream::redirect::is_login_path;
use crate::upstream::{
    build_client, HeaderBuilder, RedirectWalker, UpstreamHeaders, UpstreamOrigin,
    UpstreamResponse, WalkRequest,
};

/// Grace period for in-flight TLS connections on shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// Errors building the gateway from a configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid upstream origin: {0}")]
    Origin(#[from] url::ParseError),

    #[error("failed to compile HTML rewriter: {0}")]
    Rewriter(#[from] RewriteError),

    #[error("invalid sentinel status {0}")]
    Sentinel(u16),
}

/// Everything derived from one configuration snapshot.
pub struct GatewayContext {
    pub config: GatewayConfig,
    pub client: Client,
    pub origin: UpstreamOrigin,
    pub mount: MountPoint,
    pub rewriter: HtmlRewriter,
    pub sentinel: StatusCode,
}

impl GatewayContext {
    pub fn from_config(config: GatewayConfig) -> Result<Self, ServerError> {
        let client = build_client(&config.timeouts)?;
        let origin = UpstreamOrigin::parse(&config.upstream.origin)?;
        let mount = MountPoint::new(&config.mount, &config.upstream.api_prefixes);
        let rewriter = HtmlRewriter::new(origin.host())?;
        let sentinel = StatusCode::from_u16(config.redirects.sentinel_status)
            .map_err(|_| ServerError::Sentinel(config.redirects.sentinel_status))?;

        Ok(Self {
            config,
            client,
            origin,
            mount,
            rewriter,
            sentinel,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ArcSwap<GatewayContext>>,
    /// The listener terminates TLS itself.
    pub tls: bool,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    state: AppState,
    router: Router,
}

impl HttpServer {
    /// Create a server for a validated configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let tls = config.listener.tls.is_some();
        let context = GatewayContext::from_config(config)?;
        let state = AppState {
            context: Arc::new(ArcSwap::from_pointee(context)),
            tls,
        };
        let router = Self::build_router(state.clone());
        Ok(Self { state, router })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let mount = state.context.load().mount.path().to_string();

        // Layers wrap outward: the request ID exists before the span is made.
        Router::new()
            .route("/", any(root_redirect))
            .route(&mount, any(gateway_handler))
            .route(&format!("{mount}/"), any(gateway_handler))
            .route(&format!("{mount}/{{*path}}"), any(gateway_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(GatewayMakeSpan))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Serve plain HTTP until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount = %self.state.context.load().mount.path(),
            "HTTP server starting"
        );

        spawn_reloader(self.state.clone(), config_updates);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS until the shutdown signal fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: axum_server::tls_rustls::RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        spawn_reloader(self.state.clone(), config_updates);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Apply configuration updates as they arrive.
fn spawn_reloader(state: AppState, mut updates: mpsc::UnboundedReceiver<GatewayConfig>) {
    tokio::spawn(async move {
        while let Some(mut config) = updates.recv().await {
            let current = state.context.load();
            if config.mount.path != current.config.mount.path {
                tracing::warn!(
                    current = %current.config.mount.path,
                    requested = %config.mount.path,
                    "Mount path cannot change at runtime, keeping current"
                );
                config.mount.path = current.config.mount.path.clone();
            }

            match GatewayContext::from_config(config) {
                Ok(context) => {
                    state.context.store(Arc::new(context));
                    tracing::info!("Configuration reloaded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Rejected configuration update, keeping current");
                }
            }
        }
    });
}

/// `/` → `<mount>/`, query preserved.
async fn root_redirect(State(state): State<AppState>, uri: Uri) -> Redirect {
    let context = state.context.load();
    let target = match uri.query() {
        Some(query) => format!("{}/?{}", context.mount.path(), query),
        None => format!("{}/", context.mount.path()),
    };
    Redirect::temporary(&target)
}

/// Main gateway handler.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let context = state.context.load_full();

    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers);
    let target = RequestTarget::resolve(&parts.uri, &parts.headers, &context.mount);
    let namespace = Namespace::for_slot(target.slot);
    let method = parts.method.clone();
    let kind = if is_walked(&method) {
        "redirect"
    } else if target.is_api {
        "api"
    } else {
        "page"
    };

    tracing::debug!(
        request_id = %request_id,
        slot = %target.slot,
        method = %method,
        path = %target.upstream_path,
        "Proxying request"
    );

    let secure = is_secure_transport(
        &parts.headers,
        state.tls,
        context.config.security.trust_forwarded_proto,
    );
    let request_secs = context.config.timeouts.request_secs;
    let exchange = Exchange {
        context: &context,
        target: &target,
        namespace: &namespace,
        peer,
        secure,
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(request_secs),
        exchange.forward(parts, body),
    )
    .await
    .unwrap_or(Err(GatewayError::Timeout(request_secs)));

    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                slot = %target.slot,
                error = %e,
                "Gateway error"
            );
            metrics::record_upstream_error(e.code());
            e.into_response()
        }
    };

    let status = response.status().as_u16();
    metrics::record_request(method.as_str(), status, kind, start);
    tracing::info!(
        request_id = %request_id,
        slot = %target.slot,
        method = %method,
        path = %target.upstream_path,
        status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}

/// One inbound request on its way through the gateway.
struct Exchange<'a> {
    context: &'a GatewayContext,
    target: &'a RequestTarget,
    namespace: &'a Namespace,
    peer: SocketAddr,
    secure: bool,
}

impl Exchange<'_> {
    async fn forward(&self, parts: Parts, body: Body) -> Result<Response, GatewayError> {
        let config = &self.context.config;
        let body = read_body(&parts, body, config.security.max_body_size).await?;

        let upstream = HeaderBuilder::new(&config.upstream, &self.context.origin).build(
            &parts.headers,
            Some(self.peer.ip()),
            self.namespace,
        );
        if let Some(source) = upstream.token_source {
            tracing::debug!(source = source.as_str(), "Auth token resolved");
        }

        let response = if is_walked(&parts.method) {
            self.walk(parts.method.clone(), upstream, body).await?
        } else {
            self.call(parts.method.clone(), upstream, body).await?
        };

        Ok(self.render(response, &parts.method))
    }

    /// Single call, with the root bootstrap retry for SPA page loads.
    async fn call(
        &self,
        method: Method,
        upstream: UpstreamHeaders,
        body: Bytes,
    ) -> Result<UpstreamResponse, GatewayError> {
        let origin = &self.context.origin;
        let query = self.target.query.as_deref();
        let url = origin.url_for(&self.target.upstream_path, query);

        let response = send(
            &self.context.client,
            method.clone(),
            url,
            upstream.headers.clone(),
            body,
        )
        .await?;

        let bootstrap = method == Method::GET
            && !self.target.is_api
            && self.target.upstream_path != "/"
            && response.status.as_u16() >= 400
            && response.is_html();
        if !bootstrap {
            return Ok(response);
        }

        tracing::info!(
            status = response.status.as_u16(),
            path = %self.target.upstream_path,
            "Page not served upstream, loading application root"
        );
        send(
            &self.context.client,
            Method::GET,
            origin.url_for("/", query),
            upstream.headers,
            Bytes::new(),
        )
        .await
    }

    async fn walk(
        &self,
        method: Method,
        upstream: UpstreamHeaders,
        body: Bytes,
    ) -> Result<UpstreamResponse, GatewayError> {
        let config = &self.context.config;
        let walker = RedirectWalker::new(
            &self.context.client,
            &self.context.origin,
            config.redirects.max_redirects,
            self.context.sentinel,
            Duration::from_secs(config.timeouts.redirect_walk_secs),
        );
        let request = WalkRequest {
            method,
            url: self
                .context
                .origin
                .url_for(&self.target.upstream_path, self.target.query.as_deref()),
            headers: upstream.headers,
            jar: upstream.jar,
            body,
        };

        let result = if is_login_path(&self.target.upstream_path, &config.upstream.login_paths) {
            walker.walk_login(request, &config.upstream.auth_headers).await
        } else {
            walker.walk(request).await
        };

        match &result {
            Ok(walked) if walked.budget_exceeded => {
                metrics::record_redirect_walk("budget_exceeded", walked.hops)
            }
            Ok(walked) => metrics::record_redirect_walk("terminal", walked.hops),
            Err(_) => metrics::record_redirect_walk("error", 0),
        }
        Ok(result?.response)
    }

    fn render(&self, upstream: UpstreamResponse, method: &Method) -> Response {
        let config = &self.context.config;
        let headers = ResponseNormalizer {
            mount: &self.context.mount,
            origin: &self.context.origin,
            namespace: self.namespace,
            secure_transport: self.secure,
            excluded_cookies: &config.upstream.excluded_cookies,
        }
        .normalize(&upstream.headers);

        let rewrite = upstream.is_html() && *method != Method::HEAD && !upstream.body.is_empty();
        let body = if rewrite {
            let ctx = RewriteContext {
                mount: &self.context.mount,
                namespace: self.namespace,
                api_prefixes: &config.upstream.api_prefixes,
                spa: &config.spa,
                credentials: config.credentials_for(self.namespace.slot().get()),
            };
            self.context.rewriter.rewrite_or_original(upstream.body, &ctx)
        } else {
            upstream.body
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = upstream.status;
        *response.headers_mut() = headers;
        response
    }
}

/// Buffer the inbound body within the configured limit.
async fn read_body(parts: &Parts, body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(GatewayError::BodyTooLarge(limit));
    }

    axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| body_error(e, limit))
}

/// Only the length limit is the client's size problem; anything else is a
/// broken or aborted stream.
fn body_error(error: axum::Error, limit: usize) -> GatewayError {
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(&error);
    while let Some(e) = cause {
        if e.is::<LengthLimitError>() {
            return GatewayError::BodyTooLarge(limit);
        }
        cause = e.source();
    }
    GatewayError::BadRequest(format!("failed to read request body: {error}"))
}

/// State-changing verbs go through the redirect walker.
fn is_walked(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT
}
