//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Path,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{AppendHeaders, Html, IntoResponse, Json, Response},
    routing::{any, get, post},
    Router,
};
use serde_json::{json, Map, Value};
use spa_gateway::config::GatewayConfig;
use spa_gateway::http::HttpServer;
use spa_gateway::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Page served at the upstream root.
pub const ROOT_HTML: &str =
    r#"<html><head><title>upstream</title></head><body><script src="/app.js"></script></body></html>"#;

/// Start an axum router on an ephemeral port.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// The programmable upstream used by most tests.
pub async fn start_mock_upstream() -> SocketAddr {
    let router = Router::new()
        .route("/", get(root_page))
        .route("/missing", get(missing_page))
        .route("/echo", any(echo))
        .route("/api/echo", any(echo))
        .route("/api/auth/login", post(echo))
        .route("/set-cookies", get(set_cookies))
        .route("/go", get(go_dashboard))
        .route("/leave", post(leave))
        .route("/r/{remaining}", any(redirect_chain))
        .route("/expire/{step}", any(expiring_chain))
        .route("/bare-redirect", any(bare_redirect))
        .route("/other-port", any(other_port))
        .route("/data-missing", get(data_missing))
        .route("/api/missing", get(api_missing));
    start_backend(router).await
}

/// Request as seen by the upstream.
async fn echo(method: axum::http::Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
        .collect();
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
    }))
}

async fn root_page() -> impl IntoResponse {
    (
        [
            (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        Html(ROOT_HTML),
    )
}

async fn missing_page() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html("<html><head></head><body>not here</body></html>"))
}

async fn set_cookies() -> impl IntoResponse {
    (
        AppendHeaders([
            (header::SET_COOKIE, "sid=abc; Domain=127.0.0.1; Path=/; Secure; SameSite=None"),
            (header::SET_COOKIE, "cf_clearance=cf1; Path=/"),
        ]),
        "ok",
    )
}

async fn go_dashboard(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("127.0.0.1")
        .to_string();
    (
        StatusCode::FOUND,
        [(header::LOCATION, format!("http://{host}/dashboard?x=1"))],
    )
        .into_response()
}

async fn leave() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "https://idp.example/authorize")],
    )
        .into_response()
}

/// `/r/N` redirects to `/r/N-1`, setting `hopN`; `/r/0` echoes the request.
async fn redirect_chain(
    Path(remaining): Path<u32>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if remaining == 0 {
        return echo(method, uri, headers).await.into_response();
    }
    (
        StatusCode::FOUND,
        AppendHeaders([
            (header::LOCATION, format!("/r/{}", remaining - 1)),
            (header::SET_COOKIE, format!("hop{remaining}=1; Path=/")),
        ]),
    )
        .into_response()
}

/// `/expire/2` sets `doomed` and `kept`, `/expire/1` expires `doomed`,
/// `/expire/0` echoes the request.
async fn expiring_chain(
    Path(step): Path<u32>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let cookies: &[&str] = match step {
        0 => return echo(method, uri, headers).await.into_response(),
        1 => &["doomed=; Max-Age=0; Path=/"],
        _ => &["doomed=1; Path=/", "kept=1; Path=/"],
    };
    let mut response = (
        StatusCode::FOUND,
        [(header::LOCATION, format!("/expire/{}", step - 1))],
    )
        .into_response();
    for cookie in cookies {
        response
            .headers_mut()
            .append(header::SET_COOKIE, header::HeaderValue::from_static(cookie));
    }
    response
}

async fn bare_redirect() -> Response {
    (StatusCode::SEE_OTHER, "moved").into_response()
}

/// Same host as the upstream, different port.
async fn other_port() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "http://127.0.0.1:1/elsewhere")],
    )
        .into_response()
}

async fn data_missing() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "missing" }))).into_response()
}

async fn api_missing() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html("<html><head></head><body>api missing</body></html>"),
    )
        .into_response()
}

/// Gateway configuration pointed at an upstream address.
pub fn gateway_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.origin = format!("http://{upstream}");
    config.timeouts.request_secs = 10;
    config.timeouts.redirect_walk_secs = 5;
    config
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        shutdown,
        updates,
    }
}

/// Client that never follows redirects, so Location headers can be checked.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// All `set-cookie` values of a response, in order.
pub fn set_cookies_of(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
