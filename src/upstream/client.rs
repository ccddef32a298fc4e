//! Upstream HTTP client and origin handling.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use reqwest::Client;
use url::Url;

use crate::config::schema::TimeoutConfig;
use crate::error::GatewayError;

/// Build the shared upstream client.
///
/// Redirects are never followed automatically: GET redirects go back to the
/// browser with a rewritten Location and state-changing calls are walked hop
/// by hop.
pub fn build_client(timeouts: &TimeoutConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .no_proxy()
        .build()
}

/// The fixed origin of the embedded application.
#[derive(Debug, Clone)]
pub struct UpstreamOrigin {
    base: Url,
    origin: String,
    host: String,
}

impl UpstreamOrigin {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(raw)?;
        let host = parsed
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .to_ascii_lowercase();
        let origin = parsed.origin().ascii_serialization();
        let base = Url::parse(&format!("{}/", origin))?;
        Ok(Self { base, origin, host })
    }

    /// `scheme://host[:port]`, no trailing slash.
    pub fn as_str(&self) -> &str {
        &self.origin
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// URL of an upstream path with an optional raw query.
    /// The path is set verbatim, so it can never change scheme or host.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }

    /// Resolve a Location header against the origin.
    pub fn resolve(&self, location: &str) -> Result<Url, url::ParseError> {
        self.base.join(location)
    }

    /// Whether a URL has the upstream's origin: same scheme, host and port.
    pub fn is_upstream(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
    }
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn is_html(&self) -> bool {
        self.content_type().is_some_and(is_html_content_type)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Raw `Set-Cookie` values in arrival order.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    mime.eq_ignore_ascii_case("text/html") || mime.eq_ignore_ascii_case("application/xhtml+xml")
}

/// Issue one upstream call and buffer the response.
pub async fn send(
    client: &Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
) -> Result<UpstreamResponse, GatewayError> {
    let mut request = client.request(method.clone(), url.clone()).headers(headers);
    if !body.is_empty() || method_has_body(&method) {
        request = request.body(body);
    }

    tracing::debug!(method = %method, url = %url, "Upstream call");
    let response = request.send().await?;
    Ok(UpstreamResponse::read(response).await?)
}

fn method_has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}
