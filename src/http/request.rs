//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Resolve the session slot and strip its selector from the query
//! - Map the gateway path onto the upstream path
//! - Decide whether the client connection counts as secure
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - API calls carry no slot parameter; the page they come from does, so the
//!   Referer is consulted when the query has none

use axum::http::{header, HeaderMap, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::{form_urlencoded, Url};
use uuid::Uuid;

use crate::routing::MountPoint;
use crate::session::namespace::strip_query_param;
use crate::session::SlotId;

/// Header carrying the request ID, in and out.
pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID set by the request-id layer, or `-`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

/// Where an inbound request goes upstream, and for which slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub slot: SlotId,
    /// Inbound path with the mount removed.
    pub upstream_path: String,
    /// Inbound query without the slot selector.
    pub query: Option<String>,
    pub is_api: bool,
}

impl RequestTarget {
    pub fn resolve(uri: &Uri, headers: &HeaderMap, mount: &MountPoint) -> Self {
        let slot = slot_from_query(uri.query(), mount.slot_param())
            .or_else(|| slot_from_referer(headers, mount))
            .unwrap_or_default();
        let upstream_path = mount.upstream_path(uri.path());
        let is_api = mount.is_api_path(&upstream_path);

        Self {
            slot,
            query: strip_query_param(uri.query(), mount.slot_param()),
            upstream_path,
            is_api,
        }
    }
}

/// Slot selected by the query, `None` when the parameter is absent.
fn slot_from_query(query: Option<&str>, param: &str) -> Option<SlotId> {
    let query = query?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == param)
        .map(|(_, value)| SlotId::parse(&value))
}

/// Slot of the mounted page that issued the request.
fn slot_from_referer(headers: &HeaderMap, mount: &MountPoint) -> Option<SlotId> {
    let referer = headers.get(header::REFERER)?.to_str().ok()?;
    let url = Url::parse(referer).ok()?;
    if !mount.is_mounted(url.path()) {
        return None;
    }
    slot_from_query(url.query(), mount.slot_param())
}

/// Whether the client reached us over TLS, directly or through a trusted
/// terminating proxy.
pub fn is_secure_transport(headers: &HeaderMap, tls_listener: bool, trust_forwarded_proto: bool) -> bool {
    if tls_listener {
        return true;
    }
    trust_forwarded_proto
        && headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountConfig;

    fn mount() -> MountPoint {
        MountPoint::new(&MountConfig::default(), &["/api".to_string()])
    }

    #[test]
    fn target_strips_mount_and_slot() {
        let uri: Uri = "/app/dashboard?x=1&acc=2".parse().unwrap();
        let target = RequestTarget::resolve(&uri, &HeaderMap::new(), &mount());
        assert_eq!(target.slot, SlotId::new(2));
        assert_eq!(target.upstream_path, "/dashboard");
        assert_eq!(target.query.as_deref(), Some("x=1"));
        assert!(!target.is_api);
    }

    #[test]
    fn mount_root_maps_to_upstream_root() {
        let uri: Uri = "/app?acc=3".parse().unwrap();
        let target = RequestTarget::resolve(&uri, &HeaderMap::new(), &mount());
        assert_eq!(target.upstream_path, "/");
        assert_eq!(target.query, None);
        assert_eq!(target.slot, SlotId::new(3));
    }

    #[test]
    fn api_call_inherits_slot_from_referer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://gw.example/app/dashboard?acc=4"),
        );
        let uri: Uri = "/app/api/v1/me".parse().unwrap();
        let target = RequestTarget::resolve(&uri, &headers, &mount());
        assert_eq!(target.slot, SlotId::new(4));
        assert!(target.is_api);
    }

    #[test]
    fn query_beats_referer_and_foreign_referer_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://gw.example/elsewhere?acc=4"),
        );
        let uri: Uri = "/app/api/x".parse().unwrap();
        assert_eq!(RequestTarget::resolve(&uri, &headers, &mount()).slot, SlotId::DEFAULT);

        let uri: Uri = "/app/x?acc=5".parse().unwrap();
        assert_eq!(RequestTarget::resolve(&uri, &headers, &mount()).slot, SlotId::new(5));
    }

    #[test]
    fn secure_transport_detection() {
        let mut headers = HeaderMap::new();
        assert!(is_secure_transport(&headers, true, false));
        assert!(!is_secure_transport(&headers, false, true));

        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("HTTPS, http"));
        assert!(is_secure_transport(&headers, false, true));
        assert!(!is_secure_transport(&headers, false, false));
    }

    #[test]
    fn request_ids_are_unique() {
        let request = Request::new(());
        let mut make = UuidRequestId;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }
}
