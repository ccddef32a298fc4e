//! End-to-end behaviour of the gateway against a mock upstream.

use reqwest::header;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{client, gateway_config, set_cookies_of, start_gateway, start_mock_upstream};

#[tokio::test]
async fn test_root_redirects_into_mount() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client().get(gateway.url("/?acc=2")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()[header::LOCATION], "/app/?acc=2");
}

#[tokio::test]
async fn test_slot_isolation() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/echo?acc=2&q=1"))
        .header(header::COOKIE, "S1_sid=one; S2_sid=two; cf_clearance=cf; sid=plain")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let seen: Value = res.json().await.unwrap();

    assert_eq!(seen["headers"]["cookie"], "cf_clearance=cf; sid=two");
    assert_eq!(seen["query"], "q=1");
    assert_eq!(seen["path"], "/echo");
}

#[tokio::test]
async fn test_upstream_headers_sanitized() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/echo"))
        .header("cf-connecting-ip", "1.2.3.4")
        .header("x-forwarded-for", "203.0.113.9")
        .header(header::ACCEPT_ENCODING, "gzip, br")
        .send()
        .await
        .unwrap();
    let seen: Value = res.json().await.unwrap();
    let headers = &seen["headers"];

    assert!(headers.get("cf-connecting-ip").is_none());
    assert_eq!(headers["accept-encoding"], "identity");
    assert_eq!(headers["origin"], format!("http://{upstream}"));
    assert_eq!(headers["x-forwarded-for"], "203.0.113.9");
    assert_eq!(headers["x-real-ip"], "203.0.113.9");
    assert_eq!(headers["x-platform"], "web");
    assert!(headers.get("x-request-id").is_none());
}

#[tokio::test]
async fn test_set_cookie_doubled_except_excluded() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/set-cookies?acc=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        set_cookies_of(&res),
        vec![
            "S2_sid=abc; Path=/; SameSite=Lax",
            "sid=abc; Path=/; SameSite=Lax",
            "cf_clearance=cf1; Path=/",
        ]
    );
    assert_eq!(res.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_cookie_round_trip() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;
    let client = client();

    let res = client
        .get(gateway.url("/app/set-cookies?acc=3"))
        .send()
        .await
        .unwrap();
    let scoped = set_cookies_of(&res)
        .into_iter()
        .find(|c| c.starts_with("S3_"))
        .unwrap();
    let pair = scoped.split(';').next().unwrap().to_string();

    let res = client
        .get(gateway.url("/app/echo?acc=3"))
        .header(header::COOKIE, pair)
        .send()
        .await
        .unwrap();
    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["headers"]["cookie"], "sid=abc");
}

#[tokio::test]
async fn test_json_cookie_token_broadcast() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/api/echo"))
        .header(header::COOKIE, r#"auth={"access_token":"abc"}"#)
        .send()
        .await
        .unwrap();
    let seen: Value = res.json().await.unwrap();
    let headers = &seen["headers"];

    assert_eq!(headers["authorization"], "Bearer abc");
    assert_eq!(headers["x-access-token"], "abc");
    assert_eq!(headers["x-auth-token"], "abc");
    assert_eq!(headers["access-token"], "abc");
}

#[tokio::test]
async fn test_api_call_uses_slot_of_referring_page() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/api/echo"))
        .header(header::REFERER, gateway.url("/app/dashboard?acc=2"))
        .header(header::COOKIE, "S1_token=one; S2_token=two")
        .send()
        .await
        .unwrap();
    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["headers"]["x-access-token"], "two");
}

#[tokio::test]
async fn test_location_rewritten_with_slot() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client().get(gateway.url("/app/go?acc=2")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "/app/dashboard?x=1&acc=2");
}

#[tokio::test]
async fn test_html_rewritten_and_headers_stripped() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client().get(gateway.url("/app/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::CONTENT_SECURITY_POLICY).is_none());
    assert!(res.headers().get(header::CONTENT_ENCODING).is_none());
    assert!(res.headers().get("x-request-id").is_some());

    let body = res.text().await.unwrap();
    assert!(body.contains(r#"<script src="/app/app.js"></script>"#));
    assert!(body.contains(r#"<head><script data-gateway="early">"#));
    assert!(body.contains(r#"<base href="/app/">"#));
    assert!(!body.contains("data-gateway=\"autofill\""));
}

#[tokio::test]
async fn test_autofill_only_for_slots_with_credentials() {
    let upstream = start_mock_upstream().await;
    let mut config = gateway_config(upstream);
    config.credentials.push(spa_gateway::config::SlotCredentials {
        slot: 2,
        email: "two@example.com".into(),
        password: "pw".into(),
    });
    let gateway = start_gateway(config).await;
    let client = client();

    let with = client.get(gateway.url("/app/?acc=2")).send().await.unwrap();
    assert!(with.text().await.unwrap().contains("two@example.com"));

    let without = client.get(gateway.url("/app/?acc=1")).send().await.unwrap();
    assert!(!without.text().await.unwrap().contains("data-gateway=\"autofill\""));
}

#[tokio::test]
async fn test_get_falls_back_to_application_root() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client().get(gateway.url("/app/missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("<title>upstream</title>"));
}

#[tokio::test]
async fn test_non_html_error_is_not_retried_at_root() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/data-missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing");
}

#[tokio::test]
async fn test_api_error_is_not_retried_at_root() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/api/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = res.text().await.unwrap();
    assert!(body.contains("api missing"));
    assert!(!body.contains("<title>upstream</title>"));
}

#[tokio::test]
async fn test_empty_bearer_removed_without_token() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/api/echo"))
        .header(header::AUTHORIZATION, "Bearer ")
        .header("x-access-token", "")
        .send()
        .await
        .unwrap();
    let seen: Value = res.json().await.unwrap();
    let headers = &seen["headers"];
    assert!(headers.get("authorization").is_none());
    assert!(headers.get("x-access-token").is_none());
}

#[tokio::test]
async fn test_slot_one_does_not_borrow_other_slot_token() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .get(gateway.url("/app/api/echo"))
        .header(
            header::COOKIE,
            r#"S2_auth={"access_token":"two"}; auth={"access_token":"two"}"#,
        )
        .send()
        .await
        .unwrap();
    let seen: Value = res.json().await.unwrap();
    assert!(seen["headers"].get("authorization").is_none());
}

#[tokio::test]
async fn test_body_too_large() {
    let upstream = start_mock_upstream().await;
    let mut config = gateway_config(upstream);
    config.security.max_body_size = 16;
    let gateway = start_gateway(config).await;

    let res = client()
        .post(gateway.url("/app/echo"))
        .body(vec![b'x'; 100])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.headers()["x-gateway-error"], "BODY_TOO_LARGE");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let gateway = start_gateway(gateway_config(dead)).await;
    let res = client().get(gateway.url("/app/echo")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["x-gateway-error"], "UPSTREAM_UNREACHABLE");
}

#[tokio::test]
async fn test_hot_reload_keeps_mount() {
    let upstream = start_mock_upstream().await;
    let config = gateway_config(upstream);
    let gateway = start_gateway(config.clone()).await;

    let mut next = config;
    next.mount.path = "/elsewhere".to_string();
    next.spa.overlay_enabled = false;
    gateway.updates.send(next).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let res = client().get(gateway.url("/app/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains(r#"<base href="/app/">"#));
    assert!(!body.contains("gateway-loader"));
}
