//! Redirect walking for state-changing calls.

use reqwest::header;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{client, gateway_config, set_cookies_of, start_gateway, start_mock_upstream};

#[tokio::test]
async fn test_six_redirects_yield_sentinel() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .post(gateway.url("/app/r/6"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 599);

    // Cookies from every followed hop still reach the client, doubled.
    let cookies = set_cookies_of(&res);
    assert_eq!(cookies.len(), 12);
    assert!(cookies.contains(&"S1_hop6=1; Path=/".to_string()));
    assert!(cookies.contains(&"hop1=1; Path=/".to_string()));

    assert!(res.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_four_redirects_return_terminal_response() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .post(gateway.url("/app/r/4?acc=2"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(r#"{"k":"v"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(set_cookies_of(&res).len(), 8);

    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["path"], "/r/0");
    let cookie = seen["headers"]["cookie"].as_str().unwrap();
    for hop in ["hop4=1", "hop3=1", "hop2=1", "hop1=1"] {
        assert!(cookie.contains(hop), "{hop} missing from {cookie}");
    }
}

#[tokio::test]
async fn test_five_redirects_are_within_budget() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client().put(gateway.url("/app/r/5")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["method"], "PUT");
}

#[tokio::test]
async fn test_configurable_sentinel() {
    let upstream = start_mock_upstream().await;
    let mut config = gateway_config(upstream);
    config.redirects.max_redirects = 2;
    config.redirects.sentinel_status = 508;
    let gateway = start_gateway(config).await;

    let res = client().post(gateway.url("/app/r/3")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 508);
}

#[tokio::test]
async fn test_foreign_location_is_not_followed() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client().post(gateway.url("/app/leave")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "https://idp.example/authorize");
}

#[tokio::test]
async fn test_login_put_falls_back_to_post() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .put(gateway.url("/app/api/auth/login"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(r#"{"email":"a@example.com"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["headers"]["content-type"], "application/json");
    // Minimal header set on the retry.
    assert!(seen["headers"].get("x-platform").is_none());
    assert!(seen["headers"].get("sec-fetch-mode").is_none());
}

#[tokio::test]
async fn test_non_login_put_is_not_retried() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    // Only GET is routed at the upstream root, so PUT is rejected there.
    let res = client().put(gateway.url("/app/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_redirect_without_location_is_returned() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .post(gateway.url("/app/bare-redirect"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(res.headers().get(header::LOCATION).is_none());
    assert_eq!(res.text().await.unwrap(), "moved");
}

#[tokio::test]
async fn test_each_hop_refers_to_upstream_origin() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .post(gateway.url("/app/r/2"))
        .header(header::REFERER, gateway.url("/app/checkout?acc=1"))
        .send()
        .await
        .unwrap();
    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["headers"]["referer"], format!("http://{upstream}/"));
}

#[tokio::test]
async fn test_expired_cookie_leaves_working_jar() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .post(gateway.url("/app/expire/2"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The browser still learns about the expiry.
    let cookies = set_cookies_of(&res);
    assert!(cookies.iter().any(|c| c.starts_with("doomed=;") && c.contains("Max-Age=0")));

    let seen: Value = res.json().await.unwrap();
    let cookie = seen["headers"]["cookie"].as_str().unwrap();
    assert_eq!(cookie, "kept=1");
}

#[tokio::test]
async fn test_same_host_other_port_is_not_followed() {
    let upstream = start_mock_upstream().await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = client()
        .post(gateway.url("/app/other-port"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "http://127.0.0.1:1/elsewhere");
}
