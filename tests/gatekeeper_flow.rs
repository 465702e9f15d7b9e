//! End-to-end admission tests against a live server.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;

mod common;
use common::{auth_headers, client, now, test_config, TestServer, ADMIN_KEY, TOKEN};

#[tokio::test]
async fn health_checks_need_no_credentials() {
    let server = TestServer::start(test_config()).await;
    let client = client();

    let res = client.get(server.url("/healthz")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), serde_json::json!({ "status": "ok" }));

    let res = client.get(server.url("/livez")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_secs"].is_u64());

    server.stop().await;
}

#[tokio::test]
async fn signed_request_is_admitted() {
    let server = TestServer::start(test_config()).await;
    let client = client();

    let res = server
        .signed(&client, Method::GET, "/api/v1/items", "192.0.2.1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        serde_json::json!({ "items": [], "total": 0 })
    );

    server.stop().await;
}

#[tokio::test]
async fn rejections_have_generic_bodies() {
    let server = TestServer::start(test_config()).await;
    let client = client();
    let path = "/api/v1/items";

    // Each case comes from its own address so none of them gets blocked.
    let no_auth = client
        .get(server.url(path))
        .header("x-forwarded-for", "192.0.2.10")
        .send()
        .await
        .unwrap();
    assert_eq!(no_auth.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        no_auth.json::<Value>().await.unwrap(),
        serde_json::json!({ "message": "unauthorized" })
    );

    let mut wrong_token = client.get(server.url(path)).header("x-forwarded-for", "192.0.2.11");
    for (name, value) in auth_headers("not-the-token", "GET", path, now()) {
        wrong_token = wrong_token.header(name, value);
    }
    let wrong_token = wrong_token.send().await.unwrap();
    assert_eq!(wrong_token.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        wrong_token.json::<Value>().await.unwrap(),
        serde_json::json!({ "message": "forbidden" })
    );

    let unsigned = client
        .get(server.url(path))
        .header("x-forwarded-for", "192.0.2.12")
        .header("authorization", format!("Bearer {TOKEN}"))
        .send()
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let mut stale = client.get(server.url(path)).header("x-forwarded-for", "192.0.2.13");
    for (name, value) in auth_headers(TOKEN, "GET", path, now() - 301) {
        stale = stale.header(name, value);
    }
    assert_eq!(stale.send().await.unwrap().status(), StatusCode::UNAUTHORIZED);

    // Signed for GET, sent as DELETE.
    let mut wrong_method = client
        .delete(server.url("/api/v1/items/1"))
        .header("x-forwarded-for", "192.0.2.14");
    for (name, value) in auth_headers(TOKEN, "GET", "/api/v1/items/1", now()) {
        wrong_method = wrong_method.header(name, value);
    }
    assert_eq!(wrong_method.send().await.unwrap().status(), StatusCode::FORBIDDEN);

    server.stop().await;
}

#[tokio::test]
async fn query_string_is_not_signed() {
    let server = TestServer::start(test_config()).await;
    let client = client();

    let mut request = client
        .get(server.url("/api/v1/items?page=2"))
        .header("x-forwarded-for", "192.0.2.20");
    for (name, value) in auth_headers(TOKEN, "GET", "/api/v1/items", now()) {
        request = request.header(name, value);
    }
    assert_eq!(request.send().await.unwrap().status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn repeated_failures_block_address_and_subnet() {
    let mut config = test_config();
    config.security.block_duration_secs = 60;
    let server = TestServer::start(config).await;
    let client = client();

    for _ in 0..3 {
        let res = client
            .get(server.url("/api/v1/items"))
            .header("x-forwarded-for", "203.0.113.7")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    let blocked = server
        .signed(&client, Method::GET, "/api/v1/items", "203.0.113.7")
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status(), StatusCode::FORBIDDEN);

    let neighbour = server
        .signed(&client, Method::GET, "/api/v1/items", "203.0.113.200")
        .send()
        .await
        .unwrap();
    assert_eq!(neighbour.status(), StatusCode::FORBIDDEN);

    let elsewhere = server
        .signed(&client, Method::GET, "/api/v1/items", "198.51.100.1")
        .send()
        .await
        .unwrap();
    assert_eq!(elsewhere.status(), StatusCode::OK);

    let stats: Value = client
        .get(server.url("/admin/security"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["blocked_addresses"], 1);
    assert_eq!(stats["subnet_blocks"], 1);

    server.stop().await;
}

#[tokio::test]
async fn block_lifts_after_duration() {
    let server = TestServer::start(test_config()).await;
    let client = client();

    for _ in 0..3 {
        client
            .get(server.url("/api/v1/items"))
            .header("x-forwarded-for", "203.0.113.50")
            .send()
            .await
            .unwrap();
    }
    let blocked = server
        .signed(&client, Method::GET, "/api/v1/items", "203.0.113.50")
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status(), StatusCode::FORBIDDEN);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let admitted = server
        .signed(&client, Method::GET, "/api/v1/items", "203.0.113.50")
        .send()
        .await
        .unwrap();
    assert_eq!(admitted.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn success_resets_failure_count() {
    let server = TestServer::start(test_config()).await;
    let client = client();
    let fail = || {
        client
            .get(server.url("/api/v1/items"))
            .header("x-forwarded-for", "198.51.100.77")
            .send()
    };

    fail().await.unwrap();
    fail().await.unwrap();
    let ok = server
        .signed(&client, Method::GET, "/api/v1/items", "198.51.100.77")
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    // Two more failures would have blocked without the reset.
    fail().await.unwrap();
    fail().await.unwrap();
    let still_ok = server
        .signed(&client, Method::GET, "/api/v1/items", "198.51.100.77")
        .send()
        .await
        .unwrap();
    assert_eq!(still_ok.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn unknown_path_is_protected_then_not_found() {
    let server = TestServer::start(test_config()).await;
    let client = client();

    let anonymous = client
        .get(server.url("/does/not/exist"))
        .header("x-forwarded-for", "192.0.2.30")
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let signed = server
        .signed(&client, Method::GET, "/does/not/exist", "192.0.2.31")
        .send()
        .await
        .unwrap();
    assert_eq!(signed.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}
