//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use gatekeeper::config::{AdminConfig, AuthConfig, GatekeeperConfig, SecurityConfig};
use gatekeeper::http::HttpServer;
use gatekeeper::lifecycle::Shutdown;
use gatekeeper::security::signature::{canonical_message, sign, X_SIGNATURE, X_TIMESTAMP};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TOKEN: &str = "integration-token";
pub const SECRET: &str = "integration-secret";
pub const ADMIN_KEY: &str = "integration-admin";

/// Small thresholds so blocking and slowdown are quick to observe.
pub fn test_config() -> GatekeeperConfig {
    GatekeeperConfig {
        auth: AuthConfig {
            api_token: TOKEN.into(),
            hmac_secret: SECRET.into(),
        },
        security: SecurityConfig {
            max_failures: 3,
            fail_window_secs: 60,
            block_duration_secs: 1,
            slowdown_step_ms: 10,
            slowdown_max_ms: 50,
            ..SecurityConfig::default()
        },
        admin: AdminConfig {
            enabled: true,
            api_key: ADMIN_KEY.into(),
        },
        ..GatekeeperConfig::default()
    }
}

/// `(name, value)` pairs for a request signed at `timestamp`.
pub fn auth_headers(token: &str, method: &str, path: &str, timestamp: i64) -> Vec<(&'static str, String)> {
    let ts = timestamp.to_string();
    let signature = sign(SECRET.as_bytes(), &canonical_message(token, &ts, method, path));
    vec![
        ("authorization", format!("Bearer {token}")),
        (X_TIMESTAMP, ts),
        (X_SIGNATURE, signature),
    ]
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A server running on an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub async fn start(config: GatekeeperConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = HttpServer::new(config);
        let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// A signed request from `client_ip` (sent as `X-Forwarded-For`).
    pub fn signed(
        &self,
        client: &reqwest::Client,
        method: reqwest::Method,
        path: &str,
        client_ip: &str,
    ) -> reqwest::RequestBuilder {
        let mut request = client
            .request(method.clone(), self.url(path))
            .header("x-forwarded-for", client_ip);
        for (name, value) in auth_headers(TOKEN, method.as_str(), path, now()) {
            request = request.header(name, value);
        }
        request
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop");
        result.unwrap().unwrap();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
