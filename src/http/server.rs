//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the abuse tracker, gatekeeper and item store
//! - Assemble health, item and admin routers
//! - Wire up middleware (tracing, request ID, CORS, timeout, body limit)
//! - Run the cleanup task alongside the server
//! - Serve with connection info and graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::clock::{Clock, SystemClock};
use crate::config::{CorsConfig, GatekeeperConfig};
use crate::health::health_router;
use crate::http::request::{
    propagate_request_id_layer, set_request_id_layer, RequestIdExt, X_REQUEST_ID,
};
use crate::http::response::not_found;
use crate::items::{items_router, MemoryItemStore, SharedStore};
use crate::security::signature::{X_SIGNATURE, X_TIMESTAMP};
use crate::security::{AbuseTracker, CleanupTask, Gatekeeper};

/// HTTP server for the gatekeeper.
pub struct HttpServer {
    router: Router,
    config: GatekeeperConfig,
    tracker: Arc<AbuseTracker>,
}

impl HttpServer {
    /// Create a server that reads the system clock.
    pub fn new(config: GatekeeperConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a server whose security and item timestamps come from `clock`.
    pub fn with_clock(config: GatekeeperConfig, clock: Arc<dyn Clock>) -> Self {
        let tracker = Arc::new(AbuseTracker::new(&config.security, clock.clone()));
        let gate = Arc::new(Gatekeeper::new(&config.auth, tracker.clone(), clock.clone()));
        let store: SharedStore = Arc::new(MemoryItemStore::new(clock.clone()));

        let protected = gate.protect(items_router(store).fallback(not_found));

        let mut app = Router::new().merge(health_router(clock)).merge(protected);

        if config.admin.enabled {
            app = app.merge(setup_admin_router(AdminState {
                tracker: tracker.clone(),
                api_key: Arc::from(config.admin.api_key.as_str()),
            }));
        }

        let router = Self::apply_layers(&config, app);
        Self {
            router,
            config,
            tracker,
        }
    }

    /// Wrap the application in the cross-cutting layers.
    ///
    /// Outermost first: sensitive headers, request id, trace, CORS, timeout,
    /// body limit, security headers.
    #[allow(deprecated)]
    fn apply_layers(config: &GatekeeperConfig, app: Router) -> Router {
        let mut app = app;
        if config.security.enable_headers {
            app = app.layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ));
        }

        app.layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(cors_layer(&config.cors))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = request.request_id().unwrap_or("unknown"),
                )
            }))
            .layer(set_request_id_layer())
            .layer(SetSensitiveRequestHeadersLayer::new([
                header::AUTHORIZATION,
                HeaderName::from_static(X_SIGNATURE),
                HeaderName::from_static(X_TIMESTAMP),
            ]))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_failures = self.config.security.max_failures,
            fail_window_secs = self.config.security.fail_window_secs,
            block_duration_secs = self.config.security.block_duration_secs,
            "HTTP server starting"
        );

        let cleanup = CleanupTask::new(self.tracker.clone(), self.config.security.cleanup_tick());
        let cleanup_handle = tokio::spawn(cleanup.run(shutdown.resubscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Err(e) = cleanup_handle.await {
            tracing::error!(error = %e, "Cleanup task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn tracker(&self) -> &Arc<AbuseTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let list: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(X_SIGNATURE),
            HeaderName::from_static(X_TIMESTAMP),
            X_REQUEST_ID,
        ])
}
