//! Request admission.
//!
//! Every protected request runs this sequence, stopping at the first rejection:
//!
//! ```text
//! resolve client address
//!     → blocked (address or /24)?          403, no failure recorded
//!     → sleep for the address's slowdown
//!     → Authorization: Bearer <token>?     401 + failure
//!     → token matches?                     403 + failure
//!     → X-Signature / X-Timestamp valid?   401/403 + failure
//!     → forget the address, run the inner handler
//! ```
//!
//! The reason for a rejection is logged; the response body only says
//! "unauthorized" or "forbidden".

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{OriginalUri, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::http::request::RequestIdExt;
use crate::http::response::json_error;
use crate::observability::metrics;
use crate::security::abuse::AbuseTracker;
use crate::security::client_ip;
use crate::security::signature::{signed_path, SignatureError, SignatureVerifier};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("blocked")]
    Blocked,

    #[error("missing bearer")]
    MissingBearer,

    #[error("invalid token")]
    InvalidToken,

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Blocked | Self::InvalidToken => StatusCode::FORBIDDEN,
            Self::MissingBearer => StatusCode::UNAUTHORIZED,
            Self::Signature(e) => e.status(),
        }
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::MissingBearer => "missing_bearer",
            Self::InvalidToken => "invalid_token",
            Self::Signature(e) => e.label(),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::UNAUTHORIZED {
            "unauthorized"
        } else {
            "forbidden"
        };
        json_error(status, message)
    }
}

/// Combines the abuse tracker and credential checks into one decision.
#[derive(Debug)]
pub struct Gatekeeper {
    tracker: Arc<AbuseTracker>,
    verifier: SignatureVerifier,
    api_token: String,
}

impl Gatekeeper {
    pub fn new(auth: &AuthConfig, tracker: Arc<AbuseTracker>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tracker,
            verifier: SignatureVerifier::new(auth.hmac_secret.as_bytes(), clock),
            api_token: auth.api_token.clone(),
        }
    }

    pub fn tracker(&self) -> &Arc<AbuseTracker> {
        &self.tracker
    }

    /// Run the admission sequence for one request.
    pub async fn admit(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        address: &str,
    ) -> Result<(), Rejection> {
        if self.tracker.is_blocked(address) {
            return Err(Rejection::Blocked);
        }

        let delay = self.tracker.current_slowdown(address);
        if !delay.is_zero() {
            tracing::debug!(client = %address, delay = ?delay, "Slowing down client");
            tokio::time::sleep(delay).await;
        }

        let Some(token) = bearer_token(headers) else {
            return Err(self.fail(address, Rejection::MissingBearer));
        };

        if !self.token_matches(token) {
            return Err(self.fail(address, Rejection::InvalidToken));
        }

        self.verifier
            .verify_headers(token, method.as_str(), path, headers)
            .map_err(|e| self.fail(address, e.into()))?;

        self.tracker.record_success(address);
        Ok(())
    }

    fn fail(&self, address: &str, rejection: Rejection) -> Rejection {
        self.tracker.record_failure(address);
        rejection
    }

    fn token_matches(&self, presented: &str) -> bool {
        presented.as_bytes().ct_eq(self.api_token.as_bytes()).into()
    }

    /// Put every route of `router` behind the gatekeeper.
    ///
    /// The layer also covers the router's fallback.
    pub fn protect<S>(self: Arc<Self>, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self, gatekeeper_middleware))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
}

/// Axum middleware wrapping an inner handler with [`Gatekeeper::admit`].
pub async fn gatekeeper_middleware(
    State(gate): State<Arc<Gatekeeper>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let address = client_ip::client_address(&request);
    let method = request.method().clone();
    // Nested routers strip their prefix from `uri()`; the signature covers the full path.
    let raw_path = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |OriginalUri(uri)| uri.path());
    let path = signed_path(raw_path);
    let request_id = request.request_id().unwrap_or("unknown").to_owned();

    match gate.admit(&method, &path, request.headers(), &address).await {
        Ok(()) => {
            metrics::record_admitted();
            next.run(request).await
        }
        Err(Rejection::Blocked) => {
            tracing::warn!(
                request_id = %request_id,
                client = %address,
                method = %method,
                path = %path,
                "Blocked request"
            );
            metrics::record_rejected(Rejection::Blocked.label());
            Rejection::Blocked.into_response()
        }
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id,
                client = %address,
                method = %method,
                path = %path,
                status = rejection.status().as_u16(),
                reason = %rejection,
                "Authentication failed"
            );
            metrics::record_rejected(rejection.label());
            rejection.into_response()
        }
    }
}
