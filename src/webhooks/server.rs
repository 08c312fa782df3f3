//! Admission webhook server.
//!
//! Every registered route accepts `POST` with a JSON `AdmissionReview` and
//! answers with a JSON `AdmissionReview` carrying the decision. Transport
//! problems (unreadable body, wrong content type, undecodable envelope) are
//! answered with 400 and no body. Any decodable review gets 200, whether the
//! object was allowed or denied.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{debug, error, info, trace, warn};

use super::{WebhookError, WebhookRegistry};
use crate::admission::{AdmissionResponse, AdmissionReview, Verdict};
use crate::health::HealthState;
use crate::policies::Admit;

/// The only accepted request content type
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Default request body limit; admission payloads can exceed axum's 2 MiB default
pub const DEFAULT_MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Per-route handler state
#[derive(Clone)]
struct RouteState {
    path: Arc<str>,
    pipeline: Arc<dyn Admit>,
    health: Arc<HealthState>,
}

/// HTTPS front door for a set of registered policies
pub struct WebhookServer {
    registry: WebhookRegistry,
    health: Arc<HealthState>,
    max_body_bytes: usize,
}

impl WebhookServer {
    pub fn new(registry: WebhookRegistry, health: Arc<HealthState>) -> Self {
        Self {
            registry,
            health,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Override the request body limit
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn registry(&self) -> &WebhookRegistry {
        &self.registry
    }

    /// Create the webhook router with one `POST` route per binding
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        for binding in self.registry.bindings() {
            info!(
                path = binding.path(),
                policy = binding.policy_name(),
                "Setting admission handler"
            );
            let state = RouteState {
                path: Arc::from(binding.path()),
                pipeline: binding.pipeline(),
                health: Arc::clone(&self.health),
            };
            router = router.route(binding.path(), post(review_handler).with_state(state));
        }
        router.layer(DefaultBodyLimit::max(self.max_body_bytes))
    }

    /// Serve all routes over TLS on `addr` until `handle` shuts the server down.
    ///
    /// The health state is marked ready once the listener is bound.
    pub async fn serve(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        handle: Handle,
    ) -> Result<(), WebhookError> {
        let app = self.router();

        let listening = handle.clone();
        let health = Arc::clone(&self.health);
        tokio::spawn(async move {
            if let Some(bound) = listening.listening().await {
                info!(addr = %bound, "Webhook server listening with TLS");
                health.set_ready(true).await;
            }
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }
}

/// Handle one admission review
async fn review_handler(
    State(route): State<RouteState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let started = Instant::now();
    let metrics = &route.health.metrics;

    let body = match body {
        Ok(body) => body,
        Err(e) => {
            error!(path = %route.path, error = %e, "Failed to read admission request body");
            metrics.record_transport_error(&route.path, "unreadable_body");
            let status = e.status();
            return if status.is_client_error() {
                status.into_response()
            } else {
                StatusCode::BAD_REQUEST.into_response()
            };
        }
    };
    trace!(path = %route.path, body = %String::from_utf8_lossy(&body), "AdmissionReview request");

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if content_type != Some(JSON_CONTENT_TYPE) {
        error!(
            path = %route.path,
            content_type = ?content_type,
            "Unexpected content type, expect application/json"
        );
        metrics.record_transport_error(&route.path, "content_type");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let review: AdmissionReview = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            error!(path = %route.path, error = %e, "Failed to decode AdmissionReview");
            metrics.record_transport_error(&route.path, "invalid_review");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let AdmissionReview {
        api_version,
        request,
        ..
    } = review;
    let Some(request) = request else {
        error!(path = %route.path, "AdmissionReview carries no request");
        metrics.record_transport_error(&route.path, "invalid_review");
        return StatusCode::BAD_REQUEST.into_response();
    };

    let uid = request.uid.clone();
    debug!(
        uid = %uid,
        path = %route.path,
        policy = route.pipeline.policy_name(),
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        kind = %request.kind,
        "Processing admission request"
    );

    let verdict = route.pipeline.admit(&request);
    match &verdict {
        Verdict::Admitted => {
            info!(uid = %uid, path = %route.path, "Admission request allowed");
        }
        Verdict::Denied(violation) => {
            warn!(
                uid = %uid,
                path = %route.path,
                reason = violation.reason,
                message = %violation.message,
                "Admission request denied"
            );
        }
    }
    metrics.record_review(&route.path, &verdict, started.elapsed().as_secs_f64());

    let review = AdmissionResponse::allowed(uid)
        .with_verdict(&verdict)
        .into_review(api_version);

    match serde_json::to_vec(&review) {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(path = %route.path, error = %e, "Failed to encode AdmissionReview response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
