//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the webhook server is listening)
//! - `/metrics` - Prometheus metrics endpoint
//!
//! Served over plain HTTP on its own port so probes do not need the webhook
//! certificate.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

use crate::admission::Verdict;

/// Labels for per-route metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RouteLabels {
    pub path: String,
}

impl EncodeLabelSet for RouteLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("path", self.path.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for admission decisions (path + allowed/denied)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DecisionLabels {
    pub path: String,
    pub decision: &'static str,
}

impl EncodeLabelSet for DecisionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("path", self.path.as_str()).encode(encoder.encode_label())?;
        ("decision", self.decision).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for denials and transport failures (path + cause)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CauseLabels {
    pub path: String,
    pub cause: &'static str,
}

impl EncodeLabelSet for CauseLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("path", self.path.as_str()).encode(encoder.encode_label())?;
        ("cause", self.cause).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook server
pub struct Metrics {
    /// Admission reviews answered, by decision
    pub reviews_total: Family<DecisionLabels, Counter>,
    /// Denials, by violation reason
    pub denials_total: Family<CauseLabels, Counter>,
    /// Requests rejected before reaching a policy, by failure kind
    pub transport_errors_total: Family<CauseLabels, Counter>,
    /// Time spent deciding an admission review
    pub review_duration_seconds: Family<RouteLabels, Histogram>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reviews_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "admission_reviews",
            "Total number of admission reviews answered",
            reviews_total.clone(),
        );

        let denials_total = Family::<CauseLabels, Counter>::default();
        registry.register(
            "admission_denials",
            "Total number of denied admission reviews by reason",
            denials_total.clone(),
        );

        let transport_errors_total = Family::<CauseLabels, Counter>::default();
        registry.register(
            "admission_transport_errors",
            "Total number of admission requests rejected before evaluation",
            transport_errors_total.clone(),
        );

        let review_duration_seconds =
            Family::<RouteLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 15))
            });
        registry.register(
            "admission_review_duration_seconds",
            "Duration of admission review evaluation in seconds",
            review_duration_seconds.clone(),
        );

        Self {
            reviews_total,
            denials_total,
            transport_errors_total,
            review_duration_seconds,
            registry,
        }
    }

    /// Record an answered review
    pub fn record_review(&self, path: &str, verdict: &Verdict, duration_secs: f64) {
        let decision = match verdict {
            Verdict::Admitted => "allowed",
            Verdict::Denied(violation) => {
                self.denials_total
                    .get_or_create(&CauseLabels {
                        path: path.to_string(),
                        cause: violation.reason,
                    })
                    .inc();
                "denied"
            }
        };
        self.reviews_total
            .get_or_create(&DecisionLabels {
                path: path.to_string(),
                decision,
            })
            .inc();
        self.review_duration_seconds
            .get_or_create(&RouteLabels {
                path: path.to_string(),
            })
            .observe(duration_secs);
    }

    /// Record a request rejected before evaluation
    pub fn record_transport_error(&self, path: &str, cause: &'static str) {
        self.transport_errors_total
            .get_or_create(&CauseLabels {
                path: path.to_string(),
                cause,
            })
            .inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook server is accepting connections
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the service as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the service is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until the webhook server is listening.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on `addr`
pub async fn run_health_server(
    addr: SocketAddr,
    state: Arc<HealthState>,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!(%addr, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
