//! Webhook front door: route registry, TLS listener and review handler.
//!
//! Every route is a `POST` endpoint bound to one policy:
//! - `/prometheuslinter`: Prometheus rule-file linting for ConfigMaps
//! - `/gkepublicservice`: public LoadBalancer gating for Services

mod error;
mod registry;
mod server;
mod tls;

pub use error::WebhookError;
pub use registry::{RouteBinding, WebhookRegistry};
pub use server::{DEFAULT_MAX_BODY_BYTES, JSON_CONTENT_TYPE, WebhookServer};
pub use tls::{load_rustls_config, server_config};

use crate::policies::{RuleLintPolicy, ServiceExposurePolicy};

/// Route serving the rule-file linting policy
pub const PROMETHEUS_LINTER_PATH: &str = "/prometheuslinter";
/// Route serving the public load-balancer policy
pub const GKE_PUBLIC_SERVICE_PATH: &str = "/gkepublicservice";

/// Registry with both shipped policies on their standard routes
pub fn standard_registry(exposure_annotation: &str) -> Result<WebhookRegistry, WebhookError> {
    WebhookRegistry::new()
        .register(PROMETHEUS_LINTER_PATH, RuleLintPolicy)?
        .register(
            GKE_PUBLIC_SERVICE_PATH,
            ServiceExposurePolicy::new(exposure_annotation),
        )
}
