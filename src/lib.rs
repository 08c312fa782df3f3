//! admission-webhooks library crate
//!
//! Validating admission webhooks for Kubernetes. Each policy is bound to a URL
//! path and judges one resource kind:
//! - Services of type `LoadBalancer` must be internal or explicitly opted into
//!   public exposure
//! - ConfigMaps holding Prometheus rule files must contain valid rules

pub mod admission;
pub mod config;
pub mod health;
pub mod policies;
pub mod rules;
pub mod webhooks;

pub use admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Verdict};
pub use health::HealthState;
pub use policies::{Policy, RuleLintPolicy, ServiceExposurePolicy};
pub use webhooks::{WebhookError, WebhookRegistry, WebhookServer, standard_registry};
