//! Public load-balancer exposure policy.
//!
//! Only `LoadBalancer` Services can become reachable from outside the
//! cluster, so every other Service type passes untouched. A LoadBalancer is
//! allowed when:
//! - the platform annotation scopes it to the private network
//!   (`cloud.google.com/load-balancer-type: Internal`), or
//! - the exposure annotation explicitly opts in
//!   (`gke/load-balancer-type: External`).
//!
//! Annotation keys match exactly, values case-insensitively. The platform
//! annotation only ever short-circuits on `internal`; once it falls through,
//! the exposure annotation alone decides.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Service;
use tracing::debug;

use super::Policy;
use crate::admission::{AdmissionResource, Verdict};

/// Platform annotation that scopes a load balancer to the private network
pub const PLATFORM_LB_TYPE_ANNOTATION: &str = "cloud.google.com/load-balancer-type";
/// Default annotation used to opt a load balancer into public exposure
pub const EXPOSURE_ANNOTATION: &str = "gke/load-balancer-type";

const LOAD_BALANCER: &str = "LoadBalancer";
const INTERNAL: &str = "internal";
const EXTERNAL: &str = "external";

/// Denies LoadBalancer Services that would be public without an explicit opt-in
#[derive(Clone, Debug)]
pub struct ServiceExposurePolicy {
    exposure_annotation: String,
}

impl Default for ServiceExposurePolicy {
    fn default() -> Self {
        Self::new(EXPOSURE_ANNOTATION)
    }
}

impl ServiceExposurePolicy {
    /// Create a policy that accepts `<exposure_annotation>: External` as opt-in
    pub fn new(exposure_annotation: impl Into<String>) -> Self {
        Self {
            exposure_annotation: exposure_annotation.into(),
        }
    }

    pub fn exposure_annotation(&self) -> &str {
        &self.exposure_annotation
    }
}

impl Policy for ServiceExposurePolicy {
    type Resource = Service;

    fn name(&self) -> &'static str {
        "service-exposure"
    }

    fn evaluate(&self, service: &Service) -> Verdict {
        let service_type = service.spec.as_ref().and_then(|s| s.type_.as_deref());
        debug!(
            service = service.object_name(),
            service_type = ?service_type,
            "Evaluating service exposure"
        );

        if service_type != Some(LOAD_BALANCER) {
            return Verdict::Admitted;
        }

        let annotations = service.metadata.annotations.as_ref();

        if annotation_is(annotations, PLATFORM_LB_TYPE_ANNOTATION, INTERNAL) {
            return Verdict::Admitted;
        }

        if annotation_is(annotations, &self.exposure_annotation, EXTERNAL) {
            return Verdict::Admitted;
        }

        Verdict::deny(
            "PublicLoadBalancer",
            format!(
                "The service '{}' is public, and so disallowed without the explicit '{}: External' annotation. Add it to expose the service externally.",
                service.object_name(),
                self.exposure_annotation
            ),
        )
    }
}

/// Exact key match, case-insensitive value match. A missing map never matches.
fn annotation_is(annotations: Option<&BTreeMap<String, String>>, key: &str, value: &str) -> bool {
    annotations
        .and_then(|a| a.get(key))
        .is_some_and(|v| v.eq_ignore_ascii_case(value))
}
