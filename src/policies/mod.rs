//! Admission policies and the pipeline that feeds them.
//!
//! A [`Policy`] judges one typed resource. [`AdmissionPipeline`] adapts it to
//! raw admission requests: extract the resource the policy expects, then hand
//! it over. Extraction failures deny with the extraction error as the reason.
//!
//! Shipped policies:
//! - [`ServiceExposurePolicy`]: gates externally reachable LoadBalancer Services
//! - [`RuleLintPolicy`]: syntax-checks ConfigMaps holding Prometheus rule files

pub mod rule_lint;
pub mod service_exposure;

pub use rule_lint::RuleLintPolicy;
pub use service_exposure::ServiceExposurePolicy;

use tracing::debug;

use crate::admission::{AdmissionRequest, AdmissionResource, Verdict, extract};

/// A single compliance rule, judged against one typed resource
pub trait Policy: Send + Sync + 'static {
    /// The resource kind this policy reviews
    type Resource: AdmissionResource;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Judge a resource
    fn evaluate(&self, resource: &Self::Resource) -> Verdict;
}

/// Uniform entry point from a raw request to a verdict
pub trait Admit: Send + Sync {
    /// Name of the policy behind this pipeline
    fn policy_name(&self) -> &'static str;

    /// Decide on a request
    fn admit(&self, request: &AdmissionRequest) -> Verdict;
}

/// Binds a policy to its resource extractor
#[derive(Clone, Debug)]
pub struct AdmissionPipeline<P> {
    policy: P,
}

impl<P: Policy> AdmissionPipeline<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<P: Policy> Admit for AdmissionPipeline<P> {
    fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    fn admit(&self, request: &AdmissionRequest) -> Verdict {
        match extract::<P::Resource>(request) {
            Ok(resource) => self.policy.evaluate(&resource),
            Err(e) => {
                debug!(
                    uid = %request.uid,
                    policy = self.policy.name(),
                    error = %e,
                    "Failed to extract object from admission request"
                );
                Verdict::Denied(e.into())
            }
        }
    }
}
