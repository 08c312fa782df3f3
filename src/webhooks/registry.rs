//! Route registry: which policy answers which URL path.
//!
//! Built once at startup and handed to the server by value; nothing is
//! registered or removed once serving begins.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::WebhookError;
use crate::admission::{AdmissionRequest, Verdict};
use crate::policies::{AdmissionPipeline, Admit, Policy};

/// An immutable (path, policy pipeline) pair
#[derive(Clone)]
pub struct RouteBinding {
    path: String,
    pipeline: Arc<dyn Admit>,
}

impl RouteBinding {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn policy_name(&self) -> &'static str {
        self.pipeline.policy_name()
    }

    /// Decide on a request with this route's policy
    pub fn admit(&self, request: &AdmissionRequest) -> Verdict {
        self.pipeline.admit(request)
    }

    pub(crate) fn pipeline(&self) -> Arc<dyn Admit> {
        Arc::clone(&self.pipeline)
    }
}

impl fmt::Debug for RouteBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBinding")
            .field("path", &self.path)
            .field("policy", &self.policy_name())
            .finish()
    }
}

/// Ordered collection of route bindings
#[derive(Clone, Debug, Default)]
pub struct WebhookRegistry {
    bindings: Vec<RouteBinding>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `policy` to `path`.
    ///
    /// Fails if the path is not absolute or is already bound.
    pub fn register<P: Policy>(
        mut self,
        path: impl Into<String>,
        policy: P,
    ) -> Result<Self, WebhookError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(WebhookError::InvalidRoute(path));
        }
        if self.bindings.iter().any(|b| b.path == path) {
            return Err(WebhookError::DuplicateRoute(path));
        }

        info!(path = %path, policy = policy.name(), "Registered admission policy");
        self.bindings.push(RouteBinding {
            path,
            pipeline: Arc::new(AdmissionPipeline::new(policy)),
        });
        Ok(self)
    }

    pub fn bindings(&self) -> &[RouteBinding] {
        &self.bindings
    }

    /// Look up the binding for a path
    pub fn get(&self, path: &str) -> Option<&RouteBinding> {
        self.bindings.iter().find(|b| b.path == path)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
