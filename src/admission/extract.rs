//! Typed extraction of the object under review.
//!
//! Every route expects exactly one resource kind. The extractor refuses
//! envelopes declaring any other resource before decoding, so a policy is
//! never handed a zero-valued object of the wrong shape.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::{AdmissionRequest, GroupVersionResource, PolicyViolation};

/// Errors that can occur while pulling a typed object out of a request
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The envelope declares a different resource than the route serves
    #[error("expected resource to be {expected}")]
    TypeMismatch { expected: GroupVersionResource },

    /// No object was sent (DELETE, or a malformed request)
    #[error("admission request carries no object to review")]
    MissingObject,

    /// The object did not decode as the expected type
    #[error("failed to decode object: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ExtractError {
    /// Label used for this error in logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractError::TypeMismatch { .. } => "ResourceMismatch",
            ExtractError::MissingObject | ExtractError::Decode(_) => "InvalidObject",
        }
    }
}

impl From<ExtractError> for PolicyViolation {
    fn from(err: ExtractError) -> Self {
        PolicyViolation::new(err.reason(), err.to_string())
    }
}

/// A Kubernetes object that can be the subject of an admission review
pub trait AdmissionResource: DeserializeOwned {
    /// The resource this type is served under, e.g. `/v1, Resource=services`
    fn expected_resource() -> GroupVersionResource;

    /// Name used in denial messages
    fn object_name(&self) -> &str;
}

impl<K> AdmissionResource for K
where
    K: k8s_openapi::Resource + k8s_openapi::Metadata<Ty = ObjectMeta> + DeserializeOwned,
{
    fn expected_resource() -> GroupVersionResource {
        GroupVersionResource::new(K::GROUP, K::VERSION, K::URL_PATH_SEGMENT)
    }

    fn object_name(&self) -> &str {
        let meta = self.metadata();
        // Objects created with generateName have no name yet at admission time
        meta.name
            .as_deref()
            .or(meta.generate_name.as_deref())
            .unwrap_or_default()
    }
}

/// Decode the object under review as `K`.
///
/// Fails with [`ExtractError::TypeMismatch`] unless the request's resource
/// equals `K::expected_resource()` on group, version and resource.
pub fn extract<K: AdmissionResource>(request: &AdmissionRequest) -> Result<K, ExtractError> {
    let expected = K::expected_resource();
    if request.resource != expected {
        return Err(ExtractError::TypeMismatch { expected });
    }

    let raw = request
        .object
        .as_deref()
        .ok_or(ExtractError::MissingObject)?;
    Ok(serde_json::from_str(raw.get())?)
}
