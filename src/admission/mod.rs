//! AdmissionReview wire types (`admission.k8s.io`).
//!
//! Only the fields this service reads or writes are modelled. The object under
//! review is kept as raw JSON until a route's extractor decodes it into the
//! typed resource that route expects.

mod extract;
mod verdict;

pub use extract::{AdmissionResource, ExtractError, extract};
pub use verdict::{PolicyViolation, Verdict};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// API version used for responses when the request did not carry one
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of the review envelope
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Group, version and kind of the object under review
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// Group, version and resource plural of the object under review.
///
/// Equality is structural over all three fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Resource={}", self.group, self.version, self.resource)
    }
}

/// Operation being admitted. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

/// The envelope exchanged with the API server.
///
/// Inbound reviews carry `request`; outbound reviews carry `response`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

/// A single admission question from the API server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Identifier echoed back in the response
    pub uid: String,
    /// Declared type of the object
    pub kind: GroupVersionKind,
    /// Resource the object is served under; checked by the extractor
    pub resource: GroupVersionResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// Raw object under review, absent for DELETE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// The decision returned to the API server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    /// Present iff `allowed` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

/// Denial detail shown to whoever attempted the change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub message: String,
}

impl AdmissionResponse {
    /// An allowing response for the given request uid
    pub fn allowed(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            status: None,
        }
    }

    /// Flip to a denial carrying `message`
    pub fn deny(mut self, message: impl Into<String>) -> Self {
        self.allowed = false;
        self.status = Some(Status {
            message: message.into(),
        });
        self
    }

    /// Apply a policy verdict to this response
    pub fn with_verdict(self, verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Admitted => self,
            Verdict::Denied(violation) => self.deny(violation.message.clone()),
        }
    }

    /// Status message, if denied
    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.message.as_str())
    }

    /// Wrap in a review envelope, echoing the request's API version
    pub fn into_review(self, api_version: Option<String>) -> AdmissionReview {
        AdmissionReview {
            api_version: Some(api_version.unwrap_or_else(|| ADMISSION_API_VERSION.to_string())),
            kind: Some(ADMISSION_REVIEW_KIND.to_string()),
            request: None,
            response: Some(self),
        }
    }
}
