// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the admission webhook front door.
//!
//! These tests drive the full axum router (registry, handler, extractor and
//! policies) in-process, WITHOUT TLS or a Kubernetes API server.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_public_load_balancer_denied
//! ```

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use admission_webhooks::HealthState;
use admission_webhooks::webhooks::{
    GKE_PUBLIC_SERVICE_PATH, PROMETHEUS_LINTER_PATH, WebhookServer, standard_registry,
};
use common::fixtures::{ConfigMapBuilder, ReviewBuilder, ServiceBuilder};

const INVALID_RULES: &str = r#" ALERT deployment_health LABELS { team = "test-team", urgent = "false" }"#;
const VALID_RULES: &str = r#"
# Deployment health
ALERT deployment_health
  IF kube_deployment_status_replicas_available{deployment="test-deployment",namespace="default"} < kube_deployment_spec_replicas
  FOR 10m
  LABELS { team = "test-team", urgent = "false" }
  ANNOTATIONS {
    summary = "Deployment is unhealthy",
    description = "Fewer than the expected number of pods are running.",
  }

job:http_requests:rate5m = sum by (job) (rate(http_requests_total[5m]))
"#;

fn app() -> (Router, Arc<HealthState>) {
    let health = Arc::new(HealthState::new());
    let registry = standard_registry("gke/load-balancer-type").unwrap();
    let router = WebhookServer::new(registry, Arc::clone(&health)).router();
    (router, health)
}

async fn post(path: &str, content_type: &str, body: String) -> (StatusCode, Option<Value>) {
    let (router, _) = app();
    post_to(router, path, content_type, body).await
}

async fn post_to(
    router: Router,
    path: &str,
    content_type: &str,
    body: String,
) -> (StatusCode, Option<Value>) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = (!bytes.is_empty()).then(|| serde_json::from_slice(&bytes).unwrap());
    (status, json)
}

async fn review(path: &str, review: ReviewBuilder) -> Value {
    let (status, body) = post(path, "application/json", review.body()).await;
    assert_eq!(status, StatusCode::OK);
    body.expect("review response body")
}

mod service_exposure {
    use super::*;

    #[tokio::test]
    async fn test_public_load_balancer_denied() {
        let service = ServiceBuilder::new("frontend").load_balancer().build();
        let body = review(GKE_PUBLIC_SERVICE_PATH, ReviewBuilder::service(&service)).await;

        assert_eq!(body["kind"], "AdmissionReview");
        assert_eq!(body["apiVersion"], "admission.k8s.io/v1");
        assert_eq!(body["response"]["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(body["response"]["allowed"], false);
        let message = body["response"]["status"]["message"].as_str().unwrap();
        assert!(message.contains("'frontend'"), "{message}");
        assert!(message.contains("gke/load-balancer-type: External"), "{message}");
    }

    #[tokio::test]
    async fn test_internal_load_balancer_allowed() {
        let service = ServiceBuilder::new("frontend")
            .load_balancer()
            .annotation("cloud.google.com/load-balancer-type", "internal")
            .build();
        let body = review(GKE_PUBLIC_SERVICE_PATH, ReviewBuilder::service(&service)).await;

        assert_eq!(body["response"]["allowed"], true);
        assert!(body["response"].get("status").is_none());
    }

    #[tokio::test]
    async fn test_explicit_external_allowed() {
        let service = ServiceBuilder::new("frontend")
            .load_balancer()
            .annotation("gke/load-balancer-type", "External")
            .build();
        let body = review(GKE_PUBLIC_SERVICE_PATH, ReviewBuilder::service(&service)).await;
        assert_eq!(body["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_cluster_ip_allowed() {
        let service = ServiceBuilder::new("backend").type_("ClusterIP").build();
        let body = review(GKE_PUBLIC_SERVICE_PATH, ReviewBuilder::service(&service)).await;
        assert_eq!(body["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_resource_mismatch_denied() {
        let service = ServiceBuilder::new("frontend").load_balancer().build();
        let body = review(
            GKE_PUBLIC_SERVICE_PATH,
            ReviewBuilder::service(&service).resource("pods"),
        )
        .await;

        assert_eq!(body["response"]["allowed"], false);
        let message = body["response"]["status"]["message"].as_str().unwrap();
        assert!(message.contains("services"), "{message}");
    }

    #[tokio::test]
    async fn test_missing_object_denied() {
        let service = ServiceBuilder::new("frontend").build();
        let body = review(
            GKE_PUBLIC_SERVICE_PATH,
            ReviewBuilder::service(&service)
                .operation("DELETE")
                .without_object(),
        )
        .await;
        assert_eq!(body["response"]["allowed"], false);
    }

    #[tokio::test]
    async fn test_api_version_echoed() {
        let service = ServiceBuilder::new("frontend").build();
        let body = review(
            GKE_PUBLIC_SERVICE_PATH,
            ReviewBuilder::service(&service).api_version("admission.k8s.io/v1beta1"),
        )
        .await;
        assert_eq!(body["apiVersion"], "admission.k8s.io/v1beta1");
    }
}

mod rule_lint {
    use super::*;

    #[tokio::test]
    async fn test_invalid_rules_denied() {
        let configmap = ConfigMapBuilder::new("test-rules")
            .label("prometheus", "shared")
            .rulefiles()
            .entry("test.rules", INVALID_RULES)
            .build();
        let body = review(PROMETHEUS_LINTER_PATH, ReviewBuilder::configmap(&configmap)).await;

        assert_eq!(body["response"]["allowed"], false);
        let message = body["response"]["status"]["message"].as_str().unwrap();
        assert!(message.contains("'test-rules'"), "{message}");
        assert!(message.contains("expected IF"), "{message}");
    }

    #[tokio::test]
    async fn test_valid_rules_allowed() {
        let configmap = ConfigMapBuilder::new("test-rules")
            .rulefiles()
            .entry("test.rules", VALID_RULES)
            .build();
        let body = review(PROMETHEUS_LINTER_PATH, ReviewBuilder::configmap(&configmap)).await;
        assert_eq!(body["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_unlabelled_configmap_allowed() {
        let configmap = ConfigMapBuilder::new("app-config")
            .entry("test.rules", INVALID_RULES)
            .build();
        let body = review(PROMETHEUS_LINTER_PATH, ReviewBuilder::configmap(&configmap)).await;
        assert_eq!(body["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_service_on_linter_route_denied() {
        let service = ServiceBuilder::new("frontend").build();
        let body = review(PROMETHEUS_LINTER_PATH, ReviewBuilder::service(&service)).await;

        let message = body["response"]["status"]["message"].as_str().unwrap();
        assert!(message.contains("configmaps"), "{message}");
    }
}

mod transport {
    use super::*;

    #[tokio::test]
    async fn test_wrong_content_type_rejected() {
        let service = ServiceBuilder::new("frontend").load_balancer().build();
        let (status, body) = post(
            GKE_PUBLIC_SERVICE_PATH,
            "text/plain",
            ReviewBuilder::service(&service).body(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let (status, _) = post(
            GKE_PUBLIC_SERVICE_PATH,
            "application/json",
            "{not json".to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let (status, _) = post("/nothing", "application/json", "{}".to_string()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_decisions_recorded_in_metrics() {
        let (router, health) = app();
        let service = ServiceBuilder::new("frontend").load_balancer().build();
        let (status, _) = post_to(
            router,
            GKE_PUBLIC_SERVICE_PATH,
            "application/json",
            ReviewBuilder::service(&service).body(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let encoded = health.metrics.encode();
        assert!(encoded.contains("cause=\"PublicLoadBalancer\""), "{encoded}");
        assert!(encoded.contains("decision=\"denied\""), "{encoded}");
    }
}
