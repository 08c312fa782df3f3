// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for admission-webhooks.
//!
//! Uses proptest to generate random inputs and verify the policy decision
//! tables and the robustness of the rule-file linter.

#[path = "../common/mod.rs"]
mod common;

use proptest::prelude::*;

use admission_webhooks::policies::Policy;
use admission_webhooks::rules::lint;
use admission_webhooks::{RuleLintPolicy, ServiceExposurePolicy};
use common::fixtures::{ConfigMapBuilder, ServiceBuilder};

const PLATFORM_ANNOTATION: &str = "cloud.google.com/load-balancer-type";
const EXPOSURE_ANNOTATION: &str = "gke/load-balancer-type";

/// Strategy for generating Service types, including unset.
fn any_service_type() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("LoadBalancer".to_string())),
        Just(Some("ClusterIP".to_string())),
        Just(Some("NodePort".to_string())),
        Just(Some("ExternalName".to_string())),
    ]
}

/// Strategy for annotation values, biased towards the interesting ones in any case.
fn any_annotation_value() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        "(?i)internal".prop_map(Some),
        "(?i)external".prop_map(Some),
        "[a-zA-Z]{0,12}".prop_map(Some),
    ]
}

proptest! {
    /// Property: a Service is admitted iff it is not a LoadBalancer, or the
    /// platform marks it internal, or it explicitly opts into external exposure.
    #[test]
    fn service_exposure_decision_table(
        type_ in any_service_type(),
        platform in any_annotation_value(),
        exposure in any_annotation_value(),
    ) {
        let mut builder = ServiceBuilder::new("svc");
        if let Some(type_) = &type_ {
            builder = builder.type_(type_.clone());
        }
        if let Some(value) = &platform {
            builder = builder.annotation(PLATFORM_ANNOTATION, value.clone());
        }
        if let Some(value) = &exposure {
            builder = builder.annotation(EXPOSURE_ANNOTATION, value.clone());
        }

        let expected = type_.as_deref() != Some("LoadBalancer")
            || platform.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("internal"))
            || exposure.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("external"));

        let verdict = ServiceExposurePolicy::default().evaluate(&builder.build());
        prop_assert_eq!(verdict.is_admitted(), expected);
        if let Some(violation) = verdict.violation() {
            prop_assert_eq!(violation.reason, "PublicLoadBalancer");
            prop_assert!(violation.message.contains("'svc'"));
        }
    }

    /// Property: annotation keys are matched exactly, so an opt-in under a
    /// different key never admits a public LoadBalancer.
    #[test]
    fn exposure_key_must_match(key in "[a-z]{1,8}/[a-z-]{1,16}") {
        prop_assume!(key != EXPOSURE_ANNOTATION && key != PLATFORM_ANNOTATION);
        let service = ServiceBuilder::new("svc")
            .load_balancer()
            .annotation(key, "External")
            .build();
        prop_assert!(!ServiceExposurePolicy::default().evaluate(&service).is_admitted());
    }

    /// Property: a custom exposure annotation is honored in place of the default.
    #[test]
    fn custom_exposure_annotation(key in "[a-z]{1,8}\\.io/[a-z]{1,12}") {
        let service = ServiceBuilder::new("svc")
            .load_balancer()
            .annotation(key.clone(), "external")
            .build();
        prop_assert!(ServiceExposurePolicy::new(key).evaluate(&service).is_admitted());
    }

    /// Property: ConfigMaps without the rule-file role are never linted.
    #[test]
    fn unlabelled_configmaps_admitted(
        role in proptest::option::of("[a-z-]{0,24}"),
        content in ".*",
    ) {
        prop_assume!(role.as_deref() != Some("prometheus-rulefiles"));
        let mut builder = ConfigMapBuilder::new("cm").entry("data", content);
        if let Some(role) = role {
            builder = builder.label("role", role);
        }
        prop_assert!(RuleLintPolicy.evaluate(&builder.build()).is_admitted());
    }

    /// Property: linting never panics, whatever the input.
    #[test]
    fn lint_total(content in "\\PC{0,200}") {
        let _ = lint(&content);
    }

    /// Property: rule-file ConfigMaps are admitted iff every entry lints.
    #[test]
    fn rulefiles_follow_lint(entries in proptest::collection::btree_map(
        "[a-z]{1,6}\\.rules",
        prop_oneof![
            Just("up_count = count(up)".to_string()),
            Just("ALERT Down IF up == 0 FOR 5m".to_string()),
            Just("ALERT Down LABELS { a = \"b\" }".to_string()),
            Just("broken = sum(".to_string()),
        ],
        0..4,
    )) {
        let expected = entries.values().all(|content| lint(content).is_ok());
        let mut builder = ConfigMapBuilder::new("rules").rulefiles();
        for (key, content) in &entries {
            builder = builder.entry(key.clone(), content.clone());
        }
        prop_assert_eq!(RuleLintPolicy.evaluate(&builder.build()).is_admitted(), expected);
    }
}
