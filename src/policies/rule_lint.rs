//! Prometheus rule-file linting policy.
//!
//! ConfigMaps labelled `role: prometheus-rulefiles` are mounted into
//! Prometheus as rule files. A syntax error in any of them breaks rule
//! reloading, so every data entry of such a ConfigMap must lint cleanly.
//! All other ConfigMaps are opaque and pass untouched.

use k8s_openapi::api::core::v1::ConfigMap;
use tracing::debug;

use super::Policy;
use crate::admission::{AdmissionResource, Verdict};
use crate::rules;

/// Label selecting ConfigMaps that hold rule files
pub const ROLE_LABEL: &str = "role";
/// Value of [`ROLE_LABEL`] marking a rule-file ConfigMap
pub const RULEFILES_ROLE: &str = "prometheus-rulefiles";

/// Denies rule-file ConfigMaps containing invalid rule syntax
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleLintPolicy;

impl RuleLintPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl Policy for RuleLintPolicy {
    type Resource = ConfigMap;

    fn name(&self) -> &'static str {
        "prometheus-rule-lint"
    }

    fn evaluate(&self, configmap: &ConfigMap) -> Verdict {
        let role = configmap
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(ROLE_LABEL));

        if role.map(String::as_str) != Some(RULEFILES_ROLE) {
            return Verdict::Admitted;
        }

        // Entries are visited in key order; the first failure wins
        for (key, content) in configmap.data.iter().flatten() {
            match rules::lint(content) {
                Ok(file) => {
                    debug!(
                        configmap = configmap.object_name(),
                        key = %key,
                        rules = file.rule_count(),
                        "Rule file passed linting"
                    );
                }
                Err(e) => {
                    return Verdict::deny(
                        "InvalidRuleSyntax",
                        format!(
                            "Prometheus rule linting failed for ConfigMap '{}' (key '{}'): {}",
                            configmap.object_name(),
                            key,
                            e
                        ),
                    );
                }
            }
        }

        Verdict::Admitted
    }
}
