//! YAML rule-group files.
//!
//! ```yaml
//! groups:
//!   - name: example
//!     rules:
//!       - alert: HighErrorRate
//!         expr: job:request_errors:rate5m > 0.5
//!         for: 10m
//! ```
//!
//! Unknown fields are rejected, as Prometheus does when loading rule files.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use super::{
    RuleSyntaxError, check_expr, is_valid_duration, is_valid_label_name, is_valid_metric_name,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroups {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub query_offset: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: Vec<GroupRule>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupRule {
    #[serde(default)]
    pub record: Option<String>,
    #[serde(default)]
    pub alert: Option<String>,
    #[serde(default)]
    pub expr: String,
    #[serde(default, rename = "for")]
    pub for_duration: Option<String>,
    #[serde(default)]
    pub keep_firing_for: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Whether `content` is a YAML mapping with a top-level `groups` key
pub(super) fn is_rule_groups(content: &str) -> bool {
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(content),
        Ok(serde_yaml::Value::Mapping(ref mapping)) if mapping.contains_key("groups")
    )
}

/// Decode and check a rule-group file
pub(super) fn parse(content: &str) -> Result<RuleGroups, RuleSyntaxError> {
    let file: RuleGroups = serde_yaml::from_str(content).map_err(|e| RuleSyntaxError {
        line: e.location().map(|l| l.line()),
        message: format!("invalid rule file: {}", e),
    })?;

    let mut seen = HashSet::new();
    for group in &file.groups {
        if group.name.is_empty() {
            return Err(RuleSyntaxError::new("rule group name must not be empty"));
        }
        if !seen.insert(group.name.as_str()) {
            return Err(RuleSyntaxError::new(format!(
                "group {:?}: repeated in the same file",
                group.name
            )));
        }
        check_group(group)
            .map_err(|e| RuleSyntaxError::new(format!("group {:?}: {}", group.name, e)))?;
    }

    Ok(file)
}

fn check_group(group: &RuleGroup) -> Result<(), String> {
    for (field, value) in [
        ("interval", &group.interval),
        ("query_offset", &group.query_offset),
    ] {
        if let Some(duration) = value
            && !is_valid_duration(duration)
        {
            return Err(format!("invalid {} {:?}", field, duration));
        }
    }
    check_label_names("label", &group.labels)?;

    for (index, rule) in group.rules.iter().enumerate() {
        check_rule(rule).map_err(|e| format!("rule {}: {}", index + 1, e))?;
    }
    Ok(())
}

fn check_rule(rule: &GroupRule) -> Result<(), String> {
    match (&rule.record, &rule.alert) {
        (Some(_), Some(_)) => {
            return Err("only one of 'record' and 'alert' must be set".to_string());
        }
        (None, None) => return Err("one of 'record' or 'alert' must be set".to_string()),
        (Some(record), None) => {
            if !is_valid_metric_name(record) {
                return Err(format!("invalid recording rule name {:?}", record));
            }
            if rule.for_duration.is_some() {
                return Err("invalid field 'for' in recording rule".to_string());
            }
            if rule.keep_firing_for.is_some() {
                return Err("invalid field 'keep_firing_for' in recording rule".to_string());
            }
            if !rule.annotations.is_empty() {
                return Err("invalid field 'annotations' in recording rule".to_string());
            }
        }
        (None, Some(alert)) => {
            if alert.is_empty() {
                return Err("alert name must not be empty".to_string());
            }
            for (field, value) in [
                ("for", &rule.for_duration),
                ("keep_firing_for", &rule.keep_firing_for),
            ] {
                if let Some(duration) = value
                    && !is_valid_duration(duration)
                {
                    return Err(format!("invalid {} {:?}", field, duration));
                }
            }
            check_label_names("annotation", &rule.annotations)?;
        }
    }

    check_label_names("label", &rule.labels)?;

    if rule.expr.trim().is_empty() {
        return Err("field 'expr' must be set".to_string());
    }
    check_expr(&rule.expr)
}

fn check_label_names(what: &str, labels: &BTreeMap<String, String>) -> Result<(), String> {
    match labels.keys().find(|name| !is_valid_label_name(name)) {
        Some(name) => Err(format!("invalid {} name {:?}", what, name)),
        None => Ok(()),
    }
}
