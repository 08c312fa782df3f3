//! Prometheus rule-file linting.
//!
//! Two on-disk formats are understood:
//! - YAML rule groups (`groups: [{name, rules: [...]}]`), used whenever the
//!   content is a YAML mapping with a `groups` key
//! - the statement format (`ALERT <name> IF <expr> ...` and
//!   `<name>[{labels}] = <expr>`), used for everything else
//!
//! Rule expressions are parsed as PromQL by `promql-parser`; the rest of the
//! grammar is checked here.

mod groups;
mod legacy;

pub use groups::{GroupRule, RuleGroup, RuleGroups};
pub use legacy::{AlertStatement, RecordStatement, Statement};

use std::fmt;
use std::sync::LazyLock;

/// A rule file that passed linting
#[derive(Clone, Debug)]
pub enum RuleFile {
    Groups(RuleGroups),
    Statements(Vec<Statement>),
}

impl RuleFile {
    /// Number of rules defined in the file
    pub fn rule_count(&self) -> usize {
        match self {
            RuleFile::Groups(groups) => groups.groups.iter().map(|g| g.rules.len()).sum(),
            RuleFile::Statements(statements) => statements.len(),
        }
    }
}

/// A syntax error, with the 1-based line it was found on when known
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSyntaxError {
    pub line: Option<usize>,
    pub message: String,
}

impl RuleSyntaxError {
    pub(crate) fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }

    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for RuleSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RuleSyntaxError {}

/// Lint a rule file, returning its parsed rules or the first syntax error
pub fn lint(content: &str) -> Result<RuleFile, RuleSyntaxError> {
    if groups::is_rule_groups(content) {
        groups::parse(content).map(RuleFile::Groups)
    } else {
        legacy::parse(content).map(RuleFile::Statements)
    }
}

/// Parse `expr` as PromQL
fn check_expr(expr: &str) -> Result<(), String> {
    promql_parser::parser::parse(expr)
        .map(|_| ())
        .map_err(|e| format!("could not parse expression {:?}: {}", expr, e))
}

fn is_valid_metric_name(name: &str) -> bool {
    static METRIC_NAME_RE: LazyLock<Option<regex::Regex>> =
        LazyLock::new(|| regex::Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").ok());
    METRIC_NAME_RE.as_ref().is_some_and(|re| re.is_match(name))
}

fn is_valid_label_name(name: &str) -> bool {
    static LABEL_NAME_RE: LazyLock<Option<regex::Regex>> =
        LazyLock::new(|| regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").ok());
    LABEL_NAME_RE.as_ref().is_some_and(|re| re.is_match(name))
}

/// Check a Prometheus duration such as `10m`, `1h30m` or `500ms`
fn is_valid_duration(duration: &str) -> bool {
    static DURATION_RE: LazyLock<Option<regex::Regex>> = LazyLock::new(|| {
        regex::Regex::new(
            r"^((([0-9]+)y)?(([0-9]+)w)?(([0-9]+)d)?(([0-9]+)h)?(([0-9]+)m)?(([0-9]+)s)?(([0-9]+)ms)?|0)$",
        )
        .ok()
    });
    !duration.is_empty() && DURATION_RE.as_ref().is_some_and(|re| re.is_match(duration))
}
