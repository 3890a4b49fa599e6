//! Rules: registry, outcomes, rule-string parsing and built-in rules

pub mod builtin;
pub mod outcome;
pub mod registry;

use indexmap::IndexMap;
use serde_json::Value;

pub use outcome::{Normalized, RuleOutcome, RuleResult};
pub use registry::{RuleEntry, RuleOptions, RuleRegistry, RuleSpec, ValidateFn};

/// A field's rules in declaration order: rule name -> parameters.
pub type RuleSet = IndexMap<String, Vec<Value>>;

/// Parses `required|min:3|between:1,10` into a [`RuleSet`].
///
/// Parameters are kept as strings; rules coerce them as needed. Empty
/// segments are skipped and a repeated rule keeps its first position with
/// the last parameters.
pub fn parse_rules(rules: &str) -> RuleSet {
    rules
        .split('|')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once(':') {
            Some((name, params)) => (
                name.trim().to_owned(),
                params
                    .split(',')
                    .map(|p| Value::String(p.trim().to_owned()))
                    .collect(),
            ),
            None => (segment.to_owned(), Vec::new()),
        })
        .collect()
}
