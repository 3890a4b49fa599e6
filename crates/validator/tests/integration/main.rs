//! Integration tests for forma-validator.

mod bail;
mod error_bag;
mod locale;
mod properties;
mod registry;
mod validate_all;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use forma_validator::prelude::*;

/// A validator over a fresh registry with the built-in rules.
pub fn validator() -> Validator {
    Validator::new(Arc::new(RuleRegistry::with_builtin_rules()))
}

/// A sync rule that always fails and counts its invocations.
pub fn failing_rule(calls: Arc<AtomicUsize>) -> impl Fn(&Value, &[Value]) -> RuleResult + Send + Sync {
    move |_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        RuleResult::Bool(false)
    }
}
