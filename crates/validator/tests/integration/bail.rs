use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use forma_validator::prelude::*;
use pretty_assertions::assert_eq;

use crate::failing_rule;

struct Counters {
    a: Arc<AtomicUsize>,
    b: Arc<AtomicUsize>,
}

fn setup(fast_exit: bool) -> (Validator, Counters) {
    let v = Validator::builder()
        .registry(Arc::new(RuleRegistry::new()))
        .fast_exit(fast_exit)
        .build();
    let counters = Counters {
        a: Arc::new(AtomicUsize::new(0)),
        b: Arc::new(AtomicUsize::new(0)),
    };
    v.extend("rule_a", failing_rule(Arc::clone(&counters.a)), RuleOptions::default())
        .unwrap();
    v.extend("rule_b", failing_rule(Arc::clone(&counters.b)), RuleOptions::default())
        .unwrap();
    (v, counters)
}

fn failed_rules(v: &Validator) -> Vec<String> {
    v.errors().iter().map(|e| e.rule.clone()).collect()
}

#[tokio::test]
async fn bail_stops_at_first_sync_failure() {
    let (v, counters) = setup(true);
    v.attach(FieldOptions::new("field").rules("rule_a|rule_b"))
        .await
        .unwrap();
    // Empty values skip every rule; feed a real one.
    let valid = v
        .validate(Some("field"), Some(json!("value")), ValidateOptions::new())
        .await
        .unwrap();

    assert!(!valid);
    assert_eq!(failed_rules(&v), ["rule_a"]);
    assert_eq!(counters.a.load(Ordering::SeqCst), 1);
    assert_eq!(counters.b.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn without_fast_exit_every_rule_runs() {
    let (v, counters) = setup(false);
    v.attach(FieldOptions::new("field").rules("rule_a|rule_b"))
        .await
        .unwrap();

    let valid = v
        .validate(Some("field"), Some(json!("value")), ValidateOptions::new())
        .await
        .unwrap();

    assert!(!valid);
    assert_eq!(failed_rules(&v), ["rule_a", "rule_b"]);
    assert_eq!(counters.b.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn field_bails_overrides_fast_exit() {
    let (v, _) = setup(true);
    v.attach(FieldOptions::new("loose").rules("rule_a|rule_b").bails(false))
        .await
        .unwrap();
    let (strict, _) = setup(false);
    strict
        .attach(FieldOptions::new("tight").rules("rule_a|rule_b").bails(true))
        .await
        .unwrap();

    v.validate(Some("loose"), Some(json!("x")), ValidateOptions::new())
        .await
        .unwrap();
    strict
        .validate(Some("tight"), Some(json!("x")), ValidateOptions::new())
        .await
        .unwrap();

    assert_eq!(failed_rules(&v), ["rule_a", "rule_b"]);
    assert_eq!(failed_rules(&strict), ["rule_a"]);
}

#[tokio::test]
async fn deferred_outcomes_before_a_bail_are_still_awaited() {
    let (v, counters) = setup(true);
    v.extend(
        "slow_fail",
        |_: &Value, _: &[Value]| {
            RuleResult::deferred(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                false
            })
        },
        RuleOptions::default(),
    )
    .unwrap();
    v.attach(FieldOptions::new("field").rules("slow_fail|rule_a|rule_b"))
        .await
        .unwrap();

    let valid = v
        .validate(Some("field"), Some(json!("x")), ValidateOptions::new())
        .await
        .unwrap();

    assert!(!valid);
    assert_eq!(failed_rules(&v), ["slow_fail", "rule_a"]);
    assert_eq!(counters.b.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_optional_value_skips_rules() {
    let (v, counters) = setup(false);
    v.attach(FieldOptions::new("field").rules("rule_a|rule_b"))
        .await
        .unwrap();

    for empty in [Value::Null, json!(""), json!([])] {
        assert!(
            v.validate(Some("field"), Some(empty), ValidateOptions::new())
                .await
                .unwrap()
        );
    }
    assert!(v.errors().is_empty());
    assert_eq!(counters.a.load(Ordering::SeqCst), 0);
}
