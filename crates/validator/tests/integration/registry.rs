use std::sync::Arc;

use forma_validator::dictionary::MessageFn;
use forma_validator::prelude::*;
use pretty_assertions::assert_eq;

use crate::validator;

fn even(value: &Value, _: &[Value]) -> RuleResult {
    RuleResult::Bool(value.as_i64().is_some_and(|n| n % 2 == 0))
}

#[tokio::test]
async fn removed_rule_is_unknown_on_next_run() {
    let v = validator();
    v.extend("even", even, RuleOptions::default()).unwrap();
    v.attach(FieldOptions::new("count").rules("even"))
        .await
        .unwrap();

    assert!(
        v.validate(Some("count"), Some(json!(4)), ValidateOptions::new())
            .await
            .unwrap()
    );

    v.remove("even");
    v.remove("even");
    assert!(!v.registry().has("even"));

    let err = v
        .validate(Some("count"), Some(json!(4)), ValidateOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_unknown_rule());
    assert_eq!(err.to_string(), "No such validator 'even' exists.");
}

#[tokio::test]
async fn unknown_rule_clears_pending_flag() {
    let v = validator();
    v.extend("even", even, RuleOptions::default()).unwrap();
    v.attach(FieldOptions::new("count").rules("even"))
        .await
        .unwrap();
    v.remove("even");

    assert!(
        v.validate(Some("count"), Some(json!(4)), ValidateOptions::new())
            .await
            .is_err()
    );
    assert!(!v.field("count").unwrap().flags().pending);
}

#[test]
fn spec_without_validate_is_rejected() {
    let v = validator();
    let err = v
        .extend("broken", RuleSpec::new(), RuleOptions::default())
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Extension Error: The validator 'broken' must be a function or have a 'validate' method."
    );
    assert!(!v.registry().has("broken"));
}

#[test]
fn names_clashing_with_the_rule_syntax_are_rejected() {
    let v = validator();
    for name in ["", "a|b", "min:3", "#id", "two words"] {
        assert!(
            matches!(
                v.extend(name, even, RuleOptions::default()),
                Err(Error::Extension { .. })
            ),
            "{name:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn message_generator_renders_failures() {
    let v = validator();
    let message: MessageFn = Arc::new(|args: &MessageArgs<'_>| {
        format!("{} must be even.", args.field)
    });
    v.extend(
        "even",
        RuleSpec::new().with_validate(even).with_message(message),
        RuleOptions::default(),
    )
    .unwrap();
    v.attach(FieldOptions::new("count").alias("Count").rules("even"))
        .await
        .unwrap();

    v.validate(Some("count"), Some(json!(3)), ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(
        v.errors().first("count", None).as_deref(),
        Some("Count must be even.")
    );
}

#[tokio::test]
async fn target_rule_options_substitute_the_other_field() {
    let v = validator();
    v.extend(
        "greater_than",
        |value: &Value, params: &[Value]| {
            RuleResult::Bool(match (value.as_f64(), params.first().and_then(Value::as_f64)) {
                (Some(value), Some(other)) => value > other,
                _ => false,
            })
        },
        RuleOptions::default().target(),
    )
    .unwrap();
    v.attach(FieldOptions::new("min").initial_value(json!(10)))
        .await
        .unwrap();
    v.attach(FieldOptions::new("max").rules("greater_than:min"))
        .await
        .unwrap();

    assert!(
        v.validate(Some("max"), Some(json!(11)), ValidateOptions::new())
            .await
            .unwrap()
    );
    assert!(
        !v.validate(Some("max"), Some(json!(9)), ValidateOptions::new())
            .await
            .unwrap()
    );
}

#[test]
fn validators_share_a_registry() {
    let registry = Arc::new(RuleRegistry::new());
    let first = Validator::new(Arc::clone(&registry));
    let second = Validator::new(Arc::clone(&registry));

    first.extend("even", even, RuleOptions::default()).unwrap();
    assert!(second.registry().has("even"));

    second.remove("even");
    assert!(!first.registry().has("even"));
}

#[test]
fn fresh_registries_are_isolated() {
    let first = validator();
    let second = validator();

    first.extend("even", even, RuleOptions::default()).unwrap();
    assert!(!second.registry().has("even"));
    assert!(second.registry().has("required"));
}
