use forma_validator::prelude::*;
use pretty_assertions::assert_eq;

use crate::validator;

async fn signup_form() -> Validator {
    let v = validator();
    v.attach(
        FieldOptions::new("email")
            .rules("required|email")
            .initial_value(json!("not-an-email")),
    )
    .await
    .unwrap();
    v.attach(
        FieldOptions::new("age")
            .rules("required|min_value:18")
            .initial_value(json!(30)),
    )
    .await
    .unwrap();
    v
}

#[tokio::test]
async fn provided_values_replace_field_values() {
    let v = signup_form().await;

    let valid = v
        .validate_all(
            Targets::values([("email", json!("a@b.com")), ("age", json!(5))]),
            ValidateOptions::new(),
        )
        .await
        .unwrap();

    assert!(!valid);
    let errors = v.errors();
    assert_eq!(errors.count(), 1);
    assert_eq!(
        errors.first("age", None).as_deref(),
        Some("The age field must be 18 or more.")
    );
    assert!(!errors.has("email", None));
}

#[tokio::test]
async fn json_object_targets() {
    let v = signup_form().await;
    let values = json!({ "email": "a@b.com", "age": 21 });

    let valid = v
        .validate_all(values.as_object().cloned().unwrap(), ValidateOptions::new())
        .await
        .unwrap();
    assert!(valid);
    assert!(v.errors().is_empty());
}

#[tokio::test]
async fn stored_values_when_none_given() {
    let v = signup_form().await;

    let valid = v
        .validate_all(Targets::Unscoped, ValidateOptions::new())
        .await
        .unwrap();
    assert!(!valid);
    assert_eq!(v.errors().collect(None, None).keys().collect::<Vec<_>>(), ["email"]);
}

#[tokio::test]
async fn names_select_across_scopes() {
    let v = validator();
    v.attach(FieldOptions::new("email").scope("a").rules("required"))
        .await
        .unwrap();
    v.attach(FieldOptions::new("email").scope("b").rules("required"))
        .await
        .unwrap();
    v.attach(FieldOptions::new("name").scope("a").rules("required"))
        .await
        .unwrap();

    v.validate_all(Targets::names(["email"]), ValidateOptions::new())
        .await
        .unwrap();

    let scopes: Vec<_> = v.errors().iter().map(|e| (e.field.clone(), e.scope.clone())).collect();
    assert_eq!(
        scopes,
        [
            ("email".to_owned(), Some("a".to_owned())),
            ("email".to_owned(), Some("b".to_owned())),
        ]
    );
}

#[tokio::test]
async fn scope_target_and_silent_mode() {
    let v = validator();
    v.attach(FieldOptions::new("email").scope("signup").rules("required"))
        .await
        .unwrap();

    let valid = v
        .validate_all("signup", ValidateOptions::new().silent())
        .await
        .unwrap();
    assert!(!valid);
    assert!(v.errors().is_empty());

    assert!(!v.validate_all("signup", ValidateOptions::new()).await.unwrap());
    assert!(v.errors().has("email", Some("signup")));
}

#[tokio::test]
async fn validate_scopes_covers_everything() {
    let v = signup_form().await;
    v.attach(FieldOptions::new("token").scope("api").rules("required"))
        .await
        .unwrap();

    assert!(!v.validate_scopes(ValidateOptions::new()).await.unwrap());
    let grouped = v.errors().collect(None, None);
    assert_eq!(grouped.keys().collect::<Vec<_>>(), ["email", "token"]);
}

#[tokio::test]
async fn unknown_rule_propagates_from_batch() {
    let v = validator();
    v.attach(FieldOptions::new("ok").rules("required").initial_value(json!("x")))
        .await
        .unwrap();
    let err = v
        .attach(FieldOptions::new("broken").rules("no_such_rule").initial_value(json!("x")))
        .await
        .unwrap_err();
    assert!(err.is_unknown_rule());

    let err = v
        .validate_all(Targets::Unscoped, ValidateOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No such validator 'no_such_rule' exists.");
}
