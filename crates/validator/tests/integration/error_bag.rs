use forma_validator::prelude::*;
use pretty_assertions::assert_eq;

fn error(id: &str, field: &str, scope: Option<&str>, rule: &str, msg: &str) -> FieldError {
    let error = FieldError::new(field, msg).with_id(id).with_rule(rule);
    match scope {
        Some(scope) => error.with_scope(scope),
        None => error,
    }
}

#[test]
fn add_then_remove_round_trip() {
    let mut bag = ErrorBag::new();
    bag.add(error("1", "name", None, "required", "The name field is required."));
    let before = bag.count();

    let added = error("2", "email", Some("signup"), "email", "The email field must be a valid email.");
    bag.add(added.clone());

    let grouped = bag.collect(None, None);
    assert_eq!(grouped["email"], [added.msg.clone()]);

    bag.remove(&added.field, added.scope.as_deref(), None);
    assert_eq!(bag.count(), before);
    assert!(!bag.collect(None, None).contains_key("email"));
}

#[test]
fn grouped_messages_snapshot() {
    let mut bag = ErrorBag::new();
    bag.extend([
        error("1", "email", None, "required", "The email field is required."),
        error("1", "email", None, "email", "The email field must be a valid email."),
        error("2", "name", Some("profile"), "min", "The name field must be at least 3 characters."),
    ]);

    insta::assert_json_snapshot!(bag.collect(None, None), @r#"
    {
      "email": [
        "The email field is required.",
        "The email field must be a valid email."
      ],
      "name": [
        "The name field must be at least 3 characters."
      ]
    }
    "#);
}

#[test]
fn error_records_snapshot() {
    let mut bag = ErrorBag::new();
    bag.add(error("f_1", "email", Some("signup"), "required", "The email field is required.").with_owner("form-a"));
    bag.add(FieldError::new("email", "Taken."));

    let errors: Vec<&FieldError> = bag.iter().collect();
    insta::assert_json_snapshot!(errors, @r#"
    [
      {
        "id": "f_1",
        "owner_id": "form-a",
        "field": "email",
        "scope": "signup",
        "rule": "required",
        "msg": "The email field is required."
      },
      {
        "id": null,
        "owner_id": null,
        "field": "email",
        "scope": null,
        "rule": "",
        "msg": "Taken."
      }
    ]
    "#);
}

#[test]
fn first_prefers_primary_over_literal_dotted_name() {
    let mut bag = ErrorBag::new();
    bag.add(error("1", "user.name", None, "required", "literal"));
    assert_eq!(bag.first("name", Some("user")).as_deref(), Some("literal"));

    bag.add(error("2", "name", Some("user"), "required", "scoped"));
    assert_eq!(bag.first("name", Some("user")).as_deref(), Some("scoped"));
    assert_eq!(bag.first("user.name", None).as_deref(), Some("scoped"));
}

#[test]
fn rule_queries() {
    let mut bag = ErrorBag::new();
    bag.extend([
        error("1", "email", None, "required", "req"),
        error("1", "email", None, "email", "fmt"),
    ]);

    assert_eq!(bag.first_rule("email", None).as_deref(), Some("required"));
    assert_eq!(bag.first_by_rule("email", "email", None).as_deref(), Some("fmt"));
    assert_eq!(bag.first_not("email", "required", None).as_deref(), Some("fmt"));
    assert_eq!(bag.first("email:email", None).as_deref(), Some("fmt"));
    assert_eq!(bag.first_by_id(&FieldId::new("1")).as_deref(), Some("req"));
}

#[test]
fn clear_matches_scope_exactly() {
    let mut bag = ErrorBag::new();
    bag.extend([
        error("1", "a", None, "required", "a"),
        error("2", "b", Some("s"), "required", "b"),
    ]);

    bag.clear(None);
    assert_eq!(bag.all(None), ["b"]);
    bag.clear(Some("s"));
    assert!(!bag.any(None));
}

#[test]
fn update_reappends_moved_error() {
    let mut bag = ErrorBag::new();
    bag.extend([
        error("1", "a", None, "required", "a"),
        error("2", "b", None, "required", "b"),
    ]);

    bag.update(&FieldId::new("1"), Some("moved"));

    assert_eq!(bag.all(None), ["b", "a"]);
    assert_eq!(bag.all(Some("moved")), ["a"]);
}

#[test]
fn remove_by_id_spares_manual_errors() {
    let mut bag = ErrorBag::new();
    bag.extend([
        error("1", "a", None, "required", "a"),
        FieldError::new("a", "manual"),
    ]);

    bag.remove_by_id(&[FieldId::new("1")]);
    assert_eq!(bag.all(None), ["manual"]);
}
