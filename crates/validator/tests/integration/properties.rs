use forma_validator::prelude::*;
use forma_validator::selector::Selector;
use futures::executor::block_on;
use proptest::prelude::*;

use crate::validator;

const OPTIONAL_RULES: &[&str] = &[
    "alpha",
    "alpha_num",
    "email",
    "numeric",
    "min:3",
    "max:2",
    "min_value:10",
    "max_value:1",
    "between:5,6",
    "is:x",
    "included:a,b",
];

fn empty_value() -> impl Strategy<Value = Value> {
    prop_oneof![Just(Value::Null), Just(json!("")), Just(json!([]))]
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn empty_optional_fields_always_pass(
        rules in proptest::sample::subsequence(OPTIONAL_RULES, 1..=OPTIONAL_RULES.len()),
        value in empty_value(),
    ) {
        let v = validator();
        let rules = rules.join("|");
        block_on(v.attach(FieldOptions::new("field").rules(&rules))).unwrap();

        let valid = block_on(v.validate(Some("field"), Some(value), ValidateOptions::new())).unwrap();
        prop_assert!(valid, "rules {rules} rejected an empty optional value");
        prop_assert!(v.errors().is_empty());
    }

    #[test]
    fn fields_without_rules_are_valid(value in any::<Option<i64>>().prop_map(|n| json!(n))) {
        let v = validator();
        block_on(v.attach(FieldOptions::new("free"))).unwrap();

        prop_assert!(block_on(v.validate(Some("free"), Some(value), ValidateOptions::new())).unwrap());
        let field = v.field("free").unwrap();
        prop_assert_eq!(field.flags().valid, Some(true));
        prop_assert!(field.flags().validated);
    }

    #[test]
    fn required_rejects_empty_values(value in empty_value()) {
        let v = validator();
        block_on(v.attach(FieldOptions::new("name").rules("required|min:3"))).unwrap();

        prop_assert!(!block_on(v.validate(Some("name"), Some(value), ValidateOptions::new())).unwrap());
        let errors = v.errors();
        let first = errors.first_rule("name", None);
        prop_assert_eq!(first.as_deref(), Some("required"));
    }

    #[test]
    fn selector_parts_survive_parsing(
        scope in proptest::option::of(ident()),
        name in ident(),
        rule in proptest::option::of(ident()),
    ) {
        let mut text = String::new();
        if let Some(scope) = &scope {
            text.push_str(scope);
            text.push('.');
        }
        text.push_str(&name);
        if let Some(rule) = &rule {
            text.push(':');
            text.push_str(rule);
        }

        let selector = Selector::parse(&text);
        prop_assert!(!selector.is_id());
        prop_assert_eq!(selector.scope.as_deref(), scope.as_deref());
        prop_assert_eq!(selector.name.as_deref(), Some(name.as_str()));
        prop_assert_eq!(selector.rule.as_deref(), rule.as_deref());
    }

    #[test]
    fn id_selectors_keep_the_whole_id(id in "[a-z0-9_-]{1,12}") {
        let selector = Selector::parse(&format!("#{id}"));
        prop_assert!(selector.name.is_none());
        prop_assert_eq!(selector.id.as_deref(), Some(id.as_str()));
    }
}
