use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use forma_validator::prelude::*;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

/// Host that records every interaction.
#[derive(Default)]
struct RecordingHost {
    cycles: AtomicUsize,
    locales: Mutex<Vec<String>>,
}

impl Host for RecordingHost {
    fn schedule(&self) -> BoxFuture<'static, ()> {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        future::ready(()).boxed()
    }

    fn locale_changed(&self, locale: &str) {
        self.locales.lock().push(locale.to_owned());
    }
}

fn with_host() -> (Validator, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let v = Validator::builder()
        .host(Arc::clone(&host) as Arc<dyn Host>)
        .build();
    (v, host)
}

fn french() -> LocalePatch {
    LocalePatch {
        messages: HashMap::from([(
            "required".to_owned(),
            "Le champ {field} est obligatoire.".to_owned(),
        )]),
        attributes: HashMap::from([("name".to_owned(), "nom".to_owned())]),
        ..LocalePatch::default()
    }
}

#[test]
fn host_hears_only_actual_locale_changes() {
    let (v, host) = with_host();

    v.set_locale("en");
    v.set_locale("fr");
    v.set_locale("fr");
    v.set_locale("en");

    assert_eq!(v.locale(), "en");
    assert_eq!(*host.locales.lock(), ["fr", "en"]);
}

#[tokio::test]
async fn reset_waits_two_host_cycles() {
    let (v, host) = with_host();
    v.attach(FieldOptions::new("name").rules("required").immediate(true))
        .await
        .unwrap();
    v.flag("name", &FlagsPatch::new().touched(true), None);
    assert!(v.errors().has("name", None));

    v.reset(&FieldMatcher::new().name("name")).await;

    assert_eq!(host.cycles.load(Ordering::SeqCst), 2);
    let field = v.field("name").unwrap();
    assert_eq!(*field.flags(), FieldFlags { required: true, ..FieldFlags::default() });
    assert!(v.errors().is_empty());
}

#[tokio::test]
async fn localize_then_regenerate_rewrites_messages() {
    let v = crate::validator();
    v.attach(FieldOptions::new("name").rules("required").immediate(true))
        .await
        .unwrap();
    assert_eq!(
        v.errors().first("name", None).as_deref(),
        Some("The name field is required.")
    );

    v.localize("fr", Some(french()));
    assert_eq!(v.locale(), "fr");
    // Stored messages keep their text until regenerated.
    assert_eq!(
        v.errors().first("name", None).as_deref(),
        Some("The name field is required.")
    );

    v.regenerate();
    assert_eq!(
        v.errors().first("name", None).as_deref(),
        Some("Le champ nom est obligatoire.")
    );

    v.localize("en", None);
    v.regenerate();
    assert_eq!(
        v.errors().first("name", None).as_deref(),
        Some("The name field is required.")
    );
}

#[tokio::test]
async fn unknown_rule_message_falls_back_to_generic_text() {
    let v = crate::validator();
    v.localize("de", None);
    v.attach(FieldOptions::new("name").rules("required").immediate(true))
        .await
        .unwrap();

    assert_eq!(
        v.errors().first("name", None).as_deref(),
        Some("The name value is not valid.")
    );
}

#[tokio::test]
async fn config_document_drives_the_builder() {
    let config = ValidatorConfig::from_json_str(
        r#"{
            "fastExit": false,
            "locale": "fr",
            "dictionary": {
                "fr": {
                    "messages": {
                        "required": "Le champ {field} est obligatoire.",
                        "email": "Le champ {field} doit être une adresse valide."
                    },
                    "attributes": { "email": "courriel" }
                }
            }
        }"#,
    )
    .unwrap();

    let v = Validator::builder().config(config).build();
    assert!(!v.fast_exit());
    assert_eq!(v.locale(), "fr");

    v.attach(FieldOptions::new("email").rules("email|min:10"))
        .await
        .unwrap();
    assert!(
        !v.validate(Some("email"), Some(json!("x")), ValidateOptions::new())
            .await
            .unwrap()
    );

    // No fast exit: both rules report, `min` through the generic fallback.
    assert_eq!(
        v.errors().all(None),
        [
            "Le champ courriel doit être une adresse valide.",
            "The courriel value is not valid.",
        ]
    );
}

#[tokio::test]
async fn custom_field_messages_win_over_rule_messages() {
    let dictionary = Arc::new(MessageDictionary::with_defaults());
    dictionary.set_custom_message("en", "email", "required", "We need your email.");
    let v = Validator::builder()
        .dictionary(Arc::clone(&dictionary) as Arc<dyn Dictionary>)
        .build();

    v.attach(FieldOptions::new("email").rules("required").immediate(true))
        .await
        .unwrap();
    v.attach(FieldOptions::new("name").rules("required").immediate(true))
        .await
        .unwrap();

    assert_eq!(v.errors().all(None), ["We need your email.", "The name field is required."]);
}
