//! Message dictionary
//!
//! The validator never formats messages itself: it asks a [`Dictionary`]
//! for the text of `(locale, field, rule)`. [`MessageDictionary`] is the
//! in-memory implementation used by default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Locale used when nothing else is configured.
pub const DEFAULT_LOCALE: &str = "en";

/// Date format of [`DEFAULT_LOCALE`] (chrono `strftime` syntax).
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Arguments handed to a message generator.
#[derive(Debug, Clone, Copy)]
pub struct MessageArgs<'a> {
    /// Display name of the field (alias or localized attribute).
    pub field: &'a str,
    /// Rule parameters, with target names localized.
    pub params: &'a [Value],
    /// Data returned by the rule alongside its outcome.
    pub data: &'a Value,
}

/// A message generator closure.
pub type MessageFn = Arc<dyn Fn(&MessageArgs<'_>) -> String + Send + Sync>;

/// A dictionary entry.
#[derive(Clone)]
pub enum Message {
    /// Template with `{field}` and positional `{0}`, `{1}`, ... placeholders.
    Text(String),
    /// Generator invoked with the message arguments.
    Generator(MessageFn),
}

impl Message {
    /// Renders the message.
    pub fn render(&self, args: &MessageArgs<'_>) -> String {
        match self {
            Self::Text(template) => interpolate(template, args),
            Self::Generator(generate) => generate(args),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<MessageFn> for Message {
    fn from(generate: MessageFn) -> Self {
        Self::Generator(generate)
    }
}

/// Collaborator that resolves localized messages, attributes and date formats.
pub trait Dictionary: Send + Sync {
    /// The active locale.
    fn locale(&self) -> String;

    /// Switches the active locale.
    fn set_locale(&self, locale: &str);

    /// Message for `rule` failing on `field`.
    fn field_message(&self, locale: &str, field: &str, rule: &str, args: &MessageArgs<'_>)
    -> String;

    /// Localized display name for `name`, or `fallback`.
    fn attribute(&self, locale: &str, name: &str, fallback: &str) -> String;

    /// Default date format of the locale.
    fn date_format(&self, locale: &str) -> Option<String>;

    /// Registers a message for `rule` under `locale`.
    fn set_message(&self, locale: &str, rule: &str, message: Message);

    /// Merges a patch into the dictionary.
    fn merge(&self, patch: DictionaryPatch);
}

/// Serializable dictionary content keyed by locale.
pub type DictionaryPatch = HashMap<String, LocalePatch>;

/// One locale's worth of dictionary content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalePatch {
    /// Messages per rule.
    pub messages: HashMap<String, String>,
    /// Display names per field.
    pub attributes: HashMap<String, String>,
    /// Field-specific messages: field -> rule -> message.
    pub custom: HashMap<String, HashMap<String, String>>,
    /// Default date format (chrono `strftime` syntax).
    pub date_format: Option<String>,
}

#[derive(Debug, Default)]
struct LocaleEntry {
    messages: HashMap<String, Message>,
    attributes: HashMap<String, String>,
    custom: HashMap<String, HashMap<String, Message>>,
    date_format: Option<String>,
}

#[derive(Debug)]
struct Inner {
    locale: String,
    locales: HashMap<String, LocaleEntry>,
}

/// In-memory [`Dictionary`].
#[derive(Debug)]
pub struct MessageDictionary {
    inner: RwLock<Inner>,
}

impl Default for MessageDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDictionary {
    /// Creates an empty dictionary using [`DEFAULT_LOCALE`].
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                locale: DEFAULT_LOCALE.to_owned(),
                locales: HashMap::new(),
            }),
        }
    }

    /// Creates a dictionary with English messages for the built-in rules and
    /// [`DEFAULT_DATE_FORMAT`] as the English date format.
    pub fn with_defaults() -> Self {
        let dictionary = Self::new();
        let messages = DEFAULT_MESSAGES
            .iter()
            .map(|(rule, text)| ((*rule).to_owned(), (*text).to_owned()))
            .collect();
        dictionary.merge(HashMap::from([(
            DEFAULT_LOCALE.to_owned(),
            LocalePatch {
                messages,
                date_format: Some(DEFAULT_DATE_FORMAT.to_owned()),
                ..LocalePatch::default()
            },
        )]));
        dictionary
    }

    /// Returns true if the locale has any content.
    pub fn has_locale(&self, locale: &str) -> bool {
        self.inner.read().locales.contains_key(locale)
    }

    /// Sets a field-specific message.
    pub fn set_custom_message(
        &self,
        locale: &str,
        field: &str,
        rule: &str,
        message: impl Into<Message>,
    ) {
        self.inner
            .write()
            .locales
            .entry(locale.to_owned())
            .or_default()
            .custom
            .entry(field.to_owned())
            .or_default()
            .insert(rule.to_owned(), message.into());
    }

    /// Sets the display name of a field.
    pub fn set_attribute(&self, locale: &str, name: &str, display: impl Into<String>) {
        self.inner
            .write()
            .locales
            .entry(locale.to_owned())
            .or_default()
            .attributes
            .insert(name.to_owned(), display.into());
    }

    /// Sets the default date format of a locale.
    pub fn set_date_format(&self, locale: &str, format: impl Into<String>) {
        self.inner
            .write()
            .locales
            .entry(locale.to_owned())
            .or_default()
            .date_format = Some(format.into());
    }
}

impl Dictionary for MessageDictionary {
    fn locale(&self) -> String {
        self.inner.read().locale.clone()
    }

    fn set_locale(&self, locale: &str) {
        self.inner.write().locale = locale.to_owned();
    }

    fn field_message(
        &self,
        locale: &str,
        field: &str,
        rule: &str,
        args: &MessageArgs<'_>,
    ) -> String {
        // Clone the entry out so generators run without the lock held.
        let message = {
            let inner = self.inner.read();
            inner.locales.get(locale).and_then(|entry| {
                entry
                    .custom
                    .get(field)
                    .and_then(|rules| rules.get(rule))
                    .or_else(|| entry.messages.get(rule))
                    .or_else(|| entry.messages.get("_default"))
                    .cloned()
            })
        };

        match message {
            Some(message) => message.render(args),
            None => format!("The {} value is not valid.", args.field),
        }
    }

    fn attribute(&self, locale: &str, name: &str, fallback: &str) -> String {
        self.inner
            .read()
            .locales
            .get(locale)
            .and_then(|entry| entry.attributes.get(name))
            .cloned()
            .unwrap_or_else(|| fallback.to_owned())
    }

    fn date_format(&self, locale: &str) -> Option<String> {
        self.inner
            .read()
            .locales
            .get(locale)
            .and_then(|entry| entry.date_format.clone())
    }

    fn set_message(&self, locale: &str, rule: &str, message: Message) {
        self.inner
            .write()
            .locales
            .entry(locale.to_owned())
            .or_default()
            .messages
            .insert(rule.to_owned(), message);
    }

    fn merge(&self, patch: DictionaryPatch) {
        let mut inner = self.inner.write();
        for (locale, content) in patch {
            let entry = inner.locales.entry(locale).or_default();
            entry.messages.extend(
                content
                    .messages
                    .into_iter()
                    .map(|(rule, text)| (rule, Message::Text(text))),
            );
            entry.attributes.extend(content.attributes);
            for (field, rules) in content.custom {
                entry.custom.entry(field).or_default().extend(
                    rules
                        .into_iter()
                        .map(|(rule, text)| (rule, Message::Text(text))),
                );
            }
            if content.date_format.is_some() {
                entry.date_format = content.date_format;
            }
        }
    }
}

/// Substitutes `{field}` and `{N}` placeholders; unknown ones stay verbatim.
pub fn interpolate(template: &str, args: &MessageArgs<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };

        let key = &tail[1..end];
        if key == "field" {
            out.push_str(args.field);
        } else if let Some(param) = key.parse::<usize>().ok().and_then(|i| args.params.get(i)) {
            out.push_str(&display_value(param));
        } else {
            out.push_str(&tail[..=end]);
        }
        rest = &tail[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Renders a parameter the way messages show it (strings unquoted).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("_default", "The {field} value is not valid."),
    ("after", "The {field} must be after {0}."),
    ("alpha", "The {field} field may only contain alphabetic characters."),
    ("alpha_num", "The {field} field may only contain alpha-numeric characters."),
    ("before", "The {field} must be before {0}."),
    ("between", "The {field} field must be between {0} and {1}."),
    ("confirmed", "The {field} confirmation does not match."),
    ("date_between", "The {field} must be between {0} and {1}."),
    ("date_format", "The {field} must be in the format {0}."),
    ("email", "The {field} field must be a valid email."),
    ("excluded", "The {field} field must be a valid value."),
    ("included", "The {field} field must be a valid value."),
    ("is", "The {field} value is not valid."),
    ("is_not", "The {field} value is not valid."),
    ("max", "The {field} field may not be greater than {0} characters."),
    ("max_value", "The {field} field must be {0} or less."),
    ("min", "The {field} field must be at least {0} characters."),
    ("min_value", "The {field} field must be {0} or more."),
    ("numeric", "The {field} field may only contain numeric characters."),
    ("regex", "The {field} field format is invalid."),
    ("required", "The {field} field is required."),
];
