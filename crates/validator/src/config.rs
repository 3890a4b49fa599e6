//! Validator configuration

use serde::{Deserialize, Serialize};

use crate::dictionary::{DEFAULT_LOCALE, DictionaryPatch};
use crate::error::{Error, Result};

/// Settings applied when a [`Validator`](crate::Validator) is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// Stop a field's scan at the first synchronous failure.
    pub fast_exit: bool,
    /// Initial dictionary locale.
    pub locale: String,
    /// Dictionary content merged at build time.
    pub dictionary: DictionaryPatch,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fast_exit: true,
            locale: DEFAULT_LOCALE.to_owned(),
            dictionary: DictionaryPatch::new(),
        }
    }
}

impl ValidatorConfig {
    /// Parses a JSON document; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| Error::Config {
            message: "invalid validator configuration".to_owned(),
            source: Some(source),
        })
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_fast_exit(mut self, fast_exit: bool) -> Self {
        self.fast_exit = fast_exit;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}
