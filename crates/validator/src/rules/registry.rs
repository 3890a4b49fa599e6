//! Rule registry
//!
//! Maps rule names to their validate function and invocation options. One
//! registry is shared (via `Arc`) by every [`Validator`](crate::Validator)
//! built from it; tests construct their own to stay isolated.
//!
//! Registration is last-write-wins. Lookups clone the entry's `Arc`, so a
//! rule replaced mid-validation keeps serving the in-flight pass with the
//! old function. Interleaving `extend`/`remove` with validation is not
//! otherwise coordinated.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::outcome::RuleResult;
use crate::dictionary::MessageFn;
use crate::error::{Error, Result};

/// Signature of a rule's validate function.
pub type ValidateFn = Arc<dyn Fn(&Value, &[Value]) -> RuleResult + Send + Sync>;

/// Invocation options of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleOptions {
    /// First parameter names another field whose value is substituted.
    pub has_target: bool,
    /// Eligible for the initial, pre-interaction pass.
    pub immediate: bool,
    /// Receives the resolved date format as a trailing parameter.
    pub is_date: bool,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            has_target: false,
            immediate: true,
            is_date: false,
        }
    }
}

impl RuleOptions {
    /// Marks the rule as depending on another field.
    #[must_use = "builder methods must be chained or built"]
    pub fn target(mut self) -> Self {
        self.has_target = true;
        self
    }

    /// Marks the rule as date-aware.
    #[must_use = "builder methods must be chained or built"]
    pub fn date(mut self) -> Self {
        self.is_date = true;
        self
    }

    /// Excludes the rule from the initial pass.
    #[must_use = "builder methods must be chained or built"]
    pub fn deferred_until_interaction(mut self) -> Self {
        self.immediate = false;
        self
    }
}

/// A custom rule as handed to `extend`.
///
/// Either shape is accepted: a bare validate function (via `From`), or a
/// spec assembled with [`RuleSpec::new`] exposing a validate method and,
/// optionally, a message generator.
#[derive(Clone, Default)]
pub struct RuleSpec {
    validate: Option<ValidateFn>,
    message: Option<MessageFn>,
}

impl RuleSpec {
    /// Creates an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the validate method.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> RuleResult + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Sets the message generator registered with the dictionary.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_message(mut self, message: MessageFn) -> Self {
        self.message = Some(message);
        self
    }

    /// Returns the message generator, if any.
    pub fn message(&self) -> Option<&MessageFn> {
        self.message.as_ref()
    }
}

impl<F> From<F> for RuleSpec
where
    F: Fn(&Value, &[Value]) -> RuleResult + Send + Sync + 'static,
{
    fn from(validate: F) -> Self {
        Self::new().with_validate(validate)
    }
}

impl std::fmt::Debug for RuleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSpec")
            .field("validate", &self.validate.is_some())
            .field("message", &self.message.is_some())
            .finish()
    }
}

/// A registered rule.
#[derive(Clone)]
pub struct RuleEntry {
    validate: ValidateFn,
    options: RuleOptions,
}

impl RuleEntry {
    /// Invokes the validate function.
    pub fn call(&self, value: &Value, params: &[Value]) -> RuleResult {
        (self.validate)(value, params)
    }

    /// Returns the rule's options.
    pub fn options(&self) -> RuleOptions {
        self.options
    }
}

impl std::fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEntry")
            .field("options", &self.options)
            .finish()
    }
}

/// Registry of named rules plus the strict-mode switch.
#[derive(Debug)]
pub struct RuleRegistry {
    rules: RwLock<HashMap<String, Arc<RuleEntry>>>,
    strict: AtomicBool,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Creates an empty registry in strict mode.
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            strict: AtomicBool::new(true),
        }
    }

    /// Creates a registry preloaded with the built-in rules.
    pub fn with_builtin_rules() -> Self {
        let registry = Self::new();
        super::builtin::register_all(&registry);
        registry
    }

    /// Registers (or replaces) a rule.
    pub fn extend(
        &self,
        name: impl Into<String>,
        spec: impl Into<RuleSpec>,
        options: RuleOptions,
    ) -> Result<()> {
        let name = name.into();
        let spec = spec.into();
        guard_name(&name)?;
        let Some(validate) = spec.validate else {
            return Err(Error::extension(
                name,
                "must be a function or have a 'validate' method.",
            ));
        };

        self.insert(name, validate, options);
        Ok(())
    }

    pub(crate) fn insert(&self, name: String, validate: ValidateFn, options: RuleOptions) {
        tracing::debug!(rule = %name, ?options, "Registered rule");
        self.rules
            .write()
            .insert(name, Arc::new(RuleEntry { validate, options }));
    }

    /// Removes a rule; absent names are ignored.
    pub fn remove(&self, name: &str) {
        if self.rules.write().remove(name).is_some() {
            tracing::debug!(rule = %name, "Removed rule");
        }
    }

    /// Looks up a rule by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<RuleEntry>> {
        self.rules.read().get(name).cloned()
    }

    /// Returns true if a rule with this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.rules.read().contains_key(name)
    }

    /// Returns the options of a registered rule.
    pub fn options(&self, name: &str) -> Option<RuleOptions> {
        self.rules.read().get(name).map(|entry| entry.options)
    }

    /// True iff the rule exists and depends on another field.
    pub fn is_target_rule(&self, name: &str) -> bool {
        self.options(name).is_some_and(|o| o.has_target)
    }

    /// True iff the rule exists and may run on the initial pass.
    pub fn is_immediate(&self, name: &str) -> bool {
        self.options(name).is_some_and(|o| o.immediate)
    }

    /// True iff the rule exists and is date-aware.
    pub fn is_date_rule(&self, name: &str) -> bool {
        self.options(name).is_some_and(|o| o.is_date)
    }

    /// Registered rule names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns true when unresolved fields are a hard error.
    pub fn is_strict(&self) -> bool {
        self.strict.load(Ordering::Relaxed)
    }

    /// Switches strict mode.
    pub fn set_strict(&self, strict: bool) {
        self.strict.store(strict, Ordering::Relaxed);
    }
}

// Names must survive the `a|b:1,2` rule syntax and the selector grammar.
fn guard_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::extension(name, "must have a non-empty name."));
    }
    if name.contains(['|', ':', ',', '#']) || name.contains(char::is_whitespace) {
        return Err(Error::extension(
            name,
            "name must not contain '|', ':', ',', '#' or whitespace.",
        ));
    }
    Ok(())
}
