//! Field model
//!
//! A [`Field`] is one validatable value: its name, scope, ordered rule set,
//! status flags and links to the fields its target rules depend on.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::{RuleRegistry, RuleSet, parse_rules};
use crate::selector::Selectable;

/// Unique field identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("f_{}", uuid::Uuid::new_v4().simple()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `#id` selector addressing this field.
    pub fn selector(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Interaction and validation state of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFlags {
    /// Not yet blurred.
    pub untouched: bool,
    /// Blurred at least once.
    pub touched: bool,
    /// Value was changed by the user.
    pub dirty: bool,
    /// Value was never changed.
    pub pristine: bool,
    /// Last known validity; `None` before the first pass.
    pub valid: Option<bool>,
    /// Negation of `valid`.
    pub invalid: Option<bool>,
    /// At least one full pass completed.
    pub validated: bool,
    /// A pass is in flight.
    pub pending: bool,
    /// Field carries a `required` rule.
    pub required: bool,
    /// Value differs from the initial value.
    pub changed: bool,
}

impl Default for FieldFlags {
    fn default() -> Self {
        Self {
            untouched: true,
            touched: false,
            dirty: false,
            pristine: true,
            valid: None,
            invalid: None,
            validated: false,
            pending: false,
            required: false,
            changed: false,
        }
    }
}

impl FieldFlags {
    /// Applies a patch; paired flags not in the patch take the negated value.
    pub fn merge(&mut self, patch: &FlagsPatch) {
        if let Some(v) = patch.untouched {
            self.untouched = v;
            if patch.touched.is_none() {
                self.touched = !v;
            }
        }
        if let Some(v) = patch.touched {
            self.touched = v;
            if patch.untouched.is_none() {
                self.untouched = !v;
            }
        }
        if let Some(v) = patch.dirty {
            self.dirty = v;
            if patch.pristine.is_none() {
                self.pristine = !v;
            }
        }
        if let Some(v) = patch.pristine {
            self.pristine = v;
            if patch.dirty.is_none() {
                self.dirty = !v;
            }
        }
        if let Some(v) = patch.valid {
            self.valid = v;
            if patch.invalid.is_none() {
                self.invalid = v.map(|v| !v);
            }
        }
        if let Some(v) = patch.invalid {
            self.invalid = v;
            if patch.valid.is_none() {
                self.valid = v.map(|v| !v);
            }
        }
        if let Some(v) = patch.validated {
            self.validated = v;
        }
        if let Some(v) = patch.pending {
            self.pending = v;
        }
        if let Some(v) = patch.required {
            self.required = v;
        }
        if let Some(v) = patch.changed {
            self.changed = v;
        }
    }

    /// Restores defaults, keeping `required`.
    pub fn reset(&mut self) {
        *self = Self {
            required: self.required,
            ..Self::default()
        };
    }
}

/// Partial flag update; `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsPatch {
    pub untouched: Option<bool>,
    pub touched: Option<bool>,
    pub dirty: Option<bool>,
    pub pristine: Option<bool>,
    pub valid: Option<Option<bool>>,
    pub invalid: Option<Option<bool>>,
    pub validated: Option<bool>,
    pub pending: Option<bool>,
    pub required: Option<bool>,
    pub changed: Option<bool>,
}

impl FlagsPatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn touched(mut self, touched: bool) -> Self {
        self.touched = Some(touched);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = Some(dirty);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = Some(Some(valid));
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn pending(mut self, pending: bool) -> Self {
        self.pending = Some(pending);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn validated(mut self, validated: bool) -> Self {
        self.validated = Some(validated);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn changed(mut self, changed: bool) -> Self {
        self.changed = Some(changed);
        self
    }
}

/// Non-owning link from a target rule to the field it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The target rule (e.g. `confirmed`).
    pub rule: String,
    /// Name of the target field, taken from the rule's first parameter.
    pub target: String,
    /// Resolved target id, if the target is attached.
    pub field_id: Option<FieldId>,
}

/// Reads a field's live value from the host.
pub type ValueGetter = Arc<dyn Fn() -> Value + Send + Sync>;

/// Options used to attach a field.
#[derive(Clone, Default)]
pub struct FieldOptions {
    pub(crate) id: Option<FieldId>,
    pub(crate) name: String,
    pub(crate) scope: Option<String>,
    pub(crate) owner_id: Option<String>,
    pub(crate) rules: RuleSet,
    pub(crate) alias: Option<String>,
    pub(crate) bails: Option<bool>,
    pub(crate) immediate: bool,
    pub(crate) disabled: bool,
    pub(crate) rejects_false: bool,
    pub(crate) initial_value: Option<Value>,
    pub(crate) getter: Option<ValueGetter>,
}

impl FieldOptions {
    /// Options for a field called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn id(mut self, id: impl Into<FieldId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Appends the rules of a `required|min:3` rule string.
    #[must_use = "builder methods must be chained or built"]
    pub fn rules(mut self, rules: &str) -> Self {
        self.rules.extend(parse_rules(rules));
        self
    }

    /// Appends one rule.
    #[must_use = "builder methods must be chained or built"]
    pub fn rule(mut self, name: impl Into<String>, params: Vec<Value>) -> Self {
        self.rules.insert(name.into(), params);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Overrides the validator's fast-exit setting for this field.
    #[must_use = "builder methods must be chained or built"]
    pub fn bails(mut self, bails: bool) -> Self {
        self.bails = Some(bails);
        self
    }

    /// Run a full, error-reporting pass on attach.
    #[must_use = "builder methods must be chained or built"]
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Makes a bare `required` reject boolean `false`.
    #[must_use = "builder methods must be chained or built"]
    pub fn rejects_false(mut self, rejects_false: bool) -> Self {
        self.rejects_false = rejects_false;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Reads the value from the host instead of the stored one.
    #[must_use = "builder methods must be chained or built"]
    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

/// A validatable field.
#[derive(Clone)]
pub struct Field {
    id: FieldId,
    name: String,
    scope: Option<String>,
    owner_id: Option<String>,
    rules: RuleSet,
    pub(crate) flags: FieldFlags,
    alias: Option<String>,
    bails: Option<bool>,
    immediate: bool,
    disabled: bool,
    rejects_false: bool,
    pub(crate) dependencies: Vec<Dependency>,
    initial_value: Value,
    value: Value,
    getter: Option<ValueGetter>,
}

impl Field {
    /// Builds a field; target rules found in `registry` become dependencies.
    pub fn new(options: FieldOptions, registry: &RuleRegistry) -> Self {
        let dependencies = options
            .rules
            .iter()
            .filter(|(rule, _)| registry.is_target_rule(rule))
            .filter_map(|(rule, params)| {
                params.first().and_then(Value::as_str).map(|target| Dependency {
                    rule: rule.clone(),
                    target: target.to_owned(),
                    field_id: None,
                })
            })
            .collect();

        let initial_value = options.initial_value.unwrap_or(Value::Null);
        let mut field = Self {
            id: options.id.unwrap_or_else(FieldId::generate),
            name: options.name,
            scope: options.scope,
            owner_id: options.owner_id,
            rules: options.rules,
            flags: FieldFlags::default(),
            alias: options.alias,
            bails: options.bails,
            immediate: options.immediate,
            disabled: options.disabled,
            rejects_false: options.rejects_false,
            dependencies,
            value: initial_value.clone(),
            initial_value,
            getter: options.getter,
        };
        field.flags.required = field.is_required();
        field
    }

    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &IndexMap<String, Vec<Value>> {
        &self.rules
    }

    pub fn flags(&self) -> &FieldFlags {
        &self.flags
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn bails(&self) -> Option<bool> {
        self.bails
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn rejects_false(&self) -> bool {
        self.rejects_false
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn initial_value(&self) -> &Value {
        &self.initial_value
    }

    /// True when the field has a `required` rule not disabled by `required:false`.
    pub fn is_required(&self) -> bool {
        self.rules
            .get("required")
            .is_some_and(|params| !matches!(params.first(), Some(p) if is_false(p)))
    }

    /// Current value: the host getter if present, else the stored value.
    pub fn value(&self) -> Value {
        match &self.getter {
            Some(getter) => getter(),
            None => self.value.clone(),
        }
    }

    /// Stores a new value and updates `changed`/`dirty`.
    pub fn set_value(&mut self, value: Value) {
        let changed = value != self.initial_value;
        self.value = value;
        self.flags.merge(&FlagsPatch::new().changed(changed));
        if changed {
            self.flags.merge(&FlagsPatch::new().dirty(true));
        }
    }

    /// Merges flags onto the field.
    pub fn set_flags(&mut self, patch: &FlagsPatch) {
        self.flags.merge(patch);
    }

    /// Resets flags to their defaults, keeping `required`.
    pub fn reset(&mut self) {
        self.flags.reset();
    }

    /// Moves the field to another scope.
    pub fn set_scope(&mut self, scope: Option<String>) {
        self.scope = scope;
    }

    /// Drops dependency links and host hooks.
    pub fn destroy(&mut self) {
        self.dependencies.clear();
        self.getter = None;
    }

    /// Whether the field satisfies a matcher.
    pub fn matches(&self, matcher: &FieldMatcher) -> bool {
        if let Some(id) = &matcher.id {
            return &self.id == id;
        }
        if let Some(owner) = &matcher.owner_id {
            if self.owner_id.as_ref() != Some(owner) {
                return false;
            }
        }
        if let Some(name) = &matcher.name {
            if &self.name != name {
                return false;
            }
        }
        match &matcher.scope {
            Some(scope) => &self.scope == scope,
            None => true,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("owner_id", &self.owner_id)
            .field("rules", &self.rules)
            .field("flags", &self.flags)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl Selectable for Field {
    fn selector_id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    fn selector_name(&self) -> &str {
        &self.name
    }

    fn selector_scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

/// Multi-criterion field query; unset criteria are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMatcher {
    pub(crate) id: Option<FieldId>,
    pub(crate) name: Option<String>,
    pub(crate) scope: Option<Option<String>>,
    pub(crate) owner_id: Option<String>,
}

impl FieldMatcher {
    /// Matches every field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches exactly one id; other criteria are ignored.
    pub fn by_id(id: impl Into<FieldId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts to a scope; `None` restricts to unscoped fields.
    #[must_use = "builder methods must be chained or built"]
    pub fn scope(mut self, scope: Option<&str>) -> Self {
        self.scope = Some(scope.map(str::to_owned));
        self
    }

    /// Restricts to one owner; `None` keeps owners as a wildcard.
    #[must_use = "builder methods must be chained or built"]
    pub fn owner(mut self, owner_id: Option<&str>) -> Self {
        self.owner_id = owner_id.map(str::to_owned);
        self
    }
}

fn is_false(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::String(s) => s == "false",
        _ => false,
    }
}
