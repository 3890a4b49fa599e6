//! Validator orchestration
//!
//! A [`Validator`] owns one [`FieldBag`] and one [`ErrorBag`] and shares a
//! [`RuleRegistry`], a [`Dictionary`] and a [`Host`] with whoever built it.
//!
//! Validation of one field is a two-phase affair. The synchronous scan walks
//! the field's rules in declaration order and invokes each validate function;
//! with bail active it stops at the first synchronous failure. Deferred
//! outcomes produced during the scan are then joined. Multi-field operations
//! join all per-field runs and apply the results in one batch.
//!
//! No lock is held across an await point or while a rule runs.

use std::collections::HashMap;
use std::iter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use serde_json::Value;

use crate::config::ValidatorConfig;
use crate::dictionary::{
    Dictionary, LocalePatch, Message, MessageArgs, MessageDictionary, display_value,
};
use crate::error::{Error, Result};
use crate::error_bag::{ErrorBag, FieldError};
use crate::field::{Dependency, Field, FieldId, FieldMatcher, FieldOptions, FlagsPatch};
use crate::field_bag::FieldBag;
use crate::host::{Host, InlineHost};
use crate::rules::{Normalized, RuleOptions, RuleOutcome, RuleRegistry, RuleSpec};

// ============================================================================
// OPTIONS AND RESULTS
// ============================================================================

/// Options shared by the `validate*` family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Compute validity without touching errors or flags.
    pub silent: bool,
    /// Restrict resolution and error removal to one owner.
    pub owner_id: Option<String>,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// Which fields [`Validator::validate_all`] runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Targets {
    /// Every unscoped field.
    #[default]
    Unscoped,
    /// Every field of one scope.
    Scope(String),
    /// Unscoped fields by name, validated against the given values.
    Values(IndexMap<String, Value>),
    /// Fields by name in any scope.
    Names(Vec<String>),
}

impl Targets {
    /// Fields by name, using their own values.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    /// Fields by name, validated against the provided values.
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self::Values(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<&str> for Targets {
    fn from(scope: &str) -> Self {
        Self::Scope(scope.to_owned())
    }
}

impl From<String> for Targets {
    fn from(scope: String) -> Self {
        Self::Scope(scope)
    }
}

impl From<IndexMap<String, Value>> for Targets {
    fn from(values: IndexMap<String, Value>) -> Self {
        Self::Values(values)
    }
}

impl From<serde_json::Map<String, Value>> for Targets {
    fn from(values: serde_json::Map<String, Value>) -> Self {
        Self::Values(values.into_iter().collect())
    }
}

/// Outcome of validating one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub valid: bool,
    /// Errors in rule declaration order.
    pub errors: Vec<FieldError>,
    pub id: FieldId,
    pub field: String,
    pub scope: Option<String>,
}

impl FieldResult {
    fn passed(field: &Field) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            id: field.id().clone(),
            field: field.name().to_owned(),
            scope: field.scope().map(str::to_owned),
        }
    }
}

/// Options of [`Validator::verify`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOptions {
    /// Field name used in messages; defaults to `{field}`.
    pub name: Option<String>,
    /// Values of target fields, by name.
    pub values: IndexMap<String, Value>,
    /// Stop at the first synchronous failure.
    pub bails: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            name: None,
            values: IndexMap::new(),
            bails: true,
        }
    }
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn value(mut self, target: impl Into<String>, value: Value) -> Self {
        self.values.insert(target.into(), value);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn bails(mut self, bails: bool) -> Self {
        self.bails = bails;
        self
    }
}

/// Outcome of [`Validator::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Failed rule -> message.
    pub failed_rules: IndexMap<String, String>,
}

// ============================================================================
// BUILDER
// ============================================================================

/// Assembles a [`Validator`].
#[derive(Default)]
pub struct ValidatorBuilder {
    registry: Option<Arc<RuleRegistry>>,
    dictionary: Option<Arc<dyn Dictionary>>,
    host: Option<Arc<dyn Host>>,
    config: ValidatorConfig,
}

impl ValidatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared rule registry; defaults to a fresh one with the built-in rules.
    #[must_use = "builder methods must be chained or built"]
    pub fn registry(mut self, registry: Arc<RuleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Message dictionary; defaults to [`MessageDictionary::with_defaults`].
    #[must_use = "builder methods must be chained or built"]
    pub fn dictionary(mut self, dictionary: Arc<dyn Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Host collaborator; defaults to [`InlineHost`].
    #[must_use = "builder methods must be chained or built"]
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn fast_exit(mut self, fast_exit: bool) -> Self {
        self.config.fast_exit = fast_exit;
        self
    }

    pub fn build(self) -> Validator {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(RuleRegistry::with_builtin_rules()));
        let dictionary = self
            .dictionary
            .unwrap_or_else(|| Arc::new(MessageDictionary::with_defaults()));
        let host = self.host.unwrap_or_else(|| Arc::new(InlineHost));

        let ValidatorConfig {
            fast_exit,
            locale,
            dictionary: patch,
        } = self.config;
        if !patch.is_empty() {
            dictionary.merge(patch);
        }
        dictionary.set_locale(&locale);

        Validator {
            registry,
            dictionary,
            host,
            fields: RwLock::new(FieldBag::new()),
            errors: RwLock::new(ErrorBag::new()),
            fast_exit,
            paused: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Field-aware validation orchestrator.
pub struct Validator {
    registry: Arc<RuleRegistry>,
    dictionary: Arc<dyn Dictionary>,
    host: Arc<dyn Host>,
    fields: RwLock<FieldBag>,
    errors: RwLock<ErrorBag>,
    fast_exit: bool,
    paused: AtomicBool,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("fields", &self.fields.read().len())
            .field("errors", &self.errors.read().count())
            .field("fast_exit", &self.fast_exit)
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// Validator over `registry` with the default dictionary and host.
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self::builder().registry(registry).build()
    }

    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn dictionary(&self) -> &Arc<dyn Dictionary> {
        &self.dictionary
    }

    pub fn fast_exit(&self) -> bool {
        self.fast_exit
    }

    /// Read access to the error bag.
    pub fn errors(&self) -> RwLockReadGuard<'_, ErrorBag> {
        self.errors.read()
    }

    /// Write access to the error bag, for manually added errors.
    pub fn errors_mut(&self) -> RwLockWriteGuard<'_, ErrorBag> {
        self.errors.write()
    }

    /// Read access to the attached fields.
    pub fn fields(&self) -> RwLockReadGuard<'_, FieldBag> {
        self.fields.read()
    }

    /// Snapshot of the field addressed by `selector`.
    pub fn field(&self, selector: &str) -> Option<Field> {
        resolve(&self.fields.read(), selector, None).cloned()
    }

    // ------------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------------

    /// Registers a rule and, if it carries one, its message generator under
    /// the current locale.
    pub fn extend(
        &self,
        name: impl Into<String>,
        spec: impl Into<RuleSpec>,
        options: RuleOptions,
    ) -> Result<()> {
        let name = name.into();
        let spec = spec.into();
        let message = spec.message().cloned();
        self.registry.extend(name.clone(), spec, options)?;
        if let Some(message) = message {
            let locale = self.dictionary.locale();
            self.dictionary
                .set_message(&locale, &name, Message::Generator(message));
        }
        Ok(())
    }

    /// Removes a rule from the shared registry.
    pub fn remove(&self, name: &str) {
        self.registry.remove(name);
    }

    // ------------------------------------------------------------------------
    // Locale
    // ------------------------------------------------------------------------

    pub fn locale(&self) -> String {
        self.dictionary.locale()
    }

    /// Switches the dictionary locale; the host hears about actual changes.
    pub fn set_locale(&self, locale: &str) {
        let changed = self.dictionary.locale() != locale;
        self.dictionary.set_locale(locale);
        if changed {
            self.host.locale_changed(locale);
        }
    }

    /// Merges `patch` into `locale` (if given) and switches to it.
    pub fn localize(&self, locale: &str, patch: Option<LocalePatch>) {
        if let Some(patch) = patch {
            self.dictionary
                .merge(HashMap::from([(locale.to_owned(), patch)]));
        }
        self.set_locale(locale);
    }

    /// Re-renders every error message in the current locale.
    pub fn regenerate(&self) {
        self.errors.write().regenerate();
    }

    // ------------------------------------------------------------------------
    // Field lifecycle
    // ------------------------------------------------------------------------

    /// Registers a field and runs its initial pass.
    ///
    /// Immediate fields get a full validation. Others run only the
    /// registry's immediate rules and record nothing but `valid`/`invalid`.
    /// The field stays attached when the initial pass fails with an error.
    pub async fn attach(&self, options: FieldOptions) -> Result<Field> {
        let field = Field::new(options, &self.registry);
        let id = field.id().clone();
        let owner_id = field.owner_id().map(str::to_owned);
        let immediate = field.is_immediate();
        tracing::debug!(
            id = %id,
            name = field.name(),
            scope = ?field.scope(),
            immediate,
            "Attached field"
        );

        {
            let mut fields = self.fields.write();
            fields.push(field);
            link_dependencies(&mut fields, &id);
        }

        if immediate {
            let options = ValidateOptions {
                silent: false,
                owner_id,
            };
            self.validate(Some(&id.selector()), None, options).await?;
        } else {
            let prepared = {
                let fields = self.fields.read();
                fields.get(&id).map(|f| Prepared::capture(&fields, f))
            };
            if let Some(prepared) = prepared {
                let value = prepared.field.value();
                let targets = prepared.targets();
                let result = self.run(prepared.field, targets, value, true).await?;
                if let Some(field) = self.fields.write().get_mut(&id) {
                    field.set_flags(&FlagsPatch::new().valid(result.valid));
                }
            }
        }

        self.field(&id.selector())
            .ok_or_else(|| Error::field_not_found(id.selector()))
    }

    /// Removes a field and purges its errors.
    pub fn detach(&self, selector: &str, owner_id: Option<&str>) -> Option<Field> {
        let mut removed = {
            let mut fields = self.fields.write();
            let id = resolve(&fields, selector, owner_id)?.id().clone();
            let removed = fields.remove(&id)?;
            for other in fields.iter_mut() {
                for dependency in &mut other.dependencies {
                    if dependency.field_id.as_ref() == Some(&id) {
                        dependency.field_id = None;
                    }
                }
            }
            removed
        };
        removed.destroy();

        {
            let mut errors = self.errors.write();
            errors.remove(removed.name(), removed.scope(), removed.owner_id());
            errors.remove_by_id(std::slice::from_ref(removed.id()));
        }
        tracing::debug!(id = %removed.id(), name = removed.name(), "Detached field");
        Some(removed)
    }

    /// Merges flags onto a field; returns false if it does not resolve.
    pub fn flag(&self, selector: &str, patch: &FlagsPatch, owner_id: Option<&str>) -> bool {
        let mut fields = self.fields.write();
        let Some(id) = resolve(&fields, selector, owner_id).map(|f| f.id().clone()) else {
            return false;
        };
        fields.get_mut(&id).is_some_and(|field| {
            field.set_flags(patch);
            true
        })
    }

    /// Stores a new value read for a field.
    pub fn set_value(&self, selector: &str, value: Value) -> bool {
        let mut fields = self.fields.write();
        let Some(id) = resolve(&fields, selector, None).map(|f| f.id().clone()) else {
            return false;
        };
        fields.get_mut(&id).is_some_and(|field| {
            field.set_value(value);
            true
        })
    }

    /// Moves a field and its errors to another scope.
    ///
    /// The moved errors are re-appended at the end of the error bag.
    pub fn update(&self, id: &FieldId, scope: Option<&str>) -> bool {
        {
            let mut fields = self.fields.write();
            let Some(field) = fields.get_mut(id) else {
                return false;
            };
            field.set_scope(scope.map(str::to_owned));
        }
        self.errors.write().update_all(id, scope);
        true
    }

    /// Resets the flags and errors of matching fields after two host cycles.
    pub async fn reset(&self, matcher: &FieldMatcher) {
        self.host.schedule().await;
        self.host.schedule().await;

        let reset: Vec<(String, Option<String>)> = {
            let mut fields = self.fields.write();
            fields
                .iter_mut()
                .filter(|f| f.matches(matcher))
                .map(|field| {
                    field.reset();
                    (field.name().to_owned(), field.scope().map(str::to_owned))
                })
                .collect()
        };

        let mut errors = self.errors.write();
        for (name, scope) in &reset {
            errors.remove(name, scope.as_deref(), matcher.owner_id.as_deref());
        }
    }

    // ------------------------------------------------------------------------
    // Pause
    // ------------------------------------------------------------------------

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Validates what `selector` addresses.
    ///
    /// `None` validates every field, `*` every unscoped field and
    /// `scope.*` one scope. Anything else must resolve to a single field,
    /// validated against `value` or its own current value.
    pub async fn validate(
        &self,
        selector: Option<&str>,
        value: Option<Value>,
        options: ValidateOptions,
    ) -> Result<bool> {
        if self.is_paused() {
            return Ok(true);
        }
        let Some(selector) = selector else {
            return self.validate_scopes(options).await;
        };
        if selector == "*" {
            return self.validate_all(Targets::Unscoped, options).await;
        }
        if let Some(scope) = selector.strip_suffix(".*")
            && !scope.is_empty()
        {
            return self.validate_all(Targets::Scope(scope.to_owned()), options).await;
        }

        let owner_id = options.owner_id.as_deref();
        let prepared = {
            let mut fields = self.fields.write();
            match resolve(&fields, selector, owner_id).map(|f| f.id().clone()) {
                Some(id) => {
                    if !options.silent
                        && let Some(field) = fields.get_mut(&id)
                    {
                        field.set_flags(&FlagsPatch::new().pending(true));
                    }
                    fields.get(&id).map(|f| Prepared::capture(&fields, f))
                }
                None => None,
            }
        };
        let Some(prepared) = prepared else {
            return self.field_not_found(selector);
        };

        let id = prepared.field.id().clone();
        let value = value.unwrap_or_else(|| prepared.field.value());
        let targets = prepared.targets();
        let result = match self.run(prepared.field, targets, value, false).await {
            Ok(result) => result,
            Err(err) => {
                if !options.silent
                    && let Some(field) = self.fields.write().get_mut(&id)
                {
                    field.set_flags(&FlagsPatch::new().pending(false));
                }
                return Err(err);
            }
        };
        let valid = result.valid;
        if !options.silent {
            self.handle_results(vec![result], owner_id);
        }
        Ok(valid)
    }

    /// Validates a group of fields concurrently; valid only if all are.
    pub async fn validate_all(
        &self,
        targets: impl Into<Targets>,
        options: ValidateOptions,
    ) -> Result<bool> {
        if self.is_paused() {
            return Ok(true);
        }
        let owner_id = options.owner_id.as_deref();
        let (matchers, values) = match targets.into() {
            Targets::Unscoped => (vec![FieldMatcher::new().scope(None).owner(owner_id)], None),
            Targets::Scope(scope) => (
                vec![FieldMatcher::new().scope(Some(scope.as_str())).owner(owner_id)],
                None,
            ),
            Targets::Names(names) => (
                names
                    .iter()
                    .map(|name| FieldMatcher::new().name(name.as_str()).owner(owner_id))
                    .collect(),
                None,
            ),
            Targets::Values(values) => (
                values
                    .keys()
                    .map(|name| {
                        FieldMatcher::new()
                            .name(name.as_str())
                            .scope(None)
                            .owner(owner_id)
                    })
                    .collect(),
                Some(values),
            ),
        };

        let prepared: Vec<Prepared> = {
            let fields = self.fields.read();
            fields
                .filter_any(&matchers)
                .into_iter()
                .map(|f| Prepared::capture(&fields, f))
                .collect()
        };
        self.run_batch(prepared, values.as_ref(), &options).await
    }

    /// Validates every field regardless of scope.
    pub async fn validate_scopes(&self, options: ValidateOptions) -> Result<bool> {
        if self.is_paused() {
            return Ok(true);
        }
        let matcher = FieldMatcher::new().owner(options.owner_id.as_deref());
        let prepared: Vec<Prepared> = {
            let fields = self.fields.read();
            fields
                .filter(&matcher)
                .into_iter()
                .map(|f| Prepared::capture(&fields, f))
                .collect()
        };
        self.run_batch(prepared, None, &options).await
    }

    /// Checks `value` against `rules` without attaching a field.
    ///
    /// Target rules read their target's value from `options.values`. The
    /// error bag and field flags are left alone.
    pub async fn verify(
        &self,
        value: Value,
        rules: &str,
        options: VerifyOptions,
    ) -> Result<VerifyResult> {
        let name = options.name.as_deref().unwrap_or("{field}");
        let field = Field::new(
            FieldOptions::new(name).rules(rules).bails(options.bails),
            &self.registry,
        );
        let targets = if options.values.is_empty() {
            HashMap::new()
        } else {
            field
                .dependencies()
                .iter()
                .map(|dependency| {
                    let target = Target {
                        value: options
                            .values
                            .get(&dependency.target)
                            .cloned()
                            .unwrap_or(Value::Null),
                        alias: None,
                    };
                    (dependency.rule.clone(), target)
                })
                .collect()
        };

        let result = self.run(field, targets, value, false).await?;
        let mut verified = VerifyResult {
            valid: result.valid,
            ..VerifyResult::default()
        };
        for error in result.errors {
            verified.failed_rules.insert(error.rule, error.msg.clone());
            verified.errors.push(error.msg);
        }
        Ok(verified)
    }

    async fn run_batch(
        &self,
        prepared: Vec<Prepared>,
        values: Option<&IndexMap<String, Value>>,
        options: &ValidateOptions,
    ) -> Result<bool> {
        tracing::debug!(fields = prepared.len(), silent = options.silent, "Validating fields");
        let runs = prepared.into_iter().map(|prepared| {
            let value = match values {
                Some(values) => values
                    .get(prepared.field.name())
                    .cloned()
                    .unwrap_or(Value::Null),
                None => prepared.field.value(),
            };
            let targets = prepared.targets();
            self.run(prepared.field, targets, value, false)
        });

        let results = future::try_join_all(runs).await?;
        let valid = results.iter().all(|r| r.valid);
        if !options.silent {
            self.handle_results(results, options.owner_id.as_deref());
        }
        Ok(valid)
    }

    fn field_not_found(&self, selector: &str) -> Result<bool> {
        if !self.registry.is_strict() {
            tracing::debug!(selector, "Field not found, treating as valid");
            return Ok(true);
        }
        tracing::warn!(selector, "Validating a non-existent field");
        Err(Error::field_not_found(selector))
    }

    // ------------------------------------------------------------------------
    // Per-field run
    // ------------------------------------------------------------------------

    async fn run(
        &self,
        field: Field,
        targets: HashMap<String, Target>,
        value: Value,
        initial: bool,
    ) -> Result<FieldResult> {
        let mut result = FieldResult::passed(&field);
        if should_skip(&field, &value) {
            return Ok(result);
        }

        let bails = field.bails().unwrap_or(self.fast_exit);
        let mut pending: Vec<BoxFuture<'static, Checked>> = Vec::new();
        let mut bailed = None;

        for (rule, params) in field.rules() {
            if initial && self.registry.options(rule).is_some_and(|o| !o.immediate) {
                continue;
            }
            match self.test(&field, &targets, &value, rule, params)? {
                Tested::Ready(checked) if !checked.valid && bails => {
                    bailed = Some(checked);
                    break;
                }
                Tested::Ready(checked) => pending.push(future::ready(checked).boxed()),
                Tested::Deferred(deferred) => pending.push(deferred),
            }
        }

        for checked in future::join_all(pending).await.into_iter().chain(bailed) {
            result.valid &= checked.valid;
            result.errors.extend(checked.error);
        }
        Ok(result)
    }

    fn test(
        &self,
        field: &Field,
        targets: &HashMap<String, Target>,
        value: &Value,
        rule: &str,
        declared: &[Value],
    ) -> Result<Tested> {
        let Some(entry) = self.registry.get(rule) else {
            tracing::warn!(rule, field = field.name(), "No such rule");
            return Err(Error::unknown_rule(rule));
        };
        let options = entry.options();

        let mut params = declared.to_vec();
        let mut target_name = None;
        if options.has_target {
            if let Some(target) = targets.get(rule) {
                target_name.clone_from(&target.alias);
                params = iter::once(target.value.clone())
                    .chain(declared.iter().skip(1).cloned())
                    .collect();
            }
        } else if rule == "required" && field.rejects_false() && params.is_empty() {
            params.push(Value::Bool(true));
        }
        if options.is_date && rule != "date_format" {
            params.push(self.date_format(field));
        }

        tracing::trace!(rule, field = field.name(), ?params, "Testing rule");
        let context = ErrorContext {
            dictionary: Arc::clone(&self.dictionary),
            id: field.id().clone(),
            owner_id: field.owner_id().map(str::to_owned),
            field: field.name().to_owned(),
            scope: field.scope().map(str::to_owned),
            alias: field.alias().map(str::to_owned),
            rule: rule.to_owned(),
            params: declared.to_vec(),
            has_target: options.has_target,
            target_name,
        };

        Ok(match entry.call(value, &params).normalize() {
            Normalized::Ready(outcome) => Tested::Ready(context.check(outcome)),
            Normalized::Deferred(deferred) => {
                Tested::Deferred(deferred.map(move |outcome| context.check(outcome)).boxed())
            }
        })
    }

    // The field's own `date_format` wins over the locale default.
    fn date_format(&self, field: &Field) -> Value {
        field
            .rules()
            .get("date_format")
            .and_then(|params| params.first())
            .filter(|format| !is_empty(format))
            .cloned()
            .or_else(|| {
                let locale = self.dictionary.locale();
                self.dictionary.date_format(&locale).map(Value::String)
            })
            .unwrap_or(Value::Null)
    }

    fn handle_results(&self, results: Vec<FieldResult>, owner_id: Option<&str>) {
        let ids: Vec<FieldId> = results.iter().map(|r| r.id.clone()).collect();
        let flags: Vec<(FieldId, bool)> = results.iter().map(|r| (r.id.clone(), r.valid)).collect();

        {
            let mut errors = self.errors.write();
            errors.remove_by_id(&ids);
            for result in &results {
                errors.remove(&result.field, result.scope.as_deref(), owner_id);
            }
            errors.extend(results.into_iter().flat_map(|r| r.errors));
        }

        let mut fields = self.fields.write();
        for (id, valid) in flags {
            if let Some(field) = fields.get_mut(&id) {
                field.set_flags(
                    &FlagsPatch::new()
                        .pending(false)
                        .valid(valid)
                        .validated(true),
                );
            }
        }
    }
}

// ============================================================================
// INTERNALS
// ============================================================================

/// A target field's value as seen by a rule.
#[derive(Debug, Clone)]
struct Target {
    value: Value,
    alias: Option<String>,
}

/// A field and its resolved dependency targets, captured under the lock.
struct Prepared {
    field: Field,
    dependencies: Vec<(String, Field)>,
}

impl Prepared {
    fn capture(bag: &FieldBag, field: &Field) -> Self {
        let dependencies = field
            .dependencies()
            .iter()
            .filter_map(|dependency| {
                resolve_target(bag, field, dependency)
                    .map(|target| (dependency.rule.clone(), target.clone()))
            })
            .collect();
        Self {
            field: field.clone(),
            dependencies,
        }
    }

    // Reads values outside the lock: getters belong to the host.
    fn targets(&self) -> HashMap<String, Target> {
        self.dependencies
            .iter()
            .map(|(rule, target)| {
                let target = Target {
                    value: target.value(),
                    alias: target.alias().map(str::to_owned),
                };
                (rule.clone(), target)
            })
            .collect()
    }
}

struct Checked {
    valid: bool,
    error: Option<FieldError>,
}

enum Tested {
    Ready(Checked),
    Deferred(BoxFuture<'static, Checked>),
}

/// Everything needed to render, and later re-render, one rule's message.
#[derive(Clone)]
struct ErrorContext {
    dictionary: Arc<dyn Dictionary>,
    id: FieldId,
    owner_id: Option<String>,
    field: String,
    scope: Option<String>,
    alias: Option<String>,
    rule: String,
    params: Vec<Value>,
    has_target: bool,
    target_name: Option<String>,
}

impl ErrorContext {
    fn check(self, outcome: RuleOutcome) -> Checked {
        if outcome.valid {
            return Checked {
                valid: true,
                error: None,
            };
        }

        let data = outcome.data;
        let msg = self.message(&data);
        let error = FieldError {
            id: Some(self.id.clone()),
            owner_id: self.owner_id.clone(),
            field: self.field.clone(),
            scope: self.scope.clone(),
            rule: self.rule.clone(),
            msg,
            regenerate: None,
        }
        .with_regenerate(move || self.message(&data));

        Checked {
            valid: false,
            error: Some(error),
        }
    }

    fn message(&self, data: &Value) -> String {
        let locale = self.dictionary.locale();
        let display = match &self.alias {
            Some(alias) => alias.clone(),
            None => self.dictionary.attribute(&locale, &self.field, &self.field),
        };
        let params = self.localized_params(&locale);
        let args = MessageArgs {
            field: &display,
            params: &params,
            data,
        };
        self.dictionary
            .field_message(&locale, &self.field, &self.rule, &args)
    }

    // Target rules show the target's display name instead of its raw name.
    fn localized_params(&self, locale: &str) -> Vec<Value> {
        match self.params.split_first() {
            Some((first, rest)) if self.has_target && !is_empty(first) => {
                let name = self.target_name.clone().unwrap_or_else(|| {
                    let raw = display_value(first);
                    self.dictionary.attribute(locale, &raw, &raw)
                });
                iter::once(Value::String(name))
                    .chain(rest.iter().cloned())
                    .collect()
            }
            _ => self.params.clone(),
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

// Disabled fields always pass; `bails: false` forces rules to run; empty
// optional values skip every rule.
fn should_skip(field: &Field, value: &Value) -> bool {
    if field.is_disabled() {
        return true;
    }
    if field.bails() == Some(false) {
        return false;
    }
    !field.is_required() && is_empty(value)
}

/// Resolves `#id`, `scope.name` or `name` to one field.
fn resolve<'a>(bag: &'a FieldBag, selector: &str, owner_id: Option<&str>) -> Option<&'a Field> {
    if let Some(id) = selector.strip_prefix('#') {
        return bag.get(&FieldId::new(id));
    }
    if let Some((scope, name)) = selector.split_once('.') {
        let scoped = FieldMatcher::new()
            .name(name)
            .scope(Some(scope))
            .owner(owner_id);
        if let Some(field) = bag.find(&scoped) {
            return Some(field);
        }
    }
    bag.find(&FieldMatcher::new().name(selector).scope(None).owner(owner_id))
}

fn resolve_target<'a>(
    bag: &'a FieldBag,
    field: &Field,
    dependency: &Dependency,
) -> Option<&'a Field> {
    let linked = dependency.field_id.as_ref().and_then(|id| bag.get(id));
    linked
        .or_else(|| {
            let sibling = FieldMatcher::new()
                .name(dependency.target.as_str())
                .scope(field.scope())
                .owner(field.owner_id());
            bag.find(&sibling)
        })
        .or_else(|| resolve(bag, &dependency.target, field.owner_id()))
        .filter(|target| target.id() != field.id())
}

// Links the new field's targets and every unlinked dependency on it.
fn link_dependencies(bag: &mut FieldBag, id: &FieldId) {
    let Some(field) = bag.get(id) else {
        return;
    };
    let resolved: Vec<Option<FieldId>> = field
        .dependencies()
        .iter()
        .map(|dependency| resolve_target(bag, field, dependency).map(|t| t.id().clone()))
        .collect();
    let name = field.name().to_owned();
    let scope = field.scope().map(str::to_owned);
    let owner_id = field.owner_id().map(str::to_owned);

    if let Some(field) = bag.get_mut(id) {
        for (dependency, target) in field.dependencies.iter_mut().zip(resolved) {
            dependency.field_id = dependency.field_id.take().or(target);
        }
    }

    for other in bag.iter_mut() {
        let sibling = other.scope() == scope.as_deref() && other.owner_id() == owner_id.as_deref();
        if other.id() == id || !sibling {
            continue;
        }
        for dependency in &mut other.dependencies {
            if dependency.field_id.is_none() && dependency.target == name {
                dependency.field_id = Some(id.clone());
            }
        }
    }
}
