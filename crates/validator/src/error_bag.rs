//! Error bag
//!
//! Ordered store of [`FieldError`] records. Insertion order is significant:
//! `first`-style queries return the earliest match.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::field::FieldId;
use crate::selector::{Selectable, Selector, select, select_all};

/// Recomputes an error message, e.g. after a locale change.
pub type Regenerate = Arc<dyn Fn() -> String + Send + Sync>;

/// One failed rule on one field.
#[derive(Clone, Serialize)]
pub struct FieldError {
    /// Id of the producing field; `None` for manually added errors.
    pub id: Option<FieldId>,
    /// Owner of the producing field.
    pub owner_id: Option<String>,
    /// Field name.
    pub field: String,
    /// Field scope.
    pub scope: Option<String>,
    /// Failed rule.
    pub rule: String,
    /// Rendered message.
    pub msg: String,
    #[serde(skip)]
    pub(crate) regenerate: Option<Regenerate>,
}

impl FieldError {
    /// A manual error not tied to a live field.
    pub fn new(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            id: None,
            owner_id: None,
            field: field.into(),
            scope: None,
            rule: String::new(),
            msg: msg.into(),
            regenerate: None,
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_id(mut self, id: impl Into<FieldId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Sets the closure used by [`ErrorBag::regenerate`].
    #[must_use = "builder methods must be chained or built"]
    pub fn with_regenerate<F>(mut self, regenerate: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.regenerate = Some(Arc::new(regenerate));
        self
    }
}

impl fmt::Debug for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldError")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("field", &self.field)
            .field("scope", &self.scope)
            .field("rule", &self.rule)
            .field("msg", &self.msg)
            .finish_non_exhaustive()
    }
}

impl PartialEq for FieldError {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.owner_id == other.owner_id
            && self.field == other.field
            && self.scope == other.scope
            && self.rule == other.rule
            && self.msg == other.msg
    }
}

impl Selectable for FieldError {
    fn selector_id(&self) -> Option<&str> {
        self.id.as_ref().map(FieldId::as_str)
    }

    fn selector_name(&self) -> &str {
        &self.field
    }

    fn selector_scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    fn selector_rule(&self) -> Option<&str> {
        Some(&self.rule)
    }
}

/// Ordered collection of field errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorBag {
    items: Vec<FieldError>,
}

impl ErrorBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one error.
    pub fn add(&mut self, error: FieldError) {
        self.items.push(error);
    }

    /// Appends several errors, keeping their order.
    pub fn extend(&mut self, errors: impl IntoIterator<Item = FieldError>) {
        self.items.extend(errors);
    }

    /// Messages, optionally restricted to one scope.
    pub fn all(&self, scope: Option<&str>) -> Vec<String> {
        self.items
            .iter()
            .filter(|e| scope.is_none_or(|s| e.scope.as_deref() == Some(s)))
            .map(|e| e.msg.clone())
            .collect()
    }

    /// Whether any error exists, optionally restricted to one scope.
    pub fn any(&self, scope: Option<&str>) -> bool {
        self.items
            .iter()
            .any(|e| scope.is_none_or(|s| e.scope.as_deref() == Some(s)))
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.items.iter()
    }

    /// Removes every error whose scope equals `scope` (`None`: unscoped errors).
    pub fn clear(&mut self, scope: Option<&str>) {
        self.items.retain(|e| e.scope.as_deref() != scope);
    }

    /// Messages grouped by field name.
    ///
    /// Without a field, every error is grouped. With a field (optionally
    /// scoped, `*` allowed as name) only the selected errors are grouped.
    pub fn collect(&self, field: Option<&str>, scope: Option<&str>) -> IndexMap<String, Vec<String>> {
        group(self.collected(field, scope), |e| e.msg.clone())
    }

    /// Same as [`collect`](Self::collect) but keeps the error records.
    pub fn collect_errors(
        &self,
        field: Option<&str>,
        scope: Option<&str>,
    ) -> IndexMap<String, Vec<FieldError>> {
        group(self.collected(field, scope), FieldError::clone)
    }

    /// Messages of a single field, flattened.
    pub fn collect_messages(&self, field: &str, scope: Option<&str>) -> Vec<String> {
        self.collected(Some(field), scope)
            .into_iter()
            .map(|e| e.msg.clone())
            .collect()
    }

    /// First message for the field, using primary-then-alternate matching.
    pub fn first(&self, field: &str, scope: Option<&str>) -> Option<String> {
        let selector = Selector::scoped(field, scope);
        select(&selector, &self.items).best().map(|e| e.msg.clone())
    }

    /// Whether the field has an error.
    pub fn has(&self, field: &str, scope: Option<&str>) -> bool {
        self.first(field, scope).is_some()
    }

    /// First message produced by the field with this exact id.
    pub fn first_by_id(&self, id: &FieldId) -> Option<String> {
        self.items
            .iter()
            .find(|e| e.id.as_ref() == Some(id))
            .map(|e| e.msg.clone())
    }

    /// Rule of the field's first error.
    pub fn first_rule(&self, field: &str, scope: Option<&str>) -> Option<String> {
        self.collected(Some(field), scope)
            .first()
            .map(|e| e.rule.clone())
    }

    /// First message of the field for a specific rule.
    pub fn first_by_rule(&self, field: &str, rule: &str, scope: Option<&str>) -> Option<String> {
        self.collected(Some(field), scope)
            .into_iter()
            .find(|e| e.rule == rule)
            .map(|e| e.msg.clone())
    }

    /// First message of the field for any rule other than `rule`.
    pub fn first_not(&self, field: &str, rule: &str, scope: Option<&str>) -> Option<String> {
        self.collected(Some(field), scope)
            .into_iter()
            .find(|e| e.rule != rule)
            .map(|e| e.msg.clone())
    }

    /// Removes errors selected by field (and scope), optionally for one owner.
    pub fn remove(&mut self, field: &str, scope: Option<&str>, owner_id: Option<&str>) {
        let selector = Selector::scoped(field, scope);
        self.items.retain(|e| {
            let owned = owner_id.is_none_or(|o| e.owner_id.as_deref() == Some(o));
            !(owned && selector.matches(e))
        });
    }

    /// Removes errors produced by any of these exact ids.
    pub fn remove_by_id(&mut self, ids: &[FieldId]) {
        self.items
            .retain(|e| e.id.as_ref().is_none_or(|id| !ids.contains(id)));
    }

    /// Moves the first error with this id to `scope`.
    ///
    /// The error is re-appended at the end, so its relative order changes.
    pub fn update(&mut self, id: &FieldId, scope: Option<&str>) {
        let Some(index) = self.items.iter().position(|e| e.id.as_ref() == Some(id)) else {
            return;
        };
        let mut error = self.items.remove(index);
        error.scope = scope.map(str::to_owned);
        self.items.push(error);
    }

    /// Moves every error with this id to `scope`, keeping their relative order.
    ///
    /// The moved errors are re-appended at the end, like [`update`](Self::update).
    pub fn update_all(&mut self, id: &FieldId, scope: Option<&str>) {
        let (mut moved, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|e| e.id.as_ref() == Some(id));
        for error in &mut moved {
            error.scope = scope.map(str::to_owned);
        }
        self.items = kept;
        self.items.extend(moved);
    }

    /// Re-renders every message that carries a regenerate closure.
    pub fn regenerate(&mut self) {
        for error in &mut self.items {
            if let Some(regenerate) = &error.regenerate {
                error.msg = regenerate();
            }
        }
    }

    fn collected(&self, field: Option<&str>, scope: Option<&str>) -> Vec<&FieldError> {
        match field {
            None => self.items.iter().collect(),
            Some(field) => select_all(&Selector::scoped(field, scope), &self.items),
        }
    }
}

fn group<T>(errors: Vec<&FieldError>, map: impl Fn(&FieldError) -> T) -> IndexMap<String, Vec<T>> {
    let mut grouped: IndexMap<String, Vec<T>> = IndexMap::new();
    for error in errors {
        grouped.entry(error.field.clone()).or_default().push(map(error));
    }
    grouped
}
