//! Selector parsing and matching
//!
//! A selector addresses fields and errors by scope, name, rule or id:
//!
//! | Selector            | scope    | name     | rule       | id    |
//! |---------------------|----------|----------|------------|-------|
//! | `email`             | -        | `email`  | -          | -     |
//! | `signup.email`      | `signup` | `email`  | -          | -     |
//! | `signup.email:min`  | `signup` | `email`  | `min`      | -     |
//! | `#f_12`             | -        | -        | -          | `f_12`|
//! | `signup.*`          | `signup` | any      | -          | -     |
//!
//! Because field names may themselves contain dots, every scoped selector
//! also yields an *alternate* predicate matching items literally named
//! `"{scope}.{name}"`. Single-item queries prefer the first primary match
//! and fall back to the last alternate match.

/// Anything addressable by a selector.
pub trait Selectable {
    /// Identifier of the owning field, if any.
    fn selector_id(&self) -> Option<&str>;
    /// Field name.
    fn selector_name(&self) -> &str;
    /// Scope, `None` for unscoped items.
    fn selector_scope(&self) -> Option<&str>;
    /// Rule name, for items tied to a rule.
    fn selector_rule(&self) -> Option<&str> {
        None
    }
}

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    /// Id prefix (from `#id` selectors).
    pub id: Option<String>,
    /// Scope part.
    pub scope: Option<String>,
    /// Name part; `None` in id mode or for the `*` wildcard.
    pub name: Option<String>,
    /// Rule restriction.
    pub rule: Option<String>,
}

impl Selector {
    /// Parses `[scope.]name[:rule]` or `#id[:rule]`.
    pub fn parse(selector: &str) -> Self {
        let (body, rule) = match selector.rsplit_once(':') {
            Some((body, rule)) => (body, Some(rule.to_owned())),
            None => (selector, None),
        };

        if let Some(id) = body.strip_prefix('#') {
            return Self {
                id: Some(id.to_owned()),
                rule,
                ..Self::default()
            };
        }

        let (scope, name) = match body.split_once('.') {
            Some((scope, name)) => (Some(scope.to_owned()), name),
            None => (None, body),
        };

        Self {
            id: None,
            scope,
            name: (name != "*").then(|| name.to_owned()),
            rule,
        }
    }

    /// Builds the selector for `field`, prefixed by `scope` when present.
    pub fn scoped(field: &str, scope: Option<&str>) -> Self {
        match scope {
            Some(scope) => Self::parse(&format!("{scope}.{field}")),
            None => Self::parse(field),
        }
    }

    /// Returns true for `#id` selectors.
    pub fn is_id(&self) -> bool {
        self.id.is_some()
    }

    /// Exact match on scope, name and (if given) rule; id prefix in id mode.
    pub fn is_primary<T: Selectable + ?Sized>(&self, item: &T) -> bool {
        if !self.matches_rule(item) {
            return false;
        }

        if let Some(id) = &self.id {
            return item.selector_id().is_some_and(|item_id| item_id.starts_with(id.as_str()));
        }

        if item.selector_scope() != self.scope.as_deref() {
            return false;
        }

        self.name
            .as_deref()
            .is_none_or(|name| item.selector_name() == name)
    }

    /// Matches items whose name literally is `"{scope}.{name}"`.
    pub fn is_alt<T: Selectable + ?Sized>(&self, item: &T) -> bool {
        let (Some(scope), Some(name)) = (&self.scope, &self.name) else {
            return false;
        };
        if self.id.is_some() || !self.matches_rule(item) {
            return false;
        }

        let field = item.selector_name();
        field.len() == scope.len() + 1 + name.len()
            && field.starts_with(scope.as_str())
            && field[scope.len()..].starts_with('.')
            && field.ends_with(name.as_str())
    }

    /// Primary or alternate match.
    pub fn matches<T: Selectable + ?Sized>(&self, item: &T) -> bool {
        self.is_primary(item) || self.is_alt(item)
    }

    fn matches_rule<T: Selectable + ?Sized>(&self, item: &T) -> bool {
        self.rule
            .as_deref()
            .is_none_or(|rule| item.selector_rule() == Some(rule))
    }
}

/// The two tiers of a single-item lookup.
#[derive(Debug)]
pub struct Candidates<'a, T> {
    /// First primary match in insertion order.
    pub primary: Option<&'a T>,
    /// Last alternate match in insertion order.
    pub alt: Option<&'a T>,
}

impl<'a, T> Candidates<'a, T> {
    /// Primary if found, otherwise the alternate.
    pub fn best(&self) -> Option<&'a T> {
        self.primary.or(self.alt)
    }
}

/// Scans `items` in order and records both candidate tiers.
pub fn select<'a, T, I>(selector: &Selector, items: I) -> Candidates<'a, T>
where
    T: Selectable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut candidates = Candidates {
        primary: None,
        alt: None,
    };

    for item in items {
        if selector.is_primary(item) {
            candidates.primary = Some(item);
            break;
        }
        if selector.is_alt(item) {
            candidates.alt = Some(item);
        }
    }

    candidates
}

/// All primary matches, or all alternate matches when there is no primary.
pub fn select_all<'a, T, I>(selector: &Selector, items: I) -> Vec<&'a T>
where
    T: Selectable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut primary = Vec::new();
    let mut alt = Vec::new();

    for item in items {
        if selector.is_primary(item) {
            primary.push(item);
        }
        if selector.is_alt(item) {
            alt.push(item);
        }
    }

    if primary.is_empty() { alt } else { primary }
}
