//! Rule outcomes and their normalization
//!
//! A rule may answer with a bare boolean, a `{valid, data}` outcome, a list
//! of outcomes, or a deferred future resolving to any of those. Everything is
//! collapsed into a single [`RuleOutcome`] at the invocation boundary.

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

/// Normalized result of one rule invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Whether the value passed the rule.
    pub valid: bool,
    /// Extra data forwarded to the message generator.
    pub data: Value,
}

impl RuleOutcome {
    /// A passing outcome with no data.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            data: empty_data(),
        }
    }

    /// A failing outcome with no data.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            valid: false,
            data: empty_data(),
        }
    }

    /// Attaches message data to the outcome.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

impl From<bool> for RuleOutcome {
    fn from(valid: bool) -> Self {
        Self {
            valid,
            data: empty_data(),
        }
    }
}

/// What a rule's validate function returns.
pub enum RuleResult {
    /// Plain pass/fail.
    Bool(bool),
    /// Pass/fail with message data.
    Outcome(RuleOutcome),
    /// Several outcomes; valid only if all are valid.
    Many(Vec<RuleOutcome>),
    /// An outcome that is not known yet.
    Deferred(BoxFuture<'static, RuleResult>),
}

impl RuleResult {
    /// Wraps a future as a deferred result.
    pub fn deferred<F, R>(future: F) -> Self
    where
        F: Future<Output = R> + Send + 'static,
        R: Into<RuleResult> + 'static,
    {
        Self::Deferred(future.map(Into::into).boxed())
    }

    /// Returns true if the outcome needs to be awaited.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Splits into an immediate outcome or a future that resolves to one.
    pub fn normalize(self) -> Normalized {
        match self {
            Self::Bool(valid) => Normalized::Ready(RuleOutcome::from(valid)),
            Self::Outcome(outcome) => Normalized::Ready(outcome),
            Self::Many(outcomes) => Normalized::Ready(reduce_many(outcomes)),
            Self::Deferred(future) => Normalized::Deferred(resolve(future)),
        }
    }
}

impl std::fmt::Debug for RuleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(valid) => f.debug_tuple("Bool").field(valid).finish(),
            Self::Outcome(outcome) => f.debug_tuple("Outcome").field(outcome).finish(),
            Self::Many(outcomes) => f.debug_tuple("Many").field(outcomes).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<bool> for RuleResult {
    fn from(valid: bool) -> Self {
        Self::Bool(valid)
    }
}

impl From<RuleOutcome> for RuleResult {
    fn from(outcome: RuleOutcome) -> Self {
        Self::Outcome(outcome)
    }
}

impl From<Vec<RuleOutcome>> for RuleResult {
    fn from(outcomes: Vec<RuleOutcome>) -> Self {
        Self::Many(outcomes)
    }
}

impl From<Vec<bool>> for RuleResult {
    fn from(values: Vec<bool>) -> Self {
        Self::Many(values.into_iter().map(RuleOutcome::from).collect())
    }
}

/// A rule result split at the synchronous boundary.
pub enum Normalized {
    /// Known during the scan.
    Ready(RuleOutcome),
    /// Must be awaited.
    Deferred(BoxFuture<'static, RuleOutcome>),
}

fn resolve(future: BoxFuture<'static, RuleResult>) -> BoxFuture<'static, RuleOutcome> {
    async move {
        match future.await.normalize() {
            Normalized::Ready(outcome) => outcome,
            Normalized::Deferred(inner) => inner.await,
        }
    }
    .boxed()
}

// All elements must pass; only the first element's data is kept.
fn reduce_many(outcomes: Vec<RuleOutcome>) -> RuleOutcome {
    let valid = outcomes.iter().all(|o| o.valid);
    let data = outcomes
        .into_iter()
        .next()
        .map(|o| o.data)
        .unwrap_or_else(empty_data);
    RuleOutcome { valid, data }
}

fn empty_data() -> Value {
    Value::Object(serde_json::Map::new())
}
