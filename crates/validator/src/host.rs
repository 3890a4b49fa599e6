//! Host collaborator
//!
//! The host owns whatever drives the validator: a UI binding, a form
//! runtime, a test harness. The validator only needs two things from it: a
//! way to wait for one host update cycle, and a sink for locale changes.

use futures::future::{self, BoxFuture, FutureExt};

/// Reactive host the validator is embedded in.
pub trait Host: Send + Sync {
    /// Resolves after the host has completed one update cycle.
    fn schedule(&self) -> BoxFuture<'static, ()>;

    /// Called after the dictionary locale actually changed.
    fn locale_changed(&self, locale: &str);
}

/// Host without update cycles; scheduling resolves immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineHost;

impl Host for InlineHost {
    fn schedule(&self) -> BoxFuture<'static, ()> {
        future::ready(()).boxed()
    }

    fn locale_changed(&self, locale: &str) {
        tracing::debug!(%locale, "Locale changed");
    }
}
