//! Rule callables
//!
//! A rule is an opaque predicate over a subject and a context. Blocking
//! gates store [`Rule`]s; cooperative gates store [`AsyncRule`]s, which
//! yield while the predicate awaits.

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use crate::verdict::{Context, Verdict};

/// Synchronous rule
pub type Rule<S, C = Context> = Arc<dyn Fn(&S, &C) -> Verdict + Send + Sync>;

/// Asynchronous rule
pub type AsyncRule<S, C = Context> =
    Arc<dyn for<'a> Fn(&'a S, &'a C) -> BoxFuture<'a, Verdict> + Send + Sync>;

/// Wrap a closure returning anything convertible to a [`Verdict`]
pub fn rule<S, C, F, R>(f: F) -> Rule<S, C>
where
    S: 'static,
    C: 'static,
    F: Fn(&S, &C) -> R + Send + Sync + 'static,
    R: Into<Verdict>,
{
    Arc::new(move |subject: &S, ctx: &C| -> Verdict { f(subject, ctx).into() })
}

/// Wrap an async closure
pub fn async_rule<S, C, F>(f: F) -> AsyncRule<S, C>
where
    F: for<'a> Fn(&'a S, &'a C) -> BoxFuture<'a, Verdict> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Lift a synchronous closure into an async rule that completes immediately
pub fn ready_rule<S, C, F, R>(f: F) -> AsyncRule<S, C>
where
    S: 'static,
    C: 'static,
    F: Fn(&S, &C) -> R + Send + Sync + 'static,
    R: Into<Verdict>,
{
    async_rule(move |subject, ctx| {
        let verdict: Verdict = f(subject, ctx).into();
        futures::future::ready(verdict).boxed()
    })
}
