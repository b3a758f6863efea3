//! Subject-side convenience checks
//!
//! Lets a subject type ask a gate about itself: `user.can(&gate, "posts:create", &ctx)`.

use async_trait::async_trait;

use crate::error::Result;
use crate::gate::{AsyncGate, Gate};
use crate::verdict::Context;

/// Subject that can query a [`Gate`] about itself
pub trait Authorizable<C = Context>: Sized + 'static
where
    C: 'static,
{
    /// Whether `action` allows this subject
    fn can(&self, gate: &Gate<Self, C>, action: &str, ctx: &C) -> Result<bool> {
        gate.allowed(action, self, ctx)
    }

    /// Whether `action` denies this subject
    fn cannot(&self, gate: &Gate<Self, C>, action: &str, ctx: &C) -> Result<bool> {
        gate.denied(action, self, ctx)
    }
}

/// Subject that can query an [`AsyncGate`] about itself
#[async_trait]
pub trait AsyncAuthorizable<C = Context>: Sized + Send + Sync + 'static
where
    C: Send + Sync + 'static,
{
    async fn can(&self, gate: &AsyncGate<Self, C>, action: &str, ctx: &C) -> Result<bool> {
        gate.allowed(action, self, ctx).await
    }

    async fn cannot(&self, gate: &AsyncGate<Self, C>, action: &str, ctx: &C) -> Result<bool> {
        gate.denied(action, self, ctx).await
    }
}
