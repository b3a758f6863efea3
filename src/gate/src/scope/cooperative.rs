//! Scope variant for cooperative schedulers
//!
//! Same semantics as [`Scope`](super::Scope), but writers await the scope's
//! `tokio` mutex instead of blocking the thread, and rules are async.
//! Lookups stay synchronous: they never wait on a writer.

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::path::{validate_segment, ScopePath};
use super::tree::{self, ScopeCore, ScopeTree};
use crate::config::ConflictPolicy;
use crate::error::Result;
use crate::rule::AsyncRule;
use crate::verdict::{Context, Verdict};

/// Hierarchical registry node holding async rules
pub struct AsyncScope<S, C = Context> {
    core: ScopeCore<AsyncRule<S, C>, AsyncScope<S, C>>,
    write_lock: Mutex<()>,
}

impl<S: 'static, C: 'static> ScopeTree for AsyncScope<S, C> {
    type Rule = AsyncRule<S, C>;

    fn core(&self) -> &ScopeCore<AsyncRule<S, C>, Self> {
        &self.core
    }
}

impl<S: 'static, C: 'static> AsyncScope<S, C> {
    /// Creates an empty, detached scope
    pub fn new(name: &str) -> Result<Arc<Self>> {
        validate_segment(name)?;
        Ok(Self::unchecked(name))
    }

    pub(crate) fn unchecked(name: &str) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            core: ScopeCore::new(name, this.clone()),
            write_lock: Mutex::new(()),
        })
    }

    /// Inserts or overwrites the rule at `path`; parent scopes must exist
    pub async fn add_rule(&self, path: &str, rule: AsyncRule<S, C>) -> Result<()> {
        self.insert_rule(path, rule, ConflictPolicy::Overwrite).await
    }

    /// Inserts the rule at `path`, failing if the name is taken
    pub async fn try_add_rule(&self, path: &str, rule: AsyncRule<S, C>) -> Result<()> {
        self.insert_rule(path, rule, ConflictPolicy::Reject).await
    }

    pub(crate) async fn insert_rule(
        &self,
        path: &str,
        rule: AsyncRule<S, C>,
        on_conflict: ConflictPolicy,
    ) -> Result<()> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let _guard = parent.write_lock.lock().await;
        tree::insert_rule(&*parent, path.leaf(), rule, on_conflict)?;

        debug!("Added rule '{}' to scope '{}'", path, self.name());
        Ok(())
    }

    /// Removes the rule at `path`
    pub async fn remove_rule(&self, path: &str) -> Result<()> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let _guard = parent.write_lock.lock().await;
        tree::delete_rule(&*parent, path.leaf())?;

        debug!("Removed rule '{}' from scope '{}'", path, self.name());
        Ok(())
    }

    /// Links `scope` at `path`, replacing any child of that name
    pub async fn add_scope(&self, path: &str, scope: Arc<Self>) -> Result<()> {
        self.link_scope(path, scope, ConflictPolicy::Overwrite).await
    }

    /// Links `scope` at `path`, failing if the name is taken
    pub async fn try_add_scope(&self, path: &str, scope: Arc<Self>) -> Result<()> {
        self.link_scope(path, scope, ConflictPolicy::Reject).await
    }

    pub(crate) async fn link_scope(
        &self,
        path: &str,
        scope: Arc<Self>,
        on_conflict: ConflictPolicy,
    ) -> Result<()> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let _guard = parent.write_lock.lock().await;
        tree::link_child(&*parent, path.leaf(), scope, on_conflict)?;

        debug!("Added scope '{}' to scope '{}'", path, self.name());
        Ok(())
    }

    /// Unlinks the scope at `path` and returns it, detached
    pub async fn remove_scope(&self, path: &str) -> Result<Arc<Self>> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let removed = {
            let _guard = parent.write_lock.lock().await;
            tree::unlink_child(&*parent, path.leaf())?
        };

        debug!("Removed scope '{}' from scope '{}'", path, self.name());
        Ok(removed)
    }

    /// Resolves the rule at `path` and awaits it; the verdict is returned as-is
    pub async fn call(&self, path: &str, subject: &S, ctx: &C) -> Result<Verdict> {
        let rule = self.get_rule(path)?;
        Ok(rule(subject, ctx).await)
    }
}

impl<S: 'static, C: 'static> fmt::Debug for AsyncScope<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncScope")
            .field("name", &self.name())
            .field("rules", &self.rule_names())
            .field("scopes", &self.scope_names())
            .finish()
    }
}

impl<S: 'static, C: 'static> fmt::Display for AsyncScope<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tree())
    }
}
