//! Scope variant for preemptive threads
//!
//! Writers take the scope's own `parking_lot` mutex for the duration of the
//! map edit only. Rules are invoked after the lookup returns, outside any
//! lock.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::path::{validate_segment, ScopePath};
use super::tree::{self, ScopeCore, ScopeTree};
use crate::config::ConflictPolicy;
use crate::error::Result;
use crate::rule::Rule;
use crate::verdict::{Context, Verdict};

/// Hierarchical rule registry node
///
/// # Examples
///
/// ```
/// use cretoai_gate::rule::rule;
/// use cretoai_gate::scope::{Scope, ScopeTree};
/// use cretoai_gate::Context;
///
/// let root = Scope::<String>::new("root").unwrap();
/// root.add_scope("billing", Scope::new("billing").unwrap()).unwrap();
/// root.add_rule("billing:refund", rule(|user: &String, _: &Context| user == "admin")).unwrap();
///
/// assert!(root.has_rule("billing:refund"));
/// let verdict = root.call("billing:refund", &"admin".to_string(), &Context::new()).unwrap();
/// assert!(verdict.is_allowed());
/// ```
pub struct Scope<S, C = Context> {
    core: ScopeCore<Rule<S, C>, Scope<S, C>>,
    write_lock: Mutex<()>,
}

impl<S: 'static, C: 'static> ScopeTree for Scope<S, C> {
    type Rule = Rule<S, C>;

    fn core(&self) -> &ScopeCore<Rule<S, C>, Self> {
        &self.core
    }
}

impl<S: 'static, C: 'static> Scope<S, C> {
    /// Creates an empty, detached scope
    pub fn new(name: &str) -> Result<Arc<Self>> {
        validate_segment(name)?;
        Ok(Self::unchecked(name))
    }

    /// Creates a scope pre-populated with child scopes, linked under their own names
    pub fn with_children(name: &str, children: Vec<Arc<Self>>) -> Result<Arc<Self>> {
        let scope = Self::new(name)?;
        for child in children {
            let child_name = child.name().to_string();
            scope.add_scope(&child_name, child)?;
        }
        Ok(scope)
    }

    pub(crate) fn unchecked(name: &str) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            core: ScopeCore::new(name, this.clone()),
            write_lock: Mutex::new(()),
        })
    }

    /// Inserts or overwrites the rule at `path`; parent scopes must exist
    pub fn add_rule(&self, path: &str, rule: Rule<S, C>) -> Result<()> {
        self.insert_rule(path, rule, ConflictPolicy::Overwrite)
    }

    /// Inserts the rule at `path`, failing if the name is taken
    pub fn try_add_rule(&self, path: &str, rule: Rule<S, C>) -> Result<()> {
        self.insert_rule(path, rule, ConflictPolicy::Reject)
    }

    pub(crate) fn insert_rule(
        &self,
        path: &str,
        rule: Rule<S, C>,
        on_conflict: ConflictPolicy,
    ) -> Result<()> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let _guard = parent.write_lock.lock();
        tree::insert_rule(&*parent, path.leaf(), rule, on_conflict)?;

        debug!("Added rule '{}' to scope '{}'", path, self.name());
        Ok(())
    }

    /// Removes the rule at `path`
    pub fn remove_rule(&self, path: &str) -> Result<()> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let _guard = parent.write_lock.lock();
        tree::delete_rule(&*parent, path.leaf())?;

        debug!("Removed rule '{}' from scope '{}'", path, self.name());
        Ok(())
    }

    /// Links `scope` at `path`, replacing any child of that name
    ///
    /// Every ancestor segment must already exist; no scopes are created
    /// implicitly.
    pub fn add_scope(&self, path: &str, scope: Arc<Self>) -> Result<()> {
        self.link_scope(path, scope, ConflictPolicy::Overwrite)
    }

    /// Links `scope` at `path`, failing if the name is taken
    pub fn try_add_scope(&self, path: &str, scope: Arc<Self>) -> Result<()> {
        self.link_scope(path, scope, ConflictPolicy::Reject)
    }

    pub(crate) fn link_scope(
        &self,
        path: &str,
        scope: Arc<Self>,
        on_conflict: ConflictPolicy,
    ) -> Result<()> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let _guard = parent.write_lock.lock();
        tree::link_child(&*parent, path.leaf(), scope, on_conflict)?;

        debug!("Added scope '{}' to scope '{}'", path, self.name());
        Ok(())
    }

    /// Unlinks the scope at `path` and returns it, detached
    pub fn remove_scope(&self, path: &str) -> Result<Arc<Self>> {
        let path = ScopePath::parse(path)?;
        let parent = self.resolve_parent(&path)?;

        let removed = {
            let _guard = parent.write_lock.lock();
            tree::unlink_child(&*parent, path.leaf())?
        };

        debug!("Removed scope '{}' from scope '{}'", path, self.name());
        Ok(removed)
    }

    /// Resolves the rule at `path` and invokes it; the verdict is returned as-is
    pub fn call(&self, path: &str, subject: &S, ctx: &C) -> Result<Verdict> {
        let rule = self.get_rule(path)?;
        Ok(rule(subject, ctx))
    }
}

impl<S: 'static, C: 'static> fmt::Debug for Scope<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name())
            .field("rules", &self.rule_names())
            .field("scopes", &self.scope_names())
            .finish()
    }
}

impl<S: 'static, C: 'static> fmt::Display for Scope<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tree())
    }
}
