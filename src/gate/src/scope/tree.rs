//! Shared scope tree capability
//!
//! Both concurrency variants store their nodes in a [`ScopeCore`] and
//! implement [`ScopeTree`], which provides every read path (rule and
//! scope lookups, introspection). Lookups never take a scope's writer
//! lock; the map itself is sharded and each insert or delete is atomic
//! per key. The edit helpers at the bottom of this module assume the
//! caller holds the target node's writer lock.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt::Write as _;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::path::ScopePath;
use crate::config::ConflictPolicy;
use crate::error::{GateError, Result};

/// Map entry tagged with its insertion sequence
#[derive(Debug, Clone)]
struct Slot<T> {
    seq: u64,
    value: T,
}

/// Node state shared by the blocking and cooperative scope variants
pub struct ScopeCore<R, N> {
    /// Local name of the scope
    name: String,
    /// Weak handle to the node owning this core
    this: Weak<N>,
    /// Back-reference for introspection, never used for ownership
    parent: RwLock<Weak<N>>,
    /// Local rules
    rules: DashMap<String, Slot<R>>,
    /// Local child scopes
    children: DashMap<String, Slot<Arc<N>>>,
    /// Insertion counter, keeps introspection output stable
    next_seq: AtomicU64,
    /// Set when the scope was built from a registered policy
    policy: AtomicBool,
}

impl<R, N> ScopeCore<R, N> {
    /// Creates an empty core; `this` must point at the node that embeds it
    pub(crate) fn new(name: &str, this: Weak<N>) -> Self {
        Self {
            name: name.to_string(),
            this,
            parent: RwLock::new(Weak::new()),
            rules: DashMap::new(),
            children: DashMap::new(),
            next_seq: AtomicU64::new(0),
            policy: AtomicBool::new(false),
        }
    }

    /// Tags the scope as a registered policy
    pub(crate) fn mark_policy(&self) {
        self.policy.store(true, Ordering::Release);
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// Parent scope of a path's leaf
///
/// Single-segment paths resolve to the receiver itself; longer paths
/// resolve to a descendant handle.
pub enum Resolved<'a, N> {
    Receiver(&'a N),
    Descendant(Arc<N>),
}

impl<N> Deref for Resolved<'_, N> {
    type Target = N;

    fn deref(&self) -> &N {
        match self {
            Self::Receiver(node) => *node,
            Self::Descendant(node) => node.as_ref(),
        }
    }
}

/// Read-side operations common to every scope variant
pub trait ScopeTree: Sized + Send + Sync + 'static {
    /// Rule type stored in this tree
    type Rule: Clone + Send + Sync;

    /// Node storage
    fn core(&self) -> &ScopeCore<Self::Rule, Self>;

    /// Local name of this scope
    fn name(&self) -> &str {
        &self.core().name
    }

    /// Parent scope, if this scope is attached and the parent is alive
    fn parent(&self) -> Option<Arc<Self>> {
        self.core().parent.read().upgrade()
    }

    /// Direct child by local name
    fn child(&self, name: &str) -> Option<Arc<Self>> {
        self.core()
            .children
            .get(name)
            .map(|slot| Arc::clone(&slot.value))
    }

    /// Rule stored directly in this scope
    fn local_rule(&self, name: &str) -> Option<Self::Rule> {
        self.core().rules.get(name).map(|slot| slot.value.clone())
    }

    /// Walks a chain of child lookups starting at this scope
    fn walk(&self, segments: &[String]) -> Result<Arc<Self>> {
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| GateError::InvalidPath("scope path cannot be empty".to_string()))?;

        let mut current = self
            .child(first)
            .ok_or_else(|| GateError::ScopeNotFound(first.clone()))?;

        for (idx, segment) in rest.iter().enumerate() {
            current = current
                .child(segment)
                .ok_or_else(|| GateError::ScopeNotFound(segments[..idx + 2].join(":")))?;
        }

        Ok(current)
    }

    /// Resolves the scope that holds the leaf of `path`
    fn resolve_parent(&self, path: &ScopePath) -> Result<Resolved<'_, Self>> {
        if path.parents().is_empty() {
            Ok(Resolved::Receiver(self))
        } else {
            self.walk(path.parents()).map(Resolved::Descendant)
        }
    }

    /// True iff `path` resolves to a rule; never fails
    fn has_rule(&self, path: &str) -> bool {
        self.get_rule(path).is_ok()
    }

    /// Resolves `path` to a rule
    ///
    /// A missing intermediate scope is reported as `RuleNotFound` for the
    /// whole path.
    fn get_rule(&self, path: &str) -> Result<Self::Rule> {
        let parsed = ScopePath::parse(path)?;
        let not_found = || GateError::RuleNotFound(path.to_string());

        let scope = self.resolve_parent(&parsed).map_err(|_| not_found())?;
        scope.local_rule(parsed.leaf()).ok_or_else(not_found)
    }

    /// True iff `path` resolves to a scope; never fails
    fn has_scope(&self, path: &str) -> bool {
        self.get_scope(path).is_ok()
    }

    /// Resolves `path` to a scope
    fn get_scope(&self, path: &str) -> Result<Arc<Self>> {
        let parsed = ScopePath::parse(path)?;
        self.walk(parsed.segments())
    }

    /// Local rule names in insertion order
    fn rule_names(&self) -> Vec<String> {
        let mut entries: Vec<(u64, String)> = self
            .core()
            .rules
            .iter()
            .map(|entry| (entry.value().seq, entry.key().clone()))
            .collect();
        entries.sort_unstable();
        entries.into_iter().map(|(_, name)| name).collect()
    }

    /// Local child scopes in insertion order
    fn children(&self) -> Vec<(String, Arc<Self>)> {
        let mut entries: Vec<(u64, String, Arc<Self>)> = self
            .core()
            .children
            .iter()
            .map(|entry| {
                (
                    entry.value().seq,
                    entry.key().clone(),
                    Arc::clone(&entry.value().value),
                )
            })
            .collect();
        entries.sort_unstable_by_key(|(seq, _, _)| *seq);
        entries
            .into_iter()
            .map(|(_, name, scope)| (name, scope))
            .collect()
    }

    /// Local child scope names in insertion order
    fn scope_names(&self) -> Vec<String> {
        self.children().into_iter().map(|(name, _)| name).collect()
    }

    /// Every rule path reachable from this scope, own rules first
    fn rule_paths(&self) -> Vec<String> {
        let mut paths = self.rule_names();
        for (name, child) in self.children() {
            paths.extend(
                child
                    .rule_paths()
                    .into_iter()
                    .map(|path| format!("{}:{}", name, path)),
            );
        }
        paths
    }

    /// True iff this scope was registered as a policy
    fn is_policy(&self) -> bool {
        self.core().policy.load(Ordering::Acquire)
    }

    /// Paths of every policy scope below this scope, depth first
    fn policy_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (name, child) in self.children() {
            if child.is_policy() {
                paths.push(name.clone());
            }
            paths.extend(
                child
                    .policy_paths()
                    .into_iter()
                    .map(|path| format!("{}:{}", name, path)),
            );
        }
        paths
    }

    /// Number of rules in this scope and all descendants
    fn rule_count(&self) -> usize {
        self.core().rules.len()
            + self
                .children()
                .iter()
                .map(|(_, child)| child.rule_count())
                .sum::<usize>()
    }

    /// Indented listing of rules and scopes, for diagnostics
    fn tree(&self) -> String {
        let mut out = String::new();
        write_tree(self, self.name(), 0, &mut out);
        out
    }
}

fn write_tree<N: ScopeTree>(node: &N, label: &str, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);
    let _ = writeln!(out, "{}Scope: {}", prefix, label);
    for rule in node.rule_names() {
        let _ = writeln!(out, "{}  Rule: {}", prefix, rule);
    }
    for (name, child) in node.children() {
        write_tree(child.as_ref(), &name, indent + 1, out);
    }
}

// ============================================================================
// Edits (caller holds the node's writer lock)
// ============================================================================

/// Inserts a rule, overwriting or rejecting an existing name
pub(crate) fn insert_rule<N: ScopeTree>(
    node: &N,
    name: &str,
    rule: N::Rule,
    on_conflict: ConflictPolicy,
) -> Result<()> {
    let core = node.core();

    if on_conflict == ConflictPolicy::Reject
        && (core.rules.contains_key(name) || core.children.contains_key(name))
    {
        return Err(GateError::Conflict(name.to_string()));
    }

    // An overwritten rule keeps its original position.
    let seq = existing_seq(&core.rules, name).unwrap_or_else(|| core.next_seq());
    core.rules.insert(name.to_string(), Slot { seq, value: rule });
    Ok(())
}

/// Deletes a rule
pub(crate) fn delete_rule<N: ScopeTree>(node: &N, name: &str) -> Result<N::Rule> {
    node.core()
        .rules
        .remove(name)
        .map(|(_, slot)| slot.value)
        .ok_or_else(|| GateError::RuleNotFound(name.to_string()))
}

/// Links `child` under `name`, claiming its parent back-reference
pub(crate) fn link_child<N: ScopeTree>(
    node: &N,
    name: &str,
    child: Arc<N>,
    on_conflict: ConflictPolicy,
) -> Result<()> {
    let core = node.core();

    if on_conflict == ConflictPolicy::Reject
        && (core.rules.contains_key(name) || core.children.contains_key(name))
    {
        return Err(GateError::Conflict(name.to_string()));
    }

    if let Some(existing) = core.children.get(name) {
        if Arc::ptr_eq(&existing.value, &child) {
            return Ok(());
        }
    }

    // Claim first, then walk: of two writers linking each other's scopes,
    // at least one observes the other's claim.
    {
        let mut parent = child.core().parent.write();
        if parent.upgrade().is_some() {
            return Err(GateError::ScopeAttached(
                child.name().to_string(),
                "already linked under a parent".to_string(),
            ));
        }
        *parent = core.this.clone();
    }

    if let Err(e) = ensure_acyclic(node, &child) {
        detach(&child);
        return Err(e);
    }

    let seq = existing_seq(&core.children, name).unwrap_or_else(|| core.next_seq());
    if let Some(displaced) = core.children.insert(name.to_string(), Slot { seq, value: child }) {
        detach(&displaced.value);
    }
    Ok(())
}

/// Unlinks the child named `name` and clears its back-reference
pub(crate) fn unlink_child<N: ScopeTree>(node: &N, name: &str) -> Result<Arc<N>> {
    let (_, slot) = node
        .core()
        .children
        .remove(name)
        .ok_or_else(|| GateError::ScopeNotFound(name.to_string()))?;

    detach(&slot.value);
    Ok(slot.value)
}

fn existing_seq<T>(map: &DashMap<String, Slot<T>>, name: &str) -> Option<u64> {
    map.get(name).map(|slot| slot.seq)
}

fn detach<N: ScopeTree>(scope: &Arc<N>) {
    *scope.core().parent.write() = Weak::new();
}

/// Rejects linking `child` under `node` when `child` is `node` or one of its ancestors
fn ensure_acyclic<N: ScopeTree>(node: &N, child: &Arc<N>) -> Result<()> {
    let cycle = || {
        GateError::ScopeAttached(
            child.name().to_string(),
            "linking would create a cycle".to_string(),
        )
    };

    if std::ptr::eq(node, child.as_ref()) {
        return Err(cycle());
    }

    let mut cursor = node.parent();
    while let Some(ancestor) = cursor {
        if Arc::ptr_eq(&ancestor, child) {
            return Err(cycle());
        }
        cursor = ancestor.parent();
    }

    Ok(())
}
