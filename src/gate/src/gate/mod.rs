//! Gate: the authorization facade
//!
//! Owns one root scope and exposes registration plus the check family
//! (`check`, `allowed`, `denied`, `authorize`, `any`, `none`). Every check
//! resolves its rule first, then invokes it outside any registry lock.
//!
//! # Architecture
//!
//! ```text
//! register_rule / register_policy ──→ root Scope ──→ child Scopes ──→ Rules
//!                                          ↑
//! check(name) ── resolve path ─────────────┘
//!      ↓
//!   Verdict ──→ allowed / denied / authorize / any / none
//!      ↓
//!   [Metrics]
//! ```

pub mod cooperative;
pub mod metrics;

pub use cooperative::AsyncGate;
pub use metrics::{GateMetrics, MetricsSnapshot};

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConflictPolicy, GateConfig};
use crate::error::{GateError, Result};
use crate::policy::{self, Policy};
use crate::rule::{self as rules, Rule};
use crate::scope::{Scope, ScopePath, ScopeTree};
use crate::verdict::{Context, Verdict};

/// Authorization gate for preemptive threads
///
/// # Examples
///
/// ```
/// use cretoai_gate::{Context, Gate, Response};
///
/// let gate: Gate<String> = Gate::new();
/// gate.register_rule("admin", |user: &String, _: &Context| user == "root").unwrap();
/// gate.register_rule("billing", |_: &String, _: &Context| {
///     Response::deny().with_message("billing is closed")
/// }).unwrap();
///
/// let root = "root".to_string();
/// assert!(gate.allowed("admin", &root, &Context::new()).unwrap());
/// assert!(gate.denied("billing", &root, &Context::new()).unwrap());
/// assert!(gate.authorize("billing", &root, &Context::new()).is_err());
/// ```
pub struct Gate<S, C = Context> {
    /// Current root scope, swapped wholesale by `clear`
    root: RwLock<Arc<Scope<S, C>>>,

    /// Gate configuration
    config: GateConfig,

    /// Check counters
    metrics: Option<Arc<GateMetrics>>,
}

impl<S: 'static, C: 'static> Gate<S, C> {
    /// Create a gate with the default configuration
    pub fn new() -> Self {
        Self::build(GateConfig::default())
    }

    /// Create a gate with a validated configuration
    pub fn with_config(config: GateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: GateConfig) -> Self {
        let metrics = config.enable_metrics.then(|| Arc::new(GateMetrics::new()));

        info!(
            "Gate initialized with root='{}', on_conflict={:?}, metrics={}",
            config.root_name, config.on_conflict, config.enable_metrics
        );

        Self {
            root: RwLock::new(Scope::unchecked(&config.root_name)),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Current root scope
    ///
    /// The handle stays usable after `clear`, but is no longer reachable
    /// from the gate.
    pub fn root(&self) -> Arc<Scope<S, C>> {
        Arc::clone(&self.root.read())
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a rule under `name`
    ///
    /// The closure may return `bool`, [`Response`](crate::Response) or
    /// [`Verdict`]. Parent scopes of `name` must already exist.
    pub fn register_rule<F, R>(&self, name: &str, rule: F) -> Result<()>
    where
        F: Fn(&S, &C) -> R + Send + Sync + 'static,
        R: Into<Verdict>,
    {
        self.register_boxed_rule(name, rules::rule(rule))
    }

    /// Register an already wrapped rule
    pub fn register_boxed_rule(&self, name: &str, rule: Rule<S, C>) -> Result<()> {
        self.root()
            .insert_rule(name, rule, self.config.on_conflict)
            .map_err(|e| self.rejected(name, e))?;

        debug!("Registered rule '{}'", name);
        Ok(())
    }

    /// Create an empty scope at `path`; ancestors must exist
    pub fn register_scope(&self, path: &str) -> Result<Arc<Scope<S, C>>> {
        let parsed = ScopePath::parse(path)?;
        let scope = Scope::new(parsed.leaf())?;

        self.root()
            .link_scope(path, Arc::clone(&scope), self.config.on_conflict)
            .map_err(|e| self.rejected(path, e))?;

        debug!("Registered scope '{}'", path);
        Ok(scope)
    }

    /// Register a default-constructed policy under `name`
    pub fn register_policy<P>(&self, name: &str) -> Result<()>
    where
        P: Policy<S, C> + Default,
    {
        self.register_policy_instance(name, P::default())
    }

    /// Register a policy instance under `name`
    ///
    /// The policy's methods become rules `<name>:<method>`. All validation
    /// happens before the registry is touched; the populated scope is then
    /// linked in a single edit.
    pub fn register_policy_instance<P>(&self, name: &str, policy: P) -> Result<()>
    where
        P: Policy<S, C>,
    {
        let path = ScopePath::parse(name)?;
        let rules = policy::instance_rules(policy)?;

        let scope = Scope::new(path.leaf())?;
        scope.core().mark_policy();
        let count = rules.len();
        for (method, rule) in rules {
            scope.add_rule(&method, rule)?;
        }

        self.root()
            .link_scope(name, scope, self.config.on_conflict)
            .map_err(|e| self.rejected(name, e))?;

        info!("Registered policy '{}' with {} rules", name, count);
        Ok(())
    }

    /// Remove the rule registered under `name`
    pub fn remove_rule(&self, name: &str) -> Result<()> {
        self.root().remove_rule(name)?;
        debug!("Removed rule '{}'", name);
        Ok(())
    }

    /// Remove a policy (or any scope) and every rule below it
    pub fn remove_policy(&self, name: &str) -> Result<()> {
        self.root().remove_scope(name)?;
        info!("Removed policy '{}'", name);
        Ok(())
    }

    /// Drop every registration by swapping in a fresh root
    pub fn clear(&self) {
        *self.root.write() = Scope::unchecked(&self.config.root_name);
        info!("Gate cleared");
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// True iff `name` resolves to a rule
    pub fn has(&self, name: &str) -> bool {
        self.root().has_rule(name)
    }

    /// Every registered rule path
    pub fn actions(&self) -> Vec<String> {
        self.root().rule_paths()
    }

    /// Paths of registered policies; plain scopes are not listed
    pub fn policies(&self) -> Vec<String> {
        self.root().policy_paths()
    }

    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Resolve and invoke the rule `name`, returning its verdict
    pub fn check(&self, name: &str, subject: &S, ctx: &C) -> Result<Verdict> {
        let rule = self.lookup(name)?;
        Ok(self.evaluate(name, &rule, subject, ctx))
    }

    /// Whether the rule allows `subject`
    pub fn allowed(&self, name: &str, subject: &S, ctx: &C) -> Result<bool> {
        self.check(name, subject, ctx).map(|verdict| verdict.is_allowed())
    }

    /// Whether the rule denies `subject`
    pub fn denied(&self, name: &str, subject: &S, ctx: &C) -> Result<bool> {
        self.check(name, subject, ctx).map(|verdict| verdict.is_denied())
    }

    /// Succeeds silently when allowed, fails with `AccessDenied` otherwise
    pub fn authorize(&self, name: &str, subject: &S, ctx: &C) -> Result<()> {
        let verdict = self.check(name, subject, ctx)?;
        verdict.authorize().map_err(|e| {
            warn!("Authorization denied for '{}': {}", name, e);
            if let Some(metrics) = &self.metrics {
                metrics.record_authorization_failure();
            }
            e
        })
    }

    /// True iff at least one of `names` allows `subject`
    ///
    /// Every name is resolved before any rule runs; rules then run in
    /// order until one allows.
    pub fn any(&self, names: &[&str], subject: &S, ctx: &C) -> Result<bool> {
        let resolved = names
            .iter()
            .map(|name| self.lookup(name).map(|rule| (*name, rule)))
            .collect::<Result<Vec<_>>>()?;

        for (name, rule) in &resolved {
            if self.evaluate(name, rule, subject, ctx).is_allowed() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True iff none of `names` allows `subject`
    pub fn none(&self, names: &[&str], subject: &S, ctx: &C) -> Result<bool> {
        self.any(names, subject, ctx).map(|any| !any)
    }

    // Private helpers

    fn lookup(&self, name: &str) -> Result<Rule<S, C>> {
        self.root().get_rule(name).map_err(|e| {
            debug!("Lookup failed for '{}': {}", name, e);
            if let Some(metrics) = &self.metrics {
                metrics.record_not_found();
            }
            e
        })
    }

    fn evaluate(&self, name: &str, rule: &Rule<S, C>, subject: &S, ctx: &C) -> Verdict {
        let start = Instant::now();
        let verdict = rule(subject, ctx);

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(verdict.is_allowed(), start.elapsed());
        }

        debug!(
            "Rule '{}' -> {}",
            name,
            if verdict.is_allowed() { "ALLOW" } else { "DENY" }
        );
        verdict
    }

    fn rejected(&self, name: &str, err: GateError) -> GateError {
        if self.config.on_conflict == ConflictPolicy::Reject {
            warn!("Registration of '{}' rejected: {}", name, err);
        }
        err
    }
}

impl<S: 'static, C: 'static> Default for Gate<S, C> {
    fn default() -> Self {
        Self::new()
    }
}
