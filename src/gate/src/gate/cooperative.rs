//! Gate variant for cooperative schedulers
//!
//! Rules are async; registry edits await the edited scope's `tokio` mutex.
//! Lookups never wait on a writer and no guard is held across a rule's
//! await point.

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::metrics::{GateMetrics, MetricsSnapshot};
use crate::config::{ConflictPolicy, GateConfig};
use crate::error::{GateError, Result};
use crate::policy::{self, AsyncPolicy, Policy};
use crate::rule::{self as rules, AsyncRule};
use crate::scope::{AsyncScope, ScopePath, ScopeTree};
use crate::verdict::{Context, Verdict};

/// Authorization gate with async rules
///
/// # Examples
///
/// ```
/// use cretoai_gate::{AsyncGate, Context, Verdict};
/// use futures::FutureExt;
///
/// # tokio_test::block_on(async {
/// let gate: AsyncGate<String> = AsyncGate::new();
/// gate.register_rule("admin", |user: &String, _: &Context| {
///     async move { Verdict::from(user == "root") }.boxed()
/// })
/// .await
/// .unwrap();
///
/// assert!(gate.allowed("admin", &"root".to_string(), &Context::new()).await.unwrap());
/// # });
/// ```
pub struct AsyncGate<S, C = Context> {
    root: RwLock<Arc<AsyncScope<S, C>>>,
    config: GateConfig,
    metrics: Option<Arc<GateMetrics>>,
}

impl<S: Sync + 'static, C: Sync + 'static> AsyncGate<S, C> {
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
            "AsyncGate initialized with root='{}', on_conflict={:?}, metrics={}",
            config.root_name, config.on_conflict, config.enable_metrics
        );

        Self {
            root: RwLock::new(AsyncScope::unchecked(&config.root_name)),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Current root scope
    pub fn root(&self) -> Arc<AsyncScope<S, C>> {
        Arc::clone(&self.root.read())
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register an async rule under `name`
    pub async fn register_rule<F>(&self, name: &str, rule: F) -> Result<()>
    where
        F: for<'a> Fn(&'a S, &'a C) -> BoxFuture<'a, Verdict> + Send + Sync + 'static,
    {
        self.register_boxed_rule(name, rules::async_rule(rule)).await
    }

    /// Register a synchronous rule; it completes without suspending
    pub async fn register_sync_rule<F, R>(&self, name: &str, rule: F) -> Result<()>
    where
        F: Fn(&S, &C) -> R + Send + Sync + 'static,
        R: Into<Verdict>,
    {
        self.register_boxed_rule(name, rules::ready_rule(rule)).await
    }

    pub async fn register_boxed_rule(&self, name: &str, rule: AsyncRule<S, C>) -> Result<()> {
        let root = self.root();
        root.insert_rule(name, rule, self.config.on_conflict)
            .await
            .map_err(|e| self.rejected(name, e))?;

        debug!("Registered rule '{}'", name);
        Ok(())
    }

    /// Create an empty scope at `path`; ancestors must exist
    pub async fn register_scope(&self, path: &str) -> Result<Arc<AsyncScope<S, C>>> {
        let parsed = ScopePath::parse(path)?;
        let scope = AsyncScope::new(parsed.leaf())?;

        let root = self.root();
        root.link_scope(path, Arc::clone(&scope), self.config.on_conflict)
            .await
            .map_err(|e| self.rejected(path, e))?;

        debug!("Registered scope '{}'", path);
        Ok(scope)
    }

    /// Register a default-constructed async policy under `name`
    pub async fn register_policy<P>(&self, name: &str) -> Result<()>
    where
        P: AsyncPolicy<S, C> + Default,
    {
        self.register_policy_instance(name, P::default()).await
    }

    /// Register an async policy instance under `name`
    pub async fn register_policy_instance<P>(&self, name: &str, policy: P) -> Result<()>
    where
        P: AsyncPolicy<S, C>,
    {
        let path = ScopePath::parse(name)?;
        let rules = policy::async_instance_rules(policy)?;
        self.install_policy(name, &path, rules).await
    }

    /// Register a synchronous policy; its rules are lifted to async rules
    pub async fn register_sync_policy<P>(&self, name: &str) -> Result<()>
    where
        P: Policy<S, C> + Default,
    {
        let path = ScopePath::parse(name)?;
        let rules = policy::lift_rules(policy::to_rules::<P, S, C>()?);
        self.install_policy(name, &path, rules).await
    }

    async fn install_policy(
        &self,
        name: &str,
        path: &ScopePath,
        rules: Vec<(String, AsyncRule<S, C>)>,
    ) -> Result<()> {
        let scope = AsyncScope::new(path.leaf())?;
        scope.core().mark_policy();
        let count = rules.len();
        for (method, rule) in rules {
            scope.add_rule(&method, rule).await?;
        }

        let root = self.root();
        root.link_scope(name, scope, self.config.on_conflict)
            .await
            .map_err(|e| self.rejected(name, e))?;

        info!("Registered policy '{}' with {} rules", name, count);
        Ok(())
    }

    pub async fn remove_rule(&self, name: &str) -> Result<()> {
        let root = self.root();
        root.remove_rule(name).await?;
        debug!("Removed rule '{}'", name);
        Ok(())
    }

    /// Remove a policy (or any scope) and every rule below it
    pub async fn remove_policy(&self, name: &str) -> Result<()> {
        let root = self.root();
        root.remove_scope(name).await?;
        info!("Removed policy '{}'", name);
        Ok(())
    }

    /// Drop every registration by swapping in a fresh root
    pub fn clear(&self) {
        *self.root.write() = AsyncScope::unchecked(&self.config.root_name);
        info!("AsyncGate cleared");
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn has(&self, name: &str) -> bool {
        self.root().has_rule(name)
    }

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

    /// Resolve and await the rule `name`
    pub async fn check(&self, name: &str, subject: &S, ctx: &C) -> Result<Verdict> {
        let rule = self.lookup(name)?;
        Ok(self.evaluate(name, &rule, subject, ctx).await)
    }

    pub async fn allowed(&self, name: &str, subject: &S, ctx: &C) -> Result<bool> {
        Ok(self.check(name, subject, ctx).await?.is_allowed())
    }

    pub async fn denied(&self, name: &str, subject: &S, ctx: &C) -> Result<bool> {
        Ok(self.check(name, subject, ctx).await?.is_denied())
    }

    /// Succeeds silently when allowed, fails with `AccessDenied` otherwise
    pub async fn authorize(&self, name: &str, subject: &S, ctx: &C) -> Result<()> {
        let verdict = self.check(name, subject, ctx).await?;
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
    /// Resolution of every name happens before the first rule is awaited.
    pub async fn any(&self, names: &[&str], subject: &S, ctx: &C) -> Result<bool> {
        let resolved = names
            .iter()
            .map(|name| self.lookup(name).map(|rule| (*name, rule)))
            .collect::<Result<Vec<_>>>()?;

        for (name, rule) in &resolved {
            if self.evaluate(name, rule, subject, ctx).await.is_allowed() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn none(&self, names: &[&str], subject: &S, ctx: &C) -> Result<bool> {
        Ok(!self.any(names, subject, ctx).await?)
    }

    // Private helpers

    fn lookup(&self, name: &str) -> Result<AsyncRule<S, C>> {
        self.root().get_rule(name).map_err(|e| {
            debug!("Lookup failed for '{}': {}", name, e);
            if let Some(metrics) = &self.metrics {
                metrics.record_not_found();
            }
            e
        })
    }

    async fn evaluate(&self, name: &str, rule: &AsyncRule<S, C>, subject: &S, ctx: &C) -> Verdict {
        let start = Instant::now();
        let verdict = rule(subject, ctx).await;

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

impl<S: Sync + 'static, C: Sync + 'static> Default for AsyncGate<S, C> {
    fn default() -> Self {
        Self::new()
    }
}
