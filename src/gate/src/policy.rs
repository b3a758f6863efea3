//! Policy declaration and flattening
//!
//! A policy bundles related checks as methods on one type. Instead of
//! discovering methods at runtime, a policy declares its method table in
//! [`Policy::rules`]. Flattening binds every declared method to a single
//! shared instance and yields `(name, rule)` pairs; the gate then links
//! them under a scope named after the policy, so the method `create` of
//! policy `posts` is addressed as `posts:create`.
//!
//! # Example
//!
//! ```rust
//! use cretoai_gate::policy::{Policy, PolicyRules};
//! use cretoai_gate::{Context, Gate};
//!
//! #[derive(Default)]
//! struct PostPolicy;
//!
//! impl PostPolicy {
//!     fn create(&self, user: &String, _ctx: &Context) -> bool {
//!         user == "editor"
//!     }
//! }
//!
//! impl Policy<String> for PostPolicy {
//!     fn rules() -> PolicyRules<Self, String> {
//!         PolicyRules::new().rule("create", Self::create)
//!     }
//! }
//!
//! let gate: Gate<String> = Gate::new();
//! gate.register_policy::<PostPolicy>("posts").unwrap();
//! assert!(gate.allowed("posts:create", &"editor".to_string(), &Context::new()).unwrap());
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{GateError, Result};
use crate::rule::{async_rule, AsyncRule, Rule};
use crate::scope::validate_segment;
use crate::verdict::{Context, Verdict};

/// Prefix reserved for internal helpers; such names are never exposed as rules
pub const INTERNAL_PREFIX: char = '_';

/// Unbound synchronous policy method
pub type PolicyMethod<P, S, C = Context> = Arc<dyn Fn(&P, &S, &C) -> Verdict + Send + Sync>;

/// Unbound asynchronous policy method
pub type AsyncPolicyMethod<P, S, C = Context> =
    Arc<dyn for<'a> Fn(&'a P, &'a S, &'a C) -> BoxFuture<'a, Verdict> + Send + Sync>;

/// Declared method table of a synchronous policy
pub struct PolicyRules<P, S, C = Context> {
    methods: Vec<(String, PolicyMethod<P, S, C>)>,
}

impl<P, S, C> PolicyRules<P, S, C> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
        }
    }

    /// Declares a method under `name`
    pub fn rule<F, R>(mut self, name: &str, method: F) -> Self
    where
        P: 'static,
        S: 'static,
        C: 'static,
        F: Fn(&P, &S, &C) -> R + Send + Sync + 'static,
        R: Into<Verdict>,
    {
        let method: PolicyMethod<P, S, C> =
            Arc::new(move |policy: &P, subject: &S, ctx: &C| -> Verdict {
                method(policy, subject, ctx).into()
            });
        self.methods.push((name.to_string(), method));
        self
    }

    /// Declared names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.methods.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<P, S, C> Default for PolicyRules<P, S, C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared method table of an asynchronous policy
pub struct AsyncPolicyRules<P, S, C = Context> {
    methods: Vec<(String, AsyncPolicyMethod<P, S, C>)>,
}

impl<P, S, C> AsyncPolicyRules<P, S, C> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
        }
    }

    /// Declares an async method under `name`
    pub fn rule<F>(mut self, name: &str, method: F) -> Self
    where
        F: for<'a> Fn(&'a P, &'a S, &'a C) -> BoxFuture<'a, Verdict> + Send + Sync + 'static,
    {
        let method: AsyncPolicyMethod<P, S, C> = Arc::new(method);
        self.methods.push((name.to_string(), method));
        self
    }

    /// Declares a synchronous method; it completes without yielding
    pub fn sync_rule<F, R>(self, name: &str, method: F) -> Self
    where
        P: 'static,
        S: 'static,
        C: 'static,
        F: Fn(&P, &S, &C) -> R + Send + Sync + 'static,
        R: Into<Verdict>,
    {
        self.rule(name, move |policy, subject, ctx| {
            let verdict: Verdict = method(policy, subject, ctx).into();
            futures::future::ready(verdict).boxed()
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.methods.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<P, S, C> Default for AsyncPolicyRules<P, S, C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A bundle of synchronous checks
pub trait Policy<S, C = Context>: Send + Sync + Sized + 'static {
    /// The checks this policy exposes
    fn rules() -> PolicyRules<Self, S, C>;
}

/// A bundle of asynchronous checks
pub trait AsyncPolicy<S, C = Context>: Send + Sync + Sized + 'static {
    /// The checks this policy exposes
    fn rules() -> AsyncPolicyRules<Self, S, C>;
}

/// Validates declared method names: valid segments, public, unique
pub fn validate_names<'a>(policy: &str, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();

    for name in names {
        validate_segment(name).map_err(|e| {
            GateError::InvalidPolicy(format!("policy '{}' method '{}': {}", policy, name, e))
        })?;

        if name.starts_with(INTERNAL_PREFIX) {
            return Err(GateError::InvalidPolicy(format!(
                "policy '{}' exposes internal method '{}'",
                policy, name
            )));
        }

        if !seen.insert(name) {
            return Err(GateError::InvalidPolicy(format!(
                "policy '{}' declares '{}' more than once",
                policy, name
            )));
        }
    }

    Ok(())
}

/// Flattens a default-constructed policy into bound rules
pub fn to_rules<P, S, C>() -> Result<Vec<(String, Rule<S, C>)>>
where
    P: Policy<S, C> + Default,
    S: 'static,
    C: 'static,
{
    instance_rules(P::default())
}

/// Flattens a policy instance into bound rules sharing that instance
pub fn instance_rules<P, S, C>(policy: P) -> Result<Vec<(String, Rule<S, C>)>>
where
    P: Policy<S, C>,
    S: 'static,
    C: 'static,
{
    let table = P::rules();
    validate_names(std::any::type_name::<P>(), table.names())?;

    let instance = Arc::new(policy);
    Ok(table
        .methods
        .into_iter()
        .map(|(name, method)| {
            let instance = Arc::clone(&instance);
            let bound: Rule<S, C> =
                Arc::new(move |subject: &S, ctx: &C| method(&*instance, subject, ctx));
            (name, bound)
        })
        .collect())
}

/// Flattens a default-constructed async policy into bound async rules
pub fn to_async_rules<P, S, C>() -> Result<Vec<(String, AsyncRule<S, C>)>>
where
    P: AsyncPolicy<S, C> + Default,
    S: Sync + 'static,
    C: Sync + 'static,
{
    async_instance_rules(P::default())
}

/// Flattens an async policy instance into bound async rules
pub fn async_instance_rules<P, S, C>(policy: P) -> Result<Vec<(String, AsyncRule<S, C>)>>
where
    P: AsyncPolicy<S, C>,
    S: Sync + 'static,
    C: Sync + 'static,
{
    let table = P::rules();
    validate_names(std::any::type_name::<P>(), table.names())?;

    let instance = Arc::new(policy);
    Ok(table
        .methods
        .into_iter()
        .map(|(name, method)| {
            let instance = Arc::clone(&instance);
            let bound: AsyncRule<S, C> = async_rule(move |subject, ctx| {
                let instance = Arc::clone(&instance);
                let method = Arc::clone(&method);
                async move { method(&*instance, subject, ctx).await }.boxed()
            });
            (name, bound)
        })
        .collect())
}

/// Lifts a synchronous policy's rules into async rules
pub fn lift_rules<S, C>(rules: Vec<(String, Rule<S, C>)>) -> Vec<(String, AsyncRule<S, C>)>
where
    S: 'static,
    C: 'static,
{
    rules
        .into_iter()
        .map(|(name, rule)| {
            let lifted: AsyncRule<S, C> = async_rule(move |subject, ctx| {
                futures::future::ready(rule(subject, ctx)).boxed()
            });
            (name, lifted)
        })
        .collect()
}
