//! # CretoAI Gate
//!
//! In-process authorization engine: named rules organized in a tree of
//! colon-delimited scopes, queried through a gate facade.
//!
//! ## Features
//!
//! - **Colon-delimited paths** (`billing:invoices:refund`) resolved without
//!   creating scopes implicitly
//! - **Policies** as declared method tables, flattened into one scope per policy
//! - **Two concurrency variants**: [`Gate`] for preemptive threads,
//!   [`AsyncGate`] for Tokio tasks
//! - **Lock-free lookups** backed by `DashMap`; writers lock only the scope
//!   they edit
//! - **Structured denials** carrying a message and status code
//! - **Check metrics** with allow rate and rule latency
//!
//! ## Example
//!
//! ```rust
//! use cretoai_gate::{Context, Gate, GateError, Response};
//!
//! let gate: Gate<String> = Gate::new();
//! gate.register_scope("posts").unwrap();
//! gate.register_rule("posts:create", |user: &String, _: &Context| user == "editor").unwrap();
//! gate.register_rule("posts:delete", |_: &String, _: &Context| {
//!     Response::deny().with_message("posts are permanent").with_status(409)
//! }).unwrap();
//!
//! let editor = "editor".to_string();
//! let ctx = Context::new();
//!
//! assert!(gate.allowed("posts:create", &editor, &ctx).unwrap());
//! match gate.authorize("posts:delete", &editor, &ctx) {
//!     Err(GateError::AccessDenied(denial)) => assert_eq!(denial.status, 409),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

pub mod authorizable;
pub mod config;
pub mod error;
pub mod gate;
pub mod policy;
pub mod rule;
pub mod scope;
pub mod verdict;

// Re-export commonly used types
pub use authorizable::{AsyncAuthorizable, Authorizable};
pub use config::{ConflictPolicy, GateConfig};
pub use error::{GateError, Result};
pub use gate::{AsyncGate, Gate, GateMetrics, MetricsSnapshot};
pub use policy::{AsyncPolicy, AsyncPolicyRules, Policy, PolicyRules};
pub use rule::{AsyncRule, Rule};
pub use scope::{AsyncScope, Scope, ScopePath, ScopeTree};
pub use verdict::{Context, Denial, Response, Verdict};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
