//! Hierarchical rule registry
//!
//! A scope owns a map of local rule names to rules and a map of local
//! child names to child scopes. Colon-delimited paths address rules and
//! scopes below the receiving scope:
//!
//! - `create` is the rule `create` in the receiving scope
//! - `billing:invoices:create` walks `billing`, then `invoices`, then
//!   resolves the rule `create` there
//!
//! Resolution never creates scopes. Writers lock only the scope they edit.
//!
//! # Examples
//!
//! ```
//! use cretoai_gate::rule::rule;
//! use cretoai_gate::scope::{Scope, ScopeTree};
//! use cretoai_gate::Context;
//!
//! let root = Scope::<u32>::new("root").unwrap();
//! assert!(root.add_scope("a:b", Scope::new("b").unwrap()).is_err());
//!
//! root.add_scope("a", Scope::new("a").unwrap()).unwrap();
//! root.add_scope("a:b", Scope::new("b").unwrap()).unwrap();
//! root.add_rule("a:b:even", rule(|n: &u32, _: &Context| n % 2 == 0)).unwrap();
//!
//! assert!(root.has_rule("a:b:even"));
//! assert!(root.has_scope("a:b"));
//! ```

mod blocking;
mod cooperative;
mod path;
mod tree;

#[cfg(test)]
mod tests;

pub use blocking::Scope;
pub use cooperative::AsyncScope;
pub use path::{validate_segment, ScopePath, SEPARATOR};
pub use tree::{Resolved, ScopeCore, ScopeTree};
