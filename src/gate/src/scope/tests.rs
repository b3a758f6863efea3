//! Test suite for the scope registry
//!
//! Tests cover:
//! - Path resolution (single and nested segments)
//! - Rule and scope mutation
//! - Single ownership and cycle rejection
//! - Conflict handling
//! - Introspection
//! - Concurrent writers

use super::*;
use crate::error::GateError;
use crate::rule::{ready_rule, rule, Rule};
use crate::verdict::{Context, Response, Verdict};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn allow() -> Rule<String> {
    rule(|_: &String, _: &Context| true)
}

fn deny() -> Rule<String> {
    rule(|_: &String, _: &Context| false)
}

fn is_admin() -> Rule<String> {
    rule(|user: &String, _: &Context| user == "admin")
}

fn root() -> Arc<Scope<String>> {
    Scope::new("root").unwrap()
}

// ============================================================================
// Resolution Tests
// ============================================================================

#[test]
fn test_single_segment_resolves_in_receiver() {
    let root = root();
    root.add_rule("view", allow()).unwrap();

    assert!(root.has_rule("view"));
    assert!(root.get_rule("view").is_ok());
    assert_eq!(root.rule_names(), vec!["view"]);
}

#[test]
fn test_nested_resolution() {
    let root = root();
    root.add_scope("billing", Scope::new("billing").unwrap()).unwrap();
    root.add_scope("billing:invoices", Scope::new("invoices").unwrap()).unwrap();
    root.add_rule("billing:invoices:create", is_admin()).unwrap();

    let ctx = Context::new();
    assert!(root.call("billing:invoices:create", &"admin".to_string(), &ctx).unwrap().is_allowed());
    assert!(root.call("billing:invoices:create", &"bob".to_string(), &ctx).unwrap().is_denied());

    // Resolution is relative to the receiving scope
    let billing = root.get_scope("billing").unwrap();
    assert!(billing.has_rule("invoices:create"));
    assert!(!billing.has_rule("billing:invoices:create"));
}

#[test]
fn test_missing_rule() {
    let root = root();
    root.add_scope("posts", Scope::new("posts").unwrap()).unwrap();
    root.add_rule("posts:create", allow()).unwrap();

    assert!(!root.has_rule("posts:publish"));
    assert!(matches!(
        root.get_rule("posts:publish"),
        Err(GateError::RuleNotFound(path)) if path == "posts:publish"
    ));
}

#[test]
fn test_missing_intermediate_scope_is_rule_not_found() {
    let root = root();

    assert!(!root.has_rule("ghost:create"));
    assert!(matches!(
        root.get_rule("ghost:create"),
        Err(GateError::RuleNotFound(_))
    ));
}

#[test]
fn test_rule_is_not_a_scope() {
    let root = root();
    root.add_rule("view", allow()).unwrap();

    assert!(!root.has_scope("view"));
    assert!(matches!(root.get_rule("view:inner"), Err(GateError::RuleNotFound(_))));
}

#[test]
fn test_scope_lookup() {
    let root = root();
    root.add_scope("a", Scope::new("a").unwrap()).unwrap();
    root.add_scope("a:b", Scope::new("b").unwrap()).unwrap();

    assert!(root.has_scope("a"));
    assert!(root.has_scope("a:b"));
    assert!(!root.has_scope("a:c"));
    assert!(matches!(
        root.get_scope("a:c:d"),
        Err(GateError::ScopeNotFound(path)) if path == "a:c"
    ));
}

#[test]
fn test_invalid_paths() {
    let root = root();

    assert!(!root.has_rule(""));
    assert!(!root.has_rule("a::b"));
    assert!(!root.has_scope("a:"));
    assert!(matches!(root.get_rule("a::b"), Err(GateError::InvalidPath(_))));
    assert!(matches!(root.add_rule("", allow()), Err(GateError::InvalidPath(_))));
    assert!(matches!(Scope::<String>::new("a:b"), Err(GateError::InvalidPath(_))));
}

#[test]
fn test_call_returns_raw_verdict() {
    let root = root();
    root.add_rule(
        "owner",
        rule(|user: &String, ctx: &Context| {
            if ctx.attribute_str("owner") == Some(user.as_str()) {
                Response::allow()
            } else {
                Response::deny().with_message("not the owner").with_status(404)
            }
        }),
    )
    .unwrap();

    let ctx = Context::new().with_attribute("owner", "alice");
    let verdict = root.call("owner", &"bob".to_string(), &ctx).unwrap();

    match verdict {
        Verdict::Denied { reason: Some(denial) } => {
            assert_eq!(denial.message, "not the owner");
            assert_eq!(denial.status, 404);
        }
        other => panic!("unexpected verdict: {:?}", other),
    }
}

// ============================================================================
// Mutation Tests
// ============================================================================

#[test]
fn test_add_rule_requires_existing_scope() {
    let root = root();

    assert!(matches!(
        root.add_rule("billing:create", allow()),
        Err(GateError::ScopeNotFound(_))
    ));
    assert!(!root.has_scope("billing"));
}

#[test]
fn test_add_scope_requires_existing_ancestor() {
    let root = root();

    assert!(matches!(
        root.add_scope("a:b", Scope::new("b").unwrap()),
        Err(GateError::ScopeNotFound(_))
    ));

    root.add_scope("a", Scope::new("a").unwrap()).unwrap();
    let b = Scope::new("b").unwrap();
    b.add_rule("read", allow()).unwrap();
    root.add_scope("a:b", b).unwrap();

    assert!(root.has_rule("a:b:read"));
}

#[test]
fn test_add_rule_overwrites() {
    let root = root();
    let user = "bob".to_string();
    let ctx = Context::new();

    root.add_rule("edit", allow()).unwrap();
    assert!(root.call("edit", &user, &ctx).unwrap().is_allowed());

    root.add_rule("edit", deny()).unwrap();
    assert!(root.call("edit", &user, &ctx).unwrap().is_denied());
    assert_eq!(root.rule_names().len(), 1);
}

#[test]
fn test_overwritten_rule_keeps_position() {
    let root = root();
    root.add_rule("zeta", allow()).unwrap();
    root.add_rule("alpha", allow()).unwrap();

    root.add_rule("zeta", deny()).unwrap();
    assert_eq!(root.rule_names(), vec!["zeta", "alpha"]);
    assert!(root
        .call("zeta", &"bob".to_string(), &Context::new())
        .unwrap()
        .is_denied());
}

#[test]
fn test_overwritten_scope_keeps_position() {
    let root = root();
    root.add_scope("zeta", Scope::new("zeta").unwrap()).unwrap();
    root.add_scope("alpha", Scope::new("alpha").unwrap()).unwrap();

    root.add_scope("zeta", Scope::new("zeta2").unwrap()).unwrap();
    assert_eq!(root.scope_names(), vec!["zeta", "alpha"]);
    assert_eq!(root.get_scope("zeta").unwrap().name(), "zeta2");
}

#[test]
fn test_remove_rule() {
    let root = root();
    root.add_rule("edit", allow()).unwrap();

    root.remove_rule("edit").unwrap();
    assert!(!root.has_rule("edit"));
    assert!(matches!(root.remove_rule("edit"), Err(GateError::RuleNotFound(_))));
}

#[test]
fn test_remove_scope_detaches() {
    let root = root();
    root.add_scope("posts", Scope::new("posts").unwrap()).unwrap();
    root.add_rule("posts:create", allow()).unwrap();

    let removed = root.remove_scope("posts").unwrap();
    assert!(removed.parent().is_none());
    assert!(!root.has_rule("posts:create"));
    assert!(removed.has_rule("create"));
    assert!(matches!(root.remove_scope("posts"), Err(GateError::ScopeNotFound(_))));
}

#[test]
fn test_overwriting_scope_detaches_previous() {
    let root = root();
    let first = Scope::new("v1").unwrap();
    first.add_rule("read", allow()).unwrap();
    root.add_scope("api", Arc::clone(&first)).unwrap();
    assert!(first.parent().is_some());

    root.add_scope("api", Scope::new("v2").unwrap()).unwrap();
    assert!(first.parent().is_none());
    assert!(!root.has_rule("api:read"));
    assert_eq!(root.get_scope("api").unwrap().name(), "v2");
}

#[test]
fn test_parent_back_reference() {
    let root = root();
    root.add_scope("a", Scope::new("a").unwrap()).unwrap();

    let a = root.get_scope("a").unwrap();
    let parent = a.parent().unwrap();
    assert!(Arc::ptr_eq(&parent, &root));
    assert!(root.parent().is_none());
}

#[test]
fn test_with_children() {
    let root = Scope::<String>::with_children(
        "root",
        vec![Scope::new("posts").unwrap(), Scope::new("users").unwrap()],
    )
    .unwrap();

    assert_eq!(root.scope_names(), vec!["posts", "users"]);
}

// ============================================================================
// Ownership Tests
// ============================================================================

#[test]
fn test_scope_cannot_have_two_parents() {
    let root = root();
    let shared = Scope::new("shared").unwrap();

    root.add_scope("first", Arc::clone(&shared)).unwrap();
    assert!(matches!(
        root.add_scope("second", Arc::clone(&shared)),
        Err(GateError::ScopeAttached(_, _))
    ));
    assert!(!root.has_scope("second"));
}

#[test]
fn test_relinking_same_scope_is_noop() {
    let root = root();
    let child = Scope::new("child").unwrap();

    root.add_scope("child", Arc::clone(&child)).unwrap();
    root.add_scope("child", Arc::clone(&child)).unwrap();
    assert!(root.has_scope("child"));
}

#[test]
fn test_cycles_rejected() {
    let root = root();
    root.add_scope("a", Scope::new("a").unwrap()).unwrap();
    root.add_scope("a:b", Scope::new("b").unwrap()).unwrap();
    let a = root.get_scope("a").unwrap();

    // Root is an ancestor of a:b
    assert!(matches!(
        root.add_scope("a:b:loop", Arc::clone(&root)),
        Err(GateError::ScopeAttached(_, _))
    ));

    // A scope under itself
    let detached = Scope::<String>::new("self").unwrap();
    assert!(detached.add_scope("me", Arc::clone(&detached)).is_err());

    // Detaching makes the scope linkable again
    root.remove_scope("a").unwrap();
    assert!(root.add_scope("again", a).is_ok());
}

#[test]
fn test_rejected_link_leaves_child_detached() {
    let x = Scope::<String>::new("x").unwrap();
    let y = Scope::<String>::new("y").unwrap();

    x.add_scope("y", Arc::clone(&y)).unwrap();
    assert!(matches!(
        y.add_scope("x", Arc::clone(&x)),
        Err(GateError::ScopeAttached(_, _))
    ));
    assert!(x.parent().is_none());
    assert!(!y.has_scope("x"));

    let lone = Scope::<String>::new("lone").unwrap();
    assert!(lone.add_scope("me", Arc::clone(&lone)).is_err());
    assert!(lone.parent().is_none());
    assert!(lone.scope_names().is_empty());
}

#[test]
fn test_concurrent_cross_links_never_form_a_cycle() {
    for _ in 0..500 {
        let x = Scope::<String>::new("x").unwrap();
        let y = Scope::<String>::new("y").unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let first = {
            let (x, y, barrier) = (Arc::clone(&x), Arc::clone(&y), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                y.add_scope("x", x).is_ok()
            })
        };
        let second = {
            let (x, y, barrier) = (Arc::clone(&x), Arc::clone(&y), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                x.add_scope("y", y).is_ok()
            })
        };

        let linked_x = first.join().unwrap();
        let linked_y = second.join().unwrap();
        assert!(!(linked_x && linked_y), "x and y linked under each other");

        // Losers roll back their claim
        if !linked_x {
            assert!(!y.has_scope("x"));
        }
        if !linked_y {
            assert!(!x.has_scope("y"));
        }
        assert!(x.parent().is_none() || y.parent().is_none());
    }
}

#[test]
fn test_retrieved_handles_survive_removal() {
    let root = root();
    root.add_scope("posts", Scope::new("posts").unwrap()).unwrap();
    root.add_rule("posts:create", is_admin()).unwrap();

    let scope = root.get_scope("posts").unwrap();
    let rule = root.get_rule("posts:create").unwrap();
    root.remove_scope("posts").unwrap();

    assert!(rule(&"admin".to_string(), &Context::new()).is_allowed());
    assert!(scope.has_rule("create"));
}

// ============================================================================
// Conflict Tests
// ============================================================================

#[test]
fn test_try_add_rule_rejects_existing() {
    let root = root();
    root.try_add_rule("edit", allow()).unwrap();

    assert!(matches!(
        root.try_add_rule("edit", deny()),
        Err(GateError::Conflict(name)) if name == "edit"
    ));
    assert!(root.call("edit", &"x".to_string(), &Context::new()).unwrap().is_allowed());
}

#[test]
fn test_try_add_rejects_rule_scope_name_clash() {
    let root = root();
    root.add_scope("posts", Scope::new("posts").unwrap()).unwrap();
    root.add_rule("edit", allow()).unwrap();

    assert!(matches!(root.try_add_rule("posts", allow()), Err(GateError::Conflict(_))));
    assert!(matches!(
        root.try_add_scope("edit", Scope::new("edit").unwrap()),
        Err(GateError::Conflict(_))
    ));
    assert!(matches!(
        root.try_add_scope("posts", Scope::new("posts").unwrap()),
        Err(GateError::Conflict(_))
    ));
}

#[test]
fn test_rejected_scope_stays_detached() {
    let root = root();
    root.add_scope("posts", Scope::new("posts").unwrap()).unwrap();

    let candidate = Scope::new("posts").unwrap();
    assert!(root.try_add_scope("posts", Arc::clone(&candidate)).is_err());
    assert!(candidate.parent().is_none());
}

// ============================================================================
// Introspection Tests
// ============================================================================

#[test]
fn test_insertion_order_and_paths() {
    let root = root();
    root.add_rule("zeta", allow()).unwrap();
    root.add_rule("alpha", allow()).unwrap();
    root.add_scope("posts", Scope::new("posts").unwrap()).unwrap();
    root.add_scope("admin", Scope::new("admin").unwrap()).unwrap();
    root.add_rule("posts:create", allow()).unwrap();
    root.add_rule("admin:purge", allow()).unwrap();

    assert_eq!(root.rule_names(), vec!["zeta", "alpha"]);
    assert_eq!(root.scope_names(), vec!["posts", "admin"]);
    assert_eq!(
        root.rule_paths(),
        vec!["zeta", "alpha", "posts:create", "admin:purge"]
    );
    assert_eq!(root.rule_count(), 4);
}

#[test]
fn test_tree_output() {
    let root = root();
    root.add_rule("view", allow()).unwrap();
    root.add_scope("posts", Scope::new("posts").unwrap()).unwrap();
    root.add_rule("posts:create", allow()).unwrap();

    let expected = "Scope: root\n  Rule: view\n  Scope: posts\n    Rule: create\n";
    assert_eq!(root.tree(), expected);
    assert_eq!(format!("{}", root), expected);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_concurrent_writers_disjoint_scopes() {
    let root = root();
    root.add_scope("left", Scope::new("left").unwrap()).unwrap();
    root.add_scope("right", Scope::new("right").unwrap()).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|side| {
            let root = Arc::clone(&root);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100 {
                    root.add_rule(&format!("{}:rule{}", side, i), allow()).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(root.get_scope("left").unwrap().rule_names().len(), 100);
    assert_eq!(root.get_scope("right").unwrap().rule_names().len(), 100);
}

#[test]
fn test_concurrent_writers_same_scope_no_lost_update() {
    let root = root();
    let mut handles = vec![];

    for t in 0..8 {
        let root = Arc::clone(&root);
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                root.add_rule(&format!("t{}_r{}", t, i), allow()).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(root.rule_names().len(), 400);
}

#[test]
fn test_rule_runs_outside_lock() {
    let root = root();
    let calls = Arc::new(AtomicUsize::new(0));

    // A rule that mutates the registry it lives in must not deadlock
    let registry = Arc::downgrade(&root);
    let counter = Arc::clone(&calls);
    root.add_rule(
        "reentrant",
        rule(move |_: &String, _: &Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(scope) = registry.upgrade() {
                scope.add_rule("side_effect", rule(|_: &String, _: &Context| true)).unwrap();
            }
            true
        }),
    )
    .unwrap();

    assert!(root.call("reentrant", &"x".to_string(), &Context::new()).unwrap().is_allowed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(root.has_rule("side_effect"));
}

// ============================================================================
// Cooperative Variant Tests
// ============================================================================

#[tokio::test]
async fn test_async_scope_resolution() {
    let root = AsyncScope::<String>::new("root").unwrap();
    assert!(matches!(
        root.add_scope("a:b", AsyncScope::new("b").unwrap()).await,
        Err(GateError::ScopeNotFound(_))
    ));

    root.add_scope("a", AsyncScope::new("a").unwrap()).await.unwrap();
    root.add_rule("a:admin", ready_rule(|user: &String, _: &Context| user == "admin"))
        .await
        .unwrap();

    let ctx = Context::new();
    assert!(root.call("a:admin", &"admin".to_string(), &ctx).await.unwrap().is_allowed());
    assert!(root.call("a:admin", &"eve".to_string(), &ctx).await.unwrap().is_denied());
    assert!(matches!(
        root.call("a:missing", &"admin".to_string(), &ctx).await,
        Err(GateError::RuleNotFound(_))
    ));
}

#[tokio::test]
async fn test_async_scope_mutation() {
    let root = AsyncScope::<String>::new("root").unwrap();
    root.add_scope("posts", AsyncScope::new("posts").unwrap()).await.unwrap();
    root.try_add_rule("posts:create", ready_rule(|_: &String, _: &Context| true))
        .await
        .unwrap();

    assert!(matches!(
        root.try_add_rule("posts:create", ready_rule(|_: &String, _: &Context| false)).await,
        Err(GateError::Conflict(_))
    ));

    root.remove_rule("posts:create").await.unwrap();
    assert!(!root.has_rule("posts:create"));

    let removed = root.remove_scope("posts").await.unwrap();
    assert!(removed.parent().is_none());
    assert_eq!(root.tree(), "Scope: root\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_concurrent_writers() {
    let root = AsyncScope::<String>::new("root").unwrap();
    let mut tasks = tokio::task::JoinSet::new();

    for t in 0..8 {
        let root = Arc::clone(&root);
        tasks.spawn(async move {
            for i in 0..25 {
                root.add_rule(
                    &format!("t{}_r{}", t, i),
                    ready_rule(|_: &String, _: &Context| true),
                )
                .await
                .unwrap();
            }
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(root.rule_names().len(), 200);
}
