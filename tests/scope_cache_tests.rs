//! Scope, ScopeCache and logger behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rivulet_core::{EngineConfig, MemoryLogger, Row, Scope, Value};

#[test]
fn cache_is_shared_by_every_scope_copy() {
    let root = Scope::new(EngineConfig::default());
    let child = root.copy();
    let grandchild = child.copy();

    grandchild.cache().set("k", Arc::new(41_i64));
    assert_eq!(root.cache().get::<i64>("k").as_deref(), Some(&41));
    assert_eq!(child.cache().len(), 1);
}

#[test]
fn typed_lookup_misses_on_other_types() {
    let scope = Scope::new(EngineConfig::default());
    scope.cache().set("k", Arc::new(String::from("text")));
    assert!(scope.cache().get::<i64>("k").is_none());
    assert_eq!(scope.cache().get::<String>("k").as_deref().map(String::as_str), Some("text"));
}

#[test]
fn get_or_insert_with_initializes_once() {
    let scope = Scope::new(EngineConfig::default());
    let inits = AtomicUsize::new(0);
    let a = scope.cache().get_or_insert_with("k", || {
        inits.fetch_add(1, Ordering::SeqCst);
        Mutex::new(Vec::<i64>::new())
    });
    let b = scope.cache().get_or_insert_with("k", || {
        inits.fetch_add(1, Ordering::SeqCst);
        Mutex::new(Vec::<i64>::new())
    });
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(inits.load(Ordering::SeqCst), 1);

    // A different type under the same key is replaced.
    let c = scope.cache().get_or_insert_with("k", || 7_u8);
    assert_eq!(*c, 7);
    assert!(scope.cache().get::<Mutex<Vec<i64>>>("k").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_or_insert_with_agrees_on_one_value() {
    let scope = Scope::new(EngineConfig::default());
    let mut handles = Vec::new();
    for i in 0..16_usize {
        let scope = scope.clone();
        handles.push(tokio::spawn(async move {
            scope.cache().get_or_insert_with("shared", move || i)
        }));
    }
    let mut seen = Vec::new();
    for h in handles {
        seen.push(*h.await.unwrap());
    }
    assert!(seen.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn closing_root_tears_down_cache_and_cancels_owner() {
    let scope = Scope::new(EngineConfig::default());
    let owner = scope.cache().owner_context();
    scope.cache().set("k", Arc::new(1_u8));

    let child = scope.copy();
    child.close();
    assert!(!owner.is_cancelled(), "closing a copy leaves the cache alone");
    assert_eq!(scope.cache().len(), 1);

    scope.close();
    assert!(owner.is_cancelled());
    assert!(scope.cache().is_empty());
    assert!(scope.cache().is_torn_down());
}

#[test]
fn variables_resolve_through_parents_but_not_upwards() {
    let root = Scope::new(EngineConfig::default());
    root.set_var("A", 1);
    let child = root.copy();
    child.set_var("B", 2);
    child.append_vars(&Row::new().with("C", 3).with("A", 10));

    assert_eq!(child.resolve("A"), Some(Value::Int(10)));
    assert_eq!(child.resolve("B"), Some(Value::Int(2)));
    assert_eq!(root.resolve("A"), Some(Value::Int(1)));
    assert_eq!(root.resolve("B"), None);
}

#[test]
fn destructors_run_once_in_reverse_order() {
    let scope = Scope::new(EngineConfig::default()).copy();
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        let order = Arc::clone(&order);
        scope.add_destructor(move || order.lock().unwrap().push(i));
    }
    scope.close();
    scope.close();
    assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);

    // Registered after close: runs immediately.
    let late = Arc::clone(&order);
    scope.add_destructor(move || late.lock().unwrap().push(9));
    assert_eq!(order.lock().unwrap().last(), Some(&9));
}

#[test]
fn log_lines_reach_the_scope_logger() {
    let log = MemoryLogger::new();
    let scope = Scope::with_logger(EngineConfig::default(), Arc::new(log.clone()));
    scope.copy().log("hello from a copy");
    assert_eq!(log.lines(), vec!["hello from a copy".to_string()]);
    assert!(log.contains("from a copy"));
}

#[tokio::test]
async fn associative_reads_rows_lists_and_lazies() {
    use rivulet_core::lazy::LazyFn;

    let scope = Scope::new(EngineConfig::default());
    let ctx = rivulet_core::Context::new();

    let row = Value::Row(Row::new().with("Name", "x"));
    assert_eq!(scope.associative(&ctx, &row, "Name").await, Some(Value::from("x")));
    assert_eq!(scope.associative(&ctx, &row, "Missing").await, None);

    let list = Value::List(vec![Value::Int(5), Value::Int(6)]);
    assert_eq!(scope.associative(&ctx, &list, "1").await, Some(Value::Int(6)));
    assert_eq!(scope.members(&list), vec!["0".to_string(), "1".to_string()]);

    let lazy = Value::lazy(LazyFn::new("lazy_row", |_ctx, _scope| async {
        Value::Row(Row::new().with("Pid", 4))
    }));
    assert_eq!(scope.associative(&ctx, &lazy, "Pid").await, Some(Value::Int(4)));
}
