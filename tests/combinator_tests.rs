//! switch, batch, sampler, chain/combine, for/foreach and items.

mod test_data_gen;

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use rivulet_core::lazy::LambdaFn;
use rivulet_core::protocol::set_member;
use rivulet_core::{Args, FnQuery, Row, Value};
use test_data_gen::{engine, engine_with_log, ints, keyed_rows, numbered_rows, probe_query, rows_query, strs};

/// Emits one row `{column: <resolved var>}`, or nothing if `var` is unbound.
fn echo_var(var: &'static str, column: &'static str) -> Value {
    Value::query(FnQuery::new(format!("echo({var})"), move |ctx, scope, sink| async move {
        if let Some(v) = scope.resolve(var) {
            sink.send(&ctx, Row::new().with(column, v)).await;
        }
    }))
}

#[tokio::test]
async fn switch_forwards_first_non_empty_query() {
    let engine = engine();
    let (winner, _) = probe_query("winner", keyed_rows(&[("a", 1), ("a", 2)]));
    let (later, later_evals) = probe_query("later", keyed_rows(&[("b", 3)]));
    let rows = engine
        .collect(
            "switch",
            Args::new()
                .with("first", rows_query(Vec::new()))
                .with("second", rows_query(Vec::new()))
                .with("third", winner)
                .with("fourth", later),
        )
        .await
        .unwrap();
    assert_eq!(ints(&rows, "Value"), vec![1, 2]);
    assert_eq!(later_evals.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn switch_with_all_empty_yields_nothing() {
    let engine = engine();
    let rows = engine
        .collect("switch", Args::new().with("a", rows_query(Vec::new())))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

fn batch_sizes(rows: &[Row]) -> Vec<usize> {
    rows.iter()
        .filter_map(|r| r.get("rows").and_then(Value::as_list).map(<[Value]>::len))
        .collect()
}

#[tokio::test]
async fn batch_groups_rows_by_size() {
    let engine = engine();
    let rows = engine
        .collect("batch", Args::new().with("query", rows_query(numbered_rows(7))).with("batch_size", 10))
        .await
        .unwrap();
    assert_eq!(batch_sizes(&rows), vec![7]);

    let rows = engine
        .collect("batch", Args::new().with("query", rows_query(numbered_rows(7))).with("batch_size", 3))
        .await
        .unwrap();
    assert_eq!(batch_sizes(&rows), vec![3, 3, 1]);
    let first = rows[0].get("rows").and_then(Value::as_list).unwrap();
    assert_eq!(first[2].as_row().and_then(|r| r.get("Idx")), Some(&Value::Int(2)));
}

#[tokio::test]
async fn batch_func_can_flush_early() {
    let engine = engine();
    let pairs = LambdaFn::new("pairs", |_ctx, _scope, args| async move {
        let len = args.first().and_then(Value::as_list).map_or(0, <[Value]>::len);
        Value::Bool(len >= 2)
    });
    let rows = engine
        .collect(
            "batch",
            Args::new()
                .with("query", rows_query(numbered_rows(5)))
                .with("batch_size", 10)
                .with("batch_func", Value::lambda(pairs)),
        )
        .await
        .unwrap();
    assert_eq!(batch_sizes(&rows), vec![2, 2, 1]);
}

#[tokio::test]
async fn batch_of_empty_source_is_empty() {
    let engine = engine();
    let rows = engine
        .collect("batch", Args::new().with("query", rows_query(Vec::new())))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn sampler_keeps_every_nth_row() {
    let engine = engine();
    let rows = engine
        .collect("sampler", Args::new().with("query", rows_query(numbered_rows(10))).with("n", 3))
        .await
        .unwrap();
    assert_eq!(ints(&rows, "Idx"), vec![0, 3, 6, 9]);
}

#[tokio::test]
async fn sampler_rejects_zero_stride() {
    let (engine, log) = engine_with_log();
    let rows = engine
        .collect("sampler", Args::new().with("query", rows_query(numbered_rows(10))).with("n", 0))
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert!(log.contains("sampler:"));
}

#[tokio::test]
async fn chain_runs_queries_in_order() {
    let engine = engine();
    let rows = engine
        .collect(
            "chain",
            Args::new()
                .with("a", rows_query(keyed_rows(&[("a", 1), ("a", 2)])))
                .with("b", rows_query(keyed_rows(&[("b", 3)])))
                .with("c", rows_query(keyed_rows(&[("c", 4)]))),
        )
        .await
        .unwrap();
    assert_eq!(ints(&rows, "Value"), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn chain_accepts_lists() {
    let engine = engine();
    let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
    let rows = engine.collect("chain", Args::new().with("a", list)).await.unwrap();
    assert_eq!(ints(&rows, "_value"), vec![1, 2]);
}

fn multiset(values: Vec<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts
}

#[tokio::test]
async fn combine_and_async_chain_yield_every_row() {
    let engine = engine();
    let args = || {
        Args::new()
            .with("a", rows_query(keyed_rows(&[("a", 1), ("a", 2)])))
            .with("b", rows_query(keyed_rows(&[("b", 2), ("b", 3)])))
    };
    let expected = multiset(vec![1, 2, 2, 3]);

    let rows = engine.collect("combine", args()).await.unwrap();
    assert_eq!(multiset(ints(&rows, "Value")), expected);

    let rows = engine.collect("chain", args().with("async", true)).await.unwrap();
    assert_eq!(multiset(ints(&rows, "Value")), expected);
}

#[tokio::test]
async fn for_binds_each_list_element() {
    let engine = engine();
    let rows = engine
        .collect(
            "for",
            Args::new()
                .with("var", "x")
                .with("foreach", Value::List(vec![Value::from("p"), Value::from("q")]))
                .with("query", echo_var("x", "X")),
        )
        .await
        .unwrap();
    assert_eq!(strs(&rows, "X"), vec!["p", "q"]);
}

#[tokio::test]
async fn for_over_scalar_runs_once() {
    let engine = engine();
    let rows = engine
        .collect(
            "for",
            Args::new()
                .with("var", "x")
                .with("foreach", 5)
                .with("query", echo_var("x", "X")),
        )
        .await
        .unwrap();
    assert_eq!(ints(&rows, "X"), vec![5]);
}

#[tokio::test]
async fn foreach_binds_row_columns() {
    let engine = engine();
    let rows = engine
        .collect(
            "foreach",
            Args::new()
                .with("row", rows_query(numbered_rows(4)))
                .with("query", echo_var("Idx", "Seen")),
        )
        .await
        .unwrap();
    assert_eq!(ints(&rows, "Seen"), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn foreach_with_workers_covers_every_row() {
    let engine = engine();
    let rows = engine
        .collect(
            "foreach",
            Args::new()
                .with("row", rows_query(numbered_rows(20)))
                .with("query", echo_var("Idx", "Seen"))
                .with("workers", 4),
        )
        .await
        .unwrap();
    let mut seen = ints(&rows, "Seen");
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn foreach_column_iterates_nested_elements() {
    let engine = engine();
    let hosts = vec![
        Row::new().with("Ports", vec![Value::Int(22), Value::Int(80)]),
        Row::new().with("Other", 1),
        Row::new().with("Ports", vec![Value::Int(443)]),
    ];
    let rows = engine
        .collect(
            "foreach",
            Args::new()
                .with("row", rows_query(hosts))
                .with("column", "Ports")
                .with("query", echo_var("_value", "Port")),
        )
        .await
        .unwrap();
    assert_eq!(ints(&rows, "Port"), vec![22, 80, 443]);
}

#[tokio::test]
async fn foreach_rejects_zero_workers() {
    let (engine, log) = engine_with_log();
    let rows = engine
        .collect(
            "foreach",
            Args::new()
                .with("row", rows_query(numbered_rows(2)))
                .with("query", echo_var("Idx", "Seen"))
                .with("workers", 0),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert!(log.contains("foreach: invalid argument 'workers'"));
}

#[tokio::test]
async fn items_enumerates_lists_rows_and_queries() {
    let engine = engine();

    let list = Value::List(vec![Value::from("x"), Value::from("y")]);
    let rows = engine.collect("items", Args::new().with("item", list)).await.unwrap();
    assert_eq!(ints(&rows, "_key"), vec![0, 1]);
    assert_eq!(strs(&rows, "_value"), vec!["x", "y"]);

    let row = Row::new().with("A", 1).with("B", 2);
    let rows = engine.collect("items", Args::new().with("item", row)).await.unwrap();
    assert_eq!(strs(&rows, "_key"), vec!["A", "B"]);
    assert_eq!(ints(&rows, "_value"), vec![1, 2]);

    let rows = engine
        .collect("items", Args::new().with("item", rows_query(numbered_rows(2))))
        .await
        .unwrap();
    assert_eq!(ints(&rows, "_key"), vec![0, 1]);
    assert!(matches!(rows[1].get("_value"), Some(Value::Row(_))));

    let rows = engine.collect("items", Args::new().with("item", 42)).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn items_enumerates_object_members() {
    let engine = engine();
    let lru = engine.function("lru", Args::new().with("size", 4)).await.unwrap();
    assert!(set_member(&lru, "k1", Value::Int(10)));
    assert!(set_member(&lru, "k2", Value::Int(20)));

    let rows = engine.collect("items", Args::new().with("item", lru)).await.unwrap();
    let mut pairs: Vec<(String, i64)> = strs(&rows, "_key").into_iter().zip(ints(&rows, "_value")).collect();
    pairs.sort();
    assert_eq!(pairs, vec![("k1".to_string(), 10), ("k2".to_string(), 20)]);
}
