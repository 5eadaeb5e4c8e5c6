//! fifo() and sequence() windows.

mod test_data_gen;

use std::sync::atomic::Ordering;
use std::time::Duration;

use rivulet_core::{Args, FnQuery, Row, Value};
use test_data_gen::{engine, engine_with_log, ints, ticking_query};

#[tokio::test(start_paused = true)]
async fn fifo_snapshots_background_rows() {
    let engine = engine();
    let (query, _) = ticking_query("ticks", 10, Duration::from_secs(1));
    let args = Args::new().with("query", query);

    let first = engine.collect("fifo", args.clone()).await.unwrap();
    assert!(first.is_empty(), "window starts empty");

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let rows = engine.collect("fifo", args.clone()).await.unwrap();
    assert_eq!(ints(&rows, "Idx"), vec![0, 1, 2]);

    // Snapshots do not consume the window.
    let again = engine.collect("fifo", args).await.unwrap();
    assert_eq!(ints(&again, "Idx"), vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn fifo_bounded_by_row_count() {
    let engine = engine();
    let (query, _) = ticking_query("ticks", 10, Duration::from_secs(1));
    let args = Args::new().with("query", query).with("max_rows", 2);

    engine.collect("fifo", args.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let rows = engine.collect("fifo", args).await.unwrap();
    assert_eq!(ints(&rows, "Idx"), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn fifo_bounded_by_age() {
    let engine = engine();
    let (query, _) = ticking_query("ticks", 10, Duration::from_secs(1));
    let args = Args::new().with("query", query).with("max_age", 2);

    engine.collect("fifo", args.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let rows = engine.collect("fifo", args).await.unwrap();
    assert_eq!(ints(&rows, "Idx"), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn fifo_flush_empties_window() {
    let engine = engine();
    let (query, _) = ticking_query("ticks", 3, Duration::from_secs(1));
    let args = Args::new().with("query", query);

    engine.collect("fifo", args.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let flushed = engine
        .collect("fifo", args.clone().with("flush", true))
        .await
        .unwrap();
    assert_eq!(ints(&flushed, "Idx"), vec![0, 1, 2]);
    assert!(engine.collect("fifo", args).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fifo_producer_stops_when_engine_closes() {
    let engine = engine();
    let (query, sent) = ticking_query("ticks", 100, Duration::from_secs(1));
    engine.collect("fifo", Args::new().with("query", query)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(sent.load(Ordering::SeqCst), 2);

    engine.close();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(sent.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fifo_rejects_zero_rows() {
    let (engine, log) = engine_with_log();
    let (query, _) = ticking_query("ticks", 1, Duration::from_millis(1));
    let rows = engine
        .collect("fifo", Args::new().with("query", query).with("max_rows", 0))
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert!(log.contains("fifo: invalid argument 'max_rows'"));
}

fn event(kind: &str, n: i64) -> Row {
    Row::new().with("Kind", kind).with("N", n)
}

fn producer_a() -> Value {
    Value::query(FnQuery::new("alpha", |ctx, _scope, sink| async move {
        sink.send(&ctx, event("a", 0)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        sink.send(&ctx, event("a", 1)).await;
    }))
}

fn producer_b() -> Value {
    Value::query(FnQuery::new("beta", |ctx, _scope, sink| async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        sink.send(&ctx, event("b", 0)).await;
    }))
}

/// Fires with the window size once both kinds are present.
fn both_seen() -> Value {
    Value::query(FnQuery::new("both_seen", |ctx, scope, sink| async move {
        let window = scope.resolve("SEQUENCE").unwrap_or_default();
        let items = window.as_list().map(<[Value]>::to_vec).unwrap_or_default();
        let kinds: Vec<&str> = items
            .iter()
            .filter_map(|v| v.as_row()?.get("Kind")?.as_str())
            .collect();
        if kinds.contains(&"a") && kinds.contains(&"b") {
            sink.send(&ctx, Row::new().with("Count", items.len())).await;
        }
    }))
}

#[tokio::test(start_paused = true)]
async fn sequence_fires_and_resets() {
    let engine = engine();
    let args = Args::new()
        .with("query", both_seen())
        .with("alpha", producer_a())
        .with("beta", producer_b());

    // a0, b0 fires and clears; a1 stays behind.
    let rows = engine.collect("sequence", args.clone()).await.unwrap();
    assert_eq!(ints(&rows, "Count"), vec![2]);

    // The window persists between calls: a1, a0, b0.
    let rows = engine.collect("sequence", args).await.unwrap();
    assert_eq!(ints(&rows, "Count"), vec![3]);
}

#[tokio::test]
async fn sequence_without_producers_is_an_error() {
    let (engine, log) = engine_with_log();
    let rows = engine
        .collect("sequence", Args::new().with("query", both_seen()))
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert!(log.contains("sequence: invalid argument 'query'"));
}
