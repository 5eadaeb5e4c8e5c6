//! Row generators and instrumented queries shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rivulet_core::{EngineConfig, FnQuery, MemoryLogger, Row, StaticQuery, Value};
use rivulet_exec::Engine;

/// Rows `{Idx: 0}`, `{Idx: 1}`, ...
pub fn numbered_rows(n: usize) -> Vec<Row> {
    (0..n).map(|i| Row::new().with("Idx", i as i64)).collect()
}

/// Rows `{Key, Value}` from pairs.
pub fn keyed_rows(pairs: &[(&str, i64)]) -> Vec<Row> {
    pairs
        .iter()
        .map(|(k, v)| Row::new().with("Key", *k).with("Value", *v))
        .collect()
}

pub fn rows_query(rows: Vec<Row>) -> Value {
    Value::query(StaticQuery::new(rows))
}

/// A query over fixed rows that counts how often it is evaluated.
pub fn probe_query(name: &str, rows: Vec<Row>) -> (Value, Arc<AtomicUsize>) {
    let evals = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evals);
    let rows = Arc::new(rows);
    let query = FnQuery::new(name, move |ctx, _scope, sink| {
        counter.fetch_add(1, Ordering::SeqCst);
        let rows = Arc::clone(&rows);
        async move {
            for row in rows.iter() {
                if !sink.send(&ctx, row.clone()).await {
                    break;
                }
            }
        }
    });
    (Value::query(query), evals)
}

/// Emits `{Idx: i}` every `every`, `n` times. The counter tracks rows
/// actually delivered.
pub fn ticking_query(name: &str, n: usize, every: Duration) -> (Value, Arc<AtomicUsize>) {
    let sent = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sent);
    let query = FnQuery::new(name, move |ctx, _scope, sink| {
        let counter = Arc::clone(&counter);
        async move {
            for i in 0..n {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return,
                    _ = tokio::time::sleep(every) => {}
                }
                if !sink.send(&ctx, Row::new().with("Idx", i as i64)).await {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    (Value::query(query), sent)
}

/// A query whose rows can be swapped between evaluations.
pub fn mutable_query(name: &str, rows: Vec<Row>) -> (Value, SharedRows) {
    let shared = SharedRows::new(rows);
    let source = shared.clone();
    let query = FnQuery::new(name, move |ctx, _scope, sink| {
        let rows = source.get();
        async move {
            for row in rows {
                if !sink.send(&ctx, row).await {
                    break;
                }
            }
        }
    });
    (Value::query(query), shared)
}

#[derive(Clone, Default)]
pub struct SharedRows(Arc<Mutex<Vec<Row>>>);

impl SharedRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self(Arc::new(Mutex::new(rows)))
    }

    pub fn get(&self) -> Vec<Row> {
        self.0.lock().unwrap().clone()
    }

    pub fn set(&self, rows: Vec<Row>) {
        *self.0.lock().unwrap() = rows;
    }
}

pub fn engine() -> Engine {
    Engine::new(EngineConfig::default()).expect("default config is valid")
}

pub fn engine_with_log() -> (Engine, MemoryLogger) {
    let log = MemoryLogger::new();
    let engine = Engine::with_logger(EngineConfig::default(), Arc::new(log.clone()))
        .expect("default config is valid");
    (engine, log)
}

/// Integer column of every row, skipping rows without it.
pub fn ints(rows: &[Row], column: &str) -> Vec<i64> {
    rows.iter()
        .filter_map(|r| r.get(column).and_then(Value::as_int))
        .collect()
}

pub fn strs(rows: &[Row], column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.get(column).and_then(|v| v.as_str()).map(str::to_string))
        .collect()
}
