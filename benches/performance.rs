use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use rivulet::rivulet_operators::diff::{diff_rows, Grouping};
use rivulet::rivulet_state::{TtlLru, WindowBuffer};
use rivulet::Row;
use tokio::time::Instant;

fn make_rows(rows: usize) -> Vec<Row> {
    (0..rows)
        .map(|i| {
            Row::new()
                .with("Key", format!("key-{}", i % 256))
                .with("Idx", i as i64)
        })
        .collect()
}

fn group(rows: &[Row], offset: usize) -> Grouping {
    let mut g = Grouping::new();
    for (i, row) in rows.iter().enumerate() {
        g.entry(format!("key-{}", i + offset)).or_default().push(row.clone());
    }
    g
}

fn bench_window_buffer(c: &mut Criterion) {
    let rows = make_rows(4096);
    c.bench_function("window_push_snapshot", |b| {
        b.iter(|| {
            let now = Instant::now();
            let mut w = WindowBuffer::new(1000, Duration::from_secs(60)).unwrap();
            for row in &rows {
                w.push(row.clone(), now);
            }
            w.snapshot(now).len()
        })
    });
}

fn bench_dedup_lru(c: &mut Criterion) {
    let keys: Vec<String> = (0..4096).map(|i| format!("key-{}", i % 1500)).collect();
    c.bench_function("ttl_lru_insert_if_absent", |b| {
        b.iter(|| {
            let now = Instant::now();
            let mut lru = TtlLru::new(1000, Some(Duration::from_secs(60))).unwrap();
            keys.iter()
                .filter(|k| lru.insert_if_absent(k, (), now))
                .count()
        })
    });
}

fn bench_diff(c: &mut Criterion) {
    let rows = make_rows(2048);
    let previous = group(&rows, 0);
    let current = group(&rows, 128);
    c.bench_function("diff_rows", |b| b.iter(|| diff_rows(&previous, &current).len()));
}

criterion_group!(state, bench_window_buffer, bench_dedup_lru, bench_diff);
criterion_main!(state);
