//! `diff`: report keys that appeared or disappeared between evaluations.
//!
//! Each round drains the source completely, then groups rows by the key
//! column. The first round only records a baseline. Later rounds emit every
//! row of a new key as `Diff = "added"` and every stored row of a vanished
//! key as `Diff = "removed"`. A round cut short by cancellation is dropped
//! without touching the baseline.

use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;

use rivulet_core::args::{ArgKind, ArgSpec, Args};
use rivulet_core::hash::fingerprint;
use rivulet_core::{Context, QueryRef, Row, RowSink, RowStream, Scope};

use crate::call::{row_key, spawn_plugin};
use crate::traits::{OpError, OperatorInfo, Plugin};

pub const DIFF_COLUMN: &str = "Diff";

pub type Grouping = IndexMap<String, Vec<Row>>;

/// Baseline kept between one-shot invocations.
#[derive(Default)]
struct DiffCache {
    previous: Mutex<Option<Grouping>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Diff;

impl Plugin for Diff {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "diff",
            "Emit rows whose key was added or removed since the previous evaluation.",
            vec![
                ArgSpec::required("query", ArgKind::Query, "Source query."),
                ArgSpec::required("key", ArgKind::Str, "Column identifying a row."),
                ArgSpec::optional(
                    "period",
                    ArgKind::Duration,
                    "Seconds between rounds; omit for one round per call.",
                ),
            ],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("diff", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let query = args.query(&ctx, &scope, "query").await?;
    let key = args.string(&ctx, &scope, "key").await?;
    let period = args.opt_duration(&ctx, &scope, "period").await?;

    match period {
        Some(period) if !period.is_zero() => periodic(&ctx, &scope, &query, &key, period, &sink).await,
        _ => one_shot(&ctx, &scope, &query, &key, &sink).await,
    }
    Ok(())
}

async fn periodic(
    ctx: &Context,
    scope: &Scope,
    query: &QueryRef,
    key: &str,
    period: Duration,
    sink: &RowSink,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut previous: Option<Grouping> = None;

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let Some(current) = round(ctx, scope, query, key).await else {
            return;
        };
        let changes = previous
            .as_ref()
            .map(|prev| diff_rows(prev, &current))
            .unwrap_or_default();
        tracing::debug!(keys = current.len(), changes = changes.len(), "diff round");
        previous = Some(current);
        if !emit(ctx, sink, changes).await {
            return;
        }
    }
}

async fn one_shot(ctx: &Context, scope: &Scope, query: &QueryRef, key: &str, sink: &RowSink) {
    let fp = fingerprint("diff", &[key, &query.describe()]);
    let state = scope.cache().get_or_insert_with(&fp, DiffCache::default);

    let Some(current) = round(ctx, scope, query, key).await else {
        return;
    };
    let changes = {
        let mut previous = state.previous.lock();
        let changes = previous
            .as_ref()
            .map(|prev| diff_rows(prev, &current))
            .unwrap_or_default();
        *previous = Some(current);
        changes
    };
    emit(ctx, sink, changes).await;
}

/// Drain one evaluation and group it. `None` if cancelled before the end.
async fn round(ctx: &Context, scope: &Scope, query: &QueryRef, key: &str) -> Option<Grouping> {
    let (sub, _guard) = ctx.scoped();
    let rows = query.eval(&sub, scope).drain(&sub).await?;
    let mut grouping = Grouping::new();
    for row in rows {
        if let Some(k) = row_key(&sub, scope, &row, key).await {
            grouping.entry(k).or_default().push(row);
        }
    }
    if sub.is_cancelled() {
        None
    } else {
        Some(grouping)
    }
}

/// Added keys in current order, then removed keys in previous order.
pub fn diff_rows(previous: &Grouping, current: &Grouping) -> Vec<Row> {
    let added = current
        .iter()
        .filter(|(k, _)| !previous.contains_key(*k))
        .flat_map(|(_, rows)| rows.iter().map(|r| annotate("added", r)));
    let removed = previous
        .iter()
        .filter(|(k, _)| !current.contains_key(*k))
        .flat_map(|(_, rows)| rows.iter().map(|r| annotate("removed", r)));
    added.chain(removed).collect()
}

fn annotate(kind: &str, row: &Row) -> Row {
    Row::new().with(DIFF_COLUMN, kind).merge(row)
}

async fn emit(ctx: &Context, sink: &RowSink, rows: Vec<Row>) -> bool {
    for row in rows {
        if !sink.send(ctx, row).await {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(pairs: &[(&str, i64)]) -> Grouping {
        let mut g = Grouping::new();
        for (k, v) in pairs {
            g.entry(k.to_string())
                .or_default()
                .push(Row::new().with("Name", *k).with("Value", *v));
        }
        g
    }

    #[test]
    fn unchanged_round_is_quiet() {
        let g = group(&[("a", 1), ("b", 2)]);
        assert!(diff_rows(&g, &g).is_empty());
    }

    #[test]
    fn added_before_removed() {
        let prev = group(&[("a", 1), ("b", 2)]);
        let cur = group(&[("b", 2), ("c", 3), ("c", 4)]);
        let out = diff_rows(&prev, &cur);
        let kinds: Vec<_> = out
            .iter()
            .map(|r| r.get(DIFF_COLUMN).and_then(|v| v.as_str()).unwrap_or("").to_string())
            .collect();
        assert_eq!(kinds, vec!["added", "added", "removed"]);
        assert_eq!(out[2].get("Name").and_then(|v| v.as_str()), Some("a"));
        assert_eq!(out[0].keys().next(), Some(DIFF_COLUMN));
    }

    #[test]
    fn same_key_new_content_is_not_a_change() {
        let prev = group(&[("a", 1)]);
        let cur = group(&[("a", 99)]);
        assert!(diff_rows(&prev, &cur).is_empty());
    }
}
