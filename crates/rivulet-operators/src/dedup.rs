//! `dedup`: suppress rows whose key was seen recently.

use parking_lot::Mutex;
use tokio::time::Instant;

use rivulet_core::args::{ArgError, ArgKind, ArgSpec, Args};
use rivulet_core::hash::fingerprint;
use rivulet_core::{Context, RowSink, RowStream, Scope};
use rivulet_state::TtlLru;

use crate::call::{row_key, spawn_plugin};
use crate::traits::{OpError, OperatorInfo, Plugin};

/// Seen-key cache shared by every call with the same key column and query.
/// `timeout` and `size` are fixed by the call that creates it; later calls
/// with other bounds reuse the existing cache as is.
struct SeenKeys {
    lru: Mutex<TtlLru<()>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Dedup;

impl Plugin for Dedup {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "dedup",
            "Emit only the first row per key within the timeout window.",
            vec![
                ArgSpec::required("query", ArgKind::Query, "Source query."),
                ArgSpec::required("key", ArgKind::Str, "Column to deduplicate on."),
                ArgSpec::optional("timeout", ArgKind::Duration, "Seconds a key stays remembered."),
                ArgSpec::optional("size", ArgKind::Int, "Maximum number of remembered keys."),
            ],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("dedup", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let query = args.query(&ctx, &scope, "query").await?;
    let key = args.string(&ctx, &scope, "key").await?;
    let timeout = args
        .opt_duration(&ctx, &scope, "timeout")
        .await?
        .unwrap_or_else(|| scope.config().dedup_timeout());
    let size = args
        .opt_u64(&ctx, &scope, "size")
        .await?
        .unwrap_or(scope.config().dedup_size as u64) as usize;
    if size == 0 {
        return Err(ArgError::Invalid {
            name: "size".into(),
            reason: "must be greater than zero".into(),
        }
        .into());
    }

    let fp = fingerprint("dedup", &[&key, &query.describe()]);
    let lru = TtlLru::new(size, Some(timeout))?;
    let seen = scope
        .cache()
        .get_or_insert_with(&fp, || SeenKeys { lru: Mutex::new(lru) });

    let mut rows = query.eval(&ctx, &scope);
    while let Some(row) = rows.next(&ctx).await {
        let Some(k) = row_key(&ctx, &scope, &row, &key).await else {
            continue;
        };
        // Check and record under one lock so racing calls emit a key once.
        let first = seen.lru.lock().insert_if_absent(&k, (), Instant::now());
        if first && !sink.send(&ctx, row).await {
            break;
        }
    }
    Ok(())
}
