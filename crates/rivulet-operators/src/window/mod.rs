//! Time/count bounded row windows kept in the ScopeCache.
//!
//! A `fifo` window is created by the first call for a given source. Its
//! producer runs under the ScopeCache owner token rather than the caller's
//! context, so the window outlives individual calls and stops only when the
//! root scope closes. `sequence` keeps its window across calls the same way
//! but drives its producers from the call itself.

mod sequence;

pub use sequence::Sequence;

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use rivulet_core::args::{ArgError, ArgKind, ArgSpec, Args};
use rivulet_core::hash::fingerprint;
use rivulet_core::{Context, QueryRef, Row, RowSink, RowStream, Scope};
use rivulet_state::WindowBuffer;

use crate::call::spawn_plugin;
use crate::traits::{OpError, OperatorInfo, Plugin};

pub(crate) async fn window_bounds(
    ctx: &Context,
    scope: &Scope,
    args: &Args,
) -> Result<(usize, Duration), OpError> {
    let max_rows = args
        .opt_u64(ctx, scope, "max_rows")
        .await?
        .unwrap_or(scope.config().fifo_max_rows as u64) as usize;
    if max_rows == 0 {
        return Err(ArgError::Invalid {
            name: "max_rows".into(),
            reason: "must be greater than zero".into(),
        }
        .into());
    }
    let max_age = args
        .opt_duration(ctx, scope, "max_age")
        .await?
        .unwrap_or_else(|| scope.config().fifo_max_age());
    Ok((max_rows, max_age))
}

/// Shared state of one `fifo` source. The first call for a query sets
/// `max_rows` and `max_age`; later calls only read the window.
struct FifoWindow {
    buffer: Mutex<WindowBuffer<Row>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Fifo;

impl Plugin for Fifo {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "fifo",
            "Snapshot a window of the most recent rows of a background query.",
            vec![
                ArgSpec::required("query", ArgKind::Query, "Query drained into the window."),
                ArgSpec::optional("max_rows", ArgKind::Int, "Maximum rows retained."),
                ArgSpec::optional("max_age", ArgKind::Duration, "Maximum row age in seconds."),
                ArgSpec::optional("flush", ArgKind::Bool, "Clear the window after the snapshot."),
            ],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("fifo", ctx, scope, args, run_fifo)
    }
}

async fn run_fifo(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let query = args.query(&ctx, &scope, "query").await?;
    let (max_rows, max_age) = window_bounds(&ctx, &scope, &args).await?;
    let flush = args.opt_bool(&ctx, &scope, "flush").await?.unwrap_or(false);

    let fp = fingerprint("fifo", &[&query.describe()]);
    let buffer = WindowBuffer::new(max_rows, max_age)?;
    let mut created = false;
    let window = scope.cache().get_or_insert_with(&fp, || {
        created = true;
        FifoWindow {
            buffer: Mutex::new(buffer),
        }
    });

    if created {
        tracing::debug!(window = %fp, max_rows, ?max_age, "fifo window created");
        let owner = scope.cache().owner_context();
        let producer_scope = scope.copy();
        let window = window.clone();
        tokio::spawn(async move {
            drain_into(&owner, &producer_scope, query, &window.buffer).await;
            producer_scope.close();
        });
    }

    let rows = {
        let mut buffer = window.buffer.lock();
        let now = Instant::now();
        if flush {
            buffer.take(now)
        } else {
            buffer.snapshot(now)
        }
    };
    for row in rows {
        if !sink.send(&ctx, row).await {
            break;
        }
    }
    Ok(())
}

async fn drain_into(owner: &Context, scope: &Scope, query: QueryRef, buffer: &Mutex<WindowBuffer<Row>>) {
    let mut rows = query.eval(owner, scope);
    while let Some(row) = rows.next(owner).await {
        buffer.lock().push(row, Instant::now());
    }
    tracing::debug!(cancelled = owner.is_cancelled(), "fifo producer finished");
}
