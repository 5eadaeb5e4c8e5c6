//! `sequence`: several producers feeding one window, with a consumer query
//! re-run after every insertion.

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

use rivulet_core::args::{ArgError, ArgKind, ArgSpec, Args};
use rivulet_core::hash::fingerprint;
use rivulet_core::{channel, Context, Row, RowSink, RowStream, Scope, Value};
use rivulet_state::WindowBuffer;

use super::window_bounds;
use crate::call::{named_queries, spawn_plugin};
use crate::traits::{OpError, OperatorInfo, Plugin};

const RESERVED: &[&str] = &["query", "max_rows", "max_age"];

/// Variable the consumer query sees the window contents under.
pub const SEQUENCE_VAR: &str = "SEQUENCE";

struct SequenceWindow {
    // Async lock: held while the consumer runs, so push, evaluate and reset
    // form one step.
    buffer: Mutex<WindowBuffer<Row>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sequence;

impl Plugin for Sequence {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "sequence",
            "Correlate rows from several producers in one window; reset once the consumer fires.",
            vec![
                ArgSpec::required("query", ArgKind::Query, "Consumer query, sees SEQUENCE."),
                ArgSpec::optional("max_rows", ArgKind::Int, "Maximum rows retained."),
                ArgSpec::optional("max_age", ArgKind::Duration, "Maximum row age in seconds."),
            ],
        )
        .variadic(ArgKind::Query)
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("sequence", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let consumer = args.query(&ctx, &scope, "query").await?;
    let (max_rows, max_age) = window_bounds(&ctx, &scope, &args).await?;

    let producers = named_queries(&ctx, &scope, &args, RESERVED).await?;
    if producers.is_empty() {
        return Err(ArgError::Invalid {
            name: "query".into(),
            reason: "at least one producer query is required".into(),
        }
        .into());
    }

    let mut parts = vec![consumer.describe()];
    for (name, q) in &producers {
        parts.push(name.clone());
        parts.push(q.describe());
    }
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
    let fp = fingerprint("sequence", &parts);

    let buffer = WindowBuffer::new(max_rows, max_age)?;
    let window = scope.cache().get_or_insert_with(&fp, || SequenceWindow {
        buffer: Mutex::new(buffer),
    });

    // Producers feed one correlator; the channel closes when all are done.
    let (tx, mut pushed) = channel(scope.config().channel_capacity);
    let mut tasks = JoinSet::new();
    for (name, query) in producers {
        let ctx = ctx.clone();
        let tx = tx.clone();
        let sub = scope.copy();
        tasks.spawn(async move {
            query.eval(&ctx, &sub).forward(&ctx, &tx).await;
            sub.close();
            tracing::trace!(producer = %name, "sequence producer drained");
        });
    }
    drop(tx);

    while let Some(row) = pushed.next(&ctx).await {
        let mut buffer = window.buffer.lock().await;
        let now = Instant::now();
        buffer.push(row, now);
        let contents: Vec<Value> = buffer.snapshot(now).into_iter().map(Value::Row).collect();

        let sub = scope.copy();
        sub.set_var(SEQUENCE_VAR, Value::List(contents));
        let fired = consumer.eval(&ctx, &sub).drain(&ctx).await;
        sub.close();
        let Some(fired) = fired else {
            break;
        };
        if !fired.is_empty() {
            buffer.clear();
        }
        drop(buffer);

        for row in fired {
            if !sink.send(&ctx, row).await {
                return Ok(());
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}
