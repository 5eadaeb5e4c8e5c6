use rivulet_core::args::{ArgError, ArgKind, ArgSpec, Args};
use rivulet_core::{Context, Row, RowSink, RowStream, Scope, Value};

use crate::call::spawn_plugin;
use crate::traits::{OpError, OperatorInfo, Plugin};

/// Column the buffered rows are emitted under.
pub const ROWS_COLUMN: &str = "rows";

#[derive(Debug, Default, Clone, Copy)]
pub struct Batch;

impl Plugin for Batch {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "batch",
            "Group rows into arrays by size or by a flush predicate.",
            vec![
                ArgSpec::required("query", ArgKind::Query, "Source query."),
                ArgSpec::optional("batch_size", ArgKind::Int, "Rows per batch."),
                ArgSpec::optional(
                    "batch_func",
                    ArgKind::Lambda,
                    "Called with the buffer after each row; true flushes.",
                ),
            ],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("batch", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let query = args.query(&ctx, &scope, "query").await?;
    let batch_size = args
        .opt_u64(&ctx, &scope, "batch_size")
        .await?
        .unwrap_or(scope.config().batch_size as u64) as usize;
    if batch_size == 0 {
        return Err(ArgError::Invalid {
            name: "batch_size".into(),
            reason: "must be greater than zero".into(),
        }
        .into());
    }
    // Resolved once, not per row.
    let batch_func = args.opt_lambda(&ctx, &scope, "batch_func").await?;

    let mut buffer: Vec<Value> = Vec::with_capacity(batch_size);
    let mut rows = query.eval(&ctx, &scope);
    while let Some(row) = rows.next(&ctx).await {
        buffer.push(Value::Row(row));

        let mut flush = false;
        if let Some(func) = &batch_func {
            let verdict = func
                .call(&ctx, &scope, &[Value::List(buffer.clone())])
                .await
                .force(&ctx, &scope)
                .await;
            flush = verdict.is_truthy();
        }
        if flush || buffer.len() >= batch_size {
            let batch = std::mem::replace(&mut buffer, Vec::with_capacity(batch_size));
            if !sink.send(&ctx, Row::new().with(ROWS_COLUMN, batch)).await {
                return Ok(());
            }
        }
    }

    if !buffer.is_empty() && !ctx.is_cancelled() {
        sink.send(&ctx, Row::new().with(ROWS_COLUMN, buffer)).await;
    }
    Ok(())
}
