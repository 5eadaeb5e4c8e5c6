use rivulet_core::args::{to_query, ArgError, ArgKind, Args};
use rivulet_core::{Context, RowSink, RowStream, Scope};

use crate::call::spawn_plugin;
use crate::traits::{OpError, OperatorInfo, Plugin};

/// Forward the first named query that yields a row. Later queries are never
/// evaluated.
#[derive(Debug, Default, Clone, Copy)]
pub struct Switch;

impl Plugin for Switch {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "switch",
            "Emit the rows of the first named query that yields any.",
            vec![],
        )
        .variadic(ArgKind::Query)
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("switch", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    for (name, raw) in args.rest(&[]) {
        // Forced one at a time so nothing past the winner is touched.
        let value = raw.force(&ctx, &scope).await;
        let got = value.kind();
        let query = to_query(value).ok_or(ArgError::WrongType {
            name,
            expected: "query",
            got,
        })?;

        let mut rows = query.eval(&ctx, &scope);
        let Some(first) = rows.next(&ctx).await else {
            if ctx.is_cancelled() {
                return Ok(());
            }
            continue;
        };
        if sink.send(&ctx, first).await {
            rows.forward(&ctx, &sink).await;
        }
        return Ok(());
    }
    Ok(())
}
