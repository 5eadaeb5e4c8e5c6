use rivulet_core::args::{ArgError, ArgKind, ArgSpec, Args};
use rivulet_core::{Context, RowSink, RowStream, Scope};

use crate::call::spawn_plugin;
use crate::traits::{OpError, OperatorInfo, Plugin};

#[derive(Debug, Default, Clone, Copy)]
pub struct Sampler;

impl Plugin for Sampler {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "sampler",
            "Emit every n-th row, starting with the first.",
            vec![
                ArgSpec::required("query", ArgKind::Query, "Source query."),
                ArgSpec::required("n", ArgKind::Int, "Sampling stride."),
            ],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("sampler", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let query = args.query(&ctx, &scope, "query").await?;
    let n = match args.opt_u64(&ctx, &scope, "n").await? {
        Some(0) => {
            return Err(ArgError::Invalid {
                name: "n".into(),
                reason: "must be greater than zero".into(),
            }
            .into())
        }
        Some(n) => n,
        None => return Err(ArgError::Missing("n".into()).into()),
    };

    let mut rows = query.eval(&ctx, &scope);
    let mut index: u64 = 0;
    while let Some(row) = rows.next(&ctx).await {
        if index % n == 0 && !sink.send(&ctx, row).await {
            break;
        }
        index += 1;
    }
    Ok(())
}
