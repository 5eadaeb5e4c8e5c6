//! `invocations()`: list operator calls currently in flight.

use rivulet_core::args::Args;
use rivulet_core::{Context, Row, RowSink, RowStream, Scope};

use crate::call::spawn_plugin;
use crate::traits::{OpError, OperatorInfo, Plugin};

#[derive(Debug, Default, Clone, Copy)]
pub struct Invocations;

impl Plugin for Invocations {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "invocations",
            "List running operator invocations with their age and arguments.",
            vec![],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("invocations", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, _args: Args, sink: RowSink) -> Result<(), OpError> {
    for info in scope.monitor().snapshot() {
        let row = Row::new()
            .with("id", info.id.get())
            .with("name", info.name)
            .with("started_ms", info.started_ms)
            .with("elapsed_ms", info.elapsed.as_millis() as u64)
            .with("args", info.args);
        if !sink.send(&ctx, row).await {
            break;
        }
    }
    Ok(())
}
