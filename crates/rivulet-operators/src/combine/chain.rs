//! `chain` and `combine`: concatenate or merge named sub-queries.

use tokio::task::JoinSet;

use rivulet_core::args::{ArgKind, ArgSpec, Args};
use rivulet_core::{Context, QueryRef, RowSink, RowStream, Scope};

use crate::call::{named_queries, spawn_plugin};
use crate::traits::{OpError, OperatorInfo, Plugin};

#[derive(Debug, Default, Clone, Copy)]
pub struct Chain;

impl Plugin for Chain {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "chain",
            "Run the named queries one after another, or all at once with async=true.",
            vec![ArgSpec::optional(
                "async",
                ArgKind::Bool,
                "Run every query concurrently and interleave their rows.",
            )],
        )
        .variadic(ArgKind::Query)
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("chain", ctx, scope, args, |ctx, scope, args, sink| async move {
            let concurrent = args.opt_bool(&ctx, &scope, "async").await?.unwrap_or(false);
            let queries = named_queries(&ctx, &scope, &args, &["async"]).await?;
            run(&ctx, &scope, queries, concurrent, &sink).await;
            Ok::<(), OpError>(())
        })
    }
}

/// `chain(async=true)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Combine;

impl Plugin for Combine {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "combine",
            "Run every named query concurrently and interleave their rows.",
            vec![],
        )
        .variadic(ArgKind::Query)
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("combine", ctx, scope, args, |ctx, scope, args, sink| async move {
            let queries = named_queries(&ctx, &scope, &args, &[]).await?;
            run(&ctx, &scope, queries, true, &sink).await;
            Ok::<(), OpError>(())
        })
    }
}

async fn run(
    ctx: &Context,
    scope: &Scope,
    queries: Vec<(String, QueryRef)>,
    concurrent: bool,
    sink: &RowSink,
) {
    if !concurrent {
        for (_, query) in queries {
            if !query.eval(ctx, scope).forward(ctx, sink).await {
                return;
            }
        }
        return;
    }

    let mut tasks = JoinSet::new();
    for (name, query) in queries {
        let ctx = ctx.clone();
        let sink = sink.clone();
        let sub = scope.copy();
        tasks.spawn(async move {
            query.eval(&ctx, &sub).forward(&ctx, &sink).await;
            sub.close();
            tracing::trace!(query = %name, "merged query finished");
        });
    }
    while tasks.join_next().await.is_some() {}
}
