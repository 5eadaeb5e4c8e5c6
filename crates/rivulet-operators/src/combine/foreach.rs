//! `for` and `foreach`: evaluate a query once per element of a sequence.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use rivulet_core::args::{ArgError, ArgKind, ArgSpec, Args};
use rivulet_core::protocol::{shape, Shape};
use rivulet_core::{Context, QueryRef, RowSink, RowStream, Scope, Value};

use crate::call::spawn_plugin;
use crate::traits::{OpError, OperatorInfo, Plugin};

/// Variable a non-row element is bound to by `foreach`.
pub const VALUE_VAR: &str = "_value";

/// The elements of a value treated as a sequence.
///
/// Queries are read lazily, one row at a time. Lists yield their elements.
/// Any other value is a single element.
enum Elements {
    Rows(RowStream),
    Values(std::vec::IntoIter<Value>),
}

impl Elements {
    fn of(ctx: &Context, scope: &Scope, value: Value) -> Self {
        match shape(&value) {
            Shape::Stream(q) => Elements::Rows(q.eval(ctx, scope)),
            Shape::Ordered(items) => Elements::Values(items.into_iter()),
            _ => Elements::Values(vec![value].into_iter()),
        }
    }

    async fn next(&mut self, ctx: &Context, scope: &Scope) -> Option<Value> {
        match self {
            Elements::Rows(rows) => rows.next(ctx).await.map(Value::Row),
            Elements::Values(items) => match items.next()? {
                Value::Lazy(l) => Some(Value::Lazy(l).force(ctx, scope).await),
                other => Some(other),
            },
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct For;

impl Plugin for For {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "for",
            "Bind var to each element of foreach and run query for it.",
            vec![
                ArgSpec::required("var", ArgKind::Str, "Variable bound to the element."),
                ArgSpec::required("foreach", ArgKind::Any, "Sequence to iterate."),
                ArgSpec::required("query", ArgKind::Query, "Query run per element."),
            ],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("for", ctx, scope, args, run_for)
    }
}

async fn run_for(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let var = args.string(&ctx, &scope, "var").await?;
    let foreach = args.required(&ctx, &scope, "foreach").await?;
    let query = args.query(&ctx, &scope, "query").await?;

    let mut elements = Elements::of(&ctx, &scope, foreach);
    while let Some(element) = elements.next(&ctx, &scope).await {
        let sub = scope.copy();
        sub.set_var(var.as_str(), element);
        let forwarded = query.eval(&ctx, &sub).forward(&ctx, &sink).await;
        sub.close();
        if !forwarded {
            break;
        }
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Foreach;

impl Plugin for Foreach {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "foreach",
            "Run query once per row, with the row's columns bound as variables.",
            vec![
                ArgSpec::required("row", ArgKind::Any, "Rows (or values) to iterate."),
                ArgSpec::required("query", ArgKind::Query, "Query run per element."),
                ArgSpec::optional("column", ArgKind::Str, "Iterate this member of each element instead."),
                ArgSpec::optional("workers", ArgKind::Int, "Elements evaluated concurrently."),
            ],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("foreach", ctx, scope, args, run_foreach)
    }
}

async fn run_foreach(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let row = args.required(&ctx, &scope, "row").await?;
    let query = args.query(&ctx, &scope, "query").await?;
    let column = args.opt_string(&ctx, &scope, "column").await?;
    let workers = args.opt_u64(&ctx, &scope, "workers").await?.unwrap_or(1) as usize;
    if workers == 0 {
        return Err(ArgError::Invalid {
            name: "workers".into(),
            reason: "must be greater than zero".into(),
        }
        .into());
    }

    let mut outer = Elements::of(&ctx, &scope, row);
    let mut runner = Runner::new(ctx.clone(), scope.clone(), query, sink, workers);
    while let Some(element) = outer.next(&ctx, &scope).await {
        let Some(name) = column.as_deref() else {
            if !runner.run(element).await {
                return Ok(());
            }
            continue;
        };
        let Some(member) = scope.associative(&ctx, &element, name).await else {
            continue;
        };
        let mut inner = Elements::of(&ctx, &scope, member);
        while let Some(element) = inner.next(&ctx, &scope).await {
            if !runner.run(element).await {
                return Ok(());
            }
        }
    }
    runner.finish().await;
    Ok(())
}

/// Evaluates the per-element query, inline or on up to `workers` tasks.
struct Runner {
    ctx: Context,
    scope: Scope,
    query: QueryRef,
    sink: RowSink,
    workers: usize,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl Runner {
    fn new(ctx: Context, scope: Scope, query: QueryRef, sink: RowSink, workers: usize) -> Self {
        Self {
            ctx,
            scope,
            query,
            sink,
            workers,
            permits: Arc::new(Semaphore::new(workers)),
            tasks: JoinSet::new(),
        }
    }

    fn bind(&self, element: Value) -> Scope {
        let sub = self.scope.copy();
        match element {
            Value::Row(row) => sub.append_vars(&row),
            other => sub.set_var(VALUE_VAR, other),
        }
        sub
    }

    /// Returns `false` once output should stop.
    async fn run(&mut self, element: Value) -> bool {
        let sub = self.bind(element);
        if self.workers == 1 {
            let ok = self.query.eval(&self.ctx, &sub).forward(&self.ctx, &self.sink).await;
            sub.close();
            return ok;
        }

        let permit = tokio::select! {
            biased;
            _ = self.ctx.cancelled() => return false,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => return false,
            },
        };
        let (ctx, query, sink) = (self.ctx.clone(), self.query.clone(), self.sink.clone());
        self.tasks.spawn(async move {
            let _permit = permit;
            query.eval(&ctx, &sub).forward(&ctx, &sink).await;
            sub.close();
        });
        !self.sink.is_closed()
    }

    async fn finish(mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}
