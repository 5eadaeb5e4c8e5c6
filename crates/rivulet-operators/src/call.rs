//! Shared plumbing for running operator bodies.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rivulet_core::args::{to_query, ArgError, Args};
use rivulet_core::{channel, Context, QueryRef, Row, RowSink, RowStream, Scope, StoredQuery, Value};

use crate::traits::{OpError, Plugin};

/// Run a plugin body on its own task and hand back its output stream.
///
/// The invocation is registered with the scope's monitor for as long as the
/// task lives. The body runs under a child context that is cancelled when the
/// body returns or the consumer drops the stream, so every sub-query it
/// started winds down with it. Errors are logged as `"<name>: <error>"`.
pub fn spawn_plugin<F, Fut>(
    name: &'static str,
    ctx: &Context,
    scope: &Scope,
    args: Args,
    body: F,
) -> RowStream
where
    F: FnOnce(Context, Scope, Args, RowSink) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), OpError>> + Send + 'static,
{
    let (sink, stream) = channel(scope.config().channel_capacity);
    let guard = scope.monitor().register(name, &args);
    let scope = scope.clone();
    let (ctx, cancel_on_exit) = ctx.scoped();
    let watcher = sink.clone();

    tokio::spawn(async move {
        let _guard = guard;
        let _cancel_on_exit = cancel_on_exit;
        tokio::select! {
            res = body(ctx, scope.clone(), args, sink) => {
                if let Err(err) = res {
                    tracing::debug!(operator = name, error = %err, "operator failed");
                    scope.log(format!("{name}: {err}"));
                }
            }
            _ = watcher.closed() => {
                tracing::trace!(operator = name, "consumer went away");
            }
        }
    });
    stream
}

/// Run a function body with monitor registration and error logging.
pub async fn call_function<Fut>(name: &'static str, scope: &Scope, args: &Args, body: Fut) -> Value
where
    Fut: Future<Output = Result<Value, OpError>>,
{
    let _guard = scope.monitor().register(name, args);
    match body.await {
        Ok(v) => v,
        Err(err) => {
            scope.log(format!("{name}: {err}"));
            Value::Null
        }
    }
}

/// String key of `column` in `row`, forcing lazies. Missing and null
/// columns yield `None`.
pub async fn row_key(ctx: &Context, scope: &Scope, row: &Row, column: &str) -> Option<String> {
    let value = scope
        .associative(ctx, &Value::Row(row.clone()), column)
        .await?
        .force(ctx, scope)
        .await;
    if value.is_null() {
        None
    } else {
        Some(value.to_key_string())
    }
}

/// A configured plugin call usable wherever a stored query is expected.
#[derive(Clone)]
pub struct PluginCall {
    plugin: Arc<dyn Plugin>,
    args: Args,
}

impl PluginCall {
    pub fn new(plugin: Arc<dyn Plugin>, args: Args) -> Self {
        Self { plugin, args }
    }
}

impl fmt::Debug for PluginCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCall")
            .field("plugin", &self.plugin.info().name)
            .field("args", &self.args.render())
            .finish()
    }
}

impl StoredQuery for PluginCall {
    fn eval(&self, ctx: &Context, scope: &Scope) -> RowStream {
        self.plugin.call(ctx, scope, self.args.clone())
    }

    fn describe(&self) -> String {
        format!("{}({})", self.plugin.info().name, self.args.render())
    }
}

/// Every argument outside `reserved`, forced and coerced to a query, in
/// declaration order.
pub async fn named_queries(
    ctx: &Context,
    scope: &Scope,
    args: &Args,
    reserved: &[&str],
) -> Result<Vec<(String, QueryRef)>, OpError> {
    let mut out = Vec::new();
    for (name, raw) in args.rest(reserved) {
        let value = raw.force(ctx, scope).await;
        let got = value.kind();
        match to_query(value) {
            Some(q) => out.push((name, q)),
            None => {
                return Err(ArgError::WrongType {
                    name,
                    expected: "query",
                    got,
                }
                .into())
            }
        }
    }
    Ok(out)
}
