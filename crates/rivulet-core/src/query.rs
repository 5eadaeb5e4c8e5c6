//! The stored-query contract and two ready-made implementations.
//!
//! Every `eval` is a fresh, independent evaluation. Nothing here memoizes;
//! operators that want reuse must keep their own state.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::Context;
use crate::hash::hash_serde;
use crate::scope::Scope;
use crate::stream::{channel, RowSink, RowStream};
use crate::value::Row;

pub trait StoredQuery: Send + Sync + fmt::Debug {
    /// Start a new evaluation. Rows arrive in producer order; the stream
    /// closes when the producer is done or `ctx` is cancelled.
    fn eval(&self, ctx: &Context, scope: &Scope) -> RowStream;

    /// Stable text used for fingerprints and monitoring.
    fn describe(&self) -> String;
}

/// A fixed list of rows.
#[derive(Debug, Clone)]
pub struct StaticQuery {
    rows: Arc<Vec<Row>>,
}

impl StaticQuery {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Arc::new(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl StoredQuery for StaticQuery {
    fn eval(&self, ctx: &Context, scope: &Scope) -> RowStream {
        let (sink, stream) = channel(scope.config().channel_capacity);
        let rows = Arc::clone(&self.rows);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            for row in rows.iter() {
                if !sink.send(&ctx, row.clone()).await {
                    break;
                }
            }
        });
        stream
    }

    fn describe(&self) -> String {
        match hash_serde(&*self.rows) {
            Ok(h) => format!("static({} rows, {})", self.rows.len(), h.short()),
            Err(_) => format!("static({} rows)", self.rows.len()),
        }
    }
}

type QueryFn = dyn Fn(Context, Scope, RowSink) -> BoxFuture<'static, ()> + Send + Sync;

/// A query backed by an async producer closure. The closure runs on its own
/// task for every evaluation and should stop once `send` returns `false`.
#[derive(Clone)]
pub struct FnQuery {
    name: String,
    f: Arc<QueryFn>,
}

impl FnQuery {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, Scope, RowSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |ctx, scope, sink| Box::pin(f(ctx, scope, sink))),
        }
    }
}

impl fmt::Debug for FnQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnQuery").field("name", &self.name).finish()
    }
}

impl StoredQuery for FnQuery {
    fn eval(&self, ctx: &Context, scope: &Scope) -> RowStream {
        let (sink, stream) = channel(scope.config().channel_capacity);
        let fut = (self.f)(ctx.clone(), scope.clone(), sink);
        tokio::spawn(fut);
        stream
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
