use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use rivulet_core::args::{ArgKind, ArgSpec, Args};
use rivulet_core::hash::fingerprint;
use rivulet_core::{Associative, Context, ObjectRef, QueryRef, Row, Scope, Value};
use rivulet_state::ExpiringTable;

use crate::call::{call_function, row_key};
use crate::traits::{Function, OpError, OperatorInfo};

/// A lookup table materialized from a sub-query, keyed by one column.
///
/// Nothing runs until the first member read or enumeration. A read that
/// finds the table expired rebuilds it first, under the same lock as the
/// lookup, so concurrent readers trigger a single rebuild. `members()` is
/// synchronous and reports the table as of the last rebuild; enumerating
/// through `refresh()` rebuilds first.
pub struct MemoizeObject {
    query: QueryRef,
    key: String,
    table: Mutex<ExpiringTable<Row>>,
    keys: parking_lot::Mutex<Vec<String>>,
}

impl MemoizeObject {
    pub fn new(query: QueryRef, key: impl Into<String>, period: std::time::Duration) -> Self {
        Self {
            query,
            key: key.into(),
            table: Mutex::new(ExpiringTable::new(period, Instant::now())),
            keys: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Drain the bound query into a fresh table. `None` if cancelled first.
    async fn rebuild(&self, ctx: &Context, scope: &Scope) -> Option<IndexMap<String, Row>> {
        let (sub, _guard) = ctx.scoped();
        let rows = self.query.eval(&sub, scope).drain(&sub).await?;
        let mut table = IndexMap::with_capacity(rows.len());
        for row in rows {
            if let Some(k) = row_key(&sub, scope, &row, &self.key).await {
                table.insert(k, row);
            }
        }
        if sub.is_cancelled() {
            return None;
        }
        Some(table)
    }

    async fn ensure_fresh(&self, ctx: &Context, scope: &Scope, table: &mut ExpiringTable<Row>) {
        if !table.is_expired(Instant::now()) {
            return;
        }
        match self.rebuild(ctx, scope).await {
            Some(fresh) => {
                tracing::debug!(query = %self.query.describe(), rows = fresh.len(), "memoize table rebuilt");
                *self.keys.lock() = fresh.keys().cloned().collect();
                table.replace(fresh, Instant::now());
            }
            None => tracing::debug!("memoize rebuild cancelled; keeping previous table"),
        }
    }
}

impl fmt::Debug for MemoizeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizeObject")
            .field("query", &self.query.describe())
            .field("key", &self.key)
            .finish()
    }
}

#[async_trait]
impl Associative for MemoizeObject {
    fn type_name(&self) -> &'static str {
        "memoize"
    }

    async fn get(&self, ctx: &Context, scope: &Scope, key: &str) -> Option<Value> {
        let mut table = self.table.lock().await;
        self.ensure_fresh(ctx, scope, &mut table).await;
        table.get(key).cloned().map(Value::Row)
    }

    fn members(&self) -> Vec<String> {
        self.keys.lock().clone()
    }

    async fn refresh(&self, ctx: &Context, scope: &Scope) {
        let mut table = self.table.lock().await;
        self.ensure_fresh(ctx, scope, &mut table).await;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Memoize;

#[async_trait]
impl Function for Memoize {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "memoize",
            "Bind a lookup table to a query, rebuilt from it once per period.",
            vec![
                ArgSpec::required("query", ArgKind::Query, "Query materialized into the table."),
                ArgSpec::required("key", ArgKind::Str, "Column the table is keyed by."),
                ArgSpec::optional("period", ArgKind::Duration, "Seconds between rebuilds."),
                ArgSpec::optional("name", ArgKind::Str, "Share the table under this name."),
            ],
        )
    }

    async fn call(&self, ctx: &Context, scope: &Scope, args: &Args) -> Value {
        call_function("memoize", scope, args, bind(ctx, scope, args)).await
    }
}

async fn bind(ctx: &Context, scope: &Scope, args: &Args) -> Result<Value, OpError> {
    let query = args.query(ctx, scope, "query").await?;
    let key = args.string(ctx, scope, "key").await?;
    let period = args
        .opt_duration(ctx, scope, "period")
        .await?
        .unwrap_or_else(|| scope.config().cache_period());
    let name = match args.opt_string(ctx, scope, "name").await? {
        Some(name) => format!("memoize:{name}"),
        None => fingerprint("memoize", &[&key, &query.describe()]),
    };

    let object: Arc<MemoizeObject> = scope
        .cache()
        .get_or_insert_with(&name, || MemoizeObject::new(query, key, period));
    let object: ObjectRef = object;
    Ok(Value::Object(object))
}
