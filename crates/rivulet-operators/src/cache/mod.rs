//! Keyed caches exposed to queries: `cache()`, `memoize()` and `lru()`.
//!
//! `cache()` stores explicit key/value pairs and flushes the whole table when
//! its period runs out. `memoize()` binds a table to a sub-query and rebuilds
//! it from that query when a read finds it expired. The two share the
//! [`ExpiringTable`] container but keep their own expiry behavior.

mod lru;
mod memoize;

pub use self::lru::{Lru, LruObject};
pub use self::memoize::{Memoize, MemoizeObject};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use rivulet_core::args::{ArgKind, ArgSpec, Args};
use rivulet_core::hash::fingerprint;
use rivulet_core::{Context, Scope, Value};
use rivulet_state::ExpiringTable;

use crate::call::call_function;
use crate::traits::{Function, OpError, OperatorInfo};

/// Explicit key/value table behind one `cache()` name. The period is taken
/// from the call that creates it.
#[derive(Debug)]
pub struct CacheObject {
    table: Mutex<ExpiringTable<Value>>,
}

impl CacheObject {
    fn new(period: std::time::Duration) -> Self {
        Self {
            table: Mutex::new(ExpiringTable::started(period, Instant::now())),
        }
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Cache;

#[async_trait]
impl Function for Cache {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "cache",
            "Return the cached value for key, evaluating func on a miss.",
            vec![
                ArgSpec::required("func", ArgKind::Any, "Expression evaluated on a miss."),
                ArgSpec::required("key", ArgKind::Any, "Cache key."),
                ArgSpec::optional("name", ArgKind::Str, "Cache name; defaults to a fingerprint of func."),
                ArgSpec::optional("period", ArgKind::Duration, "Seconds before the whole table is flushed."),
            ],
        )
    }

    async fn call(&self, ctx: &Context, scope: &Scope, args: &Args) -> Value {
        call_function("cache", scope, args, lookup(ctx, scope, args)).await
    }
}

async fn lookup(ctx: &Context, scope: &Scope, args: &Args) -> Result<Value, OpError> {
    let key = args.required(ctx, scope, "key").await?.to_key_string();
    let period = args
        .opt_duration(ctx, scope, "period")
        .await?
        .unwrap_or_else(|| scope.config().cache_period());
    // `func` stays unforced until a miss.
    let func = args.raw("func").cloned().unwrap_or_default();
    let name = match args.opt_string(ctx, scope, "name").await? {
        Some(name) => format!("cache:{name}"),
        None => fingerprint("cache", &[&func.render()]),
    };

    let object = scope
        .cache()
        .get_or_insert_with(&name, || CacheObject::new(period));

    // Held across evaluation: concurrent misses on one cache evaluate once
    // each, never interleaved with a flush.
    let mut table = object.table.lock().await;
    if table.flush_if_expired(Instant::now()) {
        tracing::debug!(cache = %name, "cache table flushed");
    }
    if let Some(hit) = table.get(&key) {
        return Ok(hit.clone());
    }

    let value = func.force(ctx, scope).await;
    if !value.is_null() {
        table.insert(key, value.clone());
    }
    Ok(value)
}
