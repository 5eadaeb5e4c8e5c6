use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use rivulet_core::args::{ArgError, ArgKind, ArgSpec, Args};
use rivulet_core::{Associative, Context, Scope, Value};
use rivulet_state::TtlLru;

use crate::call::call_function;
use crate::traits::{Function, OpError, OperatorInfo};

/// Bounded key/value memo readable through member access.
pub struct LruObject {
    entries: Mutex<TtlLru<Value>>,
}

impl LruObject {
    pub fn new(size: usize, ttl: Option<Duration>) -> rivulet_state::Result<Self> {
        Ok(Self {
            entries: Mutex::new(TtlLru::new(size, ttl)?),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LruObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LruObject").field(&*self.entries.lock()).finish()
    }
}

#[async_trait]
impl Associative for LruObject {
    fn type_name(&self) -> &'static str {
        "lru"
    }

    async fn get(&self, _ctx: &Context, _scope: &Scope, key: &str) -> Option<Value> {
        self.entries.lock().get(key, Instant::now()).cloned()
    }

    fn members(&self) -> Vec<String> {
        self.entries.lock().keys(Instant::now())
    }

    fn set(&self, key: &str, value: Value) -> bool {
        self.entries.lock().insert(key, value, Instant::now());
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Lru;

#[async_trait]
impl Function for Lru {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "lru",
            "Create an empty LRU object bounded by size and optional per-entry ttl.",
            vec![
                ArgSpec::optional("size", ArgKind::Int, "Maximum number of entries."),
                ArgSpec::optional("ttl", ArgKind::Duration, "Seconds an entry stays readable."),
            ],
        )
    }

    async fn call(&self, ctx: &Context, scope: &Scope, args: &Args) -> Value {
        call_function("lru", scope, args, build(ctx, scope, args)).await
    }
}

async fn build(ctx: &Context, scope: &Scope, args: &Args) -> Result<Value, OpError> {
    let size = args
        .opt_u64(ctx, scope, "size")
        .await?
        .unwrap_or(scope.config().lru_size as u64) as usize;
    if size == 0 {
        return Err(ArgError::Invalid {
            name: "size".into(),
            reason: "must be greater than zero".into(),
        }
        .into());
    }
    let ttl = args.opt_duration(ctx, scope, "ttl").await?;
    Ok(Value::object(LruObject::new(size, ttl)?))
}
