//! Evaluation scopes and the scope-lifetime cache.
//!
//! A root scope owns one environment (config, logger, monitor, ScopeCache).
//! `copy()` derives child scopes that share the environment but carry their
//! own variables and destructors. Closing the root tears the ScopeCache down,
//! which cancels every background task started under its owner token.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::id::ScopeId;
use crate::monitor::Monitor;
use crate::protocol;
use crate::value::{Row, Value};

/// Sink for user-visible operator messages.
pub trait ScopeLogger: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards scope messages to `tracing`.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl ScopeLogger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "rivulet::scope", "{}", message);
    }
}

/// Keeps every message in memory (and still forwards to `tracing`).
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }
}

impl ScopeLogger for MemoryLogger {
    fn log(&self, message: &str) {
        tracing::debug!(target: "rivulet::scope", "{}", message);
        self.lines.lock().push(message.to_string());
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Key → value store bound to one root scope.
///
/// There is no eviction; entries live until [`ScopeCache::teardown`].
pub struct ScopeCache {
    entries: Mutex<HashMap<String, Entry>>,
    owner: CancellationToken,
}

impl ScopeCache {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            owner: CancellationToken::new(),
        }
    }

    /// Typed lookup. A value of another type under `key` reads as absent.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entry = self.entries.lock().get(key).cloned()?;
        entry.downcast::<T>().ok()
    }

    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: Arc<T>) {
        self.entries.lock().insert(key.into(), value);
    }

    /// Atomically fetch `key` or insert `init()`. A value of another type
    /// under `key` is replaced.
    ///
    /// `init` runs under the cache lock and must not touch the cache.
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key).cloned() {
            if let Ok(typed) = existing.downcast::<T>() {
                return typed;
            }
            tracing::debug!(key, "scope cache entry replaced by a different type");
        }
        let value = Arc::new(init());
        entries.insert(key.to_string(), value.clone());
        value
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancelled at teardown.
    pub fn owner_token(&self) -> CancellationToken {
        self.owner.clone()
    }

    /// Context for work that must outlive individual calls but not the scope.
    pub fn owner_context(&self) -> Context {
        Context::from_token(self.owner.child_token())
    }

    pub fn is_torn_down(&self) -> bool {
        self.owner.is_cancelled()
    }

    /// Cancel background work and drop every entry.
    pub fn teardown(&self) {
        self.owner.cancel();
        // Drop outside the lock: entry destructors may be arbitrary.
        let drained = std::mem::take(&mut *self.entries.lock());
        tracing::debug!(entries = drained.len(), "scope cache torn down");
        drop(drained);
    }
}

impl fmt::Debug for ScopeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeCache")
            .field("entries", &self.len())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

struct Env {
    next_scope: AtomicU64,
    cache: OnceCell<ScopeCache>,
    monitor: Monitor,
    config: Arc<EngineConfig>,
    logger: Arc<dyn ScopeLogger>,
}

type Destructor = Box<dyn FnOnce() + Send>;

struct ScopeInner {
    id: ScopeId,
    parent: Option<Scope>,
    env: Arc<Env>,
    vars: RwLock<Row>,
    destructors: Mutex<Vec<Destructor>>,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// A root scope logging through `tracing`.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_logger(config, Arc::new(TracingLogger))
    }

    pub fn with_logger(config: EngineConfig, logger: Arc<dyn ScopeLogger>) -> Self {
        let env = Arc::new(Env {
            next_scope: AtomicU64::new(1),
            cache: OnceCell::new(),
            monitor: Monitor::new(),
            config: Arc::new(config),
            logger,
        });
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::new(0),
                parent: None,
                env,
                vars: RwLock::new(Row::new()),
                destructors: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.env.config
    }

    pub fn monitor(&self) -> &Monitor {
        &self.inner.env.monitor
    }

    /// The shared cache, attached on first use.
    pub fn cache(&self) -> &ScopeCache {
        self.inner.env.cache.get_or_init(ScopeCache::new)
    }

    /// Derive an isolated child scope. Variables set on the child are not
    /// visible to the parent; the parent's variables are visible to the child.
    pub fn copy(&self) -> Scope {
        let env = Arc::clone(&self.inner.env);
        let id = ScopeId::new(env.next_scope.fetch_add(1, Ordering::Relaxed));
        Scope {
            inner: Arc::new(ScopeInner {
                id,
                parent: Some(self.clone()),
                env,
                vars: RwLock::new(Row::new()),
                destructors: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_var(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.vars.write().set(name, value);
    }

    /// Bind every column of `row` as a variable.
    pub fn append_vars(&self, row: &Row) {
        let mut vars = self.inner.vars.write();
        for (k, v) in row.iter() {
            vars.set(k, v.clone());
        }
    }

    /// Look a variable up here, then in each ancestor.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(v) = s.inner.vars.read().get(name) {
                return Some(v.clone());
            }
            scope = s.inner.parent.as_ref();
        }
        None
    }

    /// Member read through the associative protocol.
    pub async fn associative(&self, ctx: &Context, value: &Value, key: &str) -> Option<Value> {
        protocol::get_member(ctx, self, value, key).await
    }

    pub fn members(&self, value: &Value) -> Vec<String> {
        protocol::members(value)
    }

    pub fn log(&self, message: impl AsRef<str>) {
        self.inner.env.logger.log(message.as_ref());
    }

    /// Run `f` when this scope closes. Destructors run in reverse order.
    pub fn add_destructor<F: FnOnce() + Send + 'static>(&self, f: F) {
        if self.is_closed() {
            f();
            return;
        }
        self.inner.destructors.lock().push(Box::new(f));
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Release this scope. Idempotent. Closing the root scope also tears
    /// down the ScopeCache.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let destructors = std::mem::take(&mut *self.inner.destructors.lock());
        for d in destructors.into_iter().rev() {
            d();
        }
        if self.is_root() {
            if let Some(cache) = self.inner.env.cache.get() {
                cache.teardown();
            }
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("root", &self.is_root())
            .field("closed", &self.is_closed())
            .finish()
    }
}
