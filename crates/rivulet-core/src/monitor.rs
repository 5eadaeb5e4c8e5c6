//! Registry of in-flight operator invocations.
//!
//! Operators register at entry and hold the returned [`MonitorGuard`] for the
//! rest of their run; dropping it (normal exit, error, cancellation or
//! unwinding) removes the record. Arguments are rendered at registration, so
//! the registry never holds live lazies or queries.
//!
//! Purely diagnostic: nothing in here feeds back into operator output.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::args::Args;
use crate::id::InvocationId;

type Renderer = Arc<dyn Fn() -> String + Send + Sync>;

struct Record {
    name: String,
    started: Instant,
    started_ms: u64,
    render: Renderer,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    live: BTreeMap<InvocationId, Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvocationInfo {
    pub id: InvocationId,
    pub name: String,
    pub started_ms: u64,
    pub elapsed: Duration,
    pub args: String,
}

#[derive(Clone, Default)]
pub struct Monitor {
    inner: Arc<Mutex<Registry>>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, args: &Args) -> MonitorGuard {
        let rendered = args.render();
        self.register_with(name, move || rendered.clone())
    }

    pub fn register_with<F>(&self, name: &str, render: F) -> MonitorGuard
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        let mut reg = self.inner.lock();
        reg.next_id += 1;
        let id = InvocationId::new(reg.next_id);
        reg.live.insert(
            id,
            Record {
                name: name.to_string(),
                started: Instant::now(),
                started_ms: now_millis(),
                render: Arc::new(render),
            },
        );
        tracing::trace!(%id, name, "invocation registered");
        MonitorGuard {
            monitor: self.clone(),
            id,
        }
    }

    /// Live invocations, oldest first.
    pub fn snapshot(&self) -> Vec<InvocationInfo> {
        // Render outside the lock; renderers are user code.
        let records: Vec<(InvocationId, String, Instant, u64, Renderer)> = {
            let reg = self.inner.lock();
            reg.live
                .iter()
                .map(|(id, r)| (*id, r.name.clone(), r.started, r.started_ms, r.render.clone()))
                .collect()
        };
        records
            .into_iter()
            .map(|(id, name, started, started_ms, render)| InvocationInfo {
                id,
                name,
                started_ms,
                elapsed: started.elapsed(),
                args: render(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn unregister(&self, id: InvocationId) {
        self.inner.lock().live.remove(&id);
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor").field("live", &self.len()).finish()
    }
}

/// Removes its invocation record on drop.
#[must_use = "the invocation is unregistered as soon as the guard is dropped"]
pub struct MonitorGuard {
    monitor: Monitor,
    id: InvocationId,
}

impl MonitorGuard {
    pub fn id(&self) -> InvocationId {
        self.id
    }
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        self.monitor.unregister(self.id);
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
