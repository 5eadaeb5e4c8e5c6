//! Convenient re-exports for downstream crates.

pub use crate::args::{to_query, ArgError, ArgKind, ArgResult, ArgSpec, Args};
pub use crate::config::EngineConfig;
pub use crate::context::{Context, ContextGuard};
pub use crate::error::{Error, Result};
pub use crate::hash::fingerprint;
pub use crate::id::{InvocationId, ScopeId};
pub use crate::lazy::{Lambda, LambdaFn, Lazy, LazyFn};
pub use crate::monitor::{InvocationInfo, Monitor, MonitorGuard};
pub use crate::protocol::{shape, Associative, Shape};
pub use crate::query::{FnQuery, StaticQuery, StoredQuery};
pub use crate::scope::{MemoryLogger, Scope, ScopeCache, ScopeLogger};
pub use crate::stream::{channel, RowSink, RowStream};
pub use crate::value::{LambdaRef, LazyRef, ObjectRef, QueryRef, Row, Value};
