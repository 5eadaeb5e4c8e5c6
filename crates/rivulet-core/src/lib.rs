//! rivulet-core: values, rows, scopes and the operator call contract.
//!
//! Everything an operator touches at runtime lives here: the polymorphic
//! [`Value`] model, cancellation-aware [`Context`]s and row channels, the
//! [`Scope`] with its scope-lifetime [`ScopeCache`], argument handling and
//! the invocation [`Monitor`].

#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod id;
pub mod lazy;
pub mod monitor;
pub mod prelude;
pub mod protocol;
pub mod query;
pub mod scope;
pub mod stream;
pub mod value;

pub use args::{ArgError, ArgKind, ArgSpec, Args};
pub use config::EngineConfig;
pub use context::{Context, ContextGuard};
pub use error::{Error, Result};
pub use monitor::{InvocationInfo, Monitor, MonitorGuard};
pub use protocol::{Associative, Shape};
pub use query::{FnQuery, StaticQuery, StoredQuery};
pub use scope::{MemoryLogger, Scope, ScopeCache, ScopeLogger, TracingLogger};
pub use stream::{channel, RowSink, RowStream};
pub use value::{LambdaRef, LazyRef, ObjectRef, QueryRef, Row, Value};
