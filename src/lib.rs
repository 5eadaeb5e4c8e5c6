#![forbid(unsafe_code)]
//! Rivulet: composable streaming operators over lazy, cancellable row
//! streams.
//!
//! This crate re-exports the workspace members:
//! - [`rivulet_core`]: values, scopes, ScopeCache, row streams, arguments,
//!   invocation monitor.
//! - [`rivulet_state`]: TTL LRU, expiring tables, window buffers.
//! - [`rivulet_operators`]: every operator plus the registry.
//! - [`rivulet_exec`]: the [`Engine`] facade.

pub use rivulet_core;
pub use rivulet_exec;
pub use rivulet_operators;
pub use rivulet_state;

pub use rivulet_core::prelude::*;
pub use rivulet_exec::{Engine, ExecError};
pub use rivulet_operators::{Function, OpError, OperatorInfo, Plugin, PluginCall, Registry};
