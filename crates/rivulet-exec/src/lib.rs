#![forbid(unsafe_code)]
//! rivulet-exec: the engine facade over the operator registry.
//!
//! An [`Engine`] owns one root scope and one root context. Every call made
//! through it shares the scope's ScopeCache and monitor, so stateful
//! operators see each other's state across calls until the engine closes.

pub mod metrics;
pub mod runtime;

pub use runtime::{Engine, ExecError};
