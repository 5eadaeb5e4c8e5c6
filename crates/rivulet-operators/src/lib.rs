#![forbid(unsafe_code)]
//! rivulet-operators: stateful and combinator operators over row streams.
//!
//! Design intent:
//! - Every plugin runs on its own task and talks to its consumer through a
//!   bounded channel, so slow consumers apply backpressure upstream.
//! - State that must survive between calls (dedup keys, windows, cache
//!   tables, diff baselines) lives in the ScopeCache under a fingerprint of
//!   the operator and its arguments.
//! - Sub-queries run under child contexts of the call and stop when it ends.
//!   The FIFO producer is the exception: it runs under the ScopeCache owner
//!   token.

pub mod call;
pub mod registry;
pub mod traits;

pub mod cache;
pub mod combine;
pub mod dedup;
pub mod diff;
pub mod monitor;
pub mod window;

pub use call::PluginCall;
pub use registry::Registry;
pub use traits::{Function, OpError, OperatorInfo, Plugin};
