#![forbid(unsafe_code)]
//! rivulet-state: the containers stateful operators keep in the ScopeCache.
//!
//! None of these types lock internally. Operators wrap them in a mutex and
//! hold it across check-then-act sequences. Every time-dependent method takes
//! the current `tokio::time::Instant` explicitly, so paused-clock tests and
//! plain unit tests drive expiry the same way.

pub mod error;
pub mod table;
pub mod ttl_lru;
pub mod window;

pub use error::{Error, Result};
pub use table::ExpiringTable;
pub use ttl_lru::TtlLru;
pub use window::WindowBuffer;
