//! Fan-in, fan-out and flatMap combinators.

mod batch;
mod chain;
mod foreach;
mod items;
mod sampler;
mod switch;

pub use batch::Batch;
pub use chain::{Chain, Combine};
pub use foreach::{For, Foreach};
pub use items::Items;
pub use sampler::Sampler;
pub use switch::Switch;
