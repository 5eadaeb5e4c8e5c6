use thiserror::Error;

/// Result type local to rivulet-state.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{what} capacity must be greater than zero")]
    ZeroCapacity { what: &'static str },
}
