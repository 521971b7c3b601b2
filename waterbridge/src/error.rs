//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] waterbridge_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] waterbridge_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] waterbridge_types::Error),
}
