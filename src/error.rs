//! Error types for reducer-rs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The engine's main domain has shut down; nothing more will be applied.
    #[error("engine is closed")]
    Closed,

    #[error("start failed: {0}")]
    Start(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
