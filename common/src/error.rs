use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No such directory: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error on {target}: {source}")]
    Io {
        target: String,
        source: std::io::Error,
    },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Failure reported by the remote side, message kept verbatim.
    #[error("{0}")]
    Remote(String),
}

impl Error {
    pub fn io(target: impl std::fmt::Display, source: std::io::Error) -> Self {
        Error::Io {
            target: target.to_string(),
            source,
        }
    }

    pub fn decode(msg: impl std::fmt::Display) -> Self {
        Error::Decode(msg.to_string())
    }

    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Error::Protocol(msg.to_string())
    }
}
