use thiserror::Error;

use crate::protocol::value::RemoteError;

#[derive(Error, Debug)]
pub enum RompError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer disconnected")]
    Disconnected,

    #[error("no such object: {0}")]
    UnknownObject(u16),

    #[error("object limit exceeded")]
    ObjectLimit,

    #[error("no such method: {0}")]
    NoSuchMethod(String),

    #[error("{0}")]
    Remote(RemoteError),
}

impl RompError {
    /// True when the error means the peer went away, as opposed to a local
    /// failure. Sessions are torn down on disconnects, not recovered.
    pub fn is_disconnect(&self) -> bool {
        match self {
            RompError::Disconnected => true,
            RompError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RompError>;
