use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Tool content must never be reachable from other machines.
    #[error("refusing to serve tool content on non-loopback address {0}")]
    NotLoopback(SocketAddr),

    #[error("invalid bind address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
