use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Startup failures. Anything after the listener is up is handled in the loop.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("socket: {0}")]
    Socket(#[source] io::Error),

    #[error("bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("listen {addr}: {source}")]
    Listen { addr: SocketAddr, source: io::Error },
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
