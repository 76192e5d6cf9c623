/// Errors that can occur on the bridge transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the bridge peer.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to send the frame request token.
    #[error("failed to send request token: {0}")]
    Request(std::io::Error),

    /// An I/O error occurred on the connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
