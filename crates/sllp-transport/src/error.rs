use std::time::Duration;

/// Errors that can occur at the byte-stream level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the remote endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to bind a listening endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No complete message arrived before the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The remote end closed the connection.
    #[error("remote disconnected")]
    Disconnected,

    /// The endpoint string could not be parsed.
    #[error("invalid endpoint '{0}' (expected host:port or unix:/path)")]
    InvalidEndpoint(String),
}

impl TransportError {
    /// True when the link itself is gone and a reconnect may help.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Disconnected => true,
            TransportError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_classification() {
        assert!(TransportError::Disconnected.is_disconnect());
        assert!(TransportError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            .is_disconnect());
        assert!(!TransportError::Timeout(Duration::from_millis(100)).is_disconnect());
        assert!(!TransportError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut))
            .is_disconnect());
    }
}
