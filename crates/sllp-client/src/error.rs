use sllp_frame::{CommandCode, ErrorCode, FrameError};
use sllp_transport::TransportError;

/// Errors surfaced by client transactions.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Every attempt failed at the transport level.
    #[error("no reply after {attempts} attempts: {last_error}")]
    NoReply { attempts: u32, last_error: String },

    /// A reply arrived but did not have the expected shape. `reply` is the
    /// raw reply rendered printable.
    #[error("bad reply \"{reply}\": {reason}")]
    BadReply { reply: String, reason: String },

    /// The device refused the request. Never retried.
    #[error("{request} rejected by device: {code}")]
    Rejected {
        code: ErrorCode,
        request: CommandCode,
    },

    /// The link dropped and the single reconnect attempt failed.
    #[error("reconnect to {remote} failed: {source}")]
    ReconnectFailed {
        remote: String,
        #[source]
        source: TransportError,
    },

    /// A value was refused locally, before any I/O.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// The device error code, for rejections.
    pub fn rejection(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
