use sllp_frame::ErrorCode;

/// A request the device refuses. Each variant answers with one code of
/// the wire error band; see [`DeviceError::code`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("no {kind} with id {id}")]
    InvalidId { kind: &'static str, id: u8 },

    #[error("{kind} {id} is read-only")]
    ReadOnly { kind: &'static str, id: u8 },

    /// Raw value length differs from the variable width.
    #[error("variable {id}: value is {actual} bytes, width is {expected}")]
    InvalidValue { id: u8, expected: usize, actual: usize },

    #[error("{what}: {actual} bytes, expected {expected}")]
    InvalidPayloadSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} is full (capacity {capacity})")]
    InsufficientMemory { what: &'static str, capacity: usize },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("operation 0x{0:02X} not supported")]
    OperationNotSupported(u8),

    /// Committed checksum did not match the transferred curve.
    #[error("curve {curve}: checksum mismatch")]
    ChecksumMismatch { curve: u8 },

    /// A group write stopped at `member`; the `written` members before it
    /// keep their new values.
    #[error("group {group}: write stopped at variable {member} after {written} members: {source}")]
    PartialGroupWrite {
        group: u8,
        member: u8,
        written: usize,
        source: Box<DeviceError>,
    },
}

impl DeviceError {
    /// Wire rejection code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DeviceError::InvalidId { .. } => ErrorCode::InvalidId,
            DeviceError::ReadOnly { .. } => ErrorCode::ReadOnly,
            DeviceError::InvalidValue { .. } | DeviceError::ChecksumMismatch { .. } => {
                ErrorCode::InvalidValue
            }
            DeviceError::InvalidPayloadSize { .. } => ErrorCode::InvalidPayloadSize,
            DeviceError::InsufficientMemory { .. } => ErrorCode::InsufficientMemory,
            DeviceError::MalformedMessage(_) => ErrorCode::MalformedMessage,
            DeviceError::OperationNotSupported(_) => ErrorCode::OperationNotSupported,
            DeviceError::PartialGroupWrite { source, .. } => source.code(),
        }
    }
}

/// Errors building or running a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("transport error: {0}")]
    Transport(#[from] sllp_transport::TransportError),

    #[error("frame error: {0}")]
    Frame(#[from] sllp_frame::FrameError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_group_write_reports_member_cause() {
        let err = DeviceError::PartialGroupWrite {
            group: 0,
            member: 1,
            written: 1,
            source: Box::new(DeviceError::ReadOnly {
                kind: "variable",
                id: 1,
            }),
        };
        assert_eq!(err.code(), ErrorCode::ReadOnly);
        assert!(err.to_string().contains("variable 1"));
    }

    #[test]
    fn checksum_mismatch_is_invalid_value() {
        assert_eq!(
            DeviceError::ChecksumMismatch { curve: 0 }.code(),
            ErrorCode::InvalidValue
        );
    }
}
