/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared payload length does not match the bytes present.
    #[error("declared payload length {declared} but {available} bytes available")]
    LengthMismatch { declared: usize, available: usize },

    /// The payload exceeds the protocol (or configured) maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Fewer bytes than a well-formed message of this kind requires.
    #[error("truncated {what}: need {needed} bytes, got {got}")]
    Truncated {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    /// A message payload has the wrong size for its command.
    #[error("{what}: payload is {actual} bytes, expected {expected}")]
    PayloadSize {
        what: &'static str,
        expected: String,
        actual: usize,
    },

    /// The command octet is not part of the protocol.
    #[error("unknown command code 0x{0:02X}")]
    UnknownCommand(u8),

    /// A reply carried a command code other than the one the request expects.
    #[error("unexpected reply command 0x{actual:02X} (expected 0x{expected:02X})")]
    UnexpectedCommand { expected: u8, actual: u8 },

    /// A value's byte length does not match its registered width.
    #[error("variable {id}: payload is {actual} bytes, width is {expected}")]
    WidthMismatch { id: u8, expected: usize, actual: usize },

    /// A field holds a value outside its domain.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A control-frame reply did not have the expected shape.
    #[error("bad control reply: {0}")]
    BadControlReply(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
