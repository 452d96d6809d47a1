use bytes::{BufMut, Bytes, BytesMut};
use sllp_transport::MessageEnd;

use crate::command::CommandCode;
use crate::error::{FrameError, Result};

/// Frame header: command (1) + length (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Largest payload one length octet can declare.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// How a transport finds the end of a variable frame.
pub const VARIABLE_MESSAGE_END: MessageEnd = MessageEnd::LengthPrefixed {
    header_len: HEADER_SIZE,
    length_offset: 1,
};

/// One variable frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command octet. Kept raw so unknown codes can still be answered.
    pub command: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: CommandCode, payload: impl Into<Bytes>) -> Self {
        Self {
            command: command.code(),
            payload: payload.into(),
        }
    }

    /// Frame with an empty payload.
    pub fn empty(command: CommandCode) -> Self {
        Self::new(command, Bytes::new())
    }

    /// The command octet as a known code.
    pub fn command_code(&self) -> Result<CommandCode> {
        CommandCode::try_from(self.command)
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.command, &self.payload, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────┐
/// │ Command (1B) │ Length (1B)  │ Payload          │
/// │              │              │ (Length bytes)   │
/// └──────────────┴──────────────┴──────────────────┘
/// ```
pub fn encode_frame(command: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(command);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Decode exactly one frame occupying all of `src`.
///
/// Rejects a declared length that disagrees with the bytes present, in
/// either direction.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            what: "frame header",
            needed: HEADER_SIZE,
            got: src.len(),
        });
    }
    let declared = usize::from(src[1]);
    let available = src.len() - HEADER_SIZE;
    if declared != available {
        return Err(FrameError::LengthMismatch {
            declared,
            available,
        });
    }
    Ok(Frame {
        command: src[0],
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..]),
    })
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 255.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_variable_layout() {
        let mut buf = BytesMut::new();
        encode_frame(CommandCode::WriteVariable.code(), &[0x05, 0x07], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x20, 0x02, 0x05, 0x07]);
    }

    #[test]
    fn decode_exact_frame() {
        let frame = decode_frame(&[0x11, 0x01, 0x07]).unwrap();
        assert_eq!(frame.command, 0x11);
        assert_eq!(frame.payload.as_ref(), &[0x07]);
        assert_eq!(frame.command_code().unwrap(), CommandCode::VariableReading);
    }

    #[test]
    fn decode_rejects_short_payload() {
        let err = decode_frame(&[0x11, 0x08, 0x01, 0x02]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                declared: 8,
                available: 2
            }
        ));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let err = decode_frame(&[0xE0, 0x00, 0xFF]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                declared: 0,
                available: 1
            }
        ));
    }

    #[test]
    fn decode_incomplete_header() {
        assert!(matches!(
            decode_frame(&[0x10]),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn encode_refuses_oversized_payload() {
        let mut buf = BytesMut::new();
        let err = encode_frame(0x22, &[0u8; 256], &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 256, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_wire_size() {
        let frame = Frame::new(CommandCode::ReadVariable, vec![0x05]);
        assert_eq!(frame.wire_size(), HEADER_SIZE + 1);
        assert_eq!(frame.to_bytes().unwrap().as_ref(), &[0x10, 0x01, 0x05]);
    }
}
