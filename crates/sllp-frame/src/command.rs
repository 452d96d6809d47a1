//! Command codes and the error/acknowledgement band.
//!
//! Queries and their replies occupy adjacent codes (query even, reply odd).
//! Codes `0xE0..=0xE7` acknowledge a request or report why it was rejected.

use std::fmt;

use crate::error::FrameError;

/// Reserved group: every registered variable.
pub const GROUP_ALL: u8 = 0;
/// Reserved group: every readable variable.
pub const GROUP_READ: u8 = 1;
/// Reserved group: every writable variable.
pub const GROUP_WRITE: u8 = 2;
/// Number of reserved group ids; user groups start here.
pub const RESERVED_GROUP_COUNT: u8 = 3;

/// Command octet of a variable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    QueryStatus = 0x00,
    Status = 0x01,
    QueryVariables = 0x02,
    VariableList = 0x03,
    QueryGroups = 0x04,
    GroupList = 0x05,
    QueryGroup = 0x06,
    Group = 0x07,
    QueryCurves = 0x08,
    CurveList = 0x09,

    ReadVariable = 0x10,
    VariableReading = 0x11,
    ReadGroup = 0x12,
    GroupReading = 0x13,

    WriteVariable = 0x20,
    WriteGroup = 0x22,
    BinaryOpVariable = 0x24,
    BinaryOpGroup = 0x26,

    CreateGroup = 0x30,
    RemoveAllGroups = 0x32,

    CurveTransmit = 0x40,
    CurveBlock = 0x41,
    CurveRecalcChecksum = 0x42,

    Ok = 0xE0,
    ErrMalformedMessage = 0xE1,
    ErrOpNotSupported = 0xE2,
    ErrInvalidId = 0xE3,
    ErrInvalidValue = 0xE4,
    ErrInvalidPayloadSize = 0xE5,
    ErrReadOnly = 0xE6,
    ErrInsufficientMemory = 0xE7,
}

impl CommandCode {
    /// Wire octet.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True for the acknowledgement / error band.
    pub fn is_ack_band(self) -> bool {
        self.code() >= CommandCode::Ok.code()
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            CommandCode::QueryStatus => "QUERY_STATUS",
            CommandCode::Status => "STATUS",
            CommandCode::QueryVariables => "QUERY_VARS_LIST",
            CommandCode::VariableList => "VARS_LIST",
            CommandCode::QueryGroups => "QUERY_GROUPS_LIST",
            CommandCode::GroupList => "GROUPS_LIST",
            CommandCode::QueryGroup => "QUERY_GROUP",
            CommandCode::Group => "GROUP",
            CommandCode::QueryCurves => "QUERY_CURVES_LIST",
            CommandCode::CurveList => "CURVES_LIST",
            CommandCode::ReadVariable => "READ_VAR",
            CommandCode::VariableReading => "VAR_READING",
            CommandCode::ReadGroup => "READ_GROUP",
            CommandCode::GroupReading => "GROUP_READING",
            CommandCode::WriteVariable => "WRITE_VAR",
            CommandCode::WriteGroup => "WRITE_GROUP",
            CommandCode::BinaryOpVariable => "BIN_OP_VAR",
            CommandCode::BinaryOpGroup => "BIN_OP_GROUP",
            CommandCode::CreateGroup => "CREATE_GROUP",
            CommandCode::RemoveAllGroups => "REMOVE_ALL_GROUPS",
            CommandCode::CurveTransmit => "CURVE_TRANSMIT",
            CommandCode::CurveBlock => "CURVE_BLOCK",
            CommandCode::CurveRecalcChecksum => "CURVE_RECALC_CSUM",
            CommandCode::Ok => "OK",
            CommandCode::ErrMalformedMessage => "ERR_MALFORMED_MESSAGE",
            CommandCode::ErrOpNotSupported => "ERR_OP_NOT_SUPPORTED",
            CommandCode::ErrInvalidId => "ERR_INVALID_ID",
            CommandCode::ErrInvalidValue => "ERR_INVALID_VALUE",
            CommandCode::ErrInvalidPayloadSize => "ERR_INVALID_PAYLOAD_SIZE",
            CommandCode::ErrReadOnly => "ERR_READ_ONLY",
            CommandCode::ErrInsufficientMemory => "ERR_INSUFFICIENT_MEMORY",
        }
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let code = match value {
            0x00 => CommandCode::QueryStatus,
            0x01 => CommandCode::Status,
            0x02 => CommandCode::QueryVariables,
            0x03 => CommandCode::VariableList,
            0x04 => CommandCode::QueryGroups,
            0x05 => CommandCode::GroupList,
            0x06 => CommandCode::QueryGroup,
            0x07 => CommandCode::Group,
            0x08 => CommandCode::QueryCurves,
            0x09 => CommandCode::CurveList,
            0x10 => CommandCode::ReadVariable,
            0x11 => CommandCode::VariableReading,
            0x12 => CommandCode::ReadGroup,
            0x13 => CommandCode::GroupReading,
            0x20 => CommandCode::WriteVariable,
            0x22 => CommandCode::WriteGroup,
            0x24 => CommandCode::BinaryOpVariable,
            0x26 => CommandCode::BinaryOpGroup,
            0x30 => CommandCode::CreateGroup,
            0x32 => CommandCode::RemoveAllGroups,
            0x40 => CommandCode::CurveTransmit,
            0x41 => CommandCode::CurveBlock,
            0x42 => CommandCode::CurveRecalcChecksum,
            0xE0 => CommandCode::Ok,
            0xE1 => CommandCode::ErrMalformedMessage,
            0xE2 => CommandCode::ErrOpNotSupported,
            0xE3 => CommandCode::ErrInvalidId,
            0xE4 => CommandCode::ErrInvalidValue,
            0xE5 => CommandCode::ErrInvalidPayloadSize,
            0xE6 => CommandCode::ErrReadOnly,
            0xE7 => CommandCode::ErrInsufficientMemory,
            other => return Err(FrameError::UnknownCommand(other)),
        };
        Ok(code)
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

/// Reasons a remote rejects a request. Each maps to one octet of the
/// error band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MalformedMessage,
    OperationNotSupported,
    InvalidId,
    InvalidValue,
    InvalidPayloadSize,
    ReadOnly,
    InsufficientMemory,
}

impl ErrorCode {
    /// Command code that carries this rejection on the wire.
    pub fn command(self) -> CommandCode {
        match self {
            ErrorCode::MalformedMessage => CommandCode::ErrMalformedMessage,
            ErrorCode::OperationNotSupported => CommandCode::ErrOpNotSupported,
            ErrorCode::InvalidId => CommandCode::ErrInvalidId,
            ErrorCode::InvalidValue => CommandCode::ErrInvalidValue,
            ErrorCode::InvalidPayloadSize => CommandCode::ErrInvalidPayloadSize,
            ErrorCode::ReadOnly => CommandCode::ErrReadOnly,
            ErrorCode::InsufficientMemory => CommandCode::ErrInsufficientMemory,
        }
    }

    /// Rejection carried by `command`, if it is one.
    pub fn from_command(command: CommandCode) -> Option<Self> {
        let code = match command {
            CommandCode::ErrMalformedMessage => ErrorCode::MalformedMessage,
            CommandCode::ErrOpNotSupported => ErrorCode::OperationNotSupported,
            CommandCode::ErrInvalidId => ErrorCode::InvalidId,
            CommandCode::ErrInvalidValue => ErrorCode::InvalidValue,
            CommandCode::ErrInvalidPayloadSize => ErrorCode::InvalidPayloadSize,
            CommandCode::ErrReadOnly => ErrorCode::ReadOnly,
            CommandCode::ErrInsufficientMemory => ErrorCode::InsufficientMemory,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::MalformedMessage => "malformed message",
            ErrorCode::OperationNotSupported => "operation not supported",
            ErrorCode::InvalidId => "invalid id",
            ErrorCode::InvalidValue => "invalid value",
            ErrorCode::InvalidPayloadSize => "invalid payload size",
            ErrorCode::ReadOnly => "read-only",
            ErrorCode::InsufficientMemory => "insufficient memory",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_octet_round_trips() {
        for octet in 0u8..=0xFF {
            if let Ok(code) = CommandCode::try_from(octet) {
                assert_eq!(code.code(), octet);
            }
        }
    }

    #[test]
    fn unknown_octets_are_rejected() {
        assert!(matches!(
            CommandCode::try_from(0x21),
            Err(FrameError::UnknownCommand(0x21))
        ));
        assert!(matches!(
            CommandCode::try_from(0xE8),
            Err(FrameError::UnknownCommand(0xE8))
        ));
    }

    #[test]
    fn error_band_maps_both_ways() {
        assert_eq!(CommandCode::ErrInvalidId.code(), 0xE3);
        assert_eq!(CommandCode::ErrInsufficientMemory.code(), 0xE7);
        for code in [
            ErrorCode::MalformedMessage,
            ErrorCode::OperationNotSupported,
            ErrorCode::InvalidId,
            ErrorCode::InvalidValue,
            ErrorCode::InvalidPayloadSize,
            ErrorCode::ReadOnly,
            ErrorCode::InsufficientMemory,
        ] {
            assert!(code.command().is_ack_band());
            assert_eq!(ErrorCode::from_command(code.command()), Some(code));
        }
        assert_eq!(ErrorCode::from_command(CommandCode::Ok), None);
    }
}
