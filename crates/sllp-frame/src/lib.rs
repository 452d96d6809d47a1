//! Wire codec for instrument control frames.
//!
//! Two framing disciplines are served:
//! - **Variable frames**: `[command][length][payload]`, used for the
//!   variable / group / curve model. Multi-byte values are little-endian.
//! - **Control frames**: the `FDB:<control>:<setpoint>\r` text record used
//!   for stateful scalar control of power supplies.
//!
//! Nothing in this crate performs I/O except the [`FrameReader`] and
//! [`FrameWriter`] adapters, which only move whole messages.

pub mod checksum;
pub mod codec;
pub mod command;
pub mod control;
pub mod error;
pub mod framing;
pub mod message;
pub mod reader;
pub mod value;
pub mod writer;

pub use checksum::{curve_checksum, CurveChecksum, CurveHasher, CHECKSUM_SIZE};
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, HEADER_SIZE, MAX_PAYLOAD,
    VARIABLE_MESSAGE_END,
};
pub use command::{
    CommandCode, ErrorCode, GROUP_ALL, GROUP_READ, GROUP_WRITE, RESERVED_GROUP_COUNT,
};
pub use control::{
    escape_reply, ControlFlags, ControlReply, ControlRequest, SupplyStatus, CONTROL_MESSAGE_END,
    CONTROL_TERMINATOR,
};
pub use error::{FrameError, Result};
pub use framing::Framing;
pub use message::{
    BinaryOp, CurveInfo, GroupInfo, Request, Response, VariableInfo, Version, CURVE_INFO_SIZE,
};
pub use reader::FrameReader;
pub use value::{Value, ValueKind};
pub use writer::FrameWriter;
