//! Typed requests and responses carried in variable frames.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::{CurveChecksum, CHECKSUM_SIZE};
use crate::codec::Frame;
use crate::command::{CommandCode, ErrorCode};
use crate::error::{FrameError, Result};

const WRITABLE_MASK: u8 = 0x80;
const SIZE_MASK: u8 = 0x7F;

/// Bytes per curve entry in a curve list: writable, block count,
/// block size (u16 LE), checksum.
pub const CURVE_INFO_SIZE: usize = 4 + CHECKSUM_SIZE;

/// Protocol version reported by the status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
}

impl Version {
    pub const CURRENT: Version = Version {
        major: 1,
        minor: 0,
        revision: 0,
    };
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// One entry of the variable list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableInfo {
    pub writable: bool,
    pub width: u8,
}

impl VariableInfo {
    fn encode(self) -> u8 {
        (if self.writable { WRITABLE_MASK } else { 0 }) | (self.width & SIZE_MASK)
    }

    fn decode(octet: u8) -> Self {
        Self {
            writable: octet & WRITABLE_MASK != 0,
            width: octet & SIZE_MASK,
        }
    }
}

/// One entry of the group list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupInfo {
    /// Every member is writable.
    pub writable: bool,
    /// Number of member variables.
    pub size: u8,
}

impl GroupInfo {
    fn encode(self) -> u8 {
        (if self.writable { WRITABLE_MASK } else { 0 }) | (self.size & SIZE_MASK)
    }

    fn decode(octet: u8) -> Self {
        Self {
            writable: octet & WRITABLE_MASK != 0,
            size: octet & SIZE_MASK,
        }
    }
}

/// One entry of the curve list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveInfo {
    pub writable: bool,
    pub block_count: u8,
    pub block_size: u16,
    /// Checksum of the committed curve contents.
    pub checksum: CurveChecksum,
}

impl CurveInfo {
    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        usize::from(self.block_count) * usize::from(self.block_size)
    }
}

/// Bitwise operation applied in place to a variable or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Set,
    Clear,
    Toggle,
    Not,
}

impl BinaryOp {
    /// Wire octet (ASCII mnemonic).
    pub fn code(self) -> u8 {
        match self {
            BinaryOp::And => b'A',
            BinaryOp::Or => b'O',
            BinaryOp::Xor => b'X',
            BinaryOp::Set => b'S',
            BinaryOp::Clear => b'C',
            BinaryOp::Toggle => b'T',
            BinaryOp::Not => b'N',
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        let op = match code {
            b'A' => BinaryOp::And,
            b'O' => BinaryOp::Or,
            b'X' => BinaryOp::Xor,
            b'S' => BinaryOp::Set,
            b'C' => BinaryOp::Clear,
            b'T' => BinaryOp::Toggle,
            b'N' => BinaryOp::Not,
            other => {
                return Err(FrameError::InvalidValue(format!(
                    "unknown binary operation 0x{other:02X}"
                )))
            }
        };
        Ok(op)
    }

    /// Apply the operation byte-wise. `mask` must be as long as `target`.
    pub fn apply(self, target: &mut [u8], mask: &[u8]) {
        for (byte, &m) in target.iter_mut().zip(mask) {
            *byte = match self {
                BinaryOp::And => *byte & m,
                BinaryOp::Or | BinaryOp::Set => *byte | m,
                BinaryOp::Xor | BinaryOp::Toggle => *byte ^ m,
                BinaryOp::Clear => *byte & !m,
                BinaryOp::Not => !*byte,
            };
        }
    }
}

impl std::str::FromStr for BinaryOp {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(BinaryOp::And),
            "or" => Ok(BinaryOp::Or),
            "xor" => Ok(BinaryOp::Xor),
            "set" => Ok(BinaryOp::Set),
            "clear" => Ok(BinaryOp::Clear),
            "toggle" => Ok(BinaryOp::Toggle),
            "not" => Ok(BinaryOp::Not),
            other => Err(FrameError::InvalidValue(format!(
                "unknown binary operation '{other}'"
            ))),
        }
    }
}

/// A request addressed to the remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    QueryStatus,
    QueryVariables,
    QueryGroups,
    QueryGroup(u8),
    QueryCurves,
    ReadVariable(u8),
    ReadGroup(u8),
    WriteVariable { id: u8, value: Bytes },
    WriteGroup { id: u8, values: Bytes },
    BinaryOpVariable { id: u8, op: BinaryOp, mask: Bytes },
    BinaryOpGroup { id: u8, op: BinaryOp, mask: Bytes },
    CreateGroup(Vec<u8>),
    RemoveAllGroups,
    /// Close a curve transfer, committing it if `checksum` matches.
    CurveTransmit { curve: u8, checksum: CurveChecksum },
    CurveBlock { curve: u8, index: u16, data: Bytes },
    CurveRecalcChecksum(u8),
}

impl Request {
    pub fn command(&self) -> CommandCode {
        match self {
            Request::QueryStatus => CommandCode::QueryStatus,
            Request::QueryVariables => CommandCode::QueryVariables,
            Request::QueryGroups => CommandCode::QueryGroups,
            Request::QueryGroup(_) => CommandCode::QueryGroup,
            Request::QueryCurves => CommandCode::QueryCurves,
            Request::ReadVariable(_) => CommandCode::ReadVariable,
            Request::ReadGroup(_) => CommandCode::ReadGroup,
            Request::WriteVariable { .. } => CommandCode::WriteVariable,
            Request::WriteGroup { .. } => CommandCode::WriteGroup,
            Request::BinaryOpVariable { .. } => CommandCode::BinaryOpVariable,
            Request::BinaryOpGroup { .. } => CommandCode::BinaryOpGroup,
            Request::CreateGroup(_) => CommandCode::CreateGroup,
            Request::RemoveAllGroups => CommandCode::RemoveAllGroups,
            Request::CurveTransmit { .. } => CommandCode::CurveTransmit,
            Request::CurveBlock { .. } => CommandCode::CurveBlock,
            Request::CurveRecalcChecksum(_) => CommandCode::CurveRecalcChecksum,
        }
    }

    /// The reply code a successful exchange carries.
    pub fn expected_reply(&self) -> CommandCode {
        match self {
            Request::QueryStatus => CommandCode::Status,
            Request::QueryVariables => CommandCode::VariableList,
            Request::QueryGroups => CommandCode::GroupList,
            Request::QueryGroup(_) => CommandCode::Group,
            Request::QueryCurves => CommandCode::CurveList,
            Request::ReadVariable(_) => CommandCode::VariableReading,
            Request::ReadGroup(_) => CommandCode::GroupReading,
            _ => CommandCode::Ok,
        }
    }

    pub fn to_frame(&self) -> Frame {
        let mut payload = BytesMut::new();
        match self {
            Request::QueryStatus
            | Request::QueryVariables
            | Request::QueryGroups
            | Request::QueryCurves
            | Request::RemoveAllGroups => {}
            Request::QueryGroup(id)
            | Request::ReadVariable(id)
            | Request::ReadGroup(id)
            | Request::CurveRecalcChecksum(id) => payload.put_u8(*id),
            Request::WriteVariable { id, value } => {
                payload.put_u8(*id);
                payload.put_slice(value);
            }
            Request::WriteGroup { id, values } => {
                payload.put_u8(*id);
                payload.put_slice(values);
            }
            Request::BinaryOpVariable { id, op, mask } | Request::BinaryOpGroup { id, op, mask } => {
                payload.put_u8(*id);
                payload.put_u8(op.code());
                payload.put_slice(mask);
            }
            Request::CreateGroup(ids) => payload.put_slice(ids),
            Request::CurveTransmit { curve, checksum } => {
                payload.put_u8(*curve);
                payload.put_slice(checksum);
            }
            Request::CurveBlock { curve, index, data } => {
                payload.put_u8(*curve);
                payload.put_u16_le(*index);
                payload.put_slice(data);
            }
        }
        Frame {
            command: self.command().code(),
            payload: payload.freeze(),
        }
    }

    /// Structural decode. Widths are checked later by whoever knows them.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let p = &frame.payload;
        let command = frame.command_code()?;
        let request = match command {
            CommandCode::QueryStatus => {
                exact(p, 0, "query status")?;
                Request::QueryStatus
            }
            CommandCode::QueryVariables => {
                exact(p, 0, "query variables")?;
                Request::QueryVariables
            }
            CommandCode::QueryGroups => {
                exact(p, 0, "query groups")?;
                Request::QueryGroups
            }
            CommandCode::QueryCurves => {
                exact(p, 0, "query curves")?;
                Request::QueryCurves
            }
            CommandCode::RemoveAllGroups => {
                exact(p, 0, "remove all groups")?;
                Request::RemoveAllGroups
            }
            CommandCode::QueryGroup => {
                exact(p, 1, "query group")?;
                Request::QueryGroup(p[0])
            }
            CommandCode::ReadVariable => {
                exact(p, 1, "read variable")?;
                Request::ReadVariable(p[0])
            }
            CommandCode::ReadGroup => {
                exact(p, 1, "read group")?;
                Request::ReadGroup(p[0])
            }
            CommandCode::CurveRecalcChecksum => {
                exact(p, 1, "curve checksum recalculation")?;
                Request::CurveRecalcChecksum(p[0])
            }
            CommandCode::WriteVariable => {
                at_least(p, 2, "write variable")?;
                Request::WriteVariable {
                    id: p[0],
                    value: p.slice(1..),
                }
            }
            CommandCode::WriteGroup => {
                at_least(p, 2, "write group")?;
                Request::WriteGroup {
                    id: p[0],
                    values: p.slice(1..),
                }
            }
            CommandCode::BinaryOpVariable => {
                at_least(p, 3, "binary operation on variable")?;
                Request::BinaryOpVariable {
                    id: p[0],
                    op: BinaryOp::from_code(p[1])?,
                    mask: p.slice(2..),
                }
            }
            CommandCode::BinaryOpGroup => {
                at_least(p, 3, "binary operation on group")?;
                Request::BinaryOpGroup {
                    id: p[0],
                    op: BinaryOp::from_code(p[1])?,
                    mask: p.slice(2..),
                }
            }
            CommandCode::CreateGroup => {
                at_least(p, 1, "create group")?;
                Request::CreateGroup(p.to_vec())
            }
            CommandCode::CurveTransmit => {
                exact(p, 1 + CHECKSUM_SIZE, "curve transmit")?;
                let mut checksum = [0u8; CHECKSUM_SIZE];
                checksum.copy_from_slice(&p[1..]);
                Request::CurveTransmit {
                    curve: p[0],
                    checksum,
                }
            }
            CommandCode::CurveBlock => {
                at_least(p, 4, "curve block")?;
                Request::CurveBlock {
                    curve: p[0],
                    index: u16::from_le_bytes([p[1], p[2]]),
                    data: p.slice(3..),
                }
            }
            other => return Err(FrameError::UnknownCommand(other.code())),
        };
        Ok(request)
    }
}

/// A reply from the remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Status(Version),
    VariableList(Vec<VariableInfo>),
    GroupList(Vec<GroupInfo>),
    Group(Vec<u8>),
    CurveList(Vec<CurveInfo>),
    VariableReading(Bytes),
    GroupReading(Bytes),
    Ok,
    Rejected(ErrorCode),
}

impl Response {
    pub fn command(&self) -> CommandCode {
        match self {
            Response::Status(_) => CommandCode::Status,
            Response::VariableList(_) => CommandCode::VariableList,
            Response::GroupList(_) => CommandCode::GroupList,
            Response::Group(_) => CommandCode::Group,
            Response::CurveList(_) => CommandCode::CurveList,
            Response::VariableReading(_) => CommandCode::VariableReading,
            Response::GroupReading(_) => CommandCode::GroupReading,
            Response::Ok => CommandCode::Ok,
            Response::Rejected(code) => code.command(),
        }
    }

    pub fn to_frame(&self) -> Frame {
        let mut payload = BytesMut::new();
        match self {
            Response::Status(version) => {
                payload.put_slice(&[version.major, version.minor, version.revision]);
            }
            Response::VariableList(vars) => {
                payload.extend(vars.iter().map(|v| v.encode()));
            }
            Response::GroupList(groups) => {
                payload.extend(groups.iter().map(|g| g.encode()));
            }
            Response::Group(ids) => payload.put_slice(ids),
            Response::CurveList(curves) => {
                for curve in curves {
                    payload.put_u8(u8::from(curve.writable));
                    payload.put_u8(curve.block_count);
                    payload.put_u16_le(curve.block_size);
                    payload.put_slice(&curve.checksum);
                }
            }
            Response::VariableReading(raw) | Response::GroupReading(raw) => payload.put_slice(raw),
            Response::Ok | Response::Rejected(_) => {}
        }
        Frame {
            command: self.command().code(),
            payload: payload.freeze(),
        }
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let p = &frame.payload;
        let command = frame.command_code()?;
        if let Some(code) = ErrorCode::from_command(command) {
            return Ok(Response::Rejected(code));
        }
        let response = match command {
            CommandCode::Status => {
                exact(p, 3, "status")?;
                Response::Status(Version {
                    major: p[0],
                    minor: p[1],
                    revision: p[2],
                })
            }
            CommandCode::VariableList => {
                Response::VariableList(p.iter().copied().map(VariableInfo::decode).collect())
            }
            CommandCode::GroupList => {
                Response::GroupList(p.iter().copied().map(GroupInfo::decode).collect())
            }
            CommandCode::Group => Response::Group(p.to_vec()),
            CommandCode::CurveList => {
                if p.len() % CURVE_INFO_SIZE != 0 {
                    return Err(FrameError::PayloadSize {
                        what: "curve list",
                        expected: format!("a multiple of {CURVE_INFO_SIZE}"),
                        actual: p.len(),
                    });
                }
                let curves = p
                    .chunks_exact(CURVE_INFO_SIZE)
                    .map(|entry| {
                        let mut checksum = [0u8; CHECKSUM_SIZE];
                        checksum.copy_from_slice(&entry[4..]);
                        CurveInfo {
                            writable: entry[0] != 0,
                            block_count: entry[1],
                            block_size: u16::from_le_bytes([entry[2], entry[3]]),
                            checksum,
                        }
                    })
                    .collect();
                Response::CurveList(curves)
            }
            CommandCode::VariableReading => Response::VariableReading(p.clone()),
            CommandCode::GroupReading => Response::GroupReading(p.clone()),
            CommandCode::Ok => {
                exact(p, 0, "acknowledgement")?;
                Response::Ok
            }
            other => return Err(FrameError::UnknownCommand(other.code())),
        };
        Ok(response)
    }
}

fn exact(payload: &[u8], expected: usize, what: &'static str) -> Result<()> {
    if payload.len() != expected {
        return Err(FrameError::PayloadSize {
            what,
            expected: expected.to_string(),
            actual: payload.len(),
        });
    }
    Ok(())
}

fn at_least(payload: &[u8], min: usize, what: &'static str) -> Result<()> {
    if payload.len() < min {
        return Err(FrameError::PayloadSize {
            what,
            expected: format!("at least {min}"),
            actual: payload.len(),
        });
    }
    Ok(())
}
