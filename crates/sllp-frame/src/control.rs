//! Control frames: the `FDB` text record used for scalar power-supply
//! control.
//!
//! ```text
//! request:  FDB:<control, 2 hex digits>:<setpoint, 4 decimals>\r
//! reply:    #FDB:<status, hex>:<setpoint>:<readback>\r
//! ```

use std::fmt::Write as _;

use bitflags::bitflags;
use bytes::Bytes;
use sllp_transport::MessageEnd;

use crate::error::{FrameError, Result};

/// Record terminator for both directions.
pub const CONTROL_TERMINATOR: u8 = b'\r';

/// How a transport finds the end of a control reply.
pub const CONTROL_MESSAGE_END: MessageEnd = MessageEnd::Terminator(CONTROL_TERMINATOR);

const REQUEST_PREFIX: &str = "FDB:";
const REPLY_PREFIX: &str = "#FDB:";

bitflags! {
    /// Bits of the control octet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u8 {
        /// Always set on the wire; marks a valid control octet.
        const RESERVED = 0x01;
        /// Ramp the output toward the setpoint instead of stepping.
        const ENABLE_SLEW = 0x10;
        /// Clear latched faults.
        const RESET = 0x20;
        /// Requested power state; clear means off.
        const POWER_ON = 0x40;
        /// Report state without applying the rest of the request.
        const READBACK_ONLY = 0x80;
    }
}

bitflags! {
    /// Bits of the status octet in a control reply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SupplyStatus: u8 {
        const POWER_ON = 0x01;
        const GENERIC_FAULT = 0x02;
        const DC_UNDERVOLTAGE = 0x04;
        const MOSFET_OVERTEMP = 0x08;
        const SHUNT_OVERTEMP = 0x10;
        const INTERLOCK_OPEN = 0x20;
        const INPUT_OVERCURRENT = 0x40;
        const CROWBAR = 0x80;
    }
}

impl SupplyStatus {
    /// Latched fault bits, everything except the power state.
    pub const FAULTS: SupplyStatus = SupplyStatus::POWER_ON.complement();
}

/// A control request. The reserved bit is added on encode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRequest {
    pub flags: ControlFlags,
    pub setpoint: f64,
}

impl ControlRequest {
    pub fn new(flags: ControlFlags, setpoint: f64) -> Self {
        Self { flags, setpoint }
    }

    /// Control octet as sent.
    pub fn control(&self) -> u8 {
        (self.flags | ControlFlags::RESERVED).bits()
    }

    /// Render the request record, terminator included.
    pub fn encode(&self) -> Bytes {
        let mut text = String::with_capacity(24);
        // Writing into a String cannot fail.
        let _ = write!(
            text,
            "{REQUEST_PREFIX}{:02X}:{:.4}",
            self.control(),
            self.setpoint
        );
        text.push(char::from(CONTROL_TERMINATOR));
        Bytes::from(text)
    }

    /// Parse a request record as a remote sees it.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let bad = || {
            FrameError::InvalidValue(format!("bad control request \"{}\"", escape_reply(raw)))
        };
        let text = std::str::from_utf8(raw).map_err(|_| bad())?;
        let body = text
            .trim_end_matches(['\r', '\n'])
            .strip_prefix(REQUEST_PREFIX)
            .ok_or_else(bad)?;
        let (control, setpoint) = body.split_once(':').ok_or_else(bad)?;
        let control = u8::from_str_radix(control, 16).map_err(|_| bad())?;
        let flags = ControlFlags::from_bits_truncate(control);
        if !flags.contains(ControlFlags::RESERVED) {
            return Err(bad());
        }
        let setpoint = setpoint.parse::<f64>().map_err(|_| bad())?;
        Ok(Self { flags, setpoint })
    }
}

/// A control reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlReply {
    pub status: u8,
    pub setpoint: f64,
    pub readback: f64,
}

impl ControlReply {
    /// Parse a reply record. Anything other than the prefix and exactly
    /// three fields is a bad reply.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let bad = |reason: &str| {
            FrameError::BadControlReply(format!("{reason}: \"{}\"", escape_reply(raw)))
        };
        let text = std::str::from_utf8(raw).map_err(|_| bad("not text"))?;
        let body = text
            .trim_end_matches(['\r', '\n'])
            .strip_prefix(REPLY_PREFIX)
            .ok_or_else(|| bad("missing reply marker"))?;
        let fields: Vec<&str> = body.split(':').collect();
        let [status, setpoint, readback] = fields.as_slice() else {
            return Err(bad("expected 3 fields"));
        };
        let status = u8::from_str_radix(status.trim(), 16).map_err(|_| bad("bad status"))?;
        let setpoint = setpoint
            .trim()
            .parse::<f64>()
            .map_err(|_| bad("bad setpoint"))?;
        let readback = readback
            .trim()
            .parse::<f64>()
            .map_err(|_| bad("bad readback"))?;
        Ok(Self {
            status,
            setpoint,
            readback,
        })
    }

    /// Render the reply record, terminator included.
    pub fn encode(&self) -> Bytes {
        let mut text = String::with_capacity(32);
        let _ = write!(
            text,
            "{REPLY_PREFIX}{:02X}:{:.4}:{:.4}",
            self.status, self.setpoint, self.readback
        );
        text.push(char::from(CONTROL_TERMINATOR));
        Bytes::from(text)
    }
}

/// Render raw reply bytes printable: `\r`, `\n`, `\t`, `\\`, `\"` and
/// `\xHH` for anything else outside ASCII graphic range.
pub fn escape_reply(raw: &[u8]) -> String {
    raw.escape_ascii().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_request_text() {
        let request = ControlRequest::new(ControlFlags::POWER_ON, 5.0);
        assert_eq!(request.encode().as_ref(), b"FDB:41:5.0000\r");
    }

    #[test]
    fn reserved_bit_is_always_sent() {
        let request = ControlRequest::new(ControlFlags::empty(), -1.25);
        assert_eq!(request.control(), 0x01);
        assert_eq!(request.encode().as_ref(), b"FDB:01:-1.2500\r");
    }

    #[test]
    fn request_parses_back() {
        let parsed = ControlRequest::parse(b"FDB:71:2.5000\r").unwrap();
        assert!(parsed.flags.contains(ControlFlags::POWER_ON | ControlFlags::RESET));
        assert!(parsed.flags.contains(ControlFlags::ENABLE_SLEW));
        assert_eq!(parsed.setpoint, 2.5);
        assert!(ControlRequest::parse(b"FDB:40:1.0\r").is_err());
        assert!(ControlRequest::parse(b"XYZ:41:1.0\r").is_err());
    }

    #[test]
    fn reply_three_fields() {
        let reply = ControlReply::parse(b"#FDB:41:5.0000:4.9980").unwrap();
        assert_eq!(reply.status, 0x41);
        assert_eq!(reply.setpoint, 5.0);
        assert_eq!(reply.readback, 4.998);
    }

    #[test]
    fn reply_trailing_terminator_is_ignored() {
        let reply = ControlReply::parse(b"#FDB:1:0.0000:0.0000\r\n").unwrap();
        assert_eq!(reply.status, 0x01);
    }

    #[test]
    fn reply_wrong_field_count_is_bad() {
        let err = ControlReply::parse(b"#FDB:41:5.0000\r").unwrap_err();
        match err {
            FrameError::BadControlReply(text) => {
                assert!(text.contains("expected 3 fields"));
                assert!(text.contains("\\r"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ControlReply::parse(b"#FDB:41:5.0:4.9:1.0").is_err());
        assert!(ControlReply::parse(b"FDB:41:5.0:4.9").is_err());
    }

    #[test]
    fn reply_encode_matches_parse() {
        let reply = ControlReply {
            status: 0x41,
            setpoint: 5.0,
            readback: 4.998,
        };
        assert_eq!(reply.encode().as_ref(), b"#FDB:41:5.0000:4.9980\r");
        assert_eq!(ControlReply::parse(&reply.encode()).unwrap(), reply);
    }

    #[test]
    fn escaping_is_printable() {
        assert_eq!(escape_reply(b"ok\r\x01"), "ok\\r\\x01");
    }
}
