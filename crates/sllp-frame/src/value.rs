//! Width-checked conversions between raw variable bytes and numbers.
//!
//! Variables travel as little-endian byte strings of a fixed width. These
//! codecs validate the width before converting and never reinterpret a
//! buffer in place.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Numeric interpretation of a variable's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    U8,
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
}

impl ValueKind {
    /// Byte width of this kind on the wire.
    pub fn width(self) -> usize {
        match self {
            ValueKind::U8 => 1,
            ValueKind::I32 | ValueKind::U32 | ValueKind::F32 => 4,
            ValueKind::I64 | ValueKind::U64 | ValueKind::F64 => 8,
        }
    }

    /// Parse a textual number as this kind.
    pub fn parse(self, text: &str) -> Result<Value> {
        let text = text.trim();
        let bad = |_| FrameError::InvalidValue(format!("'{text}' is not a valid {self}"));
        let value = match self {
            ValueKind::U8 => Value::U8(parse_int(text).map_err(bad)?),
            ValueKind::I32 => Value::I32(parse_int(text).map_err(bad)?),
            ValueKind::U32 => Value::U32(parse_int(text).map_err(bad)?),
            ValueKind::I64 => Value::I64(parse_int(text).map_err(bad)?),
            ValueKind::U64 => Value::U64(parse_int(text).map_err(bad)?),
            ValueKind::F32 => Value::F32(text.parse().map_err(|_| bad(()))?),
            ValueKind::F64 => Value::F64(text.parse().map_err(|_| bad(()))?),
        };
        Ok(value)
    }

    /// Default interpretation for a variable of `width` bytes.
    pub fn for_width(width: usize) -> Option<Self> {
        match width {
            1 => Some(ValueKind::U8),
            4 => Some(ValueKind::I32),
            8 => Some(ValueKind::F64),
            _ => None,
        }
    }
}

/// Integers accept decimal or `0x`-prefixed hex.
fn parse_int<T>(text: &str) -> std::result::Result<T, ()>
where
    T: FromStr + TryFrom<i128>,
{
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        let wide = i128::from_str_radix(hex, 16).map_err(|_| ())?;
        return T::try_from(wide).map_err(|_| ());
    }
    text.parse().map_err(|_| ())
}

impl FromStr for ValueKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(ValueKind::U8),
            "i32" => Ok(ValueKind::I32),
            "u32" => Ok(ValueKind::U32),
            "f32" => Ok(ValueKind::F32),
            "i64" => Ok(ValueKind::I64),
            "u64" => Ok(ValueKind::U64),
            "f64" => Ok(ValueKind::F64),
            other => Err(FrameError::InvalidValue(format!("unknown value kind '{other}'"))),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::U8 => "u8",
            ValueKind::I32 => "i32",
            ValueKind::U32 => "u32",
            ValueKind::F32 => "f32",
            ValueKind::I64 => "i64",
            ValueKind::U64 => "u64",
            ValueKind::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A decoded variable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U8(u8),
    I32(i32),
    U32(u32),
    F32(f32),
    I64(i64),
    U64(u64),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::U8(_) => ValueKind::U8,
            Value::I32(_) => ValueKind::I32,
            Value::U32(_) => ValueKind::U32,
            Value::F32(_) => ValueKind::F32,
            Value::I64(_) => ValueKind::I64,
            Value::U64(_) => ValueKind::U64,
            Value::F64(_) => ValueKind::F64,
        }
    }

    /// Little-endian raw bytes, exactly `kind().width()` long.
    pub fn to_raw(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.kind().width());
        match *self {
            Value::U8(v) => buf.put_u8(v),
            Value::I32(v) => buf.put_i32_le(v),
            Value::U32(v) => buf.put_u32_le(v),
            Value::F32(v) => buf.put_f32_le(v),
            Value::I64(v) => buf.put_i64_le(v),
            Value::U64(v) => buf.put_u64_le(v),
            Value::F64(v) => buf.put_f64_le(v),
        }
        buf.freeze()
    }

    /// Decode `raw` as `kind`, rejecting any length other than its width.
    pub fn decode(kind: ValueKind, raw: &[u8]) -> Result<Self> {
        if raw.len() != kind.width() {
            return Err(FrameError::InvalidValue(format!(
                "{kind} needs {} bytes, got {}",
                kind.width(),
                raw.len()
            )));
        }
        let mut buf = raw;
        let value = match kind {
            ValueKind::U8 => Value::U8(buf.get_u8()),
            ValueKind::I32 => Value::I32(buf.get_i32_le()),
            ValueKind::U32 => Value::U32(buf.get_u32_le()),
            ValueKind::F32 => Value::F32(buf.get_f32_le()),
            ValueKind::I64 => Value::I64(buf.get_i64_le()),
            ValueKind::U64 => Value::U64(buf.get_u64_le()),
            ValueKind::F64 => Value::F64(buf.get_f64_le()),
        };
        Ok(value)
    }

    /// Lossy numeric view, for display and engineering-unit layers.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::U8(v) => f64::from(v),
            Value::I32(v) => f64::from(v),
            Value::U32(v) => f64::from(v),
            Value::F32(v) => f64::from(v),
            Value::I64(v) => v as f64,
            Value::U64(v) => v as f64,
            Value::F64(v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U8(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_is_little_endian() {
        let raw = Value::F64(1.0).to_raw();
        assert_eq!(raw.as_ref(), &[0, 0, 0, 0, 0, 0, 0xF0, 0x3F]);
        assert_eq!(Value::decode(ValueKind::F64, &raw).unwrap(), Value::F64(1.0));
    }

    #[test]
    fn i32_layout() {
        let raw = Value::I32(-2).to_raw();
        assert_eq!(raw.as_ref(), &[0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn decode_checks_width_before_converting() {
        assert!(Value::decode(ValueKind::F64, &[0u8; 4]).is_err());
        assert!(Value::decode(ValueKind::U8, &[]).is_err());
        assert!(Value::decode(ValueKind::U32, &[0u8; 8]).is_err());
    }

    #[test]
    fn simulator_double_decodes() {
        let raw = [0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let value = Value::decode(ValueKind::U64, &raw).unwrap();
        assert_eq!(value, Value::U64(0xFFFF_FFFF_FFFF_FF7F));
    }

    #[test]
    fn parse_accepts_hex_and_decimal() {
        assert_eq!(ValueKind::U8.parse("0x07").unwrap(), Value::U8(7));
        assert_eq!(ValueKind::U8.parse("7").unwrap(), Value::U8(7));
        assert_eq!(ValueKind::I32.parse("-12").unwrap(), Value::I32(-12));
        assert_eq!(ValueKind::F64.parse("4.998").unwrap(), Value::F64(4.998));
        assert!(ValueKind::U8.parse("256").is_err());
        assert!(ValueKind::F32.parse("abc").is_err());
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in [
            ValueKind::U8,
            ValueKind::I32,
            ValueKind::U32,
            ValueKind::F32,
            ValueKind::I64,
            ValueKind::U64,
            ValueKind::F64,
        ] {
            assert_eq!(kind.to_string().parse::<ValueKind>().unwrap(), kind);
        }
    }
}
