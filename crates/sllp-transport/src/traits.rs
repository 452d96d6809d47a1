use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// How the reader recognizes the end of one message on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEnd {
    /// The message ends with (and includes) this octet.
    Terminator(u8),
    /// Fixed-size header whose octet at `length_offset` counts the payload
    /// bytes following the header.
    LengthPrefixed {
        header_len: usize,
        length_offset: usize,
    },
}

impl MessageEnd {
    /// Length of the first complete message in `buf`, if one is present.
    pub fn complete_len(&self, buf: &[u8]) -> Option<usize> {
        match *self {
            MessageEnd::Terminator(term) => buf.iter().position(|&b| b == term).map(|pos| pos + 1),
            MessageEnd::LengthPrefixed {
                header_len,
                length_offset,
            } => {
                if buf.len() < header_len {
                    return None;
                }
                let total = header_len + usize::from(buf[length_offset]);
                (buf.len() >= total).then_some(total)
            }
        }
    }
}

/// A reply read back from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Raw reply bytes, terminator included.
    pub bytes: Bytes,
    /// True when the message end was seen; false when the reply buffer
    /// filled up first.
    pub eom: bool,
}

/// The byte-stream endpoint driven by a transaction engine.
///
/// Every call blocks for at most the supplied timeout. Implementations
/// own exactly one connection and are never shared between threads.
pub trait Transport {
    /// Send `request` in full, then wait for one reply message.
    fn write_read(&mut self, request: &[u8], end: MessageEnd, timeout: Duration) -> Result<Reply>;

    /// Write `bytes` in full, returning the number of bytes written.
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize>;

    /// Read up to `max` bytes that arrive before `timeout`.
    fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes>;

    /// Discard any pending input.
    fn flush(&mut self) -> Result<()>;

    /// Re-establish the connection to the configured remote address.
    fn reconnect(&mut self) -> Result<()>;

    /// Remote address, for diagnostics.
    fn remote(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_read(&mut self, request: &[u8], end: MessageEnd, timeout: Duration) -> Result<Reply> {
        (**self).write_read(request, end, timeout)
    }

    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(bytes, timeout)
    }

    fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes> {
        (**self).read(max, timeout)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn reconnect(&mut self) -> Result<()> {
        (**self).reconnect()
    }

    fn remote(&self) -> String {
        (**self).remote()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_includes_terminator_octet() {
        let end = MessageEnd::Terminator(b'\r');
        assert_eq!(end.complete_len(b"#FDB:1:0.0:0.0\rrest"), Some(15));
        assert_eq!(end.complete_len(b"#FDB:1:0.0"), None);
    }

    #[test]
    fn length_prefixed_waits_for_payload() {
        let end = MessageEnd::LengthPrefixed {
            header_len: 2,
            length_offset: 1,
        };
        assert_eq!(end.complete_len(&[0x11]), None);
        assert_eq!(end.complete_len(&[0x11, 0x02, 0xAA]), None);
        assert_eq!(end.complete_len(&[0x11, 0x02, 0xAA, 0xBB]), Some(4));
        assert_eq!(end.complete_len(&[0xE0, 0x00, 0x11]), Some(2));
    }
}
