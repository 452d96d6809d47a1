use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use sllp_transport::{InstrumentStream, MessageEnd};

use crate::codec::{FrameConfig, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 512;

/// Longest raw message buffered before giving up on finding its end.
const MAX_MESSAGE_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole
/// length-prefixed frames or whole terminated records.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next raw message delimited by `end` (blocking).
    ///
    /// A declared payload above the configured maximum fails as soon as
    /// its header arrives. Returns `Err(FrameError::ConnectionClosed)`
    /// when EOF is reached.
    pub fn read_message(&mut self, end: MessageEnd) -> Result<Bytes> {
        loop {
            self.check_declared_len(end)?;
            if let Some(len) = end.complete_len(&self.buf) {
                return Ok(self.buf.split_to(len).freeze());
            }
            if self.buf.len() >= MAX_MESSAGE_SIZE {
                return Err(FrameError::PayloadTooLarge {
                    size: self.buf.len(),
                    max: MAX_MESSAGE_SIZE,
                });
            }
            self.fill()?;
        }
    }

    fn check_declared_len(&self, end: MessageEnd) -> Result<()> {
        if let MessageEnd::LengthPrefixed { length_offset, .. } = end {
            if let Some(&declared) = self.buf.get(length_offset) {
                let max = self.config.max_payload_size;
                if usize::from(declared) > max {
                    return Err(FrameError::PayloadTooLarge {
                        size: usize::from(declared),
                        max,
                    });
                }
            }
        }
        Ok(())
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };
            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(());
        }
    }

    /// Bytes received but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<InstrumentStream> {
    /// Create a frame reader for an `InstrumentStream` and apply the read
    /// timeout from config.
    pub fn with_config_stream(inner: InstrumentStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: sllp_transport::TransportError) -> FrameError {
    match err {
        sllp_transport::TransportError::Io(io) | sllp_transport::TransportError::Accept(io) => {
            FrameError::Io(io)
        }
        sllp_transport::TransportError::Bind { source, .. }
        | sllp_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
