use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{MessageEnd, Reply, Transport};

const READ_CHUNK_SIZE: usize = 512;

/// A connected instrument stream; implements Read + Write.
pub struct InstrumentStream {
    inner: StreamInner,
}

enum StreamInner {
    Tcp(std::net::TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for InstrumentStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for InstrumentStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl InstrumentStream {
    pub(crate) fn from_tcp(stream: std::net::TcpStream) -> Self {
        Self {
            inner: StreamInner::Tcp(stream),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: StreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.set_read_timeout(timeout)?,
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.set_write_timeout(timeout)?,
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Switch between blocking and non-blocking reads.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking)?,
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_nonblocking(nonblocking)?,
        }
        Ok(())
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            StreamInner::Tcp(stream) => StreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            StreamInner::Unix(stream) => StreamInner::Unix(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Close both directions of the stream.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.shutdown(std::net::Shutdown::Both)?,
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.shutdown(std::net::Shutdown::Both)?,
        }
        Ok(())
    }

    /// Remote address label for diagnostics.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            StreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:<unknown>".to_string()),
            #[cfg(unix)]
            StreamInner::Unix(_) => "unix".to_string(),
        }
    }
}

impl std::fmt::Debug for InstrumentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            StreamInner::Tcp(_) => f.debug_struct("InstrumentStream").field("type", &"tcp").finish(),
            #[cfg(unix)]
            StreamInner::Unix(_) => f
                .debug_struct("InstrumentStream")
                .field("type", &"unix")
                .finish(),
        }
    }
}

/// Configuration for a [`StreamTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bound on establishing (or re-establishing) the connection.
    pub connect_timeout: Duration,
    /// Largest reply accepted before the read is cut short.
    pub max_reply: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_reply: 512,
        }
    }
}

/// [`Transport`] over a connected [`InstrumentStream`].
///
/// Remembers its endpoint so a dropped link can be re-established.
pub struct StreamTransport {
    endpoint: Endpoint,
    stream: InstrumentStream,
    config: TransportConfig,
    buf: BytesMut,
}

impl StreamTransport {
    /// Connect to `endpoint` with default configuration.
    pub fn connect(endpoint: Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, TransportConfig::default())
    }

    /// Connect to `endpoint` with explicit configuration.
    pub fn connect_with_config(endpoint: Endpoint, config: TransportConfig) -> Result<Self> {
        let stream = endpoint.connect(config.connect_timeout)?;
        Ok(Self::from_stream(endpoint, stream, config))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(endpoint: Endpoint, stream: InstrumentStream, config: TransportConfig) -> Self {
        Self {
            endpoint,
            stream,
            buf: BytesMut::with_capacity(config.max_reply),
            config,
        }
    }

    /// The configured remote endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn write_all(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        self.stream.set_write_timeout(Some(timeout))?;
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.stream.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Err(TransportError::Timeout(timeout)),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        self.stream.flush()?;
        Ok(offset)
    }

    /// Read into the internal buffer until `done` reports completion, the
    /// buffer reaches `max_reply`, or the deadline passes.
    fn fill_until(
        &mut self,
        deadline: Instant,
        timeout: Duration,
        done: impl Fn(&[u8]) -> bool,
    ) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while !done(&self.buf) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(timeout));
            }
            self.stream.set_read_timeout(Some(remaining))?;
            let room = self.config.max_reply.saturating_sub(self.buf.len()).min(chunk.len());
            if room == 0 {
                return Ok(());
            }
            match self.stream.read(&mut chunk[..room]) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => {
                    trace!(bytes = n, "read chunk");
                    self.buf.extend_from_slice(&chunk[..n]);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Err(TransportError::Timeout(timeout)),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }
}

impl Transport for StreamTransport {
    fn write_read(&mut self, request: &[u8], end: MessageEnd, timeout: Duration) -> Result<Reply> {
        let deadline = Instant::now() + timeout;
        self.flush()?;
        self.write_all(request, timeout)?;

        self.fill_until(deadline, timeout, |buf| end.complete_len(buf).is_some())?;
        match end.complete_len(&self.buf) {
            Some(len) => {
                let bytes = self.buf.split_to(len).freeze();
                Ok(Reply { bytes, eom: true })
            }
            None => {
                let bytes = self.buf.split().freeze();
                debug!(bytes = bytes.len(), "reply buffer full before message end");
                Ok(Reply { bytes, eom: false })
            }
        }
    }

    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        self.write_all(bytes, timeout)
    }

    fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        self.fill_until(deadline, timeout, |buf| !buf.is_empty())?;
        let take = self.buf.len().min(max);
        Ok(self.buf.split_to(take).freeze())
    }

    fn flush(&mut self) -> Result<()> {
        self.buf.clear();
        self.stream.set_nonblocking(true)?;
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let result = loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => break Err(TransportError::Disconnected),
                Ok(n) => trace!(bytes = n, "discarded stale input"),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(err) => break Err(TransportError::Io(err)),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }

    fn reconnect(&mut self) -> Result<()> {
        let _ = self.stream.shutdown();
        self.stream = self.endpoint.connect(self.config.connect_timeout)?;
        self.buf.clear();
        info!(endpoint = %self.endpoint, "reconnected");
        Ok(())
    }

    fn remote(&self) -> String {
        self.endpoint.to_string()
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
