use std::fmt;
use std::net::TcpListener;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::InstrumentStream;

const UNIX_PREFIX: &str = "unix:";

/// Address of an instrument or simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`.
    Tcp(String),
    /// Filesystem-path Unix domain socket.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// Connect to the endpoint (blocking, bounded by `timeout` for TCP).
    pub fn connect(&self, timeout: Duration) -> Result<InstrumentStream> {
        match self {
            Endpoint::Tcp(addr) => {
                let mut last_err = None;
                let addrs = std::net::ToSocketAddrs::to_socket_addrs(addr.as_str())
                    .map_err(|source| self.connect_error(source))?;
                for sock_addr in addrs {
                    match std::net::TcpStream::connect_timeout(&sock_addr, timeout) {
                        Ok(stream) => {
                            stream.set_nodelay(true)?;
                            debug!(endpoint = %self, "connected");
                            return Ok(InstrumentStream::from_tcp(stream));
                        }
                        Err(err) => last_err = Some(err),
                    }
                }
                Err(self.connect_error(last_err.unwrap_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        "address resolved to nothing",
                    )
                })))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = std::os::unix::net::UnixStream::connect(path)
                    .map_err(|source| self.connect_error(source))?;
                debug!(endpoint = %self, "connected");
                Ok(InstrumentStream::from_unix(stream))
            }
        }
    }

    fn connect_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Connect {
            endpoint: self.to_string(),
            source,
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(TransportError::InvalidEndpoint(s.to_string()));
                }
                return Ok(Endpoint::Unix(PathBuf::from(path)));
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Endpoint::Tcp(s.to_string()))
            }
            _ => Err(TransportError::InvalidEndpoint(s.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => f.write_str(addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

/// A bound endpoint accepting instrument connections.
pub struct EndpointListener {
    inner: ListenerInner,
    endpoint: Endpoint,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl EndpointListener {
    /// Bind and listen on `endpoint`.
    ///
    /// For Unix endpoints a stale socket file is removed first; any other
    /// kind of file at the path is left alone and reported as a bind error.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let bind_error = |source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let (inner, endpoint) = match endpoint {
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str()).map_err(bind_error)?;
                // Report the real port when bound to port 0.
                let local = listener.local_addr().map_err(bind_error)?;
                (ListenerInner::Tcp(listener), Endpoint::Tcp(local.to_string()))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                if let Ok(metadata) = std::fs::symlink_metadata(path) {
                    if !metadata.file_type().is_socket() {
                        return Err(bind_error(std::io::Error::new(
                            std::io::ErrorKind::AlreadyExists,
                            "existing path is not a unix socket",
                        )));
                    }
                    debug!(?path, "removing stale socket");
                    std::fs::remove_file(path).map_err(bind_error)?;
                }
                let listener = UnixListener::bind(path).map_err(bind_error)?;
                (ListenerInner::Unix(listener), endpoint.clone())
            }
        };

        info!(endpoint = %endpoint, "listening");
        Ok(Self { inner, endpoint })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<InstrumentStream> {
        let stream = match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%addr, "accepted connection");
                InstrumentStream::from_tcp(stream)
            }
            #[cfg(unix)]
            ListenerInner::Unix(listener) => {
                let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
                debug!("accepted connection");
                InstrumentStream::from_unix(stream)
            }
        };
        Ok(stream)
    }

    /// Switch the listener between blocking and polling accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            ListenerInner::Tcp(listener) => listener.set_nonblocking(nonblocking)?,
            #[cfg(unix)]
            ListenerInner::Unix(listener) => listener.set_nonblocking(nonblocking)?,
        }
        Ok(())
    }

    /// The endpoint actually bound (TCP port 0 resolved).
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Drop for EndpointListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let (ListenerInner::Unix(_), Endpoint::Unix(path)) = (&self.inner, &self.endpoint) {
            if let Ok(metadata) = std::fs::symlink_metadata(path) {
                if metadata.file_type().is_socket() {
                    debug!(?path, "cleaning up socket file");
                    let _ = std::fs::remove_file(path);
                }
            }
        }
    }
}
