//! Byte-stream transport boundary for instrument control links.
//!
//! Provides the endpoint types the protocol layers sit on:
//! - TCP endpoints (`host:port`), the usual link to a power supply or
//!   beam-position front end
//! - Unix domain sockets (`unix:/path`), used for local simulators
//!
//! The [`Transport`] trait is the only surface the transaction engine
//! drives. The core never touches sockets directly.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod traits;

pub use endpoint::{Endpoint, EndpointListener};
pub use error::{Result, TransportError};
pub use stream::{InstrumentStream, StreamTransport, TransportConfig};
pub use traits::{MessageEnd, Reply, Transport};
