//! Client side of the instrument control protocol.
//!
//! A [`TransactionEngine`] owns one transport and turns each request into
//! exactly one bounded exchange: retries on transport failure, one
//! reconnect on a dropped link, and a bad-reply verdict on any reply of
//! the wrong shape. [`PowerSupply`] drives it with control frames,
//! [`DeviceClient`] with variable frames.
//!
//! Every connection owns its own counters and readback cache. Nothing is
//! shared between connections and nothing here is thread-safe by itself:
//! one thread per connection, or a caller-held lock.

pub mod config;
pub mod connector;
pub mod device;
pub mod engine;
pub mod error;
pub mod stats;
pub mod status;
pub mod supply;

#[cfg(test)]
pub(crate) mod scripted;

pub use config::{ClientConfig, TransactionConfig};
pub use connector::{connect, connect_device, connect_supply, Client};
pub use device::{Catalog, DeviceClient};
pub use engine::{ControlProtocol, Protocol, TransactionEngine, VariableProtocol};
pub use error::{ClientError, Result};
pub use stats::Statistics;
pub use status::StatusReport;
pub use supply::PowerSupply;
