//! Remote side of the instrument control protocol.
//!
//! A [`Device`] holds the variable registry, the group table and the curve
//! store and answers variable frames; a [`SimulatedSupply`] answers control
//! frames. Either one is a [`Handler`], served over sockets by [`Server`]
//! or in-process by [`Loopback`].

pub mod config;
pub mod curve;
pub mod device;
pub mod error;
pub mod group;
pub mod handler;
pub mod listener;
pub mod loopback;
pub mod registry;
pub mod supply;

pub use config::{
    CurveConfig, DeviceConfig, ServerConfig, VariableConfig, MAX_CONFIG_FILE_SIZE, MAX_CURVES,
    MAX_VARIABLES,
};
pub use curve::{Curve, CurveStore, TransferState};
pub use device::Device;
pub use error::{DeviceError, Result, ServerError};
pub use group::{Group, GroupManager};
pub use handler::Handler;
pub use listener::Server;
pub use loopback::Loopback;
pub use registry::VariableRegistry;
pub use supply::SimulatedSupply;
