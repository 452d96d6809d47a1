//! Instrument control protocol for power supplies and register-mapped devices.
//!
//! One request, one reply: a client writes a frame to an instrument (or a
//! simulator) and waits for exactly one answer, retrying lost replies and
//! keeping a last-known-good copy of the remote state.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream endpoints (TCP, Unix sockets) and the `Transport` trait
//! - [`frame`]: binary variable frames, control text frames, value codecs
//! - [`server`]: variable registry, groups, curves, simulators and the accept loop (behind `server` feature)
//! - [`client`]: transaction engine, power supply and device clients (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use sllp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sllp_frame::*;
}

/// Re-export server types (requires `server` feature).
#[cfg(feature = "server")]
pub mod server {
    pub use sllp_server::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use sllp_client::*;
}
