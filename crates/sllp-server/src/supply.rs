use bytes::Bytes;
use sllp_frame::{ControlFlags, ControlReply, ControlRequest, Framing, SupplyStatus};
use tracing::{debug, warn};

use crate::handler::Handler;

/// Reply sent for a record that is not a control request.
const NAK: &[u8] = b"?\r";

/// A power supply answering control frames.
///
/// The power bit follows each request, a reset clears latched faults, and
/// the readback follows the setpoint (ramped by `slew_step` per request
/// while slew limiting is on). The readback reads zero while powered off.
#[derive(Debug, Clone)]
pub struct SimulatedSupply {
    status: SupplyStatus,
    setpoint: f64,
    readback: f64,
    slew_step: f64,
}

impl Default for SimulatedSupply {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl SimulatedSupply {
    pub fn new(slew_step: f64) -> Self {
        Self {
            status: SupplyStatus::empty(),
            setpoint: 0.0,
            readback: 0.0,
            slew_step: slew_step.abs(),
        }
    }

    /// Latch fault bits, as a tripped interlock would.
    pub fn trip(&mut self, faults: SupplyStatus) {
        self.status |= faults & SupplyStatus::FAULTS;
    }

    pub fn status(&self) -> SupplyStatus {
        self.status
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn readback(&self) -> f64 {
        self.readback
    }

    /// Apply one request and report the resulting state.
    pub fn apply(&mut self, request: &ControlRequest) -> ControlReply {
        let flags = request.flags;
        if !flags.contains(ControlFlags::READBACK_ONLY) {
            if flags.contains(ControlFlags::RESET) {
                self.status.remove(SupplyStatus::FAULTS);
            }
            self.status
                .set(SupplyStatus::POWER_ON, flags.contains(ControlFlags::POWER_ON));
            self.setpoint = request.setpoint;
            self.readback = self.next_readback(flags.contains(ControlFlags::ENABLE_SLEW));
        }
        ControlReply {
            status: self.status.bits(),
            setpoint: self.setpoint,
            readback: self.readback,
        }
    }

    fn next_readback(&self, slew: bool) -> f64 {
        if !self.status.contains(SupplyStatus::POWER_ON) {
            return 0.0;
        }
        if !slew {
            return self.setpoint;
        }
        let delta = (self.setpoint - self.readback).clamp(-self.slew_step, self.slew_step);
        self.readback + delta
    }
}

impl Handler for SimulatedSupply {
    fn framing(&self) -> Framing {
        Framing::Control
    }

    fn handle(&mut self, request: &[u8]) -> Bytes {
        match ControlRequest::parse(request) {
            Ok(parsed) => {
                let reply = self.apply(&parsed);
                debug!(
                    control = parsed.control(),
                    setpoint = parsed.setpoint,
                    status = reply.status,
                    readback = reply.readback,
                    "control request served"
                );
                reply.encode()
            }
            Err(err) => {
                warn!(%err, "control request rejected");
                Bytes::from_static(NAK)
            }
        }
    }
}
