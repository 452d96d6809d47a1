use sllp_frame::{ControlFlags, ControlReply, ControlRequest};
use sllp_transport::Transport;
use tracing::debug;

use crate::config::TransactionConfig;
use crate::engine::{ControlProtocol, TransactionEngine};
use crate::error::Result;
use crate::stats::Statistics;
use crate::status::StatusReport;

/// A power supply driven with control frames.
///
/// Every command carries the current power state and slew mode, so a
/// setpoint change never switches the supply on or off by accident. The
/// cached status, setpoint and readback are the last confirmed values and
/// survive failed transactions.
pub struct PowerSupply<T> {
    engine: TransactionEngine<ControlProtocol, T>,
    status: u8,
    setpoint: f64,
    readback: f64,
    slew: bool,
}

impl<T: Transport> PowerSupply<T> {
    pub fn new(transport: T, config: TransactionConfig) -> Self {
        Self::with_protocol(ControlProtocol::default(), transport, config)
    }

    pub fn with_protocol(protocol: ControlProtocol, transport: T, config: TransactionConfig) -> Self {
        Self {
            engine: TransactionEngine::new(protocol, transport, config),
            status: 0,
            setpoint: 0.0,
            readback: 0.0,
            slew: false,
        }
    }

    /// Write a new current setpoint.
    pub fn set_current(&mut self, setpoint: f64) -> Result<ControlReply> {
        let reply = self.command(self.mode_flags(self.power_on()), setpoint)?;
        self.engine.stats_mut().setpoint_updates += 1;
        Ok(reply)
    }

    pub fn set_power(&mut self, on: bool) -> Result<ControlReply> {
        self.command(self.mode_flags(on), self.setpoint)
    }

    /// Clear latched faults.
    pub fn reset(&mut self) -> Result<ControlReply> {
        let flags = self.mode_flags(self.power_on()) | ControlFlags::RESET;
        self.command(flags, self.setpoint)
    }

    /// Switch slew-rate limiting; applied to the supply immediately.
    pub fn set_slew(&mut self, enabled: bool) -> Result<ControlReply> {
        let previous = self.slew;
        self.slew = enabled;
        let result = self.command(self.mode_flags(self.power_on()), self.setpoint);
        if result.is_err() {
            self.slew = previous;
        }
        result
    }

    /// Fetch status and readback without changing anything.
    pub fn refresh(&mut self) -> Result<ControlReply> {
        self.command(ControlFlags::READBACK_ONLY, self.setpoint)
    }

    /// Send one raw control request and cache the reply.
    pub fn command(&mut self, flags: ControlFlags, setpoint: f64) -> Result<ControlReply> {
        let reply = self.engine.transact(&ControlRequest::new(flags, setpoint))?;
        self.status = reply.status;
        self.setpoint = reply.setpoint;
        self.readback = reply.readback;
        debug!(
            status = reply.status,
            setpoint = reply.setpoint,
            readback = reply.readback,
            "supply state updated"
        );
        Ok(reply)
    }

    fn mode_flags(&self, power_on: bool) -> ControlFlags {
        let mut flags = ControlFlags::empty();
        flags.set(ControlFlags::POWER_ON, power_on);
        flags.set(ControlFlags::ENABLE_SLEW, self.slew);
        flags
    }

    /// Cached power state.
    pub fn power_on(&self) -> bool {
        self.status().power_on
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::decode(self.status)
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn readback(&self) -> f64 {
        self.readback
    }

    pub fn slew_enabled(&self) -> bool {
        self.slew
    }

    pub fn stats(&self) -> &Statistics {
        self.engine.stats()
    }

    pub fn stats_mut(&mut self) -> &mut Statistics {
        self.engine.stats_mut()
    }

    pub fn engine(&self) -> &TransactionEngine<ControlProtocol, T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TransactionEngine<ControlProtocol, T> {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::scripted::ScriptedTransport;

    fn supply(transport: ScriptedTransport) -> PowerSupply<ScriptedTransport> {
        PowerSupply::new(transport, TransactionConfig::default())
    }

    #[test]
    fn power_on_reply_updates_cache() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(b"#FDB:41:5.0000:4.9980\r");
        let mut supply = supply(transport);

        supply
            .command(ControlFlags::POWER_ON, 5.0)
            .expect("scripted reply is well formed");
        assert_eq!(
            supply.engine().transport().requests()[0].as_ref(),
            b"FDB:41:5.0000\r"
        );
        assert!(supply.status().power_on);
        assert_eq!(supply.readback(), 4.998);
        assert_eq!(supply.setpoint(), 5.0);
        assert_eq!(supply.stats().retries, 0);
        assert_eq!(supply.stats().commands, 1);
    }

    #[test]
    fn bad_reply_keeps_last_known_good() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(b"#FDB:01:2.0000:1.9000\r");
        transport.push_reply(b"#FDB:01:3.0000\r");
        let mut supply = supply(transport);

        supply.set_current(2.0).unwrap();
        let err = supply.set_current(3.0).unwrap_err();
        assert!(matches!(err, ClientError::BadReply { .. }));
        assert_eq!(supply.setpoint(), 2.0);
        assert_eq!(supply.readback(), 1.9);
        assert!(supply.power_on());
        assert_eq!(supply.stats().bad_replies, 1);
        assert_eq!(supply.stats().setpoint_updates, 1);
    }

    #[test]
    fn commands_preserve_power_and_slew() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(b"#FDB:01:0.0000:0.0000\r");
        transport.push_reply(b"#FDB:01:0.0000:0.0000\r");
        transport.push_reply(b"#FDB:01:4.0000:0.5000\r");
        transport.push_reply(b"#FDB:01:4.0000:1.0000\r");
        transport.push_reply(b"#FDB:01:4.0000:1.5000\r");
        let mut supply = supply(transport);

        supply.set_power(true).unwrap();
        supply.set_slew(true).unwrap();
        supply.set_current(4.0).unwrap();
        supply.reset().unwrap();
        supply.refresh().unwrap();

        let sent: Vec<&[u8]> = supply
            .engine()
            .transport()
            .requests()
            .iter()
            .map(|r| r.as_ref())
            .collect();
        assert_eq!(
            sent,
            vec![
                &b"FDB:41:0.0000\r"[..],
                &b"FDB:51:0.0000\r"[..],
                &b"FDB:51:4.0000\r"[..],
                &b"FDB:71:4.0000\r"[..],
                &b"FDB:81:4.0000\r"[..],
            ]
        );
        assert_eq!(supply.readback(), 1.5);
    }

    #[test]
    fn failed_slew_change_is_rolled_back() {
        let mut supply = supply(ScriptedTransport::new());
        assert!(matches!(
            supply.set_slew(true),
            Err(ClientError::NoReply { .. })
        ));
        assert!(!supply.slew_enabled());
        assert_eq!(supply.stats().no_replies, 1);
    }
}
