//! The transaction engine: one request, one reply, bounded retries.
//!
//! A transaction encodes the request, then makes up to
//! [`TransactionConfig::max_attempts`] send/receive attempts. Transport
//! failures are retried; a disconnect triggers at most one reconnect.
//! A reply that arrives is decoded exactly once: a shape mismatch is a
//! bad reply and is never retried.

use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use sllp_frame::{
    decode_frame, escape_reply, ControlReply, ControlRequest, FrameError, Request, Response,
    CONTROL_TERMINATOR, VARIABLE_MESSAGE_END,
};
use sllp_transport::{MessageEnd, Transport};
use tracing::{debug, warn};

use crate::config::TransactionConfig;
use crate::error::{ClientError, Result};
use crate::stats::Statistics;

/// One framing discipline as seen by the engine.
pub trait Protocol {
    type Request: fmt::Debug;
    type Reply;

    /// How the reply is delimited on the stream.
    fn message_end(&self) -> MessageEnd;

    fn encode(&self, request: &Self::Request) -> Result<Bytes>;

    /// Validate and decode the reply to `request`.
    fn decode(
        &self,
        request: &Self::Request,
        reply: &[u8],
    ) -> std::result::Result<Self::Reply, FrameError>;
}

/// `FDB:` text records.
#[derive(Debug, Clone, Copy)]
pub struct ControlProtocol {
    terminator: u8,
}

impl ControlProtocol {
    pub fn new(terminator: u8) -> Self {
        Self { terminator }
    }
}

impl Default for ControlProtocol {
    fn default() -> Self {
        Self::new(CONTROL_TERMINATOR)
    }
}

impl Protocol for ControlProtocol {
    type Request = ControlRequest;
    type Reply = ControlReply;

    fn message_end(&self) -> MessageEnd {
        MessageEnd::Terminator(self.terminator)
    }

    fn encode(&self, request: &ControlRequest) -> Result<Bytes> {
        if !request.setpoint.is_finite() {
            return Err(ClientError::InvalidValue(format!(
                "setpoint {} is not finite",
                request.setpoint
            )));
        }
        Ok(request.encode())
    }

    fn decode(
        &self,
        _request: &ControlRequest,
        reply: &[u8],
    ) -> std::result::Result<ControlReply, FrameError> {
        ControlReply::parse(reply)
    }
}

/// Binary `[command][length][payload]` frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableProtocol;

impl Protocol for VariableProtocol {
    type Request = Request;
    type Reply = Response;

    fn message_end(&self) -> MessageEnd {
        VARIABLE_MESSAGE_END
    }

    fn encode(&self, request: &Request) -> Result<Bytes> {
        Ok(request.to_frame().to_bytes()?)
    }

    /// The reply must echo the expected reply code or carry a code of the
    /// error band.
    fn decode(&self, request: &Request, reply: &[u8]) -> std::result::Result<Response, FrameError> {
        let response = Response::from_frame(&decode_frame(reply)?)?;
        let expected = request.expected_reply();
        match response {
            Response::Rejected(_) => Ok(response),
            ref echoed if echoed.command() == expected => Ok(response),
            other => Err(FrameError::UnexpectedCommand {
                expected: expected.code(),
                actual: other.command().code(),
            }),
        }
    }
}

/// Drives one connection. Exclusively owns the transport and the
/// statistics; callers serialize access.
pub struct TransactionEngine<P, T> {
    protocol: P,
    transport: T,
    config: TransactionConfig,
    stats: Statistics,
}

impl<P: Protocol, T: Transport> TransactionEngine<P, T> {
    pub fn new(protocol: P, transport: T, config: TransactionConfig) -> Self {
        Self {
            protocol,
            transport,
            config,
            stats: Statistics::default(),
        }
    }

    /// Run one transaction.
    pub fn transact(&mut self, request: &P::Request) -> Result<P::Reply> {
        self.stats.commands += 1;
        let encoded = self.protocol.encode(request)?;

        let end = self.protocol.message_end();
        let max_attempts = self.config.max_attempts.max(1);
        let started = Instant::now();
        let mut reconnected = false;
        let mut attempt = 0u32;

        let reply = loop {
            attempt += 1;
            debug!(
                remote = %self.transport.remote(),
                attempt,
                bytes = encoded.len(),
                ?request,
                "sending request"
            );
            let err = match self
                .transport
                .write_read(&encoded, end, self.config.timeout)
            {
                Ok(reply) => break reply,
                Err(err) => err,
            };

            if err.is_disconnect() && self.config.reconnect && !reconnected {
                reconnected = true;
                if let Err(source) = self.transport.reconnect() {
                    self.stats.no_replies += 1;
                    let remote = self.transport.remote();
                    warn!(%remote, error = %source, "reconnect failed");
                    return Err(ClientError::ReconnectFailed { remote, source });
                }
            }

            if attempt >= max_attempts {
                self.stats.no_replies += 1;
                warn!(
                    remote = %self.transport.remote(),
                    attempts = attempt,
                    error = %err,
                    "no reply"
                );
                return Err(ClientError::NoReply {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }
            self.stats.retries += 1;
            warn!(remote = %self.transport.remote(), attempt, error = %err, "retrying");
        };

        self.stats.record_time(started.elapsed());

        let decoded = if reply.eom {
            self.protocol.decode(request, &reply.bytes)
        } else {
            Err(FrameError::Truncated {
                what: "reply",
                needed: reply.bytes.len() + 1,
                got: reply.bytes.len(),
            })
        };
        decoded.map_err(|err| {
            self.stats.bad_replies += 1;
            let escaped = escape_reply(&reply.bytes);
            warn!(reply = %escaped, error = %err, "bad reply");
            ClientError::BadReply {
                reply: escaped,
                reason: err.to_string(),
            }
        })
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sllp_frame::{ControlFlags, ErrorCode};
    use sllp_transport::TransportError;

    use super::*;
    use crate::scripted::ScriptedTransport;

    fn control_engine(transport: ScriptedTransport) -> TransactionEngine<ControlProtocol, ScriptedTransport> {
        TransactionEngine::new(
            ControlProtocol::default(),
            transport,
            TransactionConfig::default(),
        )
    }

    fn power_on(setpoint: f64) -> ControlRequest {
        ControlRequest::new(ControlFlags::POWER_ON, setpoint)
    }

    #[test]
    fn retry_ceiling_counts_attempts() {
        let transport = ScriptedTransport::new();
        let mut engine = control_engine(transport);
        let err = engine.transact(&power_on(1.0)).unwrap_err();

        match err {
            ClientError::NoReply {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 10);
                assert!(last_error.contains("no reply within"), "{last_error}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.transport().requests().len(), 10);
        assert_eq!(engine.stats().commands, 1);
        assert_eq!(engine.stats().retries, 9);
        assert_eq!(engine.stats().no_replies, 1);
    }

    #[test]
    fn success_after_timeouts() {
        let mut transport = ScriptedTransport::new();
        transport.push_err(TransportError::Timeout(Duration::from_millis(100)));
        transport.push_err(TransportError::Timeout(Duration::from_millis(100)));
        transport.push_reply(b"#FDB:41:5.0000:4.9980\r");
        let mut engine = control_engine(transport);

        let reply = engine.transact(&power_on(5.0)).unwrap();
        assert_eq!(reply.status, 0x41);
        assert_eq!(reply.readback, 4.998);
        assert_eq!(engine.stats().retries, 2);
        assert_eq!(engine.stats().no_replies, 0);
        assert_eq!(engine.transport().requests()[0].as_ref(), b"FDB:41:5.0000\r");
    }

    #[test]
    fn bad_reply_is_not_retried() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(b"#FDB:41:5.0000\r");
        let mut engine = control_engine(transport);

        let err = engine.transact(&power_on(5.0)).unwrap_err();
        match err {
            ClientError::BadReply { reply, reason } => {
                assert_eq!(reply, "#FDB:41:5.0000\\r");
                assert!(reason.contains("expected 3 fields"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.transport().requests().len(), 1);
        assert_eq!(engine.stats().bad_replies, 1);
        assert_eq!(engine.stats().retries, 0);
    }

    #[test]
    fn unterminated_reply_is_bad() {
        let mut transport = ScriptedTransport::new();
        transport.push_partial(b"#FDB:41:5.00");
        let mut engine = control_engine(transport);
        assert!(matches!(
            engine.transact(&power_on(5.0)),
            Err(ClientError::BadReply { .. })
        ));
        assert_eq!(engine.stats().bad_replies, 1);
    }

    #[test]
    fn disconnect_reconnects_once() {
        let mut transport = ScriptedTransport::new();
        transport.push_err(TransportError::Disconnected);
        transport.push_reply(b"#FDB:01:1.0000:1.0000\r");
        let mut engine = control_engine(transport);

        engine.transact(&power_on(1.0)).unwrap();
        assert_eq!(engine.transport().reconnects(), 1);
        assert_eq!(engine.stats().retries, 1);
    }

    #[test]
    fn failed_reconnect_is_reported_not_retried() {
        let mut transport = ScriptedTransport::new();
        transport.push_err(TransportError::Disconnected);
        transport.refuse_reconnect();
        let mut engine = control_engine(transport);

        let err = engine.transact(&power_on(1.0)).unwrap_err();
        assert!(matches!(err, ClientError::ReconnectFailed { .. }));
        assert_eq!(engine.transport().requests().len(), 1);
        assert_eq!(engine.stats().no_replies, 1);
    }

    #[test]
    fn reconnect_disabled_keeps_retrying() {
        let mut transport = ScriptedTransport::new();
        transport.push_err(TransportError::Disconnected);
        transport.push_reply(b"#FDB:01:1.0000:1.0000\r");
        let config = TransactionConfig {
            reconnect: false,
            ..TransactionConfig::default()
        };
        let mut engine = TransactionEngine::new(ControlProtocol::default(), transport, config);
        engine.transact(&power_on(1.0)).unwrap();
        assert_eq!(engine.transport().reconnects(), 0);
    }

    #[test]
    fn non_finite_setpoint_is_counted_but_never_sent() {
        let mut engine = control_engine(ScriptedTransport::new());
        assert!(matches!(
            engine.transact(&power_on(f64::NAN)),
            Err(ClientError::InvalidValue(_))
        ));
        assert!(engine.transport().requests().is_empty());
        assert_eq!(engine.stats().commands, 1);
    }

    #[test]
    fn variable_reply_must_echo_expected_code() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[0xE0, 0x00]);
        transport.push_reply(&[0xE3, 0x00]);
        let mut engine = TransactionEngine::new(
            VariableProtocol,
            transport,
            TransactionConfig::default(),
        );

        let err = engine.transact(&Request::ReadVariable(5)).unwrap_err();
        assert!(matches!(err, ClientError::BadReply { .. }));

        let reply = engine.transact(&Request::ReadVariable(9)).unwrap();
        assert_eq!(reply, Response::Rejected(ErrorCode::InvalidId));
        assert_eq!(engine.stats().bad_replies, 1);
        assert_eq!(engine.stats().commands, 2);
    }
}
