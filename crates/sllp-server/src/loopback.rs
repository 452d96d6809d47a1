//! In-process [`Transport`] wired straight to a [`Handler`].
//!
//! No sockets, no threads: each request is answered synchronously. Faults
//! (lost replies, a dropped link) are injected on demand so retry and
//! reconnect paths can be exercised deterministically.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use sllp_transport::{MessageEnd, Reply, Result, Transport, TransportError};
use tracing::trace;

use crate::handler::Handler;

pub struct Loopback<H> {
    handler: H,
    inbound: BytesMut,
    outbound: BytesMut,
    drop_replies: usize,
    connected: bool,
    refuse_reconnect: bool,
    requests: usize,
    reconnects: usize,
}

impl<H: Handler> Loopback<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            drop_replies: 0,
            connected: true,
            refuse_reconnect: false,
            requests: 0,
            reconnects: 0,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Swallow the next `count` requests; each times out instead.
    pub fn drop_next(&mut self, count: usize) {
        self.drop_replies = count;
    }

    /// Break the link. Every call fails as disconnected until
    /// [`reconnect`](Transport::reconnect) succeeds.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Make reconnect attempts fail.
    pub fn refuse_reconnect(&mut self, refuse: bool) {
        self.refuse_reconnect = refuse;
    }

    /// Requests that reached the transport, dropped ones included.
    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects
    }

    fn check_link(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }

    /// Answer one request, unless it is to be dropped.
    fn answer(&mut self, request: &[u8]) -> Option<Bytes> {
        self.requests += 1;
        if self.drop_replies > 0 {
            self.drop_replies -= 1;
            trace!(remaining = self.drop_replies, "reply dropped");
            return None;
        }
        Some(self.handler.handle(request))
    }
}

impl<H: Handler> Transport for Loopback<H> {
    fn write_read(&mut self, request: &[u8], end: MessageEnd, timeout: Duration) -> Result<Reply> {
        self.check_link()?;
        self.flush()?;
        let reply = self
            .answer(request)
            .ok_or(TransportError::Timeout(timeout))?;
        let eom = end.complete_len(&reply) == Some(reply.len());
        Ok(Reply { bytes: reply, eom })
    }

    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize> {
        self.check_link()?;
        self.inbound.extend_from_slice(bytes);
        let end = self.handler.framing().message_end();
        while let Some(len) = end.complete_len(&self.inbound) {
            let request = self.inbound.split_to(len).freeze();
            if let Some(reply) = self.answer(&request) {
                self.outbound.extend_from_slice(&reply);
            }
        }
        Ok(bytes.len())
    }

    fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes> {
        self.check_link()?;
        if self.outbound.is_empty() {
            return Err(TransportError::Timeout(timeout));
        }
        let take = self.outbound.len().min(max);
        Ok(self.outbound.split_to(take).freeze())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_link()?;
        self.outbound.clear();
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        if self.refuse_reconnect {
            return Err(TransportError::Connect {
                endpoint: self.remote(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        self.connected = true;
        self.inbound.clear();
        self.outbound.clear();
        Ok(())
    }

    fn remote(&self) -> String {
        format!("loopback:{}", self.handler.framing())
    }
}
