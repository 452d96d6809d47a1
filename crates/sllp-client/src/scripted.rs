//! Transport double that replays a script of outcomes.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use sllp_transport::{MessageEnd, Reply, Result, Transport, TransportError};

/// Each `write_read` pops the next scripted outcome; an empty script times
/// out.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: VecDeque<Result<Reply>>,
    requests: Vec<Bytes>,
    reconnects: usize,
    refuse_reconnect: bool,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_reply(&mut self, bytes: &[u8]) {
        self.script.push_back(Ok(Reply {
            bytes: Bytes::copy_from_slice(bytes),
            eom: true,
        }));
    }

    pub(crate) fn push_partial(&mut self, bytes: &[u8]) {
        self.script.push_back(Ok(Reply {
            bytes: Bytes::copy_from_slice(bytes),
            eom: false,
        }));
    }

    pub(crate) fn push_err(&mut self, err: TransportError) {
        self.script.push_back(Err(err));
    }

    pub(crate) fn refuse_reconnect(&mut self) {
        self.refuse_reconnect = true;
    }

    pub(crate) fn requests(&self) -> &[Bytes] {
        &self.requests
    }

    pub(crate) fn reconnects(&self) -> usize {
        self.reconnects
    }
}

impl Transport for ScriptedTransport {
    fn write_read(&mut self, request: &[u8], _end: MessageEnd, timeout: Duration) -> Result<Reply> {
        self.requests.push(Bytes::copy_from_slice(request));
        self.script
            .pop_front()
            .unwrap_or(Err(TransportError::Timeout(timeout)))
    }

    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize> {
        self.requests.push(Bytes::copy_from_slice(bytes));
        Ok(bytes.len())
    }

    fn read(&mut self, _max: usize, timeout: Duration) -> Result<Bytes> {
        match self.script.pop_front() {
            Some(Ok(reply)) => Ok(reply.bytes),
            Some(Err(err)) => Err(err),
            None => Err(TransportError::Timeout(timeout)),
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        if self.refuse_reconnect {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    fn remote(&self) -> String {
        "scripted".to_string()
    }
}
