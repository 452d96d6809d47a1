use std::time::Duration;

use sllp_frame::{Framing, CONTROL_TERMINATOR};
use sllp_transport::{Endpoint, TransportConfig};

/// Retry discipline of one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionConfig {
    /// Wait for one reply per attempt.
    pub timeout: Duration,
    /// Attempts per transaction, the first one included.
    pub max_attempts: u32,
    /// Re-establish a dropped link once per transaction.
    pub reconnect: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            max_attempts: 10,
            reconnect: true,
        }
    }
}

/// Everything needed to open a client connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub framing: Framing,
    pub transaction: TransactionConfig,
    pub transport: TransportConfig,
    /// Last octet of a control reply.
    pub control_terminator: u8,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint, framing: Framing) -> Self {
        Self {
            endpoint,
            framing,
            transaction: TransactionConfig::default(),
            transport: TransportConfig::default(),
            control_terminator: CONTROL_TERMINATOR,
        }
    }
}
