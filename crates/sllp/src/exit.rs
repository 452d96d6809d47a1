use std::fmt;
use std::io;

use sllp_client::ClientError;
use sllp_frame::FrameError;
use sllp_server::ServerError;
use sllp_transport::TransportError;

// Stable process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
/// The supply answered but reports a latched fault.
pub const DEVICE_FAULT: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::InvalidData => DATA_INVALID,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let other = match err {
        TransportError::Io(source) => return io_error(context, source),
        other => other,
    };
    let code = match &other {
        TransportError::Connect { source, .. } | TransportError::Bind { source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            PERMISSION_DENIED
        }
        TransportError::Timeout(_) => TIMEOUT,
        TransportError::InvalidEndpoint(_) => USAGE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {other}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::NoReply { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ClientError::ReconnectFailed { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        ClientError::BadReply { .. } | ClientError::Rejected { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::InvalidValue(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::Frame(err) => frame_error(context, err),
        ClientError::Transport(err) => transport_error(context, err),
    }
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Transport(err) => transport_error(context, err),
        ServerError::Frame(err) => frame_error(context, err),
        ServerError::Config(_) | ServerError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ServerError::Io(source) => io_error(context, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sllp_frame::{CommandCode, ErrorCode};

    #[test]
    fn client_failures_have_stable_codes() {
        let no_reply = ClientError::NoReply {
            attempts: 10,
            last_error: "no reply within 100ms".into(),
        };
        assert_eq!(client_error("read", no_reply).code, TIMEOUT);

        let rejected = ClientError::Rejected {
            code: ErrorCode::ReadOnly,
            request: CommandCode::WriteVariable,
        };
        assert_eq!(client_error("write", rejected).code, DATA_INVALID);

        let invalid = ClientError::InvalidValue("too wide".into());
        assert_eq!(client_error("write", invalid).code, USAGE);
    }

    #[test]
    fn transport_failures_have_stable_codes() {
        let timeout = TransportError::Timeout(Duration::from_millis(100));
        assert_eq!(transport_error("read", timeout).code, TIMEOUT);

        let refused = TransportError::Connect {
            endpoint: "127.0.0.1:1".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let err = transport_error("connect", refused);
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect: "));

        let bad = TransportError::InvalidEndpoint("nowhere".into());
        assert_eq!(transport_error("connect", bad).code, USAGE);
    }
}
