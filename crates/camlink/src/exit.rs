use std::fmt;
use std::io;

use camlink_replay::ReplayError;
use camlink_session::SessionError;
use camlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
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
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    // Every transport failure carries an io source; classify by its kind.
    match err {
        TransportError::Connect { source, .. }
        | TransportError::Request(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn replay_error(context: &str, err: ReplayError) -> CliError {
    match err {
        ReplayError::Io { source, .. } => io_error(context, source),
        ReplayError::NotFound { .. } | ReplayError::Metadata { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Config(_) | SessionError::ReplayNotConfigured => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Replay(err) => replay_error(context, err),
        SessionError::Decode(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SessionError::DeviceInit(_) => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
