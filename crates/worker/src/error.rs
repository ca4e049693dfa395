//! Structured errors on the host wire.
//!
//! Numeric codes are fixed so hosts can branch without parsing messages.

use minaret_core::Error;
use serde::{Deserialize, Serialize};

/// Error object carried in a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: i32,
    pub message: String,
}

impl WireError {
    /// A line that was not a valid inbound envelope.
    pub fn parse(message: impl Into<String>) -> Self {
        Self { code: -32700, message: message.into() }
    }
}

impl From<&Error> for WireError {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::InvalidInput(_) => -32602,
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => -32002,
            Error::InvalidUrl(_) => -32003,
            Error::Network(_) => -32004,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::InstallFailed { .. } => -32010,
            Error::Notification(_) => -32011,
            Error::HostClosed => -32012,
        };

        WireError { code, message: err.to_string() }
    }
}
