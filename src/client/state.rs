use std::fmt;

use chrono::{DateTime, Utc};

use crate::fetch::Reading;

/// User-facing classification of a failed fetch. Exactly one category is
/// recorded per failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    TimedOut,
    NoConnectivity,
    ConnectionLost,
    NetworkError,
    ServerError(u16),
    InvalidResponse,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::TimedOut => write!(f, "Request timed out"),
            ErrorCategory::NoConnectivity => write!(f, "No internet connection"),
            ErrorCategory::ConnectionLost => write!(f, "Network connection lost"),
            ErrorCategory::NetworkError => write!(f, "Network error"),
            ErrorCategory::ServerError(code) => write!(f, "Server error (HTTP {})", code),
            ErrorCategory::InvalidResponse => write!(f, "Invalid server response"),
        }
    }
}

/// The coordinator's state as read by the presentation layer. Previously
/// loaded data survives a failure so the UI can keep showing the last good
/// reading next to the error message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub data: Option<Reading>,
    pub is_loading: bool,
    pub error: Option<ErrorCategory>,
    pub last_update: Option<DateTime<Utc>>,
}
