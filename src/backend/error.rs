use std::error::Error;
use std::fmt;

/// Failure to bring up the backend module. The adapter reacts by switching to
/// demo mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No backend location is configured.
    NotConfigured,
    /// The backend could not be reached.
    Unreachable(String),
    /// The backend answered the probe with a non-success status.
    Rejected { status: u16, summary: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotConfigured => write!(f, "no backend configured"),
            LoadError::Unreachable(reason) => write!(f, "backend unreachable: {reason}"),
            LoadError::Rejected { status, summary } => {
                write!(f, "backend rejected load probe ({status}): {summary}")
            }
        }
    }
}

impl Error for LoadError {}

/// Failure of a single backend capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Constructing a client from the loaded module failed.
    Construct(String),
    /// The request never produced a response.
    Transport(String),
    /// The backend answered with a non-success status.
    Status { status: u16, summary: String },
    /// The response body could not be decoded.
    Decode(String),
    /// An incremental result broke off or reported an error mid-way.
    Stream(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Construct(reason) => write!(f, "client construction failed: {reason}"),
            BackendError::Transport(reason) => write!(f, "request failed: {reason}"),
            BackendError::Status { status, summary } => {
                write!(f, "backend returned {status}: {summary}")
            }
            BackendError::Decode(reason) => write!(f, "malformed response: {reason}"),
            BackendError::Stream(reason) => write!(f, "stream interrupted: {reason}"),
        }
    }
}

impl Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}
