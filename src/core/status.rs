use std::fmt;

/// Backend connectivity as seen by callers of the chat adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectivityStatus {
    #[default]
    Loading,
    Ready,
    Fallback,
}

impl ConnectivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityStatus::Loading => "loading",
            ConnectivityStatus::Ready => "ready",
            ConnectivityStatus::Fallback => "fallback",
        }
    }

    /// Human-facing label used by status displays.
    pub fn label(self) -> &'static str {
        match self {
            ConnectivityStatus::Loading => "Loading",
            ConnectivityStatus::Ready => "Connected",
            ConnectivityStatus::Fallback => "Demo mode",
        }
    }

    pub fn is_settled(self) -> bool {
        !matches!(self, ConnectivityStatus::Loading)
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
