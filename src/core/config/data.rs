use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BACKEND_URL_ENV: &str = "CHATBRIDGE_BACKEND_URL";
pub const DEFAULT_DEMO_BUDGET_MS: u64 = 4000;
pub const DEFAULT_DEMO_TOKEN_DELAY_MS: u64 = 80;

/// Pacing of the offline demo reply.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DemoConfig {
    /// Time spread across all tokens of one reply, in milliseconds.
    pub total_budget_ms: Option<u64>,
    /// Upper bound for the pause before a single token, in milliseconds.
    pub max_token_delay_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of an OpenAI-compatible endpoint (e.g. "http://localhost:11434/v1").
    /// Without one the client always runs in demo mode.
    pub backend_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl Config {
    /// Backend URL after applying the environment override. Blank values count
    /// as unset.
    pub fn resolved_backend_url(&self) -> Option<String> {
        let from_env = std::env::var(BACKEND_URL_ENV).ok();
        pick_backend_url(from_env.as_deref(), self.backend_url.as_deref())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// A blank override falls through to the file value.
pub(crate) fn pick_backend_url(from_env: Option<&str>, from_file: Option<&str>) -> Option<String> {
    fn non_blank(url: &str) -> Option<&str> {
        Some(url.trim()).filter(|url| !url.is_empty())
    }
    from_env
        .and_then(non_blank)
        .or_else(|| from_file.and_then(non_blank))
        .map(str::to_string)
}

impl DemoConfig {
    pub fn total_budget(&self) -> Duration {
        Duration::from_millis(self.total_budget_ms.unwrap_or(DEFAULT_DEMO_BUDGET_MS))
    }

    pub fn max_token_delay(&self) -> Duration {
        Duration::from_millis(
            self.max_token_delay_ms
                .unwrap_or(DEFAULT_DEMO_TOKEN_DELAY_MS),
        )
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/chatbridge/config.toml` → `~/.config/chatbridge/config.toml`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
