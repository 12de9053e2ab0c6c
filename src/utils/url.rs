//! Endpoint URL construction that tolerates stray slashes on either side.

/// Joins a backend base URL and an endpoint path with exactly one slash.
///
/// ```
/// use chatbridge::utils::url::endpoint_url;
///
/// assert_eq!(
///     endpoint_url("http://localhost:11434/v1/", "/chat/completions"),
///     "http://localhost:11434/v1/chat/completions"
/// );
/// ```
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}
