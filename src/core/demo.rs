//! Offline demo replies.
//!
//! Echoes the most recent user message back inside a fixed template and
//! streams it token by token, so the chat loop behaves the same with or
//! without a backend.

use std::sync::LazyLock;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use regex::Regex;
use tokio::time::Instant;

use super::config::DemoConfig;
use super::message::{last_user_content, Message};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Timing of demo tokens: each token waits
/// `min(max_token_delay, total_budget / token_count)` before it is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoPacing {
    pub total_budget: Duration,
    pub max_token_delay: Duration,
}

impl Default for DemoPacing {
    fn default() -> Self {
        Self::from_config(&DemoConfig::default())
    }
}

impl DemoPacing {
    pub fn from_config(config: &DemoConfig) -> Self {
        Self {
            total_budget: config.total_budget(),
            max_token_delay: config.max_token_delay(),
        }
    }

    /// No delays at all.
    pub const fn immediate() -> Self {
        Self {
            total_budget: Duration::ZERO,
            max_token_delay: Duration::ZERO,
        }
    }

    /// Per-token delay in whole milliseconds, so `token_count` delays never
    /// add up to more than the total budget.
    pub fn token_delay(&self, token_count: usize) -> Duration {
        let count = u128::try_from(token_count.max(1)).unwrap_or(u128::MAX);
        let per_token_ms = self.total_budget.as_millis() / count;
        let per_token = Duration::from_millis(u64::try_from(per_token_ms).unwrap_or(u64::MAX));
        per_token.min(self.max_token_delay)
    }
}

pub fn demo_reply(conversation: &[Message]) -> String {
    format!(
        "Demo mode: I received your message: \"{}\"",
        last_user_content(conversation)
    )
}

/// Splits text into alternating word and whitespace tokens. Separators are
/// kept, so joining the tokens gives back the input.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut last_end = 0;
    for separator in WHITESPACE_RUN.find_iter(text) {
        tokens.push(text[last_end..separator.start()].to_string());
        tokens.push(separator.as_str().to_string());
        last_end = separator.end();
    }
    tokens.push(text[last_end..].to_string());
    tokens
}

/// The demo reply for `conversation`, paced by `pacing`. Never fails.
pub fn demo_stream(
    conversation: &[Message],
    pacing: DemoPacing,
) -> impl Stream<Item = String> + Send + 'static {
    let tokens = tokenize(&demo_reply(conversation));
    let delay = pacing.token_delay(tokens.len());
    stream! {
        // Deadlines are measured from the first token, so timer rounding on
        // one sleep is not carried into the next.
        let start = Instant::now();
        for (index, token) in tokens.into_iter().enumerate() {
            if !delay.is_zero() {
                let emitted = u32::try_from(index + 1).unwrap_or(u32::MAX);
                tokio::time::sleep_until(start + delay * emitted).await;
            }
            yield token;
        }
    }
}
