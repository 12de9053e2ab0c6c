//! Server-sent event decoding for incremental chat-completion responses.

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use serde_json::Value;
use tracing::warn;

use super::{BackendError, EventStream};
use crate::api::extract::error_summary;

/// Classification of one line of an event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    Event(Value),
    Done,
    Skip,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Parses one trimmed line. Error payloads (an `error` member without
/// `choices`) and unparsable payloads are reported as stream failures.
pub fn parse_sse_line(line: &str) -> Result<SseLine, BackendError> {
    let Some(payload) = extract_data_payload(line) else {
        return Ok(SseLine::Skip);
    };

    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if payload.trim().is_empty() {
        return Ok(SseLine::Skip);
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => {
            if value.get("error").is_some() && value.get("choices").is_none() {
                let summary =
                    error_summary(&value).unwrap_or_else(|| "unknown error".to_string());
                return Err(BackendError::Stream(summary));
            }
            Ok(SseLine::Event(value))
        }
        Err(_) => Err(BackendError::Stream(format!(
            "unparsable event: {}",
            payload.trim()
        ))),
    }
}

/// Turns a raw byte stream into parsed events. Ends at `[DONE]` or when the
/// bytes run out; a transport error ends the stream with that error.
pub fn event_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<BackendError> + Send + 'static,
{
    Box::pin(decode_events(bytes))
}

fn decode_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<Value, BackendError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<BackendError> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        while !done {
            let Some(chunk) = bytes.next().await else {
                break;
            };
            let chunk = chunk.map_err(interrupted)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline_pos) = memchr(b'\n', &buffer) {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                let Some(parsed) = decode_line(&line[..newline_pos])? else {
                    continue;
                };
                match parsed {
                    SseLine::Event(value) => {
                        yield value;
                    }
                    SseLine::Done => {
                        done = true;
                        break;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        if !done && !buffer.is_empty() {
            if let Some(SseLine::Event(value)) = decode_line(&buffer)? {
                yield value;
            }
        }
    }
}

fn interrupted<E: Into<BackendError>>(err: E) -> BackendError {
    match err.into() {
        BackendError::Stream(reason) => BackendError::Stream(reason),
        other => BackendError::Stream(other.to_string()),
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<SseLine>, BackendError> {
    match std::str::from_utf8(raw) {
        Ok(line) => parse_sse_line(line.trim()).map(Some),
        Err(err) => {
            warn!(error = %err, "Skipping invalid UTF-8 in event stream");
            Ok(None)
        }
    }
}
