//! Text extraction from backend responses.
//!
//! Backends disagree on where the reply text lives, so each response kind has
//! an ordered list of JSON pointers. The first pointer that resolves to a
//! truthy value wins; when none does the text is the empty string.

use serde_json::Value;

const STREAM_EVENT_FIELDS: &[&str] = &["/choices/0/delta/content", "/data", "/text"];
const COMPLETION_FIELDS: &[&str] = &["/choices/0/message/content", "/data", "/text"];
const GENERATED_FIELDS: &[&str] = &["/output", "/text", "/choices/0/text"];
const CHAT_HELPER_FIELDS: &[&str] = &["/text", "/content"];

/// Text of one element of an incremental chat-completion result.
pub fn stream_event_text(event: &Value) -> String {
    first_text(event, STREAM_EVENT_FIELDS)
}

/// Text of a non-incremental chat-completion response.
pub fn completion_text(response: &Value) -> String {
    first_text(response, COMPLETION_FIELDS)
}

/// Text of a generate-text response.
pub fn generated_text(response: &Value) -> String {
    first_text(response, GENERATED_FIELDS)
}

/// Text of a module-level chat helper response.
pub fn chat_helper_text(response: &Value) -> String {
    first_text(response, CHAT_HELPER_FIELDS)
}

pub fn first_text(value: &Value, pointers: &[&str]) -> String {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(truthy_text))
        .unwrap_or_default()
}

/// Non-empty strings, non-zero numbers and `true` count as text; everything
/// else is skipped. Objects and arrays are skipped even when non-empty, since
/// they have no meaningful text form.
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(number_text(n)),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Whole floats print without a fractional part (`42.0` becomes `42`).
fn number_text(number: &serde_json::Number) -> String {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() <= MAX_EXACT => {
            format!("{}", float as i64)
        }
        _ => number.to_string(),
    }
}

/// One-line summary of an error payload: `error.message`, a string `error`,
/// or a top-level `message`, with runs of whitespace collapsed.
pub fn error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_event_prefers_delta_content() {
        let event = json!({
            "choices": [{"delta": {"content": "Hi"}}],
            "data": "ignored",
            "text": "ignored too"
        });
        assert_eq!(stream_event_text(&event), "Hi");
    }

    #[test]
    fn stream_event_falls_back_to_data_then_text() {
        assert_eq!(stream_event_text(&json!({"data": "d", "text": "t"})), "d");
        assert_eq!(stream_event_text(&json!({"data": "", "text": "t"})), "t");
        assert_eq!(
            stream_event_text(&json!({"choices": [{"delta": {"content": ""}}], "text": "t"})),
            "t"
        );
    }

    #[test]
    fn malformed_events_coalesce_to_empty_text() {
        assert_eq!(stream_event_text(&json!({})), "");
        assert_eq!(stream_event_text(&json!({"choices": []})), "");
        assert_eq!(stream_event_text(&json!("bare string")), "");
        assert_eq!(stream_event_text(&Value::Null), "");
    }

    #[test]
    fn numbers_and_true_are_rendered_as_text() {
        assert_eq!(generated_text(&json!({"output": 42})), "42");
        assert_eq!(generated_text(&json!({"output": 0, "text": "zero"})), "zero");
        assert_eq!(chat_helper_text(&json!({"text": true})), "true");
        assert_eq!(chat_helper_text(&json!({"text": false})), "");
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        assert_eq!(generated_text(&json!({"output": 42.0})), "42");
        assert_eq!(generated_text(&json!({"output": -3.0})), "-3");
        assert_eq!(generated_text(&json!({"output": 2.5})), "2.5");
        assert_eq!(generated_text(&json!({"output": 0.0, "text": "t"})), "t");
    }

    #[test]
    fn objects_and_arrays_are_not_text() {
        let response = json!({"output": {"text": "nested"}, "text": ["a"], "choices": [{"text": "c"}]});
        assert_eq!(generated_text(&response), "c");
        assert_eq!(chat_helper_text(&json!({"text": {"k": 1}})), "");
    }

    #[test]
    fn completion_reads_first_choice_message() {
        let response = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "full reply"}},
                {"message": {"role": "assistant", "content": "second choice"}}
            ]
        });
        assert_eq!(completion_text(&response), "full reply");
        assert_eq!(completion_text(&json!({"text": "plain"})), "plain");
    }

    #[test]
    fn generated_text_priority_is_output_text_choice() {
        let response = json!({"choices": [{"text": "c"}], "text": "t", "output": "o"});
        assert_eq!(generated_text(&response), "o");
        assert_eq!(generated_text(&json!({"choices": [{"text": "c"}]})), "c");
    }

    #[test]
    fn chat_helper_reads_text_then_content() {
        assert_eq!(chat_helper_text(&json!({"content": "c"})), "c");
        assert_eq!(chat_helper_text(&json!({"text": "t", "content": "c"})), "t");
    }

    #[test]
    fn error_summary_collapses_whitespace() {
        let value = json!({"error": {"message": "model\n  overloaded", "type": "x"}});
        assert_eq!(error_summary(&value).as_deref(), Some("model overloaded"));
        assert_eq!(
            error_summary(&json!({"error": "bad key"})).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            error_summary(&json!({"message": "nope"})).as_deref(),
            Some("nope")
        );
        assert_eq!(error_summary(&json!({"status": "failed"})), None);
    }
}
