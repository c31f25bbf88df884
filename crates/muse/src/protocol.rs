//! Tool-call wire protocol embedded in assistant text.
//!
//! Models emit structured tool invocations inline inside otherwise free-form
//! text, delimited by literal markers:
//!
//! ```text
//! :::TOOL_CALL:::
//! { "name": "search_web", "args": { "query": "..." } }
//! :::END_TOOL_CALL:::
//! ```
//!
//! Because the surrounding text arrives as a growing stream, [`classify`] is a
//! pure function of its input: it can be re-run on every delta without side
//! effects, and it never reports a call as complete before the closing
//! delimiter has been seen.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const TOOL_CALL_OPEN: &str = ":::TOOL_CALL:::";
pub const TOOL_CALL_CLOSE: &str = ":::END_TOOL_CALL:::";
/// Legacy single-line form, terminated by end of line. Always complete.
pub const LEGACY_TOOL_CALL: &str = "TOOL_CALL: ";
/// Marker for a machine-readable payload appended after a tool result's
/// human-readable portion. Not a tool call; stripped for display.
pub const JSON_DATA_MARKER: &str = "json_data: ";

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r#""name"\s*:\s*"([^"]*)""#).unwrap();
    static ref TOOL_BLOCK_RE: Regex =
        Regex::new(r"(?s):::TOOL_CALL:::.*?:::END_TOOL_CALL:::").unwrap();
    static ref OPEN_TAIL_RE: Regex = Regex::new(r"(?s):::TOOL_CALL:::.*\z").unwrap();
    static ref LEGACY_LINE_RE: Regex = Regex::new(r"(?m)^[ \t]*TOOL_CALL: .*$").unwrap();
}

/// A fully decoded tool invocation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolInvocation {
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// Result of classifying a (possibly truncated) content buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolScan {
    /// No tool markers present.
    None,
    /// An opening delimiter has streamed in but the closing one has not.
    /// `name` is extracted leniently for display only; the payload may be
    /// invalid JSON mid-stream and is never fully decoded here.
    Partial { name: Option<String> },
    Complete(ToolInvocation),
    /// Both delimiters present but the payload does not decode. A data
    /// value, never an error: consumers render it as a recoverable notice.
    Malformed,
}

/// Classify a content buffer, extracting zero-or-one tool invocation.
///
/// The substring between the *last* opening delimiter and its closing
/// delimiter is decoded, so one call per message is supported even when the
/// model repeats earlier text. The modern delimiter-pair form takes
/// precedence over the legacy single-line form when both are present.
pub fn classify(content: &str) -> ToolScan {
    if let Some(open) = content.rfind(TOOL_CALL_OPEN) {
        let after = &content[open + TOOL_CALL_OPEN.len()..];
        return match after.find(TOOL_CALL_CLOSE) {
            Some(close) => decode_payload(&after[..close]),
            None => ToolScan::Partial {
                name: peek_name(after),
            },
        };
    }

    if let Some(pos) = content.find(LEGACY_TOOL_CALL) {
        let rest = &content[pos + LEGACY_TOOL_CALL.len()..];
        let line = rest.lines().next().unwrap_or("");
        return decode_payload(line);
    }

    ToolScan::None
}

fn decode_payload(payload: &str) -> ToolScan {
    let cleaned = strip_code_fence(payload);
    match serde_json::from_str::<ToolInvocation>(cleaned) {
        Ok(invocation) => ToolScan::Complete(invocation),
        Err(_) => ToolScan::Malformed,
    }
}

fn peek_name(partial: &str) -> Option<String> {
    NAME_RE
        .captures(partial)
        .map(|caps| caps[1].to_string())
        .filter(|name| !name.is_empty())
}

/// Models occasionally wrap the JSON payload in a markdown code fence.
pub(crate) fn strip_code_fence(payload: &str) -> &str {
    let mut s = payload.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest
            .strip_prefix("json")
            .unwrap_or(rest)
            .trim_start_matches(['\r', '\n', ' ']);
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }
    s
}

/// Remove tool-call markers (modern blocks, a dangling open marker, and
/// legacy lines) from content. The `json_data:` suffix is kept.
pub fn strip_markers(content: &str) -> String {
    let without_blocks = TOOL_BLOCK_RE.replace_all(content, "");
    let without_tail = OPEN_TAIL_RE.replace_all(&without_blocks, "");
    let without_legacy = LEGACY_LINE_RE.replace_all(&without_tail, "");
    without_legacy.trim().to_string()
}

/// Everything [`strip_markers`] removes, plus the `json_data:` suffix.
/// Used for any text shown to a human.
pub fn clean_display(content: &str) -> String {
    let stripped = strip_markers(content);
    match stripped.rfind(JSON_DATA_MARKER) {
        Some(pos) => stripped[..pos].trim_end().to_string(),
        None => stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn modern(payload: &str) -> String {
        format!("{}\n{}\n{}", TOOL_CALL_OPEN, payload, TOOL_CALL_CLOSE)
    }

    // ---- classification ----

    #[test]
    fn test_plain_text_is_none() {
        assert_eq!(classify("The weather in Paris is mild."), ToolScan::None);
        assert_eq!(classify(""), ToolScan::None);
    }

    #[test]
    fn test_complete_modern_call() {
        let content = modern(r#"{"name":"search_web","args":{"query":"Bitcoin price"}}"#);
        match classify(&content) {
            ToolScan::Complete(inv) => {
                assert_eq!(inv.name, "search_web");
                assert_eq!(inv.arg_str("query"), Some("Bitcoin price"));
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_surrounding_prose_is_ignored() {
        let content = format!(
            "Let me look that up.\n{}\nOne moment.",
            modern(r#"{"name":"search_web","args":{"query":"rust"}}"#)
        );
        assert!(matches!(classify(&content), ToolScan::Complete(_)));
    }

    #[test]
    fn test_partial_without_closing_delimiter() {
        let content = format!("{}\n{{ \"name\": \"generate_image\", \"args\"", TOOL_CALL_OPEN);
        assert_eq!(
            classify(&content),
            ToolScan::Partial {
                name: Some("generate_image".to_string())
            }
        );
    }

    #[test]
    fn test_partial_before_name_has_streamed() {
        let content = format!("{}\n{{ \"na", TOOL_CALL_OPEN);
        assert_eq!(classify(&content), ToolScan::Partial { name: None });
    }

    #[test]
    fn test_malformed_payload_between_delimiters() {
        let content = modern("{ this is not json }");
        assert_eq!(classify(&content), ToolScan::Malformed);
    }

    #[test]
    fn test_missing_name_field_is_malformed() {
        let content = modern(r#"{"args":{"query":"x"}}"#);
        assert_eq!(classify(&content), ToolScan::Malformed);
    }

    #[test]
    fn test_missing_args_defaults_to_empty_map() {
        let content = modern(r#"{"name":"index_codebase"}"#);
        match classify(&content) {
            ToolScan::Complete(inv) => assert!(inv.args.is_empty()),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_code_fenced_payload_decodes() {
        let content = modern("```json\n{\"name\":\"create_artifact\",\"args\":{}}\n```");
        assert!(matches!(classify(&content), ToolScan::Complete(_)));
    }

    #[test]
    fn test_last_opening_delimiter_wins() {
        let content = format!(
            "{}\ngarbage\n{}",
            TOOL_CALL_OPEN,
            modern(r#"{"name":"search_web","args":{"query":"second"}}"#)
        );
        match classify(&content) {
            ToolScan::Complete(inv) => assert_eq!(inv.arg_str("query"), Some("second")),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    // ---- legacy form ----

    #[test]
    fn test_legacy_single_line_is_complete() {
        let content = "TOOL_CALL: {\"name\":\"search_web\",\"args\":{\"query\":\"btc\"}}\nmore text";
        match classify(content) {
            ToolScan::Complete(inv) => assert_eq!(inv.name, "search_web"),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_bad_json_is_malformed() {
        assert_eq!(classify("TOOL_CALL: {broken"), ToolScan::Malformed);
    }

    #[test]
    fn test_modern_takes_precedence_over_legacy() {
        let content = format!(
            "TOOL_CALL: {{\"name\":\"old\",\"args\":{{}}}}\n{}",
            modern(r#"{"name":"new","args":{}}"#)
        );
        match classify(&content) {
            ToolScan::Complete(inv) => assert_eq!(inv.name, "new"),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    // ---- streaming properties ----

    #[test]
    fn test_classifier_is_idempotent() {
        let samples = [
            "plain".to_string(),
            modern(r#"{"name":"search_web","args":{"query":"q"}}"#),
            format!("{}\n{{ \"name\": \"x\"", TOOL_CALL_OPEN),
            modern("not json"),
        ];
        for content in &samples {
            assert_eq!(classify(content), classify(content));
        }
    }

    #[test]
    fn test_prefixes_never_complete_before_closing_delimiter() {
        let full = format!(
            "Searching now.\n{}",
            modern(r#"{"name":"search_web","args":{"query":"Bitcoin price"}}"#)
        );
        let close_at = full.find(TOOL_CALL_CLOSE).unwrap() + TOOL_CALL_CLOSE.len();
        for (i, _) in full.char_indices() {
            let scan = classify(&full[..i]);
            if i < close_at {
                assert!(
                    !matches!(scan, ToolScan::Complete(_)),
                    "prefix of length {} classified complete too early",
                    i
                );
            }
        }
        assert!(matches!(classify(&full), ToolScan::Complete(_)));
    }

    // ---- display cleaning ----

    #[test]
    fn test_strip_markers_removes_complete_block() {
        let content = format!(
            "Before.\n{}\nAfter.",
            modern(r#"{"name":"search_web","args":{}}"#)
        );
        assert_eq!(strip_markers(&content), "Before.\n\nAfter.");
    }

    #[test]
    fn test_strip_markers_removes_dangling_open() {
        let content = format!("Working on it.\n{}\n{{ \"name\":", TOOL_CALL_OPEN);
        assert_eq!(strip_markers(&content), "Working on it.");
    }

    #[test]
    fn test_strip_markers_removes_legacy_line() {
        let content = "Sure.\nTOOL_CALL: {\"name\":\"x\",\"args\":{}}\nDone.";
        assert_eq!(strip_markers(content), "Sure.\n\nDone.");
    }

    #[test]
    fn test_clean_display_strips_json_data_suffix() {
        let payload = json!({"type": "search_results", "query": "q", "results": [], "isCached": false});
        let content = format!("Found 0 results.\n\n{}{}", JSON_DATA_MARKER, payload);
        assert_eq!(clean_display(&content), "Found 0 results.");
    }

    #[test]
    fn test_clean_display_of_plain_text_is_identity() {
        assert_eq!(clean_display("Hello there."), "Hello there.");
    }

    #[test]
    fn test_tool_result_with_json_data_is_not_a_tool_call() {
        // A dispatched result embeds a json_data suffix, never an opening
        // marker, so re-classifying it must not trigger another dispatch.
        let content = format!(
            "Here is the image.\n\n{}{}",
            JSON_DATA_MARKER,
            json!({"type": "image_result", "url": "https://x/y.png", "prompt": "a cat", "aspect_ratio": "1:1"})
        );
        assert_eq!(classify(&content), ToolScan::None);
    }
}
