//! Final-answer parsing: pull a JSON object out of free-form model text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Fenced code block, optionally tagged `json`
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n\s*```").expect("valid regex"));

/// Non-nested brace group containing at least one quoted-key/value pair
static INLINE_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{[^{}]*(?:"[^"]*"[^{}]*:[^{}]*)+[^{}]*\}"#).expect("valid regex")
});

/// Extract a JSON object from model output, tolerating markdown fencing and
/// surrounding prose. Attempts, first success wins:
///
/// 1. fenced code blocks, strict-parsed;
/// 2. inline brace-delimited candidates, left to right;
/// 3. the whole trimmed text.
///
/// Returns `None` when nothing parses; never fails.
pub fn extract_json(text: &str) -> Option<Map<String, Value>> {
    for captures in FENCED_BLOCK.captures_iter(text) {
        if let Ok(map) = serde_json::from_str::<Map<String, Value>>(captures[1].trim()) {
            return Some(map);
        }
    }

    for candidate in INLINE_OBJECT.find_iter(text) {
        if let Ok(map) = serde_json::from_str::<Map<String, Value>>(candidate.as_str()) {
            return Some(map);
        }
    }

    serde_json::from_str::<Map<String, Value>>(text.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_round_trip() {
        let text = "prefix ```json\n{\"a\":1}\n``` suffix";
        let map = extract_json(text).expect("fenced object");
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn untagged_fence_is_accepted() {
        let text = "Result:\n```\n{\"contact_email\": \"info@acme.test\"}\n```\nDone.";
        let map = extract_json(text).expect("fenced object");
        assert_eq!(map["contact_email"], "info@acme.test");
    }

    #[test]
    fn first_inline_candidate_wins() {
        let text = "{\"a\":1} and {\"b\":2}";
        let map = extract_json(text).expect("inline object");
        assert_eq!(map["a"], 1);
        assert!(map.get("b").is_none());
    }

    #[test]
    fn malformed_candidates_are_skipped() {
        let text = "{\"broken\": } then {\"ok\": true}";
        let map = extract_json(text).expect("second candidate");
        assert_eq!(map["ok"], true);
    }

    #[test]
    fn whole_text_parse_is_the_fallback() {
        let text = "  {\"contact_email\": \"a@b.com\", \"contact_call\": \"+123\"}  ";
        let map = extract_json(text).expect("whole text object");
        assert_eq!(map["contact_email"], "a@b.com");
        assert_eq!(map["contact_call"], "+123");
    }

    #[test]
    fn prose_yields_nothing() {
        assert!(extract_json("I could not find any contact details.").is_none());
        assert!(extract_json("").is_none());
    }

    #[test]
    fn bad_fence_falls_through_to_inline() {
        let text = "```json\nnot json at all\n```\nbut inline {\"x\": 9} works";
        let map = extract_json(text).expect("inline after bad fence");
        assert_eq!(map["x"], 9);
    }

    #[test]
    fn arrays_do_not_count_as_results() {
        assert!(extract_json("[1, 2, 3]").is_none());
    }
}
