//! Parsing of LLM filter decisions.
//!
//! The model is asked for `{"match": bool, "explanation": string}`. Real
//! responses drift, so parsing degrades in layers: strict JSON, then a loose
//! textual fallback, with `WARNING:` / `ERROR:` sentinels marking anything
//! suspicious. The sentinels are part of the external contract - downstream
//! SQL filters on these prefixes.

use serde_json::Value;

/// Explanation text is capped at this many characters in the textual
/// fallback path.
const FALLBACK_EXPLANATION_CHARS: usize = 200;

/// A parsed decision for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub match_result: bool,
    pub explanation: String,
}

/// Parses completion text into a decision.
///
/// 1. Strict JSON: `match` coerced to bool, `explanation` stringified and
///    trimmed.
/// 2. Empty explanation → `WARNING: LLM returned match=<bool> without
///    explanation`.
/// 3. JSON parse failure with non-empty content → loose scan: matched iff
///    the lowercased text contains both `"true"` and `"match"`; the first
///    200 characters become the explanation.
/// 4. JSON parse failure with empty content → the same WARNING as step 2
///    with `match=false`.
#[must_use]
pub fn parse_decision(content: &str) -> Decision {
    match serde_json::from_str::<Value>(content) {
        Ok(parsed) => {
            let match_result = parsed.get("match").map(json_truthy).unwrap_or(false);
            let explanation = parsed
                .get("explanation")
                .map(stringify)
                .unwrap_or_default()
                .trim()
                .to_string();
            Decision {
                match_result,
                explanation: non_empty_or_warning(explanation, match_result),
            }
        }
        Err(_) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Decision {
                    match_result: false,
                    explanation: missing_explanation_warning(false),
                };
            }
            let lowered = trimmed.to_lowercase();
            let match_result = lowered.contains("true") && lowered.contains("match");
            let explanation: String = trimmed.chars().take(FALLBACK_EXPLANATION_CHARS).collect();
            Decision {
                match_result,
                explanation: non_empty_or_warning(explanation.trim().to_string(), match_result),
            }
        }
    }
}

/// Formats the ERROR sentinel for a failed model call.
#[must_use]
pub fn error_explanation(kind: &str, message: &str) -> String {
    format!("ERROR: {kind}: {message}")
}

fn non_empty_or_warning(explanation: String, match_result: bool) -> String {
    if explanation.is_empty() {
        missing_explanation_warning(match_result)
    } else {
        explanation
    }
}

fn missing_explanation_warning(match_result: bool) -> String {
    format!("WARNING: LLM returned match={match_result} without explanation")
}

/// Python-style truthiness for the `match` field, which models occasionally
/// emit as a string or number.
fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Null => false,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && !text.eq_ignore_ascii_case("false"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Strict JSON Tests ====================

    #[test]
    fn test_parse_well_formed_match() {
        let decision =
            parse_decision(r#"{"match": true, "explanation": "matches because it is 2D"}"#);
        assert!(decision.match_result);
        assert_eq!(decision.explanation, "matches because it is 2D");
    }

    #[test]
    fn test_parse_well_formed_no_match() {
        let decision = parse_decision(r#"{"match": false, "explanation": "volumetric study"}"#);
        assert!(!decision.match_result);
        assert_eq!(decision.explanation, "volumetric study");
    }

    #[test]
    fn test_parse_missing_explanation_warns() {
        let decision = parse_decision(r#"{"match": true}"#);
        assert!(decision.match_result);
        assert_eq!(
            decision.explanation,
            "WARNING: LLM returned match=true without explanation"
        );
    }

    #[test]
    fn test_parse_whitespace_explanation_warns() {
        let decision = parse_decision(r#"{"match": false, "explanation": "   "}"#);
        assert!(!decision.match_result);
        assert_eq!(
            decision.explanation,
            "WARNING: LLM returned match=false without explanation"
        );
    }

    #[test]
    fn test_parse_string_match_field() {
        let decision = parse_decision(r#"{"match": "true", "explanation": "yes"}"#);
        assert!(decision.match_result);
        let decision = parse_decision(r#"{"match": "false", "explanation": "no"}"#);
        assert!(!decision.match_result);
    }

    #[test]
    fn test_parse_missing_match_field_is_false() {
        let decision = parse_decision(r#"{"explanation": "only an explanation"}"#);
        assert!(!decision.match_result);
        assert_eq!(decision.explanation, "only an explanation");
    }

    // ==================== Fallback Tests ====================

    #[test]
    fn test_fallback_textual_match() {
        let decision = parse_decision("The article is a match: true, it covers segmentation.");
        assert!(decision.match_result);
        assert!(decision.explanation.starts_with("The article is a match"));
    }

    #[test]
    fn test_fallback_textual_no_match() {
        let decision = parse_decision("This does not satisfy the criteria.");
        assert!(!decision.match_result);
    }

    #[test]
    fn test_fallback_truncates_to_200_chars() {
        let long = format!("match true {}", "x".repeat(500));
        let decision = parse_decision(&long);
        assert!(decision.match_result);
        assert_eq!(decision.explanation.chars().count(), 200);
    }

    #[test]
    fn test_fallback_empty_content_warns() {
        let decision = parse_decision("   ");
        assert!(!decision.match_result);
        assert_eq!(
            decision.explanation,
            "WARNING: LLM returned match=false without explanation"
        );
    }

    // ==================== Sentinel Tests ====================

    #[test]
    fn test_error_explanation_format() {
        assert_eq!(
            error_explanation("ApiError", "HTTP 429: slow down"),
            "ERROR: ApiError: HTTP 429: slow down"
        );
    }
}
