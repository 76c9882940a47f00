// Extraction and validation of the JSON payload in raw provider output.

use parley_core::model::{ActionType, SuggestionResult, SuggestionSource};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedResponse {
    #[error("no JSON object found in provider output")]
    NoJsonObject,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),
}

/// A validated provider answer, before the pipeline attaches its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSuggestion {
    pub analysis: String,
    pub suggestion: String,
    pub action_type: ActionType,
    pub confidence: u8,
}

impl ParsedSuggestion {
    pub fn into_result(self, source: SuggestionSource) -> SuggestionResult {
        SuggestionResult {
            analysis: self.analysis,
            suggestion: self.suggestion,
            action_type: self.action_type,
            confidence: self.confidence,
            source,
        }
    }
}

/// The text from the first `{` through the last `}`, if any.
///
/// Tolerates commentary the provider wraps around the payload.
pub fn extract_json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse and validate raw provider output.
///
/// `actionType` values outside the enumeration become `other`; `confidence`
/// is clamped to 0..=100. Anything else missing or mistyped is rejected
/// as a whole.
pub fn parse_suggestion(raw: &str) -> Result<ParsedSuggestion, MalformedResponse> {
    let span = extract_json_span(raw).ok_or(MalformedResponse::NoJsonObject)?;
    let value: Value =
        serde_json::from_str(span).map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(MalformedResponse::NoJsonObject);
    };

    let suggestion = required_str(&obj, "suggestion")?;
    if suggestion.trim().is_empty() {
        return Err(MalformedResponse::MissingField("suggestion"));
    }

    Ok(ParsedSuggestion {
        analysis: required_str(&obj, "analysis")?.to_string(),
        suggestion: suggestion.to_string(),
        action_type: action_type(&obj)?,
        confidence: confidence(&obj)?,
    })
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, MalformedResponse> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or(MalformedResponse::MissingField(field))
}

/// Only an absent key is malformed; a present value that is not one of the
/// known labels, `null` included, becomes `other`.
fn action_type(obj: &Map<String, Value>) -> Result<ActionType, MalformedResponse> {
    let value = obj
        .get("actionType")
        .ok_or(MalformedResponse::MissingField("actionType"))?;
    Ok(value.as_str().map_or(ActionType::Other, ActionType::from_label))
}

/// Accepts integers, floats (rounded) and numeric strings.
fn confidence(obj: &Map<String, Value>) -> Result<u8, MalformedResponse> {
    let missing = MalformedResponse::MissingField("confidence");
    let raw = match obj.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().ok_or(missing)?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| missing)?,
        _ => return Err(missing),
    };
    if !raw.is_finite() {
        return Err(MalformedResponse::MissingField("confidence"));
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(confidence: &str) -> String {
        format!(
            r#"{{"analysis":"a","suggestion":"s","actionType":"respond","confidence":{confidence}}}"#
        )
    }

    #[test]
    fn extracts_payload_from_surrounding_commentary() {
        let raw = r#"Here is my answer: {"analysis":"a","suggestion":"s","actionType":"respond","confidence":85} Thanks!"#;
        let parsed = parse_suggestion(raw).unwrap();
        assert_eq!(
            parsed,
            ParsedSuggestion {
                analysis: "a".into(),
                suggestion: "s".into(),
                action_type: ActionType::Respond,
                confidence: 85,
            }
        );
    }

    #[test]
    fn handles_code_fenced_payload() {
        let raw = "```json\n{\"analysis\":\"Devis demandé\",\"suggestion\":\"Je vous envoie le devis ce soir.\",\"actionType\":\"sendQuote\",\"confidence\":70}\n```";
        let parsed = parse_suggestion(raw).unwrap();
        assert_eq!(parsed.action_type, ActionType::SendQuote);
        assert_eq!(parsed.confidence, 70);
    }

    #[test]
    fn nested_braces_are_kept_within_span() {
        let raw = r#"{"analysis":"a {b}","suggestion":"s","actionType":"followUp","confidence":10,"extra":{"k":1}}"#;
        let parsed = parse_suggestion(raw).unwrap();
        assert_eq!(parsed.analysis, "a {b}");
        assert_eq!(parsed.action_type, ActionType::FollowUp);
    }

    #[test]
    fn clamps_confidence_into_range() {
        assert_eq!(parse_suggestion(&payload("150")).unwrap().confidence, 100);
        assert_eq!(parse_suggestion(&payload("-5")).unwrap().confidence, 0);
        assert_eq!(parse_suggestion(&payload("0")).unwrap().confidence, 0);
        assert_eq!(parse_suggestion(&payload("100")).unwrap().confidence, 100);
    }

    #[test]
    fn accepts_float_and_string_confidence() {
        assert_eq!(parse_suggestion(&payload("72.6")).unwrap().confidence, 73);
        assert_eq!(parse_suggestion(&payload("\"64\"")).unwrap().confidence, 64);
    }

    #[test]
    fn unknown_action_type_is_coerced_to_other() {
        let raw = r#"{"analysis":"a","suggestion":"s","actionType":"callBack","confidence":50}"#;
        assert_eq!(parse_suggestion(raw).unwrap().action_type, ActionType::Other);
    }

    #[test]
    fn non_string_action_type_is_coerced_to_other() {
        for value in ["5", "true", "{}", "null"] {
            let raw = format!(
                r#"{{"analysis":"a","suggestion":"s","actionType":{value},"confidence":50}}"#
            );
            let parsed = parse_suggestion(&raw).unwrap();
            assert_eq!(parsed.action_type, ActionType::Other, "actionType: {value}");
            assert_eq!(parsed.suggestion, "s");
            assert_eq!(parsed.confidence, 50);
        }
    }

    #[test]
    fn plain_text_is_no_json_object() {
        assert_eq!(
            parse_suggestion("Je ne peux pas répondre."),
            Err(MalformedResponse::NoJsonObject)
        );
        assert_eq!(parse_suggestion("} backwards {"), Err(MalformedResponse::NoJsonObject));
    }

    #[test]
    fn broken_json_is_invalid() {
        let err = parse_suggestion(r#"{"analysis": "a", "suggestion": }"#).unwrap_err();
        assert!(matches!(err, MalformedResponse::InvalidJson(_)), "got {err:?}");
    }

    #[test]
    fn missing_fields_are_rejected() {
        let cases = [
            (r#"{"suggestion":"s","actionType":"respond","confidence":50}"#, "analysis"),
            (r#"{"analysis":"a","actionType":"respond","confidence":50}"#, "suggestion"),
            (r#"{"analysis":"a","suggestion":"s","confidence":50}"#, "actionType"),
            (r#"{"analysis":"a","suggestion":"s","actionType":"respond"}"#, "confidence"),
            (r#"{"analysis":"a","suggestion":"s","actionType":"respond","confidence":"high"}"#, "confidence"),
            (r#"{"analysis":"a","suggestion":"  ","actionType":"respond","confidence":50}"#, "suggestion"),
            (r#"{"analysis":1,"suggestion":"s","actionType":"respond","confidence":50}"#, "analysis"),
        ];
        for (raw, field) in cases {
            assert_eq!(
                parse_suggestion(raw),
                Err(MalformedResponse::MissingField(field)),
                "input: {raw}"
            );
        }
    }

    #[test]
    fn into_result_attaches_source() {
        let result = parse_suggestion(&payload("85"))
            .unwrap()
            .into_result(SuggestionSource::DirectAnalysis);
        assert_eq!(result.source, SuggestionSource::DirectAnalysis);
        assert_eq!(result.confidence, 85);
    }
}
