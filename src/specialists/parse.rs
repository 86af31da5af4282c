//! Parsing of text-generator responses into specialist results

use crate::models::{SpecialistResult, SpecialistRole};
use serde_json::{Map, Value};

/// Confidence assumed when a parsed response omits one
pub const PARSED_DEFAULT_CONFIDENCE: f64 = 0.7;

/// Confidence given to a response that is not structured at all
pub const UNSTRUCTURED_CONFIDENCE: f64 = 0.6;

/// Pull the JSON body out of a model response
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // first '{' to last '}'
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Parse a response, degrading to `{summary: raw, confidence: 0.6}` when it
/// is not a JSON object
pub fn parse_response(role: SpecialistRole, raw: &str) -> SpecialistResult {
    let candidate = extract_json(raw).unwrap_or_else(|| raw.trim().to_string());

    match serde_json::from_str::<Value>(&candidate) {
        Ok(Value::Object(map)) => from_object(role, map),
        _ => SpecialistResult::new(role, raw, UNSTRUCTURED_CONFIDENCE),
    }
}

fn from_object(role: SpecialistRole, map: Map<String, Value>) -> SpecialistResult {
    let summary = string_field(&map, "summary").unwrap_or_default();
    let confidence = map
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(PARSED_DEFAULT_CONFIDENCE);

    let mut result = SpecialistResult::new(role, summary, confidence);
    result.signal = signal_field(role, &map);
    result.key_factors = list_field(&map, "key_factors");
    result.bullish_factors = list_field(&map, "bullish_factors");
    result.bearish_factors = list_field(&map, "bearish_factors");
    result.critical_factors = list_field(&map, "critical_factors");
    result.key_risks = list_field(&map, "key_risks");
    if result.key_risks.is_empty() {
        result.key_risks = list_field(&map, "risks");
    }
    result.risk_mitigations = list_field(&map, "risk_mitigations");
    result.data_sources = list_field(&map, "data_sources");

    if let Some(Value::Object(narratives)) = map.get("dominant_narratives") {
        if result.bullish_factors.is_empty() {
            result.bullish_factors = list_field(narratives, "bullish");
        }
        if result.bearish_factors.is_empty() {
            result.bearish_factors = list_field(narratives, "bearish");
        }
    }

    result.raw_detail = Value::Object(map);
    result
}

fn signal_field(role: SpecialistRole, map: &Map<String, Value>) -> Option<String> {
    string_field(map, role.signal_field()).or_else(|| match role {
        SpecialistRole::Sentiment => string_field(map, "sentiment_label"),
        _ => None,
    })
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn list_field(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn test_extract_json_falls_back_to_braces() {
        let s = "Here you go: {\"a\":1} hope it helps";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_structured_response() {
        let raw = r#"```json
{
  "summary": "Momentum is building",
  "trend": "bullish",
  "confidence": 0.82,
  "key_factors": ["RSI 61", "MACD cross"],
  "risks": ["overbought"],
  "support_levels": [60000, 58000]
}
```"#;
        let result = parse_response(SpecialistRole::Technical, raw);

        assert_eq!(result.summary, "Momentum is building");
        assert_eq!(result.signal.as_deref(), Some("bullish"));
        assert_eq!(result.confidence, 0.82);
        assert_eq!(result.key_factors, vec!["RSI 61", "MACD cross"]);
        assert_eq!(result.key_risks, vec!["overbought"]);
        assert_eq!(result.raw_detail["support_levels"][0], 60000);
        assert!(!result.is_failed());
    }

    #[test]
    fn test_parse_missing_confidence_uses_default() {
        let result = parse_response(SpecialistRole::Macro, r#"{"summary": "Rates on hold", "outlook": "neutral"}"#);
        assert_eq!(result.confidence, PARSED_DEFAULT_CONFIDENCE);
        assert_eq!(result.signal.as_deref(), Some("neutral"));
    }

    #[test]
    fn test_parse_unstructured_degrades() {
        let raw = "The market looks choppy; I would wait.";
        let result = parse_response(SpecialistRole::Macro, raw);
        assert_eq!(result.summary, raw);
        assert_eq!(result.confidence, UNSTRUCTURED_CONFIDENCE);
        assert!(result.key_factors.is_empty());
        assert!(result.signal.is_none());
    }

    #[test]
    fn test_parse_sentiment_label_and_narratives() {
        let raw = r#"{
            "summary": "Crowd is greedy",
            "sentiment_label": "extremely_bullish",
            "dominant_narratives": {"bullish": ["ETF inflows"], "bearish": ["regulation"]},
            "confidence": 3.0
        }"#;
        let result = parse_response(SpecialistRole::Sentiment, raw);
        assert_eq!(result.signal.as_deref(), Some("extremely_bullish"));
        assert_eq!(result.bullish_factors, vec!["ETF inflows"]);
        assert_eq!(result.bearish_factors, vec!["regulation"]);
        assert_eq!(result.confidence, 1.0);
    }
}
