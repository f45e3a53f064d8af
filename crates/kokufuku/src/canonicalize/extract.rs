//! Strict extraction of the classification answer from model output.

use serde_json::Value;
use thiserror::Error;

/// Reasons a classification response could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("response contains no JSON object")]
    NoObject,

    #[error("response JSON is malformed: {0}")]
    Malformed(String),

    #[error("value for '{0}' is not a string")]
    NonStringValue(String),

    #[error("key '{0}' is not of the form 'subject: topic'")]
    MalformedKey(String),
}

/// Parse the substring from the first `{` to the last `}` as a JSON object.
pub fn extract_json_object(text: &str) -> Result<serde_json::Map<String, Value>, ExtractionError> {
    let start = text.find('{').ok_or(ExtractionError::NoObject)?;
    let end = text.rfind('}').ok_or(ExtractionError::NoObject)?;
    if end < start {
        return Err(ExtractionError::NoObject);
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ExtractionError::NoObject),
        Err(e) => Err(ExtractionError::Malformed(e.to_string())),
    }
}

/// Parse a classification answer into `((subject, topic), canonical)` pairs.
///
/// Keys are split on the first `:` and both halves trimmed.
pub fn parse_classification(
    text: &str,
) -> Result<Vec<((String, String), String)>, ExtractionError> {
    let object = extract_json_object(text)?;

    object
        .into_iter()
        .map(|(key, value)| {
            let canonical = match value {
                Value::String(s) => s,
                _ => return Err(ExtractionError::NonStringValue(key)),
            };
            let (subject, topic) = key
                .split_once(':')
                .map(|(s, t)| (s.trim(), t.trim()))
                .filter(|(s, t)| !s.is_empty() && !t.is_empty())
                .ok_or_else(|| ExtractionError::MalformedKey(key.clone()))?;
            Ok(((subject.to_string(), topic.to_string()), canonical.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_embedded_in_prose() {
        let text = "こちらが結果です:\n```json\n{\"数学: 一次関数\": \"関数\"}\n```\n以上";
        let pairs = parse_classification(text).unwrap();
        assert_eq!(
            pairs,
            vec![(("数学".to_string(), "一次関数".to_string()), "関数".to_string())]
        );
    }

    #[test]
    fn test_free_text_has_no_object() {
        assert_eq!(
            parse_classification("I think it is 関数."),
            Err(ExtractionError::NoObject)
        );
        assert_eq!(parse_classification("} then {"), Err(ExtractionError::NoObject));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_classification("{\"数学: a\": }").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_non_string_value() {
        let err = parse_classification("{\"数学: a\": 3}").unwrap_err();
        assert_eq!(err, ExtractionError::NonStringValue("数学: a".to_string()));
    }

    #[test]
    fn test_malformed_key() {
        let err = parse_classification("{\"一次関数\": \"関数\"}").unwrap_err();
        assert_eq!(err, ExtractionError::MalformedKey("一次関数".to_string()));
    }
}
