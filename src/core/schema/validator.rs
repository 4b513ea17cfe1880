//! AI output validation
//!
//! Checks a model's JSON output against the caller's field schema. Failures
//! are reported, not thrown: a parse error or a stray key produces an invalid
//! report the dynamic-parsing driver can retry on.

use serde_json::{Map, Value};

/// Outcome of validating one AI response against an expected field list
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// True iff every returned key is in the expected list
    pub is_valid: bool,
    /// True iff at least one expected field carries a non-empty value
    pub has_content: bool,
    /// Returned keys that are not in the expected list
    pub invalid_fields: Vec<String>,
    /// The parsed fields (empty on parse failure)
    pub fields: Map<String, Value>,
    /// Set when the raw output was not parseable JSON
    pub parse_error: Option<String>,
}

impl ValidationReport {
    fn parse_failure(message: String) -> Self {
        Self {
            is_valid: false,
            has_content: false,
            invalid_fields: Vec::new(),
            fields: Map::new(),
            parse_error: Some(message),
        }
    }
}

/// Validate raw output text against the expected fields
pub fn validate_ai_output(raw: &str, expected_fields: &[String]) -> ValidationReport {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => validate_ai_value(&value, expected_fields),
        Err(e) => ValidationReport::parse_failure(format!("Output is not valid JSON: {}", e)),
    }
}

/// Validate an already-parsed output value against the expected fields
pub fn validate_ai_value(value: &Value, expected_fields: &[String]) -> ValidationReport {
    let Some(object) = value.as_object() else {
        return ValidationReport::parse_failure("Output is not a JSON object".to_string());
    };

    let invalid_fields: Vec<String> = object
        .keys()
        .filter(|key| !expected_fields.iter().any(|f| f == *key))
        .cloned()
        .collect();

    let has_content = expected_fields.iter().any(|field| {
        object
            .get(field)
            .map(|value| match value {
                Value::String(s) => !s.trim().is_empty(),
                Value::Null => false,
                other => !matches!(other, Value::Object(o) if o.is_empty())
                    && !matches!(other, Value::Array(a) if a.is_empty()),
            })
            .unwrap_or(false)
    });

    ValidationReport {
        is_valid: invalid_fields.is_empty(),
        has_content,
        invalid_fields,
        fields: object.clone(),
        parse_error: None,
    }
}
