//! Acceptance check for model output.

use serde_json::Value;

use crate::enrichment::{EnrichmentResult, Field};

const FENCE: &str = "```";

/// Outcome of validating one response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// A JSON object with all six fields populated.
    Valid(EnrichmentResult),
    /// Anything else; the caller retries.
    Invalid(InvalidReason),
}

/// Why a body was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The body did not parse as JSON.
    NotJson(String),
    /// Valid JSON, but not an object.
    NotObject,
    /// Object with one or more required fields absent, blank, or not strings.
    MissingFields(Vec<Field>),
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::NotJson(err) => write!(f, "not JSON: {err}"),
            InvalidReason::NotObject => write!(f, "JSON is not an object"),
            InvalidReason::MissingFields(fields) => {
                let names: Vec<_> = fields.iter().map(|field| field.name()).collect();
                write!(f, "missing or empty fields: {}", names.join(", "))
            }
        }
    }
}

/// Removes a surrounding fenced code block, if any.
///
/// The opening fence may carry a language tag (```` ```json ````); everything up to
/// the first newline is dropped along with it.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    let body = match rest.split_once('\n') {
        Some((_tag, body)) => body,
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Parses a model reply into a complete result, or explains why it cannot.
pub fn parse_response(text: &str) -> Validation {
    let body = strip_code_fence(text);
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => return Validation::Invalid(InvalidReason::NotJson(err.to_string())),
    };
    let Value::Object(object) = value else {
        return Validation::Invalid(InvalidReason::NotObject);
    };

    let result = EnrichmentResult::from_fields(|field| {
        object
            .get(field.name())
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let missing = result.missing_fields();
    if missing.is_empty() {
        Validation::Valid(result)
    } else {
        Validation::Invalid(InvalidReason::MissingFields(missing))
    }
}
