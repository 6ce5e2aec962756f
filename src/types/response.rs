//! Response payloads returned by the HTTP API

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error string reported for any runtime failure during prediction
pub const INTERNAL_ERROR: &str = "Internal Server Error";

/// Successful classification of a review
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class label
    pub prediction: i64,
    /// Positive-class probability, rounded to 4 decimals
    pub probability: f64,
}

/// Payload for a failure after validation succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl ErrorResponse {
    pub fn internal(details: impl Into<String>) -> Self {
        Self {
            error: INTERNAL_ERROR.to_string(),
            details: details.into(),
        }
    }
}

/// Banner returned by `GET /`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Liveness payload returned by `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

/// Path segment inside a validation error location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for LocSegment {
    fn from(value: &str) -> Self {
        LocSegment::Field(value.to_string())
    }
}

/// One entry in a 422 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub loc: Vec<LocSegment>,
    pub msg: String,
    /// Offending value; omitted for missing fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

/// Body of a 422 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorResponse {
    pub detail: Vec<ValidationIssue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_issue_omits_input() {
        let issue = ValidationIssue {
            kind: "missing".to_string(),
            loc: vec!["body".into(), "summary".into()],
            msg: "Field required".to_string(),
            input: None,
        };

        assert_eq!(
            serde_json::to_value(&issue).unwrap(),
            json!({"type": "missing", "loc": ["body", "summary"], "msg": "Field required"})
        );
    }

    #[test]
    fn test_index_segment_serializes_as_number() {
        let loc = vec![LocSegment::from("body"), LocSegment::Index(7)];
        assert_eq!(serde_json::to_value(&loc).unwrap(), json!(["body", 7]));
    }

    #[test]
    fn test_internal_error_payload() {
        let payload = ErrorResponse::internal("boom");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"error": "Internal Server Error", "details": "boom"})
        );
    }
}
