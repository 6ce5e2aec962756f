//! Request body validation.
//!
//! Checks a JSON body against the review schema field by field and reports
//! every offending field, instead of stopping at the first deserialization
//! error. Lax coercions (numeric strings, "yes"/"no" booleans and so on) are
//! accepted the same way existing clients rely on.

use crate::types::review::default_review_id;
use crate::types::{LocSegment, ReviewRecord, ValidationIssue};
use serde_json::{Map, Value};

const BOOL_PARSING: (&str, &str) = (
    "bool_parsing",
    "Input should be a valid boolean, unable to interpret input",
);
const BOOL_TYPE: (&str, &str) = ("bool_type", "Input should be a valid boolean");
const STRING_TYPE: (&str, &str) = ("string_type", "Input should be a valid string");
const INT_FROM_FLOAT: (&str, &str) = (
    "int_from_float",
    "Input should be a valid integer, got a number with a fractional part",
);
const INT_PARSING: (&str, &str) = (
    "int_parsing",
    "Input should be a valid integer, unable to parse string as an integer",
);
const INT_TYPE: (&str, &str) = ("int_type", "Input should be a valid integer");
const FLOAT_PARSING: (&str, &str) = (
    "float_parsing",
    "Input should be a valid number, unable to parse string as a number",
);
const FLOAT_TYPE: (&str, &str) = ("float_type", "Input should be a valid number");

/// Parse and validate a raw request body
pub fn validate_body(body: &[u8]) -> Result<ReviewRecord, Vec<ValidationIssue>> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        vec![ValidationIssue {
            kind: "json_invalid".to_string(),
            loc: vec!["body".into(), LocSegment::Index(byte_offset(body, &e))],
            msg: "JSON decode error".to_string(),
            input: None,
        }]
    })?;

    validate_review(&value)
}

/// Validate an already-parsed JSON value
pub fn validate_review(value: &Value) -> Result<ReviewRecord, Vec<ValidationIssue>> {
    let Some(object) = value.as_object() else {
        return Err(vec![ValidationIssue {
            kind: "model_attributes_type".to_string(),
            loc: vec!["body".into()],
            msg: "Input should be a valid dictionary or object to extract fields from".to_string(),
            input: Some(value.clone()),
        }]);
    };

    let mut fields = FieldReader::new(object);

    let review_id = fields.optional("reviewID", coerce_int);
    let verified = fields.required("verified", coerce_bool);
    let review_time = fields.optional("reviewTime", coerce_string);
    let reviewer_id = fields.required("reviewerID", coerce_string);
    let asin = fields.required("asin", coerce_string);
    let reviewer_name = fields.optional("reviewerName", coerce_string);
    let review_text = fields.required("reviewText", coerce_string);
    let summary = fields.required("summary", coerce_string);
    let unix_review_time = fields.optional("unixReviewTime", coerce_string);
    let overall = fields.required("overall", coerce_float);

    match (verified, reviewer_id, asin, review_text, summary, overall) {
        (Some(verified), Some(reviewer_id), Some(asin), Some(review_text), Some(summary), Some(overall))
            if fields.issues.is_empty() =>
        {
            Ok(ReviewRecord {
                review_id: review_id.flatten().unwrap_or_else(default_review_id),
                verified,
                review_time: review_time.flatten(),
                reviewer_id,
                asin,
                reviewer_name: reviewer_name.flatten(),
                review_text,
                summary,
                unix_review_time: unix_review_time.flatten(),
                overall,
            })
        }
        _ => Err(fields.issues),
    }
}

type Coercion<T> = fn(&Value) -> Result<T, (&'static str, &'static str)>;

/// Reads fields in declaration order, collecting one issue per bad field
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    issues: Vec<ValidationIssue>,
}

impl<'a> FieldReader<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            issues: Vec::new(),
        }
    }

    fn required<T>(&mut self, field: &str, coerce: Coercion<T>) -> Option<T> {
        match self.object.get(field) {
            Some(value) => self.coerce(field, value, coerce),
            None => {
                self.issues.push(ValidationIssue {
                    kind: "missing".to_string(),
                    loc: vec!["body".into(), field.into()],
                    msg: "Field required".to_string(),
                    input: None,
                });
                None
            }
        }
    }

    /// `Some(None)` for absent or null, `None` when invalid
    fn optional<T>(&mut self, field: &str, coerce: Coercion<T>) -> Option<Option<T>> {
        match self.object.get(field) {
            None | Some(Value::Null) => Some(None),
            Some(value) => self.coerce(field, value, coerce).map(Some),
        }
    }

    fn coerce<T>(&mut self, field: &str, value: &Value, coerce: Coercion<T>) -> Option<T> {
        match coerce(value) {
            Ok(v) => Some(v),
            Err((kind, msg)) => {
                self.issues.push(ValidationIssue {
                    kind: kind.to_string(),
                    loc: vec!["body".into(), field.into()],
                    msg: msg.to_string(),
                    input: Some(value.clone()),
                });
                None
            }
        }
    }
}

fn coerce_bool(value: &Value) -> Result<bool, (&'static str, &'static str)> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 => Ok(false),
            Some(v) if v == 1.0 => Ok(true),
            _ => Err(BOOL_PARSING),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(false),
            _ => Err(BOOL_PARSING),
        },
        _ => Err(BOOL_TYPE),
    }
}

fn coerce_string(value: &Value) -> Result<String, (&'static str, &'static str)> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(STRING_TYPE),
    }
}

fn coerce_int(value: &Value) -> Result<i64, (&'static str, &'static str)> {
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(v) if v.fract() != 0.0 => Err(INT_FROM_FLOAT),
                Some(v) if v.abs() < i64::MAX as f64 => Ok(v as i64),
                _ => Err(INT_PARSING),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| INT_PARSING),
        _ => Err(INT_TYPE),
    }
}

fn coerce_float(value: &Value) -> Result<f64, (&'static str, &'static str)> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().ok_or(FLOAT_PARSING),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| FLOAT_PARSING),
        _ => Err(FLOAT_TYPE),
    }
}

/// Byte offset of a serde_json error within the body
fn byte_offset(body: &[u8], err: &serde_json::Error) -> usize {
    let (line, column) = (err.line(), err.column());
    if line == 0 {
        return 0;
    }

    let line_start: usize = body
        .split(|b| *b == b'\n')
        .take(line - 1)
        .map(|l| l.len() + 1)
        .sum();
    (line_start + column.saturating_sub(1)).min(body.len())
}
