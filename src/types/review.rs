//! Review record data structures

use serde::{Deserialize, Serialize};

/// A product review submitted for classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Review identifier
    #[serde(rename = "reviewID", default = "default_review_id")]
    pub review_id: i64,

    /// Whether the purchase was verified
    pub verified: bool,

    /// Free-form review date, e.g. "09 18, 2016"
    #[serde(rename = "reviewTime", default, skip_serializing_if = "Option::is_none")]
    pub review_time: Option<String>,

    #[serde(rename = "reviewerID")]
    pub reviewer_id: String,

    /// Product identifier
    pub asin: String,

    #[serde(rename = "reviewerName", default, skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,

    #[serde(rename = "reviewText")]
    pub review_text: String,

    pub summary: String,

    #[serde(rename = "unixReviewTime", default, skip_serializing_if = "Option::is_none")]
    pub unix_review_time: Option<String>,

    /// Star rating
    pub overall: f64,
}

pub(crate) fn default_review_id() -> i64 {
    1
}

impl ReviewRecord {
    /// Create a record with the required fields and defaults for the rest
    pub fn new(
        reviewer_id: impl Into<String>,
        asin: impl Into<String>,
        review_text: impl Into<String>,
        summary: impl Into<String>,
        overall: f64,
        verified: bool,
    ) -> Self {
        Self {
            review_id: default_review_id(),
            verified,
            review_time: None,
            reviewer_id: reviewer_id.into(),
            asin: asin.into(),
            reviewer_name: None,
            review_text: review_text.into(),
            summary: summary.into(),
            unix_review_time: None,
            overall,
        }
    }

    /// Set the free-form review date
    pub fn with_review_time(mut self, review_time: impl Into<String>) -> Self {
        self.review_time = Some(review_time.into());
        self
    }
}
