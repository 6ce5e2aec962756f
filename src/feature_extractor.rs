//! Feature extraction for review sentiment inference.
//!
//! Builds the single-row feature table the exported pipeline was trained on.
//! Text normalization happens inside the pipeline, so strings are passed
//! through untouched here.

use crate::types::review::ReviewRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

/// Timestamp layouts tried after RFC 3339 and RFC 2822.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Date-only layouts, interpreted as midnight UTC.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m %d, %Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Single feature cell
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Text(String),
    Int(i64),
    Float(f64),
}

/// One row of model input, in training column order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub asin: String,
    pub reviewer_id: String,
    pub overall: f64,
    /// 1 for verified purchases, 0 otherwise
    pub verified: i64,
    /// Whole days between the review date and the request
    pub days: i64,
    pub len_review: i64,
    pub len_summary: i64,
    pub len_text: i64,
    pub clean_text: String,
}

impl FeatureRow {
    /// Named cells in the order of [`FeatureExtractor::feature_names`]
    pub fn columns(&self) -> Vec<(&'static str, FeatureValue)> {
        vec![
            ("asin", FeatureValue::Text(self.asin.clone())),
            ("reviewerID", FeatureValue::Text(self.reviewer_id.clone())),
            ("overall", FeatureValue::Float(self.overall)),
            ("verified", FeatureValue::Int(self.verified)),
            ("days", FeatureValue::Int(self.days)),
            ("len_review", FeatureValue::Int(self.len_review)),
            ("len_summary", FeatureValue::Int(self.len_summary)),
            ("len_text", FeatureValue::Int(self.len_text)),
            ("clean_text", FeatureValue::Text(self.clean_text.clone())),
        ]
    }
}

/// Feature extractor that turns review records into pipeline input rows.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features relative to the current time.
    pub fn extract(&self, review: &ReviewRecord) -> FeatureRow {
        self.extract_at(review, Utc::now())
    }

    /// Extract features relative to `now`.
    pub fn extract_at(&self, review: &ReviewRecord, now: DateTime<Utc>) -> FeatureRow {
        let review_text = review.review_text.as_str();
        let summary = review.summary.as_str();

        // The joining space is kept even when summary is empty
        let clean_text = format!("{} {}", review_text, summary);

        let days = review
            .review_time
            .as_deref()
            .map(|raw| match parse_review_time(raw) {
                Some(reviewed_at) => days_between(reviewed_at, now),
                None => {
                    debug!(review_time = %raw, "Unparseable reviewTime, using days = 0");
                    0
                }
            })
            .unwrap_or(0);

        FeatureRow {
            asin: review.asin.clone(),
            reviewer_id: review.reviewer_id.clone(),
            overall: review.overall,
            verified: i64::from(review.verified),
            days,
            len_review: char_count(review_text),
            len_summary: char_count(summary),
            len_text: char_count(&clean_text),
            clean_text,
        }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        9
    }

    /// Get feature names (matching training column order).
    pub fn feature_names(&self) -> Vec<&'static str> {
        vec![
            "asin",
            "reviewerID",
            "overall",
            "verified",
            "days",
            "len_review",
            "len_summary",
            "len_text",
            "clean_text",
        ]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a free-form review date.
///
/// Returns `None` for anything not recognised; naive values are taken as UTC.
pub fn parse_review_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .or_else(|| parse_partial_date(raw))
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// `YYYY` or `YYYY-MM`, anchored to the first day of the period
fn parse_partial_date(raw: &str) -> Option<NaiveDate> {
    let (year, month) = match raw.split_once('-') {
        Some((year, month)) if (1..=2).contains(&month.len()) => (year, month.parse().ok()?),
        Some(_) => return None,
        None => (raw, 1),
    };
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, 1)
}

fn days_between(reviewed_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - reviewed_at).num_days().max(0)
}

fn char_count(s: &str) -> i64 {
    s.chars().count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn review() -> ReviewRecord {
        ReviewRecord::new("test_user", "B001", "Great product", "Loved it", 5.0, true)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 11, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_text_features() {
        let row = FeatureExtractor::new().extract(&review());

        assert_eq!(row.clean_text, "Great product Loved it");
        assert_eq!(row.len_review, 13);
        assert_eq!(row.len_summary, 8);
        assert_eq!(row.len_text, 22);
        assert_eq!(row.len_text, row.len_review + row.len_summary + 1);
        assert_eq!(row.verified, 1);
        assert_eq!(row.overall, 5.0);
        assert_eq!(row.asin, "B001");
        assert_eq!(row.reviewer_id, "test_user");
    }

    #[test]
    fn test_empty_summary_keeps_joining_space() {
        let mut record = review();
        record.summary = String::new();

        let row = FeatureExtractor::new().extract(&record);
        assert_eq!(row.clean_text, "Great product ");
        assert_eq!(row.len_summary, 0);
        assert_eq!(row.len_text, 14);
    }

    #[test]
    fn test_lengths_count_characters_not_bytes() {
        let mut record = review();
        record.review_text = "Très bien 👍".to_string();
        record.summary = "ok".to_string();

        let row = FeatureExtractor::new().extract(&record);
        assert_eq!(row.len_review, 11);
        assert_eq!(row.len_text, 14);
    }

    #[test]
    fn test_unverified_is_zero() {
        let mut record = review();
        record.verified = false;
        assert_eq!(FeatureExtractor::new().extract(&record).verified, 0);
    }

    #[test]
    fn test_missing_review_time_gives_zero_days() {
        let row = FeatureExtractor::new().extract_at(&review(), now());
        assert_eq!(row.days, 0);
    }

    #[test]
    fn test_unparseable_review_time_gives_zero_days() {
        let record = review().with_review_time("not-a-date");
        let row = FeatureExtractor::new().extract_at(&record, now());
        assert_eq!(row.days, 0);
    }

    #[test]
    fn test_days_are_whole_days() {
        let record = review().with_review_time("2024-01-01");
        let row = FeatureExtractor::new().extract_at(&record, now());
        assert_eq!(row.days, 10);
    }

    #[test]
    fn test_future_review_time_clamps_to_zero() {
        let record = review().with_review_time("2030-06-01");
        let row = FeatureExtractor::new().extract_at(&record, now());
        assert_eq!(row.days, 0);
    }

    #[test]
    fn test_parse_review_time_formats() {
        let expected = Utc.with_ymd_and_hms(2016, 9, 18, 0, 0, 0).unwrap();

        for raw in [
            "09 18, 2016",
            "9 18, 2016",
            "2016-09-18",
            "2016/09/18",
            "09/18/2016",
            "18.09.2016",
            "September 18, 2016",
            "Sep 18, 2016",
            "Sep 18 2016",
            "September 18 2016",
            "18 September 2016",
            "  2016-09-18  ",
            "2016-09-18T00:00:00Z",
            "2016-09-18T02:00:00+02:00",
        ] {
            assert_eq!(parse_review_time(raw), Some(expected), "failed on {:?}", raw);
        }

        assert_eq!(
            parse_review_time("2016-09-18 13:45:10"),
            Some(Utc.with_ymd_and_hms(2016, 9, 18, 13, 45, 10).unwrap())
        );
    }

    #[test]
    fn test_parse_review_time_partial_dates() {
        assert_eq!(
            parse_review_time("2016"),
            Some(Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_review_time("2016-09"),
            Some(Utc.with_ymd_and_hms(2016, 9, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_review_time("2016-13"), None);
        assert_eq!(parse_review_time("201"), None);
        assert_eq!(parse_review_time("20a6"), None);
    }

    #[test]
    fn test_parse_review_time_rejects_garbage() {
        assert_eq!(parse_review_time(""), None);
        assert_eq!(parse_review_time("not-a-date"), None);
        assert_eq!(parse_review_time("2016-13-45"), None);
    }

    #[test]
    fn test_columns_match_feature_names() {
        let extractor = FeatureExtractor::new();
        let row = extractor.extract(&review());

        let names: Vec<&str> = row.columns().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, extractor.feature_names());
        assert_eq!(names.len(), extractor.feature_count());
    }
}
