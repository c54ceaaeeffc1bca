//! Review records → interactions.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;

use crate::events::{Event, Reporter};
use crate::models::{coerce_f64, stringify, Interaction, RawRecord, ReviewParseReport};

/// Item identifier fields, in order of preference.
pub const ITEM_ID_FIELDS: [&str; 2] = ["parent_asin", "asin"];

/// Timestamp fields, in order of preference.
pub const TIMESTAMP_FIELDS: [&str; 2] = ["sort_timestamp", "timestamp"];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format epoch milliseconds (UTC) as `YYYY-MM-DD HH:MM:SS`.
///
/// Accepts integers, floats (truncated to whole milliseconds) and integer
/// strings. Anything else, or an instant outside years 1..=9999, yields `None`.
pub fn format_epoch_millis(value: &Value) -> Option<String> {
    let millis = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_millis(millis)
        .filter(|dt| (1..=9999).contains(&dt.year()))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// Extract one interaction; `None` when user, item or rating is missing.
pub fn parse_review(record: &RawRecord) -> Option<Interaction> {
    let user_id = record.text("user_id")?;
    let item_id = record
        .first_truthy(&ITEM_ID_FIELDS)
        .map(|v| stringify(v).trim().to_string())
        .filter(|s| !s.is_empty())?;
    let rating = record.get("rating").and_then(coerce_f64)?;
    let timestamp = record
        .first_truthy(&TIMESTAMP_FIELDS)
        .and_then(format_epoch_millis);

    Some(Interaction {
        user_id,
        item_id,
        rating,
        timestamp,
    })
}

/// Parse every review, dropping incomplete ones. Duplicates and
/// out-of-range ratings are kept for the cleaner.
pub fn parse_reviews<I>(records: I, reporter: &mut dyn Reporter) -> Result<Vec<Interaction>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut interactions = Vec::new();
    let mut dropped = 0;
    for record in records {
        match parse_review(&record?) {
            Some(interaction) => interactions.push(interaction),
            None => dropped += 1,
        }
    }

    reporter.report(&Event::ReviewsParsed(ReviewParseReport {
        parsed: interactions.len(),
        dropped,
    }));
    Ok(interactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullReporter;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::try_from(value).unwrap()
    }

    #[test]
    fn test_format_epoch_millis() {
        assert_eq!(
            format_epoch_millis(&json!(1588687728923_i64)).as_deref(),
            Some("2020-05-05 14:08:48")
        );
        assert_eq!(
            format_epoch_millis(&json!("1588687728923")).as_deref(),
            Some("2020-05-05 14:08:48")
        );
        assert_eq!(
            format_epoch_millis(&json!(1588687728923.9)).as_deref(),
            Some("2020-05-05 14:08:48")
        );
        assert_eq!(format_epoch_millis(&json!("yesterday")), None);
        assert_eq!(format_epoch_millis(&json!([1])), None);
        assert_eq!(format_epoch_millis(&json!(i64::MAX)), None);
    }

    #[test]
    fn test_far_future_timestamp_is_null() {
        assert_eq!(format_epoch_millis(&json!(1_000_000_000_000_000_i64)), None);
        assert_eq!(format_epoch_millis(&json!(-100_000_000_000_000_i64)), None);
        assert_eq!(
            format_epoch_millis(&json!(253402300799000_i64)).as_deref(),
            Some("9999-12-31 23:59:59")
        );
    }

    #[test]
    fn test_parse_review_full() {
        let r = record(json!({
            "user_id": " u1 ",
            "parent_asin": "P1",
            "asin": "A1",
            "rating": 4,
            "sort_timestamp": 0,
            "timestamp": 1588687728923_i64
        }));
        let i = parse_review(&r).unwrap();
        assert_eq!(i.user_id, "u1");
        assert_eq!(i.item_id, "P1");
        assert_eq!(i.rating, 4.0);
        assert_eq!(i.timestamp.as_deref(), Some("2020-05-05 14:08:48"));
    }

    #[test]
    fn test_parse_review_falls_back_to_asin() {
        let r = record(json!({"user_id": "u1", "asin": "A1", "rating": "3.5"}));
        let i = parse_review(&r).unwrap();
        assert_eq!(i.item_id, "A1");
        assert_eq!(i.rating, 3.5);
        assert_eq!(i.timestamp, None);
    }

    #[test]
    fn test_bad_timestamp_keeps_record() {
        let r = record(json!({"user_id": "u1", "asin": "A1", "rating": 5, "timestamp": "soon"}));
        let i = parse_review(&r).unwrap();
        assert_eq!(i.timestamp, None);
    }

    #[test]
    fn test_missing_required_fields_dropped() {
        assert!(parse_review(&record(json!({"asin": "A1", "rating": 5}))).is_none());
        assert!(parse_review(&record(json!({"user_id": "u1", "rating": 5}))).is_none());
        assert!(parse_review(&record(json!({"user_id": "u1", "asin": "A1"}))).is_none());
        assert!(parse_review(&record(json!({"user_id": "u1", "asin": "A1", "rating": null}))).is_none());
        assert!(parse_review(&record(json!({"user_id": "  ", "asin": "A1", "rating": 5}))).is_none());
    }

    #[test]
    fn test_zero_rating_is_kept_for_cleaner() {
        let r = record(json!({"user_id": "u1", "asin": "A1", "rating": 0}));
        assert_eq!(parse_review(&r).unwrap().rating, 0.0);
    }

    #[test]
    fn test_parse_reviews_counts_drops() {
        let records = vec![
            Ok(record(json!({"user_id": "u1", "asin": "A1", "rating": 5}))),
            Ok(record(json!({"user_id": "u1", "asin": "A1", "rating": 5}))),
            Ok(record(json!({"user_id": "u2"}))),
        ];
        let mut events = Vec::new();
        let mut reporter = |e: &Event| events.push(e.clone());
        let interactions = parse_reviews(records, &mut reporter).unwrap();
        assert_eq!(interactions.len(), 2);
        assert_eq!(
            events,
            vec![Event::ReviewsParsed(ReviewParseReport { parsed: 2, dropped: 1 })]
        );
    }

    #[test]
    fn test_far_future_duplicate_sorts_as_null() {
        let far = parse_review(&record(
            json!({"user_id": "u1", "asin": "i1", "rating": 5, "timestamp": 1_000_000_000_000_000_i64}),
        ))
        .unwrap();
        let near = parse_review(&record(
            json!({"user_id": "u1", "asin": "i1", "rating": 2, "timestamp": 1_600_000_000_000_i64}),
        ))
        .unwrap();
        assert_eq!(far.timestamp, None);

        let kept = crate::interactions::dedup_latest(vec![far, near]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rating, 5.0);
        assert_eq!(kept[0].timestamp, None);
    }

    #[test]
    fn test_parse_reviews_propagates_io_errors() {
        let records = vec![Err(anyhow::anyhow!("disk gone"))];
        assert!(parse_reviews(records, &mut NullReporter).is_err());
    }
}
