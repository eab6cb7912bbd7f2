//! Date handling for scene acquisition times.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive window of acquisition dates.
///
/// Either bound may be open. A date equal to a bound is inside the range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Range with no bounds; every date is contained.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        if let Some(start) = &self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = &self.end {
            if date > end {
                return false;
            }
        }
        true
    }
}

/// Parse a calendar date (`YYYY-MM-DD`).
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

/// Parse a timestamp as it appears in scene lists.
///
/// Supports:
/// - RFC 3339: "2017-04-26T18:32:05Z"
/// - Space separated with optional fraction: "2017-04-26 18:32:05.187016"
/// - Date only: "2017-04-26" (midnight UTC)
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).naive_utc());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ndt);
        }
    }

    if let Ok(date) = parse_date(s) {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(ndt);
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scene_list_timestamp() {
        let dt = parse_timestamp("2017-04-26 18:32:05.187016").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2017, 4, 26).unwrap());

        let dt = parse_timestamp("2015-01-01").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let start = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2017, 1, 31).unwrap();
        let range = DateRange::new(Some(start), Some(end));

        assert!(range.contains(&start));
        assert!(range.contains(&end));
        assert!(!range.contains(&start.pred_opt().unwrap()));
        assert!(!range.contains(&end.succ_opt().unwrap()));
        assert!(DateRange::unbounded().contains(&start));
    }
}
