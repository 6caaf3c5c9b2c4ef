use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::CoreError;

/// Parses a start-date filter value: either a full RFC 3339 date-time or a
/// bare `YYYY-MM-DD` date, which is taken as midnight UTC.
pub fn parse_start_date(input: &str) -> Result<DateTime<Utc>, CoreError> {
    let trimmed = input.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidStartDate(trimmed.to_string()))?;
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
    Ok(date.and_time(midnight).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_rfc3339_datetime() {
        let parsed = parse_start_date("2025-06-01T09:30:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn parse_bare_date_as_midnight_utc() {
        let parsed = parse_start_date("2025-06-01").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_offset_datetime_normalizes_to_utc() {
        let parsed = parse_start_date("2025-06-01T02:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn reject_garbage() {
        assert!(parse_start_date("next tuesday").is_err());
        assert!(parse_start_date("2025-13-40").is_err());
    }
}
