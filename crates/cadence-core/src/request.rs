use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::time::resolve_local;

/// Assumed time of day for relative phrases ("in 2 hours") when the caller
/// supplies only a date.
pub const DEFAULT_REFERENCE_TIME: (u32, u32) = (12, 0);

/// Immutable caller input: one free-text scheduling request.
///
/// Wire: `{ "message": "...", "userTimezone": "Europe/Berlin", "referenceDate": "2026-03-01" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRequest {
    pub message: String,
    /// IANA zone id; unknown ids are rejected at deserialization.
    #[serde(rename = "userTimezone")]
    pub timezone: Tz,
    pub reference_date: NaiveDate,
    /// Local time of day the request was made, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<NaiveTime>,
}

impl RecurrenceRequest {
    pub fn new(message: impl Into<String>, timezone: Tz, reference_date: NaiveDate) -> Self {
        Self {
            message: message.into(),
            timezone,
            reference_date,
            reference_time: None,
        }
    }

    pub fn with_reference_time(mut self, time: NaiveTime) -> Self {
        self.reference_time = Some(time);
        self
    }

    /// Local midnight of the reference date, as an instant. Occurrence
    /// searches start here.
    pub fn reference_instant(&self) -> DateTime<Utc> {
        let midnight = self.reference_date.and_time(NaiveTime::MIN);
        resolve_local(&self.timezone, midnight)
            .unwrap_or_else(|| midnight.and_utc())
    }

    /// Local "now" used to resolve relative phrases.
    pub fn reference_local(&self) -> NaiveDateTime {
        let (h, m) = DEFAULT_REFERENCE_TIME;
        let time = self
            .reference_time
            .or_else(|| NaiveTime::from_hms_opt(h, m, 0))
            .unwrap_or(NaiveTime::MIN);
        self.reference_date.and_time(time)
    }

    /// English day-of-week name of the reference date (for prompts).
    pub fn reference_weekday_name(&self) -> &'static str {
        match self.reference_date.weekday() {
            chrono::Weekday::Mon => "Monday",
            chrono::Weekday::Tue => "Tuesday",
            chrono::Weekday::Wed => "Wednesday",
            chrono::Weekday::Thu => "Thursday",
            chrono::Weekday::Fri => "Friday",
            chrono::Weekday::Sat => "Saturday",
            chrono::Weekday::Sun => "Sunday",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn deserializes_wire_shape() {
        let json = r#"{"message":"Every Monday at 10:00","userTimezone":"Europe/Berlin","referenceDate":"2026-03-01"}"#;
        let req: RecurrenceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(req.reference_date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(req.reference_time.is_none());
        assert_eq!(req.reference_weekday_name(), "Sunday");
    }

    #[test]
    fn rejects_unknown_timezone() {
        let json = r#"{"message":"x","userTimezone":"Mars/Olympus","referenceDate":"2026-03-01"}"#;
        assert!(serde_json::from_str::<RecurrenceRequest>(json).is_err());
    }

    #[test]
    fn reference_instant_is_local_midnight() {
        let req = RecurrenceRequest::new(
            "x",
            chrono_tz::US::Eastern,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        );
        // EST is UTC-5 on March 1st.
        assert_eq!(req.reference_instant().hour(), 5);
        assert_eq!(req.reference_local().hour(), 12);
    }
}
