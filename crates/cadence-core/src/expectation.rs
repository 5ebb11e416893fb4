use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::request::RecurrenceRequest;
use crate::types::{weekday_codes, Category, Frequency, WallClock};

/// Sparse expected attributes. Only asserted (`Some`) dimensions are checked;
/// `Expectation::default()` asserts nothing and is what production callers use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(default, rename = "freq", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(
        default,
        rename = "byDay",
        with = "weekday_codes",
        skip_serializing_if = "Option::is_none"
    )]
    pub weekdays: Option<Vec<Weekday>>,
    #[serde(default, rename = "byMonthDay", skip_serializing_if = "Option::is_none")]
    pub month_days: Option<Vec<i32>>,
    #[serde(default, rename = "bySetPos", skip_serializing_if = "Option::is_none")]
    pub set_positions: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_clock: Option<WallClock>,
}

impl Expectation {
    pub fn recurring(frequency: Frequency, wall_clock: WallClock) -> Self {
        Self {
            is_recurring: Some(true),
            frequency: Some(frequency),
            wall_clock: Some(wall_clock),
            ..Self::default()
        }
    }

    pub fn one_time(wall_clock: Option<WallClock>) -> Self {
        Self {
            is_recurring: Some(false),
            wall_clock,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_weekdays(mut self, days: &[Weekday]) -> Self {
        self.weekdays = Some(days.to_vec());
        self
    }

    pub fn with_month_days(mut self, days: &[i32]) -> Self {
        self.month_days = Some(days.to_vec());
        self
    }

    pub fn with_set_positions(mut self, positions: &[i32]) -> Self {
        self.set_positions = Some(positions.to_vec());
        self
    }
}

/// Evaluation fixture: a request plus the attributes asserted about its answer.
///
/// Wire: the request fields are inlined next to `id`, `category`, `expected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: u32,
    pub category: Category,
    #[serde(flatten)]
    pub request: RecurrenceRequest,
    pub expected: Expectation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_parses_sparse_fixture() {
        let json = r#"{
            "id": 15,
            "category": "complex",
            "message": "Every third Thursday of the month at 15:00",
            "userTimezone": "Europe/Berlin",
            "referenceDate": "2026-03-01",
            "expected": {
                "isRecurring": true,
                "freq": "MONTHLY",
                "byDay": ["TH"],
                "bySetPos": [3],
                "wallClock": "15:00"
            }
        }"#;
        let case: TestCase = serde_json::from_str(json).unwrap();
        assert_eq!(case.category, Category::Complex);
        assert_eq!(case.expected.frequency, Some(Frequency::Monthly));
        assert_eq!(case.expected.weekdays, Some(vec![Weekday::Thu]));
        assert_eq!(case.expected.set_positions, Some(vec![3]));
        assert_eq!(case.expected.interval, None);
        assert_eq!(case.expected.wall_clock, Some(WallClock::new(15, 0)));
    }

    #[test]
    fn default_expectation_asserts_nothing() {
        let exp = Expectation::default();
        assert!(exp.is_recurring.is_none());
        assert!(exp.frequency.is_none() && exp.wall_clock.is_none());
        assert_eq!(serde_json::to_string(&exp).unwrap(), "{}");
    }
}
