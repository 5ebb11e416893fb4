use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Recurrence frequency. Only the four values the reminder engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

/// Two-letter iCalendar code for a weekday (`MO` … `SU`).
pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Parse a two-letter weekday code. Case-insensitive.
pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Serde adapter for `Option<Vec<Weekday>>` written as `["MO", "WE"]`.
pub mod weekday_codes {
    use super::*;

    pub fn serialize<S: Serializer>(days: &Option<Vec<Weekday>>, s: S) -> Result<S::Ok, S::Error> {
        match days {
            Some(days) => {
                let codes: Vec<&str> = days.iter().map(|d| weekday_code(*d)).collect();
                codes.serialize(s)
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Weekday>>, D::Error> {
        let codes: Option<Vec<String>> = Option::deserialize(d)?;
        codes
            .map(|codes| {
                codes
                    .iter()
                    .map(|c| {
                        parse_weekday_code(c).ok_or_else(|| {
                            serde::de::Error::custom(format!("unknown weekday code: {c}"))
                        })
                    })
                    .collect()
            })
            .transpose()
    }
}

/// Local clock time in a named timezone, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallClock {
    pub hour: u32,
    pub minute: u32,
}

impl WallClock {
    /// Hour 24 (end-of-day notation) normalizes to 0.
    pub fn new(hour: u32, minute: u32) -> Self {
        Self {
            hour: hour % 24,
            minute,
        }
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallClock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
        let hour: u32 = h.parse().map_err(|_| format!("invalid hour in {s:?}"))?;
        let minute: u32 = m.parse().map_err(|_| format!("invalid minute in {s:?}"))?;
        if hour > 24 || minute > 59 {
            return Err(format!("wall clock {s:?} is out of range"));
        }
        Ok(WallClock::new(hour, minute))
    }
}

impl Serialize for WallClock {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{:02}:{:02}", self.hour, self.minute))
    }
}

impl<'de> Deserialize<'de> for WallClock {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Token counts reported by a generator backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
}

impl TokenUsage {
    pub fn new(input: u32, output: u32) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u64 {
        self.input as u64 + self.output as u64
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input: self.input.saturating_add(rhs.input),
            output: self.output.saturating_add(rhs.output),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

/// Input-complexity bucket of an evaluation case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Simple,
    Medium,
    Complex,
    Ambiguous,
    OneTime,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Simple => "simple",
            Category::Medium => "medium",
            Category::Complex => "complex",
            Category::Ambiguous => "ambiguous",
            Category::OneTime => "one_time",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Category::Simple),
            "medium" => Ok(Category::Medium),
            "complex" => Ok(Category::Complex),
            "ambiguous" => Ok(Category::Ambiguous),
            "one_time" => Ok(Category::OneTime),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("weekly".parse::<Frequency>(), Ok(Frequency::Weekly));
        assert!("QUARTERLY".parse::<Frequency>().is_err());
    }

    #[test]
    fn wall_clock_hour_24_normalizes_to_midnight() {
        assert_eq!(WallClock::new(24, 0), WallClock::new(0, 0));
        assert_eq!("24:00".parse::<WallClock>(), Ok(WallClock::new(0, 0)));
    }

    #[test]
    fn wall_clock_serializes_zero_padded() {
        let json = serde_json::to_string(&WallClock::new(8, 5)).unwrap();
        assert_eq!(json, r#""08:05""#);
        assert_eq!(WallClock::new(8, 5).to_string(), "8:05");
    }

    #[test]
    fn token_usage_adds() {
        let mut total = TokenUsage::new(100, 20);
        total += TokenUsage::new(50, 5);
        assert_eq!(total, TokenUsage::new(150, 25));
        assert_eq!(total.total(), 175);
    }

    #[test]
    fn weekday_codes_round_trip() {
        for day in [Weekday::Mon, Weekday::Thu, Weekday::Sun] {
            assert_eq!(parse_weekday_code(weekday_code(day)), Some(day));
        }
        assert_eq!(parse_weekday_code("th"), Some(Weekday::Thu));
        assert_eq!(parse_weekday_code("XX"), None);
    }
}
