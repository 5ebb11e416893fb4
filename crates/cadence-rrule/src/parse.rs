//! Parser for the two-line `DTSTART` + `RRULE` descriptor.
//!
//! ```text
//! DTSTART;TZID=Europe/Berlin:20260319T150000
//! RRULE:FREQ=MONTHLY;BYDAY=TH;BYSETPOS=3
//! ```

use cadence_core::types::parse_weekday_code;
use cadence_core::Frequency;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{Result, RuleError};
use crate::rule::{Anchor, AnchorZone, ParsedRecurrenceRule, RuleBound, WeekdaySpec};

/// Turn escaped (`\n`, `\r\n`) and CRLF separators into plain newlines.
pub fn normalize_separators(input: &str) -> String {
    input
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\r\n", "\n")
}

/// Parse a generator-produced descriptor into a [`ParsedRecurrenceRule`].
pub fn parse_rule(input: &str) -> Result<ParsedRecurrenceRule> {
    let normalized = normalize_separators(input);

    let mut anchor: Option<Anchor> = None;
    let mut rrule: Option<&str> = None;

    for line in normalized.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let upper = line.to_ascii_uppercase();
        if upper.starts_with("DTSTART") {
            if anchor.is_some() {
                return Err(RuleError::DuplicateProperty("DTSTART".into()));
            }
            anchor = Some(parse_dtstart(&line["DTSTART".len()..])?);
        } else if upper.starts_with("RRULE:") {
            if rrule.is_some() {
                return Err(RuleError::DuplicateProperty("RRULE".into()));
            }
            rrule = Some(&line["RRULE:".len()..]);
        } else {
            let name = line.split([':', ';']).next().unwrap_or(line);
            return Err(RuleError::UnknownProperty(name.to_string()));
        }
    }

    let anchor = anchor.ok_or(RuleError::MissingAnchor)?;
    let body = rrule.ok_or(RuleError::MissingRule)?;
    parse_rrule_body(anchor, body)
}

/// Parse what follows `DTSTART`: `;TZID=<zone>:<stamp>` or `:<stamp>[Z]`.
fn parse_dtstart(rest: &str) -> Result<Anchor> {
    let (params, value) = rest.split_once(':').ok_or_else(|| RuleError::InvalidDateTime {
        value: rest.to_string(),
        reason: "expected ':' before the timestamp".into(),
    })?;

    let mut tz: Option<Tz> = None;
    for param in params.split(';').filter(|p| !p.is_empty()) {
        let (key, val) = param
            .split_once('=')
            .ok_or_else(|| RuleError::UnknownProperty(param.to_string()))?;
        match key.to_ascii_uppercase().as_str() {
            "TZID" => {
                let zone = val
                    .parse::<Tz>()
                    .map_err(|_| RuleError::InvalidTimezone(val.to_string()))?;
                tz = Some(zone);
            }
            "VALUE" if val.eq_ignore_ascii_case("DATE-TIME") => {}
            _ => return Err(RuleError::UnknownProperty(format!("DTSTART;{param}"))),
        }
    }

    let (local, is_utc) = parse_stamp(value.trim())?;
    let zone = match (tz, is_utc) {
        (Some(_), true) => {
            return Err(RuleError::InvalidDateTime {
                value: value.to_string(),
                reason: "TZID and a trailing Z are contradictory".into(),
            })
        }
        (Some(tz), false) => AnchorZone::Named(tz),
        (None, true) => AnchorZone::Utc,
        (None, false) => AnchorZone::Floating,
    };
    Ok(Anchor { local, zone })
}

/// `YYYYMMDDTHHMMSS` with an optional trailing `Z`.
fn parse_stamp(value: &str) -> Result<(NaiveDateTime, bool)> {
    let (digits, is_utc) = match value.strip_suffix(['Z', 'z']) {
        Some(d) => (d, true),
        None => (value, false),
    };
    if digits.len() != 15 {
        return Err(RuleError::InvalidDateTime {
            value: value.to_string(),
            reason: "expected YYYYMMDDTHHMMSS".into(),
        });
    }
    let local = NaiveDateTime::parse_from_str(digits, "%Y%m%dT%H%M%S").map_err(|e| {
        RuleError::InvalidDateTime {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok((local, is_utc))
}

/// `UNTIL` also allows a bare `YYYYMMDD` date (end of that day is not implied;
/// the date is read as midnight in the anchor's zone).
fn parse_until(value: &str, anchor: &Anchor) -> Result<DateTime<Utc>> {
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|e| {
            RuleError::InvalidDateTime {
                value: value.to_string(),
                reason: e.to_string(),
            }
        })?;
        let local = date.and_time(NaiveTime::MIN);
        return Ok(Anchor { local, ..*anchor }.instant());
    }
    let (local, is_utc) = parse_stamp(value)?;
    if is_utc {
        Ok(local.and_utc())
    } else {
        Ok(Anchor { local, ..*anchor }.instant())
    }
}

fn parse_rrule_body(anchor: Anchor, body: &str) -> Result<ParsedRecurrenceRule> {
    let mut frequency: Option<Frequency> = None;
    let mut seen: Vec<String> = Vec::new();
    let mut interval = None;
    let mut by_day = Vec::new();
    let mut by_month_day = Vec::new();
    let mut by_set_pos = Vec::new();
    let mut by_month = Vec::new();
    let mut by_hour = Vec::new();
    let mut by_minute = Vec::new();
    let mut count = None;
    let mut until = None;
    let mut week_start = Weekday::Mon;
    let mut raw_days: Vec<&str> = Vec::new();

    for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| RuleError::UnknownProperty(part.to_string()))?;
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();
        if seen.contains(&key) {
            return Err(RuleError::DuplicateProperty(key));
        }
        seen.push(key.clone());

        match key.as_str() {
            "FREQ" => {
                frequency = Some(
                    value
                        .parse()
                        .map_err(|_| RuleError::UnknownFrequency(value.to_string()))?,
                );
            }
            "INTERVAL" => interval = Some(parse_ranged(&key, value, 1, i64::from(u32::MAX))? as u32),
            "BYDAY" => raw_days = value.split(',').map(str::trim).collect(),
            "BYMONTHDAY" => by_month_day = parse_signed_list(&key, value, 31)?,
            "BYSETPOS" => by_set_pos = parse_signed_list(&key, value, 366)?,
            "BYMONTH" => by_month = parse_unsigned_list(&key, value, 1, 12)?,
            "BYHOUR" => by_hour = parse_unsigned_list(&key, value, 0, 23)?,
            "BYMINUTE" => by_minute = parse_unsigned_list(&key, value, 0, 59)?,
            "COUNT" => count = Some(parse_ranged(&key, value, 1, i64::from(u32::MAX))? as u32),
            "UNTIL" => until = Some(parse_until(value, &anchor)?),
            "WKST" => {
                week_start = parse_weekday_code(value)
                    .ok_or_else(|| RuleError::MalformedWeekday(value.to_string()))?;
            }
            _ => return Err(RuleError::UnknownProperty(key)),
        }
    }

    let frequency = frequency.ok_or(RuleError::MissingFrequency)?;

    for token in raw_days {
        let spec = parse_weekday_spec(token)?;
        if spec.ordinal.is_some()
            && !matches!(frequency, Frequency::Monthly | Frequency::Yearly)
        {
            return Err(RuleError::OrdinalNotAllowed {
                token: token.to_string(),
                frequency: frequency.to_string(),
            });
        }
        by_day.push(spec);
    }

    let bound = match (count, until) {
        (Some(_), Some(_)) => return Err(RuleError::ConflictingBounds),
        (Some(n), None) => RuleBound::Count(n),
        (None, Some(at)) => RuleBound::Until(at),
        (None, None) => RuleBound::Unbounded,
    };

    Ok(ParsedRecurrenceRule {
        anchor,
        frequency,
        interval,
        by_day,
        by_month_day,
        by_set_pos,
        by_month,
        by_hour,
        by_minute,
        bound,
        week_start,
    })
}

/// `MO`, `3TH`, `+2WE`, `-1FR`.
pub fn parse_weekday_spec(token: &str) -> Result<WeekdaySpec> {
    let malformed = || RuleError::MalformedWeekday(token.to_string());
    if token.len() < 2 || !token.is_ascii() {
        return Err(malformed());
    }
    let (prefix, code) = token.split_at(token.len() - 2);
    let weekday = parse_weekday_code(code).ok_or_else(malformed)?;
    if prefix.is_empty() {
        return Ok(WeekdaySpec::plain(weekday));
    }

    let digits = prefix.trim_start_matches(['+', '-']);
    if digits.is_empty() || prefix.len() - digits.len() > 1 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let n: i32 = prefix.parse().map_err(|_| malformed())?;
    if n == 0 || n.abs() > 53 {
        return Err(RuleError::OutOfRange {
            property: "BYDAY".into(),
            value: i64::from(n),
        });
    }
    Ok(WeekdaySpec::nth(n, weekday))
}

fn parse_int(property: &str, value: &str) -> Result<i64> {
    value.trim().parse::<i64>().map_err(|_| RuleError::InvalidInteger {
        property: property.to_string(),
        value: value.to_string(),
    })
}

fn parse_ranged(property: &str, value: &str, min: i64, max: i64) -> Result<i64> {
    let n = parse_int(property, value)?;
    if n < min || n > max {
        return Err(RuleError::OutOfRange {
            property: property.to_string(),
            value: n,
        });
    }
    Ok(n)
}

/// Comma list of non-zero integers in `-limit..=limit`.
fn parse_signed_list(property: &str, value: &str, limit: i64) -> Result<Vec<i32>> {
    value
        .split(',')
        .map(|v| {
            let n = parse_int(property, v)?;
            if n == 0 || n.abs() > limit {
                return Err(RuleError::OutOfRange {
                    property: property.to_string(),
                    value: n,
                });
            }
            Ok(n as i32)
        })
        .collect()
}

fn parse_unsigned_list(property: &str, value: &str, min: i64, max: i64) -> Result<Vec<u32>> {
    value
        .split(',')
        .map(|v| parse_ranged(property, v, min, max).map(|n| n as u32))
        .collect()
}
