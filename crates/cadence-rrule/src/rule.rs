use std::fmt;

use cadence_core::time::resolve_local;
use cadence_core::types::weekday_code;
use cadence_core::Frequency;
use chrono::{DateTime, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;

/// How the anchor's wall-clock reading maps onto an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorZone {
    /// `DTSTART;TZID=<zone>:…`: wall-clock in a named zone.
    Named(Tz),
    /// `DTSTART:…Z`
    Utc,
    /// `DTSTART:…` with neither TZID nor `Z`; read as UTC.
    Floating,
}

/// The DTSTART line: first wall-clock reading of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub local: NaiveDateTime,
    pub zone: AnchorZone,
}

impl Anchor {
    pub fn timezone(&self) -> Tz {
        match self.zone {
            AnchorZone::Named(tz) => tz,
            AnchorZone::Utc | AnchorZone::Floating => chrono_tz::UTC,
        }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        resolve_local(&self.timezone(), self.local).unwrap_or_else(|| self.local.and_utc())
    }
}

/// One BYDAY entry, e.g. `MO`, `3TH` or `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySpec {
    pub weekday: Weekday,
    /// Position within the month (or year); negative counts from the end.
    pub ordinal: Option<i32>,
}

impl WeekdaySpec {
    pub fn plain(weekday: Weekday) -> Self {
        Self {
            weekday,
            ordinal: None,
        }
    }

    pub fn nth(ordinal: i32, weekday: Weekday) -> Self {
        Self {
            weekday,
            ordinal: Some(ordinal),
        }
    }
}

impl fmt::Display for WeekdaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(n) => write!(f, "{}{}", n, weekday_code(self.weekday)),
            None => write!(f, "{}", weekday_code(self.weekday)),
        }
    }
}

/// Termination of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleBound {
    Unbounded,
    Count(u32),
    Until(DateTime<Utc>),
}

/// Structurally valid recurrence descriptor, exactly as written.
///
/// Equivalent encodings are NOT merged here; see [`crate::CanonicalRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecurrenceRule {
    pub anchor: Anchor,
    pub frequency: Frequency,
    /// `None` when INTERVAL was omitted.
    pub interval: Option<u32>,
    pub by_day: Vec<WeekdaySpec>,
    pub by_month_day: Vec<i32>,
    pub by_set_pos: Vec<i32>,
    pub by_month: Vec<u32>,
    pub by_hour: Vec<u32>,
    pub by_minute: Vec<u32>,
    pub bound: RuleBound,
    pub week_start: Weekday,
}

impl ParsedRecurrenceRule {
    /// A bare rule with no refinements.
    pub fn new(anchor: Anchor, frequency: Frequency) -> Self {
        Self {
            anchor,
            frequency,
            interval: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_set_pos: Vec::new(),
            by_month: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            bound: RuleBound::Unbounded,
            week_start: Weekday::Mon,
        }
    }

    /// Resolved interval; a missing INTERVAL means 1.
    pub fn interval(&self) -> u32 {
        self.interval.unwrap_or(1)
    }

    pub fn timezone(&self) -> Tz {
        self.anchor.timezone()
    }

    pub fn has_ordinal_weekdays(&self) -> bool {
        self.by_day.iter().any(|d| d.ordinal.is_some())
    }

    /// Render back to the two-line `DTSTART` + `RRULE` form.
    pub fn to_rrule_string(&self) -> String {
        let stamp = self.anchor.local.format("%Y%m%dT%H%M%S");
        let dtstart = match self.anchor.zone {
            AnchorZone::Named(tz) => format!("DTSTART;TZID={}:{}", tz.name(), stamp),
            AnchorZone::Utc => format!("DTSTART:{stamp}Z"),
            AnchorZone::Floating => format!("DTSTART:{stamp}"),
        };

        let mut parts = vec![format!("FREQ={}", self.frequency)];
        if let Some(interval) = self.interval {
            parts.push(format!("INTERVAL={interval}"));
        }
        if !self.by_day.is_empty() {
            parts.push(format!("BYDAY={}", join(&self.by_day)));
        }
        if !self.by_month_day.is_empty() {
            parts.push(format!("BYMONTHDAY={}", join(&self.by_month_day)));
        }
        if !self.by_set_pos.is_empty() {
            parts.push(format!("BYSETPOS={}", join(&self.by_set_pos)));
        }
        if !self.by_month.is_empty() {
            parts.push(format!("BYMONTH={}", join(&self.by_month)));
        }
        if !self.by_hour.is_empty() {
            parts.push(format!("BYHOUR={}", join(&self.by_hour)));
        }
        if !self.by_minute.is_empty() {
            parts.push(format!("BYMINUTE={}", join(&self.by_minute)));
        }
        match self.bound {
            RuleBound::Unbounded => {}
            RuleBound::Count(n) => parts.push(format!("COUNT={n}")),
            RuleBound::Until(at) => parts.push(format!("UNTIL={}", at.format("%Y%m%dT%H%M%SZ"))),
        }
        if self.week_start != Weekday::Mon {
            parts.push(format!("WKST={}", weekday_code(self.week_start)));
        }

        format!("{dtstart}\nRRULE:{}", parts.join(";"))
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
