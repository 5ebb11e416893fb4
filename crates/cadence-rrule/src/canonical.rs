use std::collections::BTreeSet;
use std::fmt;

use cadence_core::Frequency;
use chrono::Weekday;
use serde::Serialize;

use crate::rule::ParsedRecurrenceRule;

/// Where the canonical set positions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetPositionSource {
    /// No BYSETPOS and no ordinal weekdays.
    Absent,
    /// An explicit BYSETPOS list.
    Explicit,
    /// Ordinals fused into the BYDAY codes (`3TH`, `-1FR`).
    WeekdayOrdinal,
}

/// An alternative encoding folded into the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Equivalence {
    /// DAILY restricted to a weekday set enumerates the same dates as WEEKLY with that set.
    DailyWithWeekdaysAsWeekly,
    /// `BYDAY=3TH` read as `BYDAY=TH;BYSETPOS=3`.
    OrdinalFoldedIntoWeekday,
}

impl fmt::Display for Equivalence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Equivalence::DailyWithWeekdaysAsWeekly => {
                write!(f, "DAILY+BYDAY treated as WEEKLY+BYDAY (same dates)")
            }
            Equivalence::OrdinalFoldedIntoWeekday => write!(f, "bySetPos: encoded via BYDAY nth"),
        }
    }
}

/// Normal form used for comparison. Two rules that enumerate the same dates
/// through different encodings land on the same comparable fields here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRule {
    /// Frequency as written.
    pub frequency: Frequency,
    /// Equivalent frequency, when the written one has a recognised alias.
    pub alias: Option<Frequency>,
    pub interval: u32,
    /// Weekday set with ordinals stripped, Monday first, no duplicates.
    pub weekdays: Vec<Weekday>,
    pub month_days: BTreeSet<i32>,
    pub set_positions: BTreeSet<i32>,
    pub set_position_source: SetPositionSource,
    pub equivalences: Vec<Equivalence>,
}

impl CanonicalRule {
    /// True when `frequency` is the written frequency or its alias.
    pub fn frequency_matches(&self, frequency: Frequency) -> bool {
        self.frequency == frequency || self.alias == Some(frequency)
    }

    pub fn has_equivalence(&self, eq: Equivalence) -> bool {
        self.equivalences.contains(&eq)
    }
}

impl From<&ParsedRecurrenceRule> for CanonicalRule {
    fn from(rule: &ParsedRecurrenceRule) -> Self {
        let mut equivalences = Vec::new();

        let mut weekdays: Vec<Weekday> = rule.by_day.iter().map(|d| d.weekday).collect();
        weekdays.sort_by_key(|d| d.num_days_from_monday());
        weekdays.dedup();

        let month_days: BTreeSet<i32> = rule.by_month_day.iter().copied().collect();

        let (set_positions, set_position_source) = if !rule.by_set_pos.is_empty() {
            (
                rule.by_set_pos.iter().copied().collect(),
                SetPositionSource::Explicit,
            )
        } else if rule.has_ordinal_weekdays() {
            equivalences.push(Equivalence::OrdinalFoldedIntoWeekday);
            (
                rule.by_day.iter().filter_map(|d| d.ordinal).collect(),
                SetPositionSource::WeekdayOrdinal,
            )
        } else {
            (BTreeSet::new(), SetPositionSource::Absent)
        };

        let interval = rule.interval();
        let alias = if rule.frequency == Frequency::Daily
            && interval == 1
            && !weekdays.is_empty()
            && month_days.is_empty()
            && set_positions.is_empty()
        {
            equivalences.push(Equivalence::DailyWithWeekdaysAsWeekly);
            Some(Frequency::Weekly)
        } else {
            None
        };

        Self {
            frequency: rule.frequency,
            alias,
            interval,
            weekdays,
            month_days,
            set_positions,
            set_position_source,
            equivalences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_rule;

    fn canon(src: &str) -> CanonicalRule {
        CanonicalRule::from(&parse_rule(src).unwrap())
    }

    #[test]
    fn explicit_and_fused_ordinals_agree() {
        let explicit = canon("DTSTART;TZID=Europe/Berlin:20260319T150000\nRRULE:FREQ=MONTHLY;BYDAY=TH;BYSETPOS=3");
        let fused = canon("DTSTART;TZID=Europe/Berlin:20260319T150000\nRRULE:FREQ=MONTHLY;BYDAY=3TH");

        assert_eq!(explicit.weekdays, fused.weekdays);
        assert_eq!(explicit.set_positions, fused.set_positions);
        assert_eq!(explicit.set_position_source, SetPositionSource::Explicit);
        assert_eq!(fused.set_position_source, SetPositionSource::WeekdayOrdinal);
        assert!(fused.has_equivalence(Equivalence::OrdinalFoldedIntoWeekday));
        assert!(explicit.equivalences.is_empty());
    }

    #[test]
    fn daily_with_weekdays_aliases_weekly() {
        let rule = canon("DTSTART;TZID=Europe/Berlin:20260302T090000\nRRULE:FREQ=DAILY;BYDAY=FR,MO,WE");
        assert_eq!(rule.alias, Some(Frequency::Weekly));
        assert!(rule.frequency_matches(Frequency::Weekly));
        assert!(rule.frequency_matches(Frequency::Daily));
        assert_eq!(rule.weekdays, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
    }

    #[test]
    fn daily_with_interval_has_no_alias() {
        let rule = canon("DTSTART;TZID=Europe/Berlin:20260302T090000\nRRULE:FREQ=DAILY;INTERVAL=2;BYDAY=MO");
        assert_eq!(rule.alias, None);
        assert!(!rule.frequency_matches(Frequency::Weekly));
    }

    #[test]
    fn missing_interval_resolves_to_one() {
        let rule = canon("DTSTART;TZID=Europe/Berlin:20260302T090000\nRRULE:FREQ=WEEKLY");
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.set_position_source, SetPositionSource::Absent);
    }
}
