//! Occurrence expansion for parsed rules.
//!
//! Periods (day, week, month or year) are walked from the anchor's period in
//! steps of `interval`. Each period yields its candidate local datetimes, which
//! are narrowed by BYSETPOS, converted to UTC in the rule's timezone and then
//! filtered against the anchor and the COUNT/UNTIL bound.

use std::collections::{BTreeSet, VecDeque};

use cadence_core::time::resolve_local;
use cadence_core::Frequency;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

pub use cadence_core::time::wall_clock;

use crate::rule::{ParsedRecurrenceRule, RuleBound, WeekdaySpec};

/// Days in one Gregorian cycle; every date/weekday pattern repeats after it.
const GREGORIAN_CYCLE_DAYS: u32 = 146_097;

/// First occurrence at or after `reference`, or `None` when the series ends
/// (or never produces a date) before that point.
pub fn next_occurrence(
    rule: &ParsedRecurrenceRule,
    reference: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    occurrences(rule).find(|at| *at >= reference)
}

/// Lazily enumerate every occurrence of `rule`, in chronological order.
pub fn occurrences(rule: &ParsedRecurrenceRule) -> Occurrences<'_> {
    Occurrences {
        rule,
        tz: rule.timezone(),
        start: rule.anchor.instant(),
        period: 0,
        pending: VecDeque::new(),
        emitted: 0,
        idle: 0,
        max_idle: idle_limit(rule),
        exhausted: false,
    }
}

/// Consecutive empty periods before iteration gives up: one Gregorian cycle
/// of calendar time, whatever the frequency and interval.
fn idle_limit(rule: &ParsedRecurrenceRule) -> u32 {
    let periods = match rule.frequency {
        Frequency::Daily => GREGORIAN_CYCLE_DAYS,
        Frequency::Weekly => GREGORIAN_CYCLE_DAYS / 7 + 1,
        Frequency::Monthly => 400 * 12,
        Frequency::Yearly => 400,
    };
    periods.div_ceil(rule.interval().max(1)) + 1
}

pub struct Occurrences<'a> {
    rule: &'a ParsedRecurrenceRule,
    tz: Tz,
    start: DateTime<Utc>,
    period: i64,
    pending: VecDeque<DateTime<Utc>>,
    emitted: u32,
    idle: u32,
    max_idle: u32,
    exhausted: bool,
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(at) = self.pending.pop_front() {
                match self.rule.bound {
                    RuleBound::Count(n) if self.emitted >= n => {
                        self.exhausted = true;
                        self.pending.clear();
                        return None;
                    }
                    RuleBound::Until(until) if at > until => {
                        self.exhausted = true;
                        self.pending.clear();
                        return None;
                    }
                    _ => {}
                }
                self.emitted += 1;
                return Some(at);
            }

            if self.exhausted {
                return None;
            }
            if self.idle >= self.max_idle {
                debug!(
                    rule = %self.rule.to_rrule_string(),
                    periods = self.idle,
                    "rule produced no occurrence, giving up"
                );
                self.exhausted = true;
                return None;
            }

            let Some(locals) = period_candidates(self.rule, self.period) else {
                self.exhausted = true;
                return None;
            };
            self.period += 1;

            let before = self.pending.len();
            for local in locals {
                if let Some(at) = resolve_local(&self.tz, local) {
                    if at >= self.start {
                        self.pending.push_back(at);
                    }
                }
            }
            if self.pending.len() == before {
                self.idle += 1;
            } else {
                self.idle = 0;
            }
        }
    }
}

/// Sorted local candidates of period `index`, after BYSETPOS.
/// `None` once the calendar runs out.
fn period_candidates(rule: &ParsedRecurrenceRule, index: i64) -> Option<Vec<NaiveDateTime>> {
    let step = index.checked_mul(i64::from(rule.interval()))?;
    let anchor = rule.anchor.local.date();

    let dates: Vec<NaiveDate> = match rule.frequency {
        Frequency::Daily => {
            let day = anchor.checked_add_signed(Duration::try_days(step)?)?;
            vec![day]
                .into_iter()
                .filter(|d| month_allowed(rule, d.month()))
                .filter(|d| month_day_allowed(rule, *d))
                .filter(|d| weekday_allowed(rule, *d))
                .collect()
        }
        Frequency::Weekly => {
            let offset = (7 + anchor.weekday().num_days_from_monday()
                - rule.week_start.num_days_from_monday())
                % 7;
            let week_start = anchor
                .checked_sub_signed(Duration::days(i64::from(offset)))?
                .checked_add_signed(Duration::try_days(step.checked_mul(7)?)?)?;
            week_start
                .iter_days()
                .take(7)
                .filter(|d| {
                    if rule.by_day.is_empty() {
                        d.weekday() == anchor.weekday()
                    } else {
                        weekday_allowed(rule, *d)
                    }
                })
                .filter(|d| month_allowed(rule, d.month()))
                .filter(|d| month_day_allowed(rule, *d))
                .collect()
        }
        Frequency::Monthly => {
            let base = i64::from(anchor.year()) * 12 + i64::from(anchor.month0());
            let idx = base.checked_add(step)?;
            let year = i32::try_from(idx.div_euclid(12)).ok()?;
            let month = idx.rem_euclid(12) as u32 + 1;
            NaiveDate::from_ymd_opt(year, 1, 1)?;
            if month_allowed(rule, month) {
                month_dates(rule, year, month, anchor.day())
            } else {
                Vec::new()
            }
        }
        Frequency::Yearly => {
            let year = i32::try_from(i64::from(anchor.year()).checked_add(step)?).ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1)?;
            year_dates(rule, year, anchor)
        }
    };

    let times = times_of_day(rule);
    let mut locals: BTreeSet<NaiveDateTime> = BTreeSet::new();
    for date in dates {
        for &(h, m, s) in &times {
            if let Some(dt) = date.and_hms_opt(h, m, s) {
                locals.insert(dt);
            }
        }
    }

    Some(apply_set_positions(&rule.by_set_pos, locals.into_iter().collect()))
}

/// Candidate dates of one month for MONTHLY (and YEARLY with BYMONTH).
fn month_dates(rule: &ParsedRecurrenceRule, year: i32, month: u32, anchor_day: u32) -> Vec<NaiveDate> {
    let Some((first, last)) = month_bounds(year, month) else {
        return Vec::new();
    };

    match (rule.by_month_day.is_empty(), rule.by_day.is_empty()) {
        (true, true) => NaiveDate::from_ymd_opt(year, month, anchor_day)
            .into_iter()
            .collect(),
        (false, true) => month_day_dates(year, month, &rule.by_month_day),
        (true, false) => weekday_dates(first, last, &rule.by_day),
        (false, false) => {
            let by_weekday: BTreeSet<NaiveDate> =
                weekday_dates(first, last, &rule.by_day).into_iter().collect();
            month_day_dates(year, month, &rule.by_month_day)
                .into_iter()
                .filter(|d| by_weekday.contains(d))
                .collect()
        }
    }
}

fn year_dates(rule: &ParsedRecurrenceRule, year: i32, anchor: NaiveDate) -> Vec<NaiveDate> {
    if !rule.by_month.is_empty() {
        return rule
            .by_month
            .iter()
            .flat_map(|&m| month_dates(rule, year, m, anchor.day()))
            .collect();
    }
    if !rule.by_month_day.is_empty() {
        return (1..=12)
            .flat_map(|m| month_dates(rule, year, m, anchor.day()))
            .collect();
    }
    if !rule.by_day.is_empty() {
        let (Some(first), Some(last)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return Vec::new();
        };
        return weekday_dates(first, last, &rule.by_day);
    }
    NaiveDate::from_ymd_opt(year, anchor.month(), anchor.day())
        .into_iter()
        .collect()
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Resolve signed month days (`-1` = last day); days the month lacks are skipped.
fn month_day_dates(year: i32, month: u32, days: &[i32]) -> Vec<NaiveDate> {
    let Some((_, last)) = month_bounds(year, month) else {
        return Vec::new();
    };
    let len = last.day() as i32;
    let resolved: BTreeSet<NaiveDate> = days
        .iter()
        .filter_map(|&d| {
            let day = if d > 0 { d } else { len + d + 1 };
            if (1..=len).contains(&day) {
                NaiveDate::from_ymd_opt(year, month, day as u32)
            } else {
                None
            }
        })
        .collect();
    resolved.into_iter().collect()
}

/// Dates in `[first, last]` selected by BYDAY; ordinals pick the nth match
/// within that range, counting from the end when negative.
fn weekday_dates(first: NaiveDate, last: NaiveDate, specs: &[WeekdaySpec]) -> Vec<NaiveDate> {
    let mut out = BTreeSet::new();
    for spec in specs {
        let matching: Vec<NaiveDate> = first
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| d.weekday() == spec.weekday)
            .collect();
        match spec.ordinal {
            None => out.extend(matching),
            Some(n) => {
                if let Some(d) = nth(&matching, n) {
                    out.insert(*d);
                }
            }
        }
    }
    out.into_iter().collect()
}

fn apply_set_positions(positions: &[i32], sorted: Vec<NaiveDateTime>) -> Vec<NaiveDateTime> {
    if positions.is_empty() {
        return sorted;
    }
    let picked: BTreeSet<NaiveDateTime> = positions
        .iter()
        .filter_map(|&p| nth(&sorted, p).copied())
        .collect();
    picked.into_iter().collect()
}

/// 1-based from the front, or from the back when negative.
fn nth<T>(items: &[T], n: i32) -> Option<&T> {
    let len = items.len() as i64;
    let idx = if n > 0 { i64::from(n) - 1 } else { len + i64::from(n) };
    if (0..len).contains(&idx) {
        items.get(idx as usize)
    } else {
        None
    }
}

fn times_of_day(rule: &ParsedRecurrenceRule) -> Vec<(u32, u32, u32)> {
    let anchor = rule.anchor.local;
    let hours = if rule.by_hour.is_empty() {
        vec![anchor.hour()]
    } else {
        rule.by_hour.clone()
    };
    let minutes = if rule.by_minute.is_empty() {
        vec![anchor.minute()]
    } else {
        rule.by_minute.clone()
    };
    hours
        .iter()
        .flat_map(|&h| minutes.iter().map(move |&m| (h, m, anchor.second())))
        .collect()
}

fn month_allowed(rule: &ParsedRecurrenceRule, month: u32) -> bool {
    rule.by_month.is_empty() || rule.by_month.contains(&month)
}

fn month_day_allowed(rule: &ParsedRecurrenceRule, date: NaiveDate) -> bool {
    rule.by_month_day.is_empty()
        || month_day_dates(date.year(), date.month(), &rule.by_month_day).contains(&date)
}

fn weekday_allowed(rule: &ParsedRecurrenceRule, date: NaiveDate) -> bool {
    rule.by_day.is_empty() || rule.by_day.iter().any(|d| d.weekday == date.weekday())
}
