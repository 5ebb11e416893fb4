use std::collections::BTreeSet;

use cadence_core::types::weekday_code;
use cadence_core::{Expectation, RecurrenceProposal, RecurrenceRequest, TestCase, WallClock};
use cadence_rrule::{next_occurrence, wall_clock, CanonicalRule, Equivalence, ParsedRecurrenceRule};
use chrono::{NaiveDateTime, Timelike, Weekday};
use tracing::{debug, info};

use crate::outcome::ValidationOutcome;
use crate::structure::{check_structure, CheckedSchedule};

/// Validate `proposal` against the fixture's request and sparse expectation.
pub fn validate(case: &TestCase, proposal: &RecurrenceProposal) -> ValidationOutcome {
    validate_against(&case.request, &case.expected, proposal)
}

/// Structural validation only: nothing is asserted, so every dimension stays `None`.
pub fn validate_structure(
    request: &RecurrenceRequest,
    proposal: &RecurrenceProposal,
) -> ValidationOutcome {
    validate_against(request, &Expectation::default(), proposal)
}

/// Validate `proposal` for `request`, checking only the dimensions `expected` asserts.
///
/// Pure and deterministic: the same inputs always give the same outcome.
pub fn validate_against(
    request: &RecurrenceRequest,
    expected: &Expectation,
    proposal: &RecurrenceProposal,
) -> ValidationOutcome {
    let mut out = ValidationOutcome::default();

    if let Some(exp) = expected.is_recurring {
        let got = proposal.is_recurring();
        out.recurring = Some(got == exp);
        if got != exp {
            out.notes
                .push(format!("recurring: got {got}, expected {exp}"));
        }
    }

    let checked = match check_structure(proposal, request.timezone) {
        Ok(checked) => checked,
        Err(err) => {
            out.parse_error = Some(err.to_string());
            out.notes.push(format!("parse_error: {err}"));
            if let Some(raw) = proposal.rrule_string() {
                out.notes.push(format!("raw_rrule: {raw:?}"));
            }
            debug!(error = %err, "proposal is structurally unusable");
            return out;
        }
    };
    out.parseable = true;

    match checked {
        CheckedSchedule::OneTime(local) => check_one_time(&mut out, request, expected, local),
        CheckedSchedule::Recurring(rule) => check_recurring(&mut out, request, expected, &rule),
    }
    out
}

fn check_one_time(
    out: &mut ValidationOutcome,
    request: &RecurrenceRequest,
    expected: &Expectation,
    local: NaiveDateTime,
) {
    // Rule dimensions asserted against a one-time answer cannot hold.
    let missing = "none (one-time)";
    if let Some(freq) = expected.frequency {
        out.frequency = Some(false);
        out.notes.push(format!("freq: got {missing}, expected {freq}"));
    }
    if let Some(interval) = expected.interval {
        out.interval = Some(false);
        out.notes
            .push(format!("interval: got {missing}, expected {interval}"));
    }
    if let Some(days) = &expected.weekdays {
        out.weekdays = Some(false);
        out.notes
            .push(format!("byDay: got {missing}, expected [{}]", day_list(days)));
    }
    if let Some(days) = &expected.month_days {
        out.month_days = Some(false);
        out.notes.push(format!(
            "byMonthDay: got {missing}, expected [{}]",
            int_list(days.iter().copied().collect())
        ));
    }
    if let Some(pos) = &expected.set_positions {
        out.set_positions = Some(false);
        out.notes.push(format!(
            "bySetPos: got {missing}, expected [{}]",
            int_list(pos.iter().copied().collect())
        ));
    }

    if let Some(want) = expected.wall_clock {
        // a reminder in the past never fires, whatever its time of day
        let now = request.reference_local();
        if local < now {
            out.wall_clock = Some(false);
            out.notes.push(format!(
                "wall_clock: {} is before the reference time {}",
                local.format("%Y-%m-%dT%H:%M"),
                now.format("%Y-%m-%dT%H:%M")
            ));
            return;
        }
        let got = WallClock::new(local.hour(), local.minute());
        out.wall_clock = Some(got == want);
        if got != want {
            out.notes
                .push(format!("wall_clock: got {got}, expected {want}"));
        }
    }
}

fn check_recurring(
    out: &mut ValidationOutcome,
    request: &RecurrenceRequest,
    expected: &Expectation,
    rule: &ParsedRecurrenceRule,
) {
    let canon = CanonicalRule::from(rule);

    if let Some(want) = expected.frequency {
        let exact = canon.frequency == want;
        // The alias only counts when the weekday set it relies on is asserted too.
        let via_alias = !exact
            && expected.weekdays.is_some()
            && canon.frequency_matches(want)
            && canon.has_equivalence(Equivalence::DailyWithWeekdaysAsWeekly);
        out.frequency = Some(exact || via_alias);
        if via_alias {
            accept(out, Equivalence::DailyWithWeekdaysAsWeekly);
        } else if !exact {
            out.notes
                .push(format!("freq: got {}, expected {want}", canon.frequency));
        }
    }

    if let Some(want) = expected.interval {
        out.interval = Some(canon.interval == want);
        if canon.interval != want {
            out.notes
                .push(format!("interval: got {}, expected {want}", canon.interval));
        }
    }

    if let Some(want) = &expected.weekdays {
        let mut want_sorted = want.clone();
        want_sorted.sort_by_key(|d| d.num_days_from_monday());
        want_sorted.dedup();
        let ok = want_sorted == canon.weekdays;
        out.weekdays = Some(ok);
        if !ok {
            out.notes.push(format!(
                "byDay: got [{}], expected [{}]",
                day_list(&canon.weekdays),
                day_list(&want_sorted)
            ));
        }
    }

    if let Some(want) = &expected.month_days {
        let want: BTreeSet<i32> = want.iter().copied().collect();
        let ok = want == canon.month_days;
        out.month_days = Some(ok);
        if !ok {
            out.notes.push(format!(
                "byMonthDay: got [{}], expected [{}]",
                int_list(canon.month_days.clone()),
                int_list(want)
            ));
        }
    }

    if let Some(want) = &expected.set_positions {
        let want: BTreeSet<i32> = want.iter().copied().collect();
        let ok = !canon.set_positions.is_empty() && want == canon.set_positions;
        out.set_positions = Some(ok);
        if ok && canon.has_equivalence(Equivalence::OrdinalFoldedIntoWeekday) {
            accept(out, Equivalence::OrdinalFoldedIntoWeekday);
        } else if !ok {
            out.notes.push(format!(
                "bySetPos: got [{}] ({:?}), expected [{}]",
                int_list(canon.set_positions.clone()),
                canon.set_position_source,
                int_list(want)
            ));
        }
    }

    if let Some(want) = expected.wall_clock {
        match next_occurrence(rule, request.reference_instant()) {
            Some(at) => {
                let got = wall_clock(at, &request.timezone);
                out.wall_clock = Some(got == want);
                if got != want {
                    out.notes.push(format!(
                        "wall_clock: got {got} (UTC: {}), expected {want}",
                        at.to_rfc3339()
                    ));
                }
            }
            None => {
                out.wall_clock = Some(false);
                out.notes
                    .push("wall_clock: no occurrence at or after the reference date".to_string());
            }
        }
    }
}

fn accept(out: &mut ValidationOutcome, eq: Equivalence) {
    info!(equivalence = ?eq, "accepted equivalent encoding");
    out.notes.push(format!("equivalence: {eq}"));
    out.equivalences.push(eq);
}

fn day_list(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| weekday_code(*d))
        .collect::<Vec<_>>()
        .join(",")
}

fn int_list(values: BTreeSet<i32>) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
