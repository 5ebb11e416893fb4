use cadence_core::{ProposedSchedule, RecurrenceProposal};
use cadence_rrule::{parse_rule, ParsedRecurrenceRule};
use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;

use crate::error::{Result, StructuralError};

/// A proposal that passed the structural check, by branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedSchedule {
    Recurring(ParsedRecurrenceRule),
    /// Local wall-clock datetime in the caller's timezone.
    OneTime(NaiveDateTime),
}

/// Structural check only: exclusive-or of the two fields, rule grammar,
/// one-time datetime format. No expectation is consulted.
pub fn check_structure(proposal: &RecurrenceProposal, tz: Tz) -> Result<CheckedSchedule> {
    match &proposal.schedule {
        ProposedSchedule::Recurring {
            stray_datetime: Some(_),
            ..
        }
        | ProposedSchedule::OneTime {
            stray_rrule: Some(_),
            ..
        } => Err(StructuralError::BothBranches),
        ProposedSchedule::Recurring { rrule: None, .. } => Err(StructuralError::MissingRule),
        ProposedSchedule::Recurring {
            rrule: Some(rrule), ..
        } => Ok(CheckedSchedule::Recurring(parse_rule(rrule)?)),
        ProposedSchedule::OneTime { at: None, .. } => Err(StructuralError::MissingDateTime),
        ProposedSchedule::OneTime { at: Some(at), .. } => {
            Ok(CheckedSchedule::OneTime(parse_one_time(at, tz)?))
        }
    }
}

/// `YYYY-MM-DDTHH:MM[:SS]` (or with a space for the `T`) is read as local time
/// in `tz`; RFC 3339 values with an offset or `Z` are converted into `tz`.
pub fn parse_one_time(value: &str, tz: Tz) -> Result<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&tz).naive_local());
    }
    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    .ok_or_else(|| StructuralError::InvalidDateTime {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_rrule::RuleError;
    use chrono::Timelike;
    use chrono_tz::Europe::Berlin;

    #[test]
    fn naive_and_offset_datetimes() {
        let local = parse_one_time("2026-03-01T14:00:00", Berlin).unwrap();
        assert_eq!(local.hour(), 14);
        let short = parse_one_time("2026-03-01T14:00", Berlin).unwrap();
        assert_eq!(short, local);
        let zulu = parse_one_time("2026-03-01T13:00:00Z", Berlin).unwrap();
        assert_eq!(zulu, local);
        assert_eq!(parse_one_time("2026-03-01 14:00:00", Berlin).unwrap(), local);
        assert_eq!(parse_one_time("2026-03-01 14:00", Berlin).unwrap(), local);
        assert!(matches!(
            parse_one_time("tomorrow 2pm", Berlin),
            Err(StructuralError::InvalidDateTime { .. })
        ));
    }

    #[test]
    fn both_fields_set_is_structural_failure() {
        let proposal = RecurrenceProposal::bare(ProposedSchedule::Recurring {
            rrule: Some("DTSTART;TZID=Europe/Berlin:20260302T090000\nRRULE:FREQ=DAILY".into()),
            stray_datetime: Some("2026-03-02T09:00:00".into()),
        });
        assert_eq!(
            check_structure(&proposal, Berlin),
            Err(StructuralError::BothBranches)
        );
    }

    #[test]
    fn missing_fields_per_branch() {
        let recurring = RecurrenceProposal::bare(ProposedSchedule::Recurring {
            rrule: None,
            stray_datetime: None,
        });
        assert_eq!(
            check_structure(&recurring, Berlin),
            Err(StructuralError::MissingRule)
        );
        let one_time = RecurrenceProposal::bare(ProposedSchedule::OneTime {
            at: None,
            stray_rrule: None,
        });
        assert_eq!(
            check_structure(&one_time, Berlin),
            Err(StructuralError::MissingDateTime)
        );
    }

    #[test]
    fn grammar_errors_pass_through() {
        let proposal = RecurrenceProposal::recurring("RRULE:FREQ=WEEKLY;BYDAY=MO");
        assert_eq!(
            check_structure(&proposal, Berlin),
            Err(StructuralError::Rule(RuleError::MissingAnchor))
        );
    }
}
