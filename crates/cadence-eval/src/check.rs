use anyhow::Context;
use cadence_core::time::resolve_local;
use cadence_rrule::{occurrences, parse_rule};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;

/// Next `count` occurrences of `rule_text`, rendered as wall-clock times in `tz`.
///
/// With `from`, the listing starts at local midnight of that date; otherwise it
/// starts at the rule's anchor.
pub fn upcoming(
    rule_text: &str,
    tz: Tz,
    from: Option<NaiveDate>,
    count: usize,
) -> anyhow::Result<Vec<String>> {
    let rule = parse_rule(rule_text).context("rule does not parse")?;
    let start = match from {
        Some(date) => {
            let midnight = date.and_time(NaiveTime::MIN);
            Some(resolve_local(&tz, midnight).unwrap_or_else(|| midnight.and_utc()))
        }
        None => None,
    };

    Ok(occurrences(&rule)
        .filter(|at| start.map_or(true, |s| *at >= s))
        .take(count)
        .map(|at| {
            format!(
                "{}  ({})",
                at.with_timezone(&tz).format("%Y-%m-%d %a %H:%M %Z"),
                at.format("%Y-%m-%dT%H:%MZ")
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const THIRD_THURSDAY: &str =
        r"DTSTART;TZID=Europe/Berlin:20260319T150000\nRRULE:FREQ=MONTHLY;BYDAY=TH;BYSETPOS=3";

    #[test]
    fn lists_local_wall_clock() {
        let lines = upcoming(
            THIRD_THURSDAY,
            chrono_tz::Europe::Berlin,
            NaiveDate::from_ymd_opt(2026, 3, 1),
            2,
        )
        .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2026-03-19 Thu 15:00"));
        assert!(lines[0].ends_with("(2026-03-19T14:00Z)"));
        // Berlin is on summer time by April.
        assert!(lines[1].starts_with("2026-04-16 Thu 15:00"));
        assert!(lines[1].ends_with("(2026-04-16T13:00Z)"));
    }

    #[test]
    fn other_zone_shows_converted_time() {
        let lines = upcoming(THIRD_THURSDAY, chrono_tz::UTC, None, 1).unwrap();
        assert!(lines[0].starts_with("2026-03-19 Thu 14:00"));
    }

    #[test]
    fn bad_rule_is_an_error() {
        assert!(upcoming("RRULE:FREQ=HOURLY", chrono_tz::UTC, None, 3).is_err());
    }
}
