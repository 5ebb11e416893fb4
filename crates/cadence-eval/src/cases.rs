use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context};
use cadence_core::TestCase;

/// The built-in 28-case regression set.
const BUILTIN_CASES: &str = include_str!("../fixtures/recurrence_cases.json");

pub fn builtin() -> anyhow::Result<Vec<TestCase>> {
    parse(BUILTIN_CASES).context("built-in fixture set is invalid")
}

/// Load cases from `path`, or the built-in set when no path is given.
pub fn load(path: Option<&Path>) -> anyhow::Result<Vec<TestCase>> {
    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("reading cases from {}", p.display()))?;
            parse(&raw).with_context(|| format!("parsing cases from {}", p.display()))
        }
        None => builtin(),
    }
}

fn parse(raw: &str) -> anyhow::Result<Vec<TestCase>> {
    let cases: Vec<TestCase> = serde_json::from_str(raw)?;
    let mut seen = HashSet::new();
    for case in &cases {
        if !seen.insert(case.id) {
            bail!("duplicate case id {}", case.id);
        }
    }
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Category, Frequency, WallClock};
    use chrono::{NaiveDate, Weekday};

    #[test]
    fn builtin_set_is_complete() {
        let cases = builtin().unwrap();
        assert_eq!(cases.len(), 28);
        let ids: Vec<u32> = cases.iter().map(|c| c.id).collect();
        assert_eq!(ids, (1..=28).collect::<Vec<_>>());

        let count = |cat| cases.iter().filter(|c| c.category == cat).count();
        assert_eq!(count(Category::Simple), 7);
        assert_eq!(count(Category::Medium), 7);
        assert_eq!(count(Category::Complex), 6);
        assert_eq!(count(Category::Ambiguous), 5);
        assert_eq!(count(Category::OneTime), 3);
    }

    #[test]
    fn builtin_cases_carry_their_assertions() {
        let cases = builtin().unwrap();

        let third_thursday = &cases[14];
        assert_eq!(third_thursday.request.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(third_thursday.expected.frequency, Some(Frequency::Monthly));
        assert_eq!(third_thursday.expected.weekdays, Some(vec![Weekday::Thu]));
        assert_eq!(third_thursday.expected.set_positions, Some(vec![3]));
        assert_eq!(third_thursday.expected.wall_clock, Some(WallClock::new(15, 0)));

        let last_friday = &cases[15];
        assert_eq!(last_friday.request.timezone, chrono_tz::US::Eastern);
        assert_eq!(last_friday.expected.set_positions, Some(vec![-1]));

        let in_two_hours = &cases[27];
        assert_eq!(in_two_hours.expected.is_recurring, Some(false));
        assert_eq!(in_two_hours.expected.wall_clock, Some(WallClock::new(14, 0)));
        assert_eq!(
            in_two_hours.request.reference_local(),
            NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let raw = r#"[
            {"id":1,"category":"simple","message":"a","userTimezone":"UTC","referenceDate":"2026-03-01","expected":{}},
            {"id":1,"category":"simple","message":"b","userTimezone":"UTC","referenceDate":"2026-03-01","expected":{}}
        ]"#;
        let err = parse(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate case id 1"));
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"[{"id":7,"category":"one_time","message":"tomorrow at 3pm","userTimezone":"Europe/Berlin","referenceDate":"2026-03-01","expected":{"isRecurring":false,"wallClock":"15:00"}}]"#,
        )
        .unwrap();
        let cases = load(Some(&path)).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].category, Category::OneTime);
    }

    #[test]
    fn unknown_timezone_fails_to_load() {
        let raw = r#"[{"id":1,"category":"simple","message":"a","userTimezone":"Mars/Olympus","referenceDate":"2026-03-01","expected":{}}]"#;
        assert!(parse(raw).is_err());
    }
}
