//! Local wall-clock ↔ UTC helpers shared by the rule calculator and the validator.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{CadenceError, Result};
use crate::types::WallClock;

/// Look up an IANA zone id.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse()
        .map_err(|_| CadenceError::InvalidTimezone(name.to_string()))
}

/// Map a local wall-clock datetime in `tz` onto a concrete instant.
///
/// Ambiguous local times (clocks falling back) resolve to the earlier instant.
/// Nonexistent local times (clocks springing forward) shift forward by one hour,
/// which lands on the same wall-clock reading the clocks show after the jump.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Wall-clock reading of `instant` in `tz`, using the zone's DST rules.
pub fn wall_clock(instant: DateTime<Utc>, tz: &Tz) -> WallClock {
    let local = instant.with_timezone(tz);
    WallClock::new(local.hour(), local.minute())
}
