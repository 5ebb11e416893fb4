//! `cadence-rrule`: the recurrence descriptor grammar and occurrence calculator.
//!
//! [`parse_rule`] turns the `DTSTART` + `RRULE` text a generator produces into a
//! [`ParsedRecurrenceRule`]; [`CanonicalRule`] folds equivalent encodings for
//! comparison; [`occurrences`] and [`next_occurrence`] expand it into instants.

pub mod canonical;
pub mod error;
pub mod occurrence;
pub mod parse;
pub mod rule;

pub use canonical::{CanonicalRule, Equivalence, SetPositionSource};
pub use error::{Result, RuleError};
pub use occurrence::{next_occurrence, occurrences, wall_clock, Occurrences};
pub use parse::{normalize_separators, parse_rule};
pub use rule::{Anchor, AnchorZone, ParsedRecurrenceRule, RuleBound, WeekdaySpec};
