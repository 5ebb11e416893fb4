//! `cadence-validator`: structural and semantic checks of generator proposals.
//!
//! [`check_structure`] decides whether a proposal is usable at all (the only
//! escalation trigger). [`validate`] additionally compares each asserted
//! dimension of a [`cadence_core::TestCase`], including the real next
//! occurrence's wall-clock time in the caller's timezone.

pub mod error;
pub mod outcome;
pub mod structure;
pub mod validate;

pub use error::{Result, StructuralError};
pub use outcome::ValidationOutcome;
pub use structure::{check_structure, parse_one_time, CheckedSchedule};
pub use validate::{validate, validate_against, validate_structure};
