//! `cadence-core`: shared data model, configuration and error types.
//!
//! Every other crate in the workspace speaks in these types: the caller's
//! [`RecurrenceRequest`], the generator's [`RecurrenceProposal`], and the
//! sparse [`Expectation`] an evaluation [`TestCase`] asserts about it.

pub mod config;
pub mod error;
pub mod expectation;
pub mod proposal;
pub mod request;
pub mod time;
pub mod types;

pub use config::CadenceConfig;
pub use error::{CadenceError, Result};
pub use expectation::{Expectation, TestCase};
pub use proposal::{ProposedSchedule, RecurrenceProposal, WireProposal};
pub use request::RecurrenceRequest;
pub use types::{Category, Frequency, TokenUsage, WallClock};
