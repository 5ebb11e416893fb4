use cadence_rrule::RuleError;
use thiserror::Error;

/// Why a proposal cannot be used at all. This is the only failure class that
/// triggers escalation; semantic mismatches are recorded on the outcome instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("recurring proposal has no rrule_string")]
    MissingRule,

    #[error("one-time proposal has no one_time_datetime")]
    MissingDateTime,

    #[error("both rrule_string and one_time_datetime are set")]
    BothBranches,

    #[error("invalid one_time_datetime {value:?}")]
    InvalidDateTime { value: String },

    #[error(transparent)]
    Rule(#[from] RuleError),
}

pub type Result<T> = std::result::Result<T, StructuralError>;
