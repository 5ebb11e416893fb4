use thiserror::Error;

/// Structural failures of a recurrence descriptor. Any of these makes the
/// descriptor unusable; none of them is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("missing DTSTART anchor line")]
    MissingAnchor,

    #[error("missing RRULE line")]
    MissingRule,

    #[error("RRULE has no FREQ")]
    MissingFrequency,

    #[error("unknown frequency: {0}")]
    UnknownFrequency(String),

    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid datetime {value:?}: {reason}")]
    InvalidDateTime { value: String, reason: String },

    #[error("malformed weekday {0:?}")]
    MalformedWeekday(String),

    #[error("ordinal weekday {token} is not allowed with FREQ={frequency}")]
    OrdinalNotAllowed { token: String, frequency: String },

    #[error("{property}: {value:?} is not an integer")]
    InvalidInteger { property: String, value: String },

    #[error("{property}: {value} is out of range")]
    OutOfRange { property: String, value: i64 },

    #[error("unknown property {0:?}")]
    UnknownProperty(String),

    #[error("duplicate property {0}")]
    DuplicateProperty(String),

    #[error("COUNT and UNTIL are mutually exclusive")]
    ConflictingBounds,
}

pub type Result<T> = std::result::Result<T, RuleError>;
