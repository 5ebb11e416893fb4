use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

impl CadenceError {
    /// Short error code string used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            CadenceError::Config(_) => "CONFIG_ERROR",
            CadenceError::InvalidTimezone(_) => "INVALID_TIMEZONE",
        }
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;
