use thiserror::Error;

/// Terminal failure of a single dispatched job. Never affects sibling jobs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The job ran to completion and returned an error.
    #[error("job failed: {0}")]
    Failed(String),

    /// The job panicked while running.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// The runtime dropped the task before it reported back.
    #[error("job lost: {0}")]
    Lost(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
