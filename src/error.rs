use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Invalid sample source for clip '{clip}': {reason}")]
    InvalidSource { clip: String, reason: String },

    #[error("Requested range {offset}+{length} exceeds clip length of {total} frames")]
    Range {
        offset: usize,
        length: usize,
        total: usize,
    },

    #[error("Envelope summary requested before the computation was started")]
    ComputationNotStarted,

    #[error("Envelope computation was already started for clip '{0}'")]
    AlreadyStarted(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScopeError>;
