use std::io;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The supplied address/count pair cannot be used: null, misaligned, too many
    /// records to address from there, or not readable at validation time.
    #[error("memory mapped buffer at {address:#x} not accessible or invalid: {reason}")]
    PreconditionFailure {
        address: u64,
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    /// A size or index the caller asked for is out of range.
    #[error("invalid argument: {reason}")]
    ArgumentError { reason: String },
}

impl RecordError {
    pub(crate) fn precondition(address: u64, reason: impl Into<String>) -> Self {
        RecordError::PreconditionFailure {
            address,
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn argument(reason: impl Into<String>) -> Self {
        RecordError::ArgumentError {
            reason: reason.into(),
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, RecordError::PreconditionFailure { .. })
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, RecordError::ArgumentError { .. })
    }
}
