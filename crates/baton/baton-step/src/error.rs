use baton_latch::LatchError;
use baton_records::RecordError;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("latch handoff failed")]
    Latch(#[from] LatchError),
}

impl StepError {
    pub fn is_precondition(&self) -> bool {
        matches!(self, StepError::Record(e) if e.is_precondition())
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, StepError::Record(e) if e.is_argument())
    }
}
