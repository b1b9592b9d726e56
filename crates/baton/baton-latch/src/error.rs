use crate::state::LatchState;
use std::time::Duration;

/// Failures of the bounded wait paths.
///
/// The unbounded `await_turn` / `start` never fail; a stuck peer shows up there as a hang.
#[derive(Debug, thiserror::Error)]
pub enum LatchError {
    #[error("gave up after {spins} spins waiting for latch state {expected} (last saw {observed})")]
    SpinLimit {
        expected: LatchState,
        observed: u8,
        spins: u64,
    },

    #[error("timed out after {elapsed:?} waiting for latch state {expected} (last saw {observed})")]
    Timeout {
        expected: LatchState,
        observed: u8,
        elapsed: Duration,
    },

    #[error("wait for latch state {expected} cancelled after {spins} spins")]
    Cancelled { expected: LatchState, spins: u64 },

    #[error("latch holds {value}, which is not a protocol state")]
    InvalidState { value: u8 },
}
