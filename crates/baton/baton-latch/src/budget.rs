//! Opt-in limits for the latch spin loops.
//!
//! The default latch operations spin forever. A [`SpinBudget`] lets a caller bound the
//! wait by spin count, by wall-clock time, or by an external cancellation flag, so a
//! layer above the latch can notice a dead or wedged peer.

use crate::error::LatchError;
use crate::state::LatchState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Spins between clock reads / cancellation checks. Keeps `Instant::now()` off the
/// per-iteration path.
pub(crate) const CHECK_INTERVAL: u64 = 1024;

#[derive(Clone, Debug, Default)]
pub struct SpinBudget {
    max_spins: Option<u64>,
    timeout: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SpinBudget {
    /// No limit at all. Equivalent to the plain latch operations, minus a few branches.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Give up after `max_spins` failed compare-and-swap attempts.
    pub fn spins(max_spins: u64) -> Self {
        Self::default().with_max_spins(max_spins)
    }

    /// Give up once `timeout` has elapsed since the wait began.
    pub fn timeout(timeout: Duration) -> Self {
        Self::default().with_timeout(timeout)
    }

    pub fn with_max_spins(mut self, max_spins: u64) -> Self {
        self.max_spins = Some(max_spins);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the wait once `flag` reads `true`. Checked every [`CHECK_INTERVAL`] spins.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_spins.is_none() && self.timeout.is_none() && self.cancel.is_none()
    }

    pub(crate) fn spinner(&self, expected: LatchState) -> Spinner<'_> {
        Spinner {
            budget: self,
            expected,
            spins: 0,
            started: self.timeout.map(|_| Instant::now()),
        }
    }
}

/// Per-wait bookkeeping for one bounded spin loop.
pub(crate) struct Spinner<'a> {
    budget: &'a SpinBudget,
    expected: LatchState,
    spins: u64,
    started: Option<Instant>,
}

impl Spinner<'_> {
    /// Accounts for one failed attempt. `observed` is the value the CAS saw.
    #[inline]
    pub(crate) fn tick(&mut self, observed: u8) -> Result<(), LatchError> {
        self.spins += 1;

        if let Some(max) = self.budget.max_spins
            && self.spins >= max
        {
            return Err(LatchError::SpinLimit {
                expected: self.expected,
                observed,
                spins: self.spins,
            });
        }

        if self.spins % CHECK_INTERVAL != 0 {
            return Ok(());
        }

        if let Some(flag) = &self.budget.cancel
            && flag.load(Ordering::Relaxed)
        {
            return Err(LatchError::Cancelled {
                expected: self.expected,
                spins: self.spins,
            });
        }

        if let (Some(timeout), Some(started)) = (self.budget.timeout, self.started) {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(LatchError::Timeout {
                    expected: self.expected,
                    observed,
                    elapsed,
                });
            }
        }

        Ok(())
    }
}
