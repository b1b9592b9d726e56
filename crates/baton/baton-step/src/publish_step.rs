//! Producer-side step: fill the shared records, then cede and wait for the consumer.

use crate::config::StepConfig;
use crate::error::StepError;
use crate::write_back_step::WriteBackStep;
use baton_latch::{SharedLatch, SpinBudget};
use baton_perf_recorder::{PerfRecorder, PerfStage};
use baton_records::Scalar;

pub struct PublishStep<T: Scalar> {
    writer: WriteBackStep<T>,
    recorder: PerfRecorder,
}

impl<T: Scalar> PublishStep<T> {
    /// # Safety
    /// Same contract as [`WriteBackStep::new`]; additionally the caller must be the
    /// producer side of the latch passed to [`publish`](Self::publish).
    pub unsafe fn new(cfg: &StepConfig) -> Result<Self, StepError> {
        // SAFETY: forwarded to our caller.
        let writer = unsafe { WriteBackStep::new(cfg)? };
        Ok(Self {
            writer,
            recorder: PerfRecorder::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    pub fn recorder(&self) -> &PerfRecorder {
        &self.recorder
    }

    /// Writes one batch (row-major, `cols` per record) and hands the buffer to the
    /// consumer. Returns once the consumer has handed it back.
    ///
    /// A malformed batch is rejected before the latch is touched.
    pub fn publish(&mut self, latch: &SharedLatch, rows: &[T], cols: usize) -> Result<(), StepError> {
        self.recorder.begin(PerfStage::ProducerStep);
        self.writer.write_rows(rows, cols)?;

        self.recorder.begin(PerfStage::Await);
        latch.await_turn();
        self.recorder.end(PerfStage::Await);
        self.recorder.end(PerfStage::ProducerStep);
        Ok(())
    }

    /// [`publish`](Self::publish) with a bounded wait for the consumer.
    ///
    /// On a latch error the buffer is still ceded (state 1); the consumer may pick it
    /// up later.
    pub fn publish_within(
        &mut self,
        latch: &SharedLatch,
        rows: &[T],
        cols: usize,
        budget: &SpinBudget,
    ) -> Result<(), StepError> {
        self.recorder.begin(PerfStage::ProducerStep);
        self.writer.write_rows(rows, cols)?;

        self.recorder.begin(PerfStage::Await);
        latch
            .await_turn_within(budget)
            .inspect_err(|e| tracing::warn!(error = %e, "consumer did not hand the buffer back"))?;
        self.recorder.end(PerfStage::Await);
        self.recorder.end(PerfStage::ProducerStep);
        Ok(())
    }
}
