//! Consumer-side step: shared records in, `(size, fields)` numeric array out.

use crate::config::StepConfig;
use crate::error::StepError;
use baton_latch::{SharedLatch, SpinBudget};
use baton_perf_recorder::{PerfRecorder, PerfStage};
use baton_records::{Projection, RecordError, RecordView, Scalar};

pub struct ProjectionStep<T: Scalar> {
    view: RecordView<T>,
    max_elements: usize,
    recorder: PerfRecorder,
}

impl<T: Scalar> ProjectionStep<T> {
    /// Builds the step and validates the shared buffer once.
    ///
    /// # Errors
    /// - `PreconditionFailure` if the buffer at `cfg.address` can't be read
    /// - `ArgumentError` if the layout is malformed or `size * fields` exceeds
    ///   `cfg.max_elements`
    ///
    /// # Safety
    /// `cfg.address` must stay mapped for `cfg.size` records for the life of the
    /// step, and [`compute`](Self::compute) may only run while this side owns the
    /// buffer (between `start` and `end` on the latch).
    pub unsafe fn new(cfg: &StepConfig) -> Result<Self, StepError> {
        tracing::info!(
            size = cfg.size,
            address = format_args!("{:#x}", cfg.address),
            fields = cfg.fields,
            "projection step construction starting"
        );

        let layout = cfg.layout::<T>()?;
        let total = cfg.size.checked_mul(layout.fields());
        if total.is_none_or(|t| t > cfg.max_elements) {
            return Err(RecordError::ArgumentError {
                reason: format!(
                    "too many elements in output: {} x {} exceeds {}",
                    cfg.size,
                    layout.fields(),
                    cfg.max_elements
                ),
            }
            .into());
        }

        let mut recorder = PerfRecorder::new();
        recorder.begin(PerfStage::Validate);
        // SAFETY: forwarded to our caller.
        let view = unsafe { RecordView::from_raw(cfg.address, cfg.size, layout) }
            .inspect_err(|e| tracing::error!(error = %e, "shared buffer validation failed"))?;
        recorder.end(PerfStage::Validate);

        tracing::info!("projection step constructed and shared buffer validated");
        Ok(Self {
            view,
            max_elements: cfg.max_elements,
            recorder,
        })
    }

    /// Output shape: `(size, fields)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.view.len(), self.view.fields())
    }

    pub fn view(&self) -> &RecordView<T> {
        &self.view
    }

    pub fn recorder(&self) -> &PerfRecorder {
        &self.recorder
    }

    /// Projects the shared records into a fresh output. Call only while owning the
    /// buffer.
    pub fn compute(&mut self) -> Result<Projection<T>, StepError> {
        self.recorder.begin(PerfStage::Project);
        let out = self.view.project(self.max_elements)?;
        self.recorder.end(PerfStage::Project);
        Ok(out)
    }

    /// Projects into a caller-owned buffer of exactly `size * fields` elements.
    pub fn compute_into(&mut self, out: &mut [T]) -> Result<(), StepError> {
        self.recorder.begin(PerfStage::Project);
        self.view.project_into(out)?;
        self.recorder.end(PerfStage::Project);
        Ok(())
    }

    /// One consumer turn: take the buffer, project, hand the buffer back.
    ///
    /// The buffer is handed back even if the projection fails, so the producer is
    /// never stranded by a consumer-side error.
    pub fn run_turn(&mut self, latch: &SharedLatch) -> Result<Projection<T>, StepError> {
        self.recorder.begin(PerfStage::ConsumerStep);
        self.recorder.begin(PerfStage::Start);
        latch.start();
        self.recorder.end(PerfStage::Start);

        let out = self.compute();
        self.finish_turn(latch);
        out
    }

    /// [`run_turn`](Self::run_turn) with a bounded wait for the producer.
    ///
    /// If the wait fails the buffer was never taken, so nothing is handed back.
    pub fn run_turn_within(
        &mut self,
        latch: &SharedLatch,
        budget: &SpinBudget,
    ) -> Result<Projection<T>, StepError> {
        self.recorder.begin(PerfStage::ConsumerStep);
        self.recorder.begin(PerfStage::Start);
        latch
            .start_within(budget)
            .inspect_err(|e| tracing::warn!(error = %e, "producer did not cede the buffer"))?;
        self.recorder.end(PerfStage::Start);

        let out = self.compute();
        self.finish_turn(latch);
        out
    }

    #[inline]
    fn finish_turn(&mut self, latch: &SharedLatch) {
        self.recorder.begin(PerfStage::End);
        latch.end();
        self.recorder.end(PerfStage::End);
        self.recorder.end(PerfStage::ConsumerStep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_records::Vec4;

    #[test]
    fn construction_fails_for_an_unreadable_buffer() {
        let err = unsafe { ProjectionStep::<f32>::new(&StepConfig::new(8, 0x40)) }.err().unwrap();
        assert!(err.is_precondition());
    }

    #[test]
    fn construction_fails_when_output_is_too_large() {
        let data = [Vec4::<f32>::default(); 4];
        let cfg = StepConfig::new(4, data.as_ptr() as u64).with_max_elements(15);
        let err = unsafe { ProjectionStep::<f32>::new(&cfg) }.err().unwrap();
        assert!(err.is_argument());
    }

    #[test]
    fn compute_returns_size_by_four() {
        let data: Vec<Vec4<f32>> = (0..5).map(|i| Vec4::new(i as f32, 1.0, 2.0, 3.0)).collect();
        let cfg = StepConfig::new(data.len(), data.as_ptr() as u64);
        let mut step = unsafe { ProjectionStep::<f32>::new(&cfg) }.unwrap();
        assert_eq!(step.shape(), (5, 4));

        let out = step.compute().unwrap();
        assert_eq!(out.shape(), (5, 4));
        assert_eq!(out.row(4).unwrap(), &[4.0, 1.0, 2.0, 3.0]);

        let mut flat = vec![0f32; 20];
        step.compute_into(&mut flat).unwrap();
        assert_eq!(flat.as_slice(), out.as_slice());
    }

    #[test]
    fn zero_sized_step_is_valid() {
        let data = [Vec4::<f64>::default(); 1];
        let mut step =
            unsafe { ProjectionStep::<f64>::new(&StepConfig::new(0, data.as_ptr() as u64)) }.unwrap();
        assert!(step.compute().unwrap().is_empty());
    }

    #[test]
    fn bounded_turn_without_producer_reports_latch_error() {
        let data = [Vec4::<f32>::default(); 1];
        let mut step =
            unsafe { ProjectionStep::<f32>::new(&StepConfig::new(1, data.as_ptr() as u64)) }.unwrap();
        let latch = SharedLatch::new().unwrap();
        let err = step.run_turn_within(&latch, &SpinBudget::spins(50)).err().unwrap();
        assert!(matches!(err, StepError::Latch(_)));
    }
}
