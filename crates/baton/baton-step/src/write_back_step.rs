use crate::config::StepConfig;
use crate::error::StepError;
use baton_perf_recorder::{PerfRecorder, PerfStage};
use baton_records::{Projection, RecordSink, Scalar};

/// Stores a computed `(size, cols)` result into the shared records, zero-padding
/// columns the result doesn't cover.
pub struct WriteBackStep<T: Scalar> {
    sink: RecordSink<T>,
    recorder: PerfRecorder,
}

impl<T: Scalar> WriteBackStep<T> {
    /// # Safety
    /// `cfg.address` must stay mapped and writable for `cfg.size` records for the life
    /// of the step, and writes may only happen while this side owns the buffer.
    pub unsafe fn new(cfg: &StepConfig) -> Result<Self, StepError> {
        let layout = cfg.layout::<T>()?;
        // SAFETY: forwarded to our caller.
        let sink = unsafe { RecordSink::from_raw(cfg.address, cfg.size, layout) }
            .inspect_err(|e| tracing::error!(error = %e, "write-back buffer validation failed"))?;
        tracing::info!(
            size = cfg.size,
            address = format_args!("{:#x}", cfg.address),
            "write-back step constructed"
        );
        Ok(Self {
            sink,
            recorder: PerfRecorder::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.sink.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sink.is_empty()
    }

    pub fn fields(&self) -> usize {
        self.sink.fields()
    }

    pub fn recorder(&self) -> &PerfRecorder {
        &self.recorder
    }

    pub fn write(&mut self, result: &Projection<T>) -> Result<(), StepError> {
        self.recorder.begin(PerfStage::WriteBack);
        self.sink.write_projection(result)?;
        self.recorder.end(PerfStage::WriteBack);
        Ok(())
    }

    pub fn write_rows(&mut self, data: &[T], cols: usize) -> Result<(), StepError> {
        self.recorder.begin(PerfStage::WriteBack);
        self.sink.write_rows(data, cols)?;
        self.recorder.end(PerfStage::WriteBack);
        Ok(())
    }
}
