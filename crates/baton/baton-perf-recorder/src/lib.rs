//! Per-stage latency recorder for the handoff and projection hot paths.
//!
//! With the `record` feature **off** (production default), `PerfRecorder` is a
//! zero-sized type and every method is an `#[inline(always)]` no-op.
//!
//! With `record` **on**, each stage gets a pre-allocated buffer of `MAX_SAMPLES`
//! slots and `begin`/`end` pairs store elapsed nanoseconds from
//! `clock_gettime(CLOCK_MONOTONIC)`. Samples past the buffer are dropped.

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerfStage {
    /// Producer parked in `await_turn` (cede + wait for the buffer back).
    Await = 0,
    /// Consumer parked in `start`.
    Start = 1,
    /// Consumer `end` store.
    End = 2,
    /// One-time validation of the shared buffer.
    Validate = 3,
    /// Copying records into the flat output.
    Project = 4,
    /// Storing results back into the shared records.
    WriteBack = 5,
    ProducerStep = 6,
    ConsumerStep = 7,
}

pub const NUM_STAGES: usize = 8;
pub const MAX_SAMPLES: usize = 131_072; // 128K per stage

pub const ALL_STAGES: [PerfStage; NUM_STAGES] = [
    PerfStage::Await,
    PerfStage::Start,
    PerfStage::End,
    PerfStage::Validate,
    PerfStage::Project,
    PerfStage::WriteBack,
    PerfStage::ProducerStep,
    PerfStage::ConsumerStep,
];

impl PerfStage {
    pub const fn name(self) -> &'static str {
        match self {
            PerfStage::Await => "await",
            PerfStage::Start => "start",
            PerfStage::End => "end",
            PerfStage::Validate => "validate",
            PerfStage::Project => "project",
            PerfStage::WriteBack => "write_back",
            PerfStage::ProducerStep => "producer_step",
            PerfStage::ConsumerStep => "consumer_step",
        }
    }
}

/// Min / max / mean of one stage's recorded samples, in nanoseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageSummary {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

fn summarize(samples: &[u64]) -> Option<StageSummary> {
    let min = *samples.iter().min()?;
    let max = *samples.iter().max()?;
    let sum: u128 = samples.iter().map(|&s| s as u128).sum();
    Some(StageSummary {
        count: samples.len(),
        min,
        max,
        mean: sum as f64 / samples.len() as f64,
    })
}

// ─── Feature: record ON ─────────────────────────────────────────────────────

#[cfg(feature = "record")]
mod inner {
    use super::*;

    /// Monotonic clock in nanoseconds. Only differences are meaningful.
    #[inline(always)]
    pub fn now_ns() -> u64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid out-pointer; CLOCK_MONOTONIC exists on every unix we run on.
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
    }

    /// Samples for one stage. Capacity is reserved up front so `push` never reallocates.
    struct StageBuf {
        samples: Vec<u64>,
        started_at: u64,
    }

    pub struct PerfRecorder {
        stages: [StageBuf; NUM_STAGES],
    }

    impl PerfRecorder {
        pub fn new() -> Self {
            Self {
                stages: std::array::from_fn(|_| StageBuf {
                    samples: Vec::with_capacity(MAX_SAMPLES),
                    started_at: 0,
                }),
            }
        }

        #[inline(always)]
        pub fn begin(&mut self, stage: PerfStage) {
            self.stages[stage as usize].started_at = now_ns();
        }

        #[inline(always)]
        pub fn end(&mut self, stage: PerfStage) {
            let started = self.stages[stage as usize].started_at;
            self.record(stage, now_ns().saturating_sub(started));
        }

        /// Stores an externally measured duration. Dropped once the stage is full.
        #[inline(always)]
        pub fn record(&mut self, stage: PerfStage, duration_ns: u64) {
            let buf = &mut self.stages[stage as usize].samples;
            if buf.len() < MAX_SAMPLES {
                buf.push(duration_ns);
            }
        }

        pub fn samples(&self, stage: PerfStage) -> &[u64] {
            &self.stages[stage as usize].samples
        }

        pub fn count(&self, stage: PerfStage) -> usize {
            self.stages[stage as usize].samples.len()
        }

        pub fn summary(&self, stage: PerfStage) -> Option<StageSummary> {
            summarize(self.samples(stage))
        }

        pub fn drain(&mut self, stage: PerfStage) {
            self.stages[stage as usize].samples.clear();
        }

        pub fn reset(&mut self) {
            self.stages.iter_mut().for_each(|b| b.samples.clear());
        }
    }

    impl Default for PerfRecorder {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ─── Feature: record OFF (zero-cost stubs) ──────────────────────────────────

#[cfg(not(feature = "record"))]
mod inner {
    use super::*;

    #[inline(always)]
    pub fn now_ns() -> u64 {
        0
    }

    pub struct PerfRecorder;

    impl PerfRecorder {
        #[inline(always)]
        pub fn new() -> Self {
            Self
        }
        #[inline(always)]
        pub fn begin(&mut self, _stage: PerfStage) {}
        #[inline(always)]
        pub fn end(&mut self, _stage: PerfStage) {}
        #[inline(always)]
        pub fn record(&mut self, _stage: PerfStage, _duration_ns: u64) {}
        #[inline(always)]
        pub fn samples(&self, _stage: PerfStage) -> &[u64] {
            &[]
        }
        #[inline(always)]
        pub fn count(&self, _stage: PerfStage) -> usize {
            0
        }
        #[inline(always)]
        pub fn summary(&self, stage: PerfStage) -> Option<StageSummary> {
            summarize(self.samples(stage))
        }
        #[inline(always)]
        pub fn drain(&mut self, _stage: PerfStage) {}
        #[inline(always)]
        pub fn reset(&mut self) {}
    }

    impl Default for PerfRecorder {
        fn default() -> Self {
            Self
        }
    }
}

pub use inner::{PerfRecorder, now_ns};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_indices_are_dense() {
        for (i, stage) in ALL_STAGES.iter().enumerate() {
            assert_eq!(*stage as usize, i, "{}", stage.name());
        }
    }

    #[test]
    fn summary_of_nothing_is_none() {
        assert!(summarize(&[]).is_none());
        let s = summarize(&[4, 2, 6]).unwrap();
        assert_eq!((s.count, s.min, s.max), (3, 2, 6));
        assert_eq!(s.mean, 4.0);
    }

    #[cfg(feature = "record")]
    #[test]
    fn recorded_samples_are_kept_per_stage() {
        let mut r = PerfRecorder::new();
        r.record(PerfStage::Project, 10);
        r.record(PerfStage::Project, 30);
        r.begin(PerfStage::Await);
        r.end(PerfStage::Await);
        assert_eq!(r.samples(PerfStage::Project), &[10, 30]);
        assert_eq!(r.count(PerfStage::Await), 1);
        r.drain(PerfStage::Project);
        assert_eq!(r.count(PerfStage::Project), 0);
        r.reset();
        assert!(r.summary(PerfStage::Await).is_none());
    }

    #[cfg(not(feature = "record"))]
    #[test]
    fn disabled_recorder_is_zero_sized_and_silent() {
        let mut r = PerfRecorder::new();
        r.record(PerfStage::Project, 10);
        assert_eq!(std::mem::size_of::<PerfRecorder>(), 0);
        assert!(r.samples(PerfStage::Project).is_empty());
        assert_eq!(now_ns(), 0);
    }
}
