//! Per-step glue between the latch and the record views.
//!
//! The host supplies `{ size, address }` for the shared buffer; a step validates the
//! buffer once when it is built and then projects (or writes back) once per turn.

mod config;
mod error;
mod projection_step;
mod publish_step;
mod write_back_step;

pub use config::StepConfig;
pub use error::StepError;
pub use projection_step::ProjectionStep;
pub use publish_step::PublishStep;
pub use write_back_step::WriteBackStep;

pub use baton_perf_recorder::{PerfRecorder, PerfStage};
