//! Zero-copy views over record arrays that live in someone else's memory.
//!
//! The producer hands over a base address and a record count; everything here reads
//! (or, for [`RecordSink`], writes back) that memory in place. Only the `raw` module
//! turns integers into pointers.

mod error;
mod layout;
mod probe;
mod projection;
mod raw;
mod scalar;
mod sink;
mod vec4;
mod view;

pub use error::RecordError;
pub use layout::RecordLayout;
pub use projection::{DEFAULT_MAX_ELEMENTS, Projection};
pub use scalar::{Scalar, ScalarKind};
pub use sink::RecordSink;
pub use vec4::Vec4;
pub use view::RecordView;
