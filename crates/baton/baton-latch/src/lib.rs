mod budget;
mod error;
mod latch;
mod layout;
mod state;

pub use budget::SpinBudget;
pub use error::LatchError;
pub use latch::SharedLatch;
pub use layout::{LATCH_MAGIC, LATCH_VERSION};
pub use state::{LatchState, Side};
