//! On-disk layout of a file-backed latch.
//!
//! An anonymous latch is just the state byte at offset 0 of a shared page. A latch
//! that unrelated processes find by path carries a small header in front of the byte
//! so the opener can tell a latch file from anything else:
//!
//! ```text
//! ┌──────────┬──────────┬───────────────┬─────────────────┐
//! │  magic   │ version  │ state (1B)    │ padding to page │
//! │  (8B)    │  (8B)    │ AtomicU8      │                 │
//! └──────────┴──────────┴───────────────┴─────────────────┘
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

/// ASCII "BATONLAT".
pub const LATCH_MAGIC: u64 = 0x4241_544F_4E4C_4154;

/// Increment on incompatible layout changes.
pub const LATCH_VERSION: u64 = 1;

#[repr(C)]
pub(crate) struct LatchHeader {
    pub magic: u64,
    pub version: u64,
    pub state: AtomicU8,
}

impl LatchHeader {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.magic != LATCH_MAGIC {
            return Err("Bad magic");
        }
        if self.version != LATCH_VERSION {
            return Err("Wrong version");
        }
        if self.state.load(Ordering::Acquire) > 3 {
            return Err("State byte out of range");
        }
        Ok(())
    }
}
