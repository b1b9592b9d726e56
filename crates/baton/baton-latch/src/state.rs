//! The four protocol states of the latch byte.
//!
//! ```text
//!   ┌──────────────────────┐  producer: await_turn() stores 1
//!   │ 0  ProducerRunning   │─────────────────────────────┐
//!   └──────────────────────┘                             v
//!             ^                               ┌──────────────────────┐
//!             │ producer: CAS 3 -> 0          │ 1  ProducerCeding    │
//!             │ (inside await_turn)           └──────────────────────┘
//!   ┌──────────────────────┐                             │ consumer: start()
//!   │ 3  ConsumerCeding    │                             │ CAS 1 -> 2
//!   └──────────────────────┘                             v
//!             ^                               ┌──────────────────────┐
//!             └───────────────────────────────│ 2  ConsumerRunning   │
//!                consumer: end() stores 3     └──────────────────────┘
//! ```
//!
//! Every transition has exactly one legal writer, which is why only the two
//! waiting transitions need a compare-and-swap.

use crate::error::LatchError;
use std::fmt;

/// One side of the handoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Producer,
    Consumer,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LatchState {
    /// Producer owns the data buffer.
    ProducerRunning = 0,
    /// Producer has ceded and waits for the consumer to pick the buffer up.
    ProducerCeding = 1,
    /// Consumer owns the data buffer; producer is still parked in `await_turn`.
    ConsumerRunning = 2,
    /// Consumer has ceded and waits for the producer to resume.
    ConsumerCeding = 3,
}

impl LatchState {
    /// State every latch starts in.
    pub const INITIAL: LatchState = LatchState::ProducerRunning;

    #[inline(always)]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LatchState::ProducerRunning),
            1 => Some(LatchState::ProducerCeding),
            2 => Some(LatchState::ConsumerRunning),
            3 => Some(LatchState::ConsumerCeding),
            _ => None,
        }
    }

    /// The state that follows this one in the 0 -> 1 -> 2 -> 3 -> 0 cycle.
    #[inline]
    pub const fn next(self) -> Self {
        match self {
            LatchState::ProducerRunning => LatchState::ProducerCeding,
            LatchState::ProducerCeding => LatchState::ConsumerRunning,
            LatchState::ConsumerRunning => LatchState::ConsumerCeding,
            LatchState::ConsumerCeding => LatchState::ProducerRunning,
        }
    }

    /// Which side owns the data buffer in this state, if any.
    ///
    /// The two ceding states are in-flight handoffs: nobody may touch the buffer.
    #[inline]
    pub const fn owner(self) -> Option<Side> {
        match self {
            LatchState::ProducerRunning => Some(Side::Producer),
            LatchState::ConsumerRunning => Some(Side::Consumer),
            LatchState::ProducerCeding | LatchState::ConsumerCeding => None,
        }
    }
}

impl TryFrom<u8> for LatchState {
    type Error = LatchError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LatchState::from_u8(value).ok_or(LatchError::InvalidState { value })
    }
}

impl fmt::Display for LatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LatchState::ProducerRunning => "producer-running",
            LatchState::ProducerCeding => "producer-ceding",
            LatchState::ConsumerRunning => "consumer-running",
            LatchState::ConsumerCeding => "consumer-ceding",
        };
        write!(f, "{name}({})", self.as_u8())
    }
}
