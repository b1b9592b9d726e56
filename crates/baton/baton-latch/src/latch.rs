//! Cross-process turn-taking latch over one shared byte.
//!
//! # Protocol
//!
//! **Producer** (owns the buffer first):
//! 1. Write the batch into the data buffer
//! 2. `await_turn()`: store 1 (Release), then spin until CAS 3 -> 0 succeeds (Acquire)
//!
//! **Consumer:**
//! 1. `start()`: spin until CAS 1 -> 2 succeeds (Acquire)
//! 2. Read the data buffer, compute
//! 3. `end()`: store 3 (Release)
//!
//! # Memory Ordering
//!
//! Each Release store pairs with the peer's Acquire CAS that consumes it, so every
//! write made to the data buffer before handing off is visible to the side that picks
//! the buffer up. The buffer itself needs no further synchronization.
//!
//! # Liveness
//!
//! The plain operations spin forever: no sleep, no yield, no timeout. If the peer dies
//! mid-protocol the caller hangs. Use the `*_within` variants with a [`SpinBudget`] to
//! bound the wait.

use crate::budget::SpinBudget;
use crate::error::LatchError;
use crate::layout::{LATCH_MAGIC, LATCH_VERSION, LatchHeader};
use crate::state::LatchState;
use baton_mmap::{MmapFileMut, SharedAnon, page_size};
use std::io;
use std::mem::{offset_of, size_of};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU8, Ordering};

/// Keeps the mapping that holds the state byte alive.
enum Region {
    Anon(SharedAnon),
    File(MmapFileMut),
}

/// A four-state baton shared by exactly one producer and one consumer.
///
/// Move-only: there is no `Clone`. Moving the latch moves the mapping; the old binding
/// is statically dead and never unmaps. Dropping unmaps this process's view only.
pub struct SharedLatch {
    /// Owns the mapping; kept alive but only reached through `state`.
    _region: Region,
    /// The protocol byte inside `_region`.
    state: NonNull<AtomicU8>,
}

// SAFETY: the state byte is only touched through atomics, and the mapping outlives
// the pointer because both live in the same struct.
unsafe impl Send for SharedLatch {}
unsafe impl Sync for SharedLatch {}

impl SharedLatch {
    /// Creates a latch in a fresh shared anonymous page, initialized to state 0.
    ///
    /// The page is visible to children forked after this call, which is how the
    /// producer and consumer come to share it.
    pub fn new() -> io::Result<Self> {
        let region = SharedAnon::new(size_of::<AtomicU8>())?;
        let state = NonNull::new(region.as_ptr() as *mut AtomicU8)
            .ok_or_else(|| io::Error::other("shared anonymous mapping is null"))?;

        let latch = Self {
            _region: Region::Anon(region),
            state,
        };
        latch.store(LatchState::INITIAL);
        tracing::debug!(addr = format_args!("{:#x}", latch.state_addr()), "created anonymous latch");
        Ok(latch)
    }

    /// Creates a latch file at `path`, initialized to state 0.
    ///
    /// The header is written before the file appears under `path`, and a leftover file
    /// is replaced rather than truncated, so a peer still mapping the old one is left
    /// with its own stale latch instead of a shrinking mapping.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let bytes = page_size().max(size_of::<LatchHeader>());
        let mm = MmapFileMut::create_rw_with(&path, bytes as u64, |buf| {
            // SAFETY: the fresh mapping is page-aligned and at least one header long.
            unsafe {
                ptr::write(
                    buf.as_mut_ptr() as *mut LatchHeader,
                    LatchHeader {
                        magic: LATCH_MAGIC,
                        version: LATCH_VERSION,
                        state: AtomicU8::new(LatchState::INITIAL.as_u8()),
                    },
                );
            }
        })?;

        let latch = Self::from_file(mm)?;
        tracing::info!(path = %path.as_ref().display(), "created latch file");
        Ok(latch)
    }

    /// Opens a latch file created by [`SharedLatch::create`], leaving its state untouched.
    ///
    /// # Errors
    /// - The file doesn't exist or can't be mapped
    /// - The file is too short, has the wrong magic/version, or a state byte above 3
    ///   (`InvalidData`)
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mm = MmapFileMut::open_rw(&path)?;
        if mm.len() < size_of::<LatchHeader>() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Latch file too short"));
        }

        // SAFETY: length checked above; validate() catches foreign contents.
        let header = unsafe { &*(mm.as_ptr() as *const LatchHeader) };
        header
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let latch = Self::from_file(mm)?;
        tracing::info!(path = %path.as_ref().display(), state = ?latch.state().ok(), "opened latch file");
        Ok(latch)
    }

    fn from_file(mut mm: MmapFileMut) -> io::Result<Self> {
        // SAFETY: the header fits inside the mapping (checked or sized by the caller).
        let raw = unsafe { mm.as_mut_ptr().add(offset_of!(LatchHeader, state)) };
        let state = NonNull::new(raw as *mut AtomicU8)
            .ok_or_else(|| io::Error::other("latch file mapping is null"))?;
        Ok(Self {
            _region: Region::File(mm),
            state,
        })
    }

    #[inline(always)]
    fn cell(&self) -> &AtomicU8 {
        // SAFETY: `state` points into `_region`, which lives as long as `self`.
        unsafe { self.state.as_ref() }
    }

    /// Address of the state byte in this process.
    pub fn state_addr(&self) -> u64 {
        self.state.as_ptr() as u64
    }

    /// Current protocol state (Acquire load). For diagnostics and tests; the protocol
    /// itself never branches on a plain load.
    pub fn state(&self) -> Result<LatchState, LatchError> {
        LatchState::try_from(self.cell().load(Ordering::Acquire))
    }

    /// Producer: cede the buffer, then spin until the consumer hands it back.
    ///
    /// Must be called while in state 0. Returns in state 0 with the buffer owned again.
    #[inline]
    pub fn await_turn(&self) {
        // The producer is the only writer in state 0; no CAS needed.
        self.store(LatchState::ProducerCeding);
        self.change_state(LatchState::ConsumerCeding, LatchState::ProducerRunning);
    }

    /// Consumer: spin until the producer has ceded, then take the buffer (1 -> 2).
    #[inline]
    pub fn start(&self) {
        self.change_state(LatchState::ProducerCeding, LatchState::ConsumerRunning);
    }

    /// Consumer: hand the buffer back (-> 3).
    #[inline]
    pub fn end(&self) {
        // The consumer is the only writer in state 2; no CAS needed.
        self.store(LatchState::ConsumerCeding);
    }

    /// Bounded [`await_turn`](Self::await_turn).
    ///
    /// On error the latch is left in whatever state the peer put it in (normally 1,
    /// the producer still ceding); the caller decides whether to retry or shut down.
    pub fn await_turn_within(&self, budget: &SpinBudget) -> Result<(), LatchError> {
        self.store(LatchState::ProducerCeding);
        self.change_state_within(LatchState::ConsumerCeding, LatchState::ProducerRunning, budget)
    }

    /// Bounded [`start`](Self::start). On error the latch is untouched.
    pub fn start_within(&self, budget: &SpinBudget) -> Result<(), LatchError> {
        self.change_state_within(LatchState::ProducerCeding, LatchState::ConsumerRunning, budget)
    }

    /// Producer: run `f` while owning the buffer, then cede and wait for it back.
    pub fn producer_turn<R>(&self, f: impl FnOnce() -> R) -> R {
        let r = f();
        self.await_turn();
        r
    }

    /// Consumer: take the buffer, run `f`, hand it back.
    pub fn consumer_turn<R>(&self, f: impl FnOnce() -> R) -> R {
        self.start();
        let r = f();
        self.end();
        r
    }

    #[inline(always)]
    fn store(&self, state: LatchState) {
        self.cell().store(state.as_u8(), Ordering::Release);
    }

    /// Spins until the byte moves `from` -> `to`. A failed CAS retries with the same
    /// expected value; it never sleeps or gives up.
    #[inline(always)]
    fn change_state(&self, from: LatchState, to: LatchState) {
        let cell = self.cell();
        while cell
            .compare_exchange_weak(from.as_u8(), to.as_u8(), Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    fn change_state_within(
        &self,
        from: LatchState,
        to: LatchState,
        budget: &SpinBudget,
    ) -> Result<(), LatchError> {
        let cell = self.cell();
        let mut spinner = budget.spinner(from);
        loop {
            match cell.compare_exchange_weak(
                from.as_u8(),
                to.as_u8(),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) if observed > 3 => {
                    return Err(LatchError::InvalidState { value: observed });
                }
                Err(observed) => spinner.tick(observed)?,
            }
            std::hint::spin_loop();
        }
    }
}
