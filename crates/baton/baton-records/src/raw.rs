//! The one place an integer address becomes a typed pointer.
//!
//! [`RawRecords`] validates an (address, count, layout) triple once and then hands out
//! per-record pointers with the index already bounds-checked. The view and the sink
//! are thin wrappers that never see the base pointer themselves.

use crate::error::RecordError;
use crate::layout::RecordLayout;
use crate::probe::probe_readable;
use crate::scalar::Scalar;
use std::marker::PhantomData;
use std::mem::align_of;
use std::ptr::NonNull;

pub(crate) struct RawRecords<T: Scalar> {
    base: NonNull<u8>,
    count: usize,
    layout: RecordLayout,
    _pd: PhantomData<T>,
}

// SAFETY: the pointer refers to foreign memory whose lifetime and exclusive access are
// the constructor's caller's contract; the struct itself holds no thread-bound state.
unsafe impl<T: Scalar> Send for RawRecords<T> {}
unsafe impl<T: Scalar> Sync for RawRecords<T> {}

impl<T: Scalar> RawRecords<T> {
    /// Checks the triple and, when `count > 0`, reads the first record through the
    /// kernel to confirm it is mapped.
    ///
    /// # Safety
    /// On success the caller promises that `count` records of `layout` at `address`
    /// stay mapped for as long as the returned value is used.
    pub(crate) unsafe fn validate(
        address: u64,
        count: usize,
        layout: RecordLayout,
    ) -> Result<Self, RecordError> {
        if layout.stride() < layout.record_bytes::<T>() || layout.stride() % align_of::<T>() != 0 {
            return Err(RecordError::argument(format!(
                "layout {layout:?} does not fit {} fields",
                T::KIND
            )));
        }
        let addr = usize::try_from(address).map_err(|_| {
            RecordError::precondition(address, "address does not fit this platform's pointers")
        })?;
        let base = NonNull::new(addr as *mut u8)
            .ok_or_else(|| RecordError::precondition(address, "null address"))?;
        if addr % align_of::<T>() != 0 {
            return Err(RecordError::precondition(
                address,
                format!("address is not {}-byte aligned for {}", align_of::<T>(), T::KIND),
            ));
        }

        let span = count
            .checked_mul(layout.stride())
            .filter(|&b| b <= isize::MAX as usize)
            .ok_or_else(|| {
                RecordError::precondition(
                    address,
                    format!("{count} records of {} bytes exceed the addressable size", layout.stride()),
                )
            })?;
        if addr.checked_add(span).is_none() {
            return Err(RecordError::precondition(
                address,
                format!("{span} bytes from this address wrap the address space"),
            ));
        }

        if count > 0 {
            probe_readable(addr, layout.record_bytes::<T>()).map_err(|source| {
                RecordError::PreconditionFailure {
                    address,
                    reason: "first record is not readable".into(),
                    source: Some(source),
                }
            })?;
        }

        Ok(Self {
            base,
            count,
            layout,
            _pd: PhantomData,
        })
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub(crate) fn layout(&self) -> RecordLayout {
        self.layout
    }

    #[inline]
    pub(crate) fn address(&self) -> u64 {
        self.base.as_ptr() as u64
    }

    /// Pointer to the first field of record `index`, or `None` past the end.
    #[inline]
    pub(crate) fn record_ptr(&self, index: usize) -> Option<*mut T> {
        if index >= self.count {
            return None;
        }
        // SAFETY: index < count and count * stride was checked not to overflow or wrap.
        Some(unsafe { self.base.as_ptr().add(index * self.layout.stride()) } as *mut T)
    }

    /// The fields of record `index` as a slice.
    #[inline]
    pub(crate) fn record(&self, index: usize) -> Option<&[T]> {
        let p = self.record_ptr(index)?;
        // SAFETY: validated alignment and extent; the constructor's caller guarantees
        // the memory is live and not being written while we hold the buffer.
        Some(unsafe { std::slice::from_raw_parts(p, self.layout.fields()) })
    }

    /// Mutable fields of record `index`.
    #[inline]
    pub(crate) fn record_mut(&mut self, index: usize) -> Option<&mut [T]> {
        let p = self.record_ptr(index)?;
        // SAFETY: as `record`, plus `&mut self` keeps this the only live borrow.
        Some(unsafe { std::slice::from_raw_parts_mut(p, self.layout.fields()) })
    }

    /// Every scalar of every record as one slice, when the layout has no padding.
    #[inline]
    pub(crate) fn packed(&self) -> Option<&[T]> {
        if !self.layout.is_packed::<T>() {
            return None;
        }
        if self.count == 0 {
            return Some(&[]);
        }
        // SAFETY: packed layout means count * fields scalars back to back from base.
        Some(unsafe {
            std::slice::from_raw_parts(self.base.as_ptr() as *const T, self.count * self.layout.fields())
        })
    }
}
