//! Write-back into shared records: the reverse of a projection.
//!
//! The consumer computes a `(rows, cols)` result (per-particle forces, say) and stores
//! it straight into the producer's record array before handing the buffer back. When
//! the result is narrower than the records (3 force components into 4-field records)
//! the trailing fields are zeroed.

use crate::error::RecordError;
use crate::layout::RecordLayout;
use crate::projection::Projection;
use crate::raw::RawRecords;
use crate::scalar::Scalar;

pub struct RecordSink<T: Scalar> {
    raw: RawRecords<T>,
}

impl<T: Scalar> RecordSink<T> {
    /// Wraps `count` writable records of `layout` at `address`.
    ///
    /// Validation is the same read probe as [`RecordView`](crate::RecordView);
    /// writability is not probed.
    ///
    /// # Safety
    /// The memory must stay mapped and writable for as long as the sink is used, and
    /// nobody else may access it while a write is in progress.
    pub unsafe fn from_raw(
        address: u64,
        count: usize,
        layout: RecordLayout,
    ) -> Result<Self, RecordError> {
        // SAFETY: forwarded to our caller.
        let raw = unsafe { RawRecords::validate(address, count, layout)? };
        Ok(Self { raw })
    }

    /// # Safety
    /// Same contract as [`RecordSink::from_raw`].
    pub unsafe fn vec4(address: u64, count: usize) -> Result<Self, RecordError> {
        // SAFETY: forwarded to our caller.
        unsafe { Self::from_raw(address, count, RecordLayout::vec4::<T>()) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.count() == 0
    }

    #[inline]
    pub fn fields(&self) -> usize {
        self.raw.layout().fields()
    }

    #[inline]
    pub fn address(&self) -> u64 {
        self.raw.address()
    }

    /// Stores a row-major `(len, cols)` buffer, one row per record. Fields past
    /// `cols` are set to zero.
    ///
    /// # Errors
    /// `ArgumentError` if `cols` is 0 or wider than a record, or `data` is not
    /// exactly `len * cols` long. Nothing is written on error.
    pub fn write_rows(&mut self, data: &[T], cols: usize) -> Result<(), RecordError> {
        let fields = self.fields();
        if cols == 0 || cols > fields {
            return Err(RecordError::argument(format!(
                "{cols} columns can't be stored in {fields}-field records"
            )));
        }
        let expected = self.len().checked_mul(cols).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(RecordError::argument(format!(
                "write-back holds {} values, {} records x {cols} columns need {expected}",
                data.len(),
                self.len()
            )));
        }

        for (i, row) in data.chunks_exact(cols).enumerate() {
            if let Some(rec) = self.raw.record_mut(i) {
                rec[..cols].copy_from_slice(row);
                rec[cols..].fill(T::default());
            }
        }
        Ok(())
    }

    pub fn write_projection(&mut self, p: &Projection<T>) -> Result<(), RecordError> {
        if p.rows() != self.len() {
            return Err(RecordError::argument(format!(
                "projection has {} rows, sink has {} records",
                p.rows(),
                self.len()
            )));
        }
        self.write_rows(p.as_slice(), p.cols())
    }

    /// Stores one field of one record.
    pub fn set(&mut self, index: usize, field: usize, value: T) -> Result<(), RecordError> {
        let len = self.len();
        let slot = self
            .raw
            .record_mut(index)
            .and_then(|rec| rec.get_mut(field))
            .ok_or_else(|| {
                RecordError::argument(format!("field {field} of record {index} out of range (len {len})"))
            })?;
        *slot = value;
        Ok(())
    }
}
