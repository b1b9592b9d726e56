//! Shape of one record: how many scalar fields, and how far apart records start.
//!
//! ```text
//!  stride ──────────────────────────────┐
//!  ┌────────┬────────┬────────┬────────┬────────┐┌────────┬──
//!  │ field0 │ field1 │ field2 │ field3 │ (pad)  ││ field0 │ ...
//!  └────────┴────────┴────────┴────────┴────────┘└────────┴──
//!   record 0                                     record 1
//! ```
//!
//! The default is the packed 4-field record (`stride == 4 * size_of::<T>()`).

use crate::error::RecordError;
use crate::scalar::Scalar;
use std::mem::{align_of, size_of};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    fields: usize,
    /// Bytes from the start of one record to the start of the next.
    stride: usize,
}

impl RecordLayout {
    /// Records of `fields` scalars with no padding between them.
    pub fn packed<T: Scalar>(fields: usize) -> Result<Self, RecordError> {
        let stride = fields
            .checked_mul(size_of::<T>())
            .ok_or_else(|| RecordError::argument(format!("{fields} fields overflow a record")))?;
        Self::strided::<T>(fields, stride)
    }

    /// Records of `fields` scalars placed every `stride` bytes.
    ///
    /// `stride` must cover the fields and keep every record aligned for `T`.
    pub fn strided<T: Scalar>(fields: usize, stride: usize) -> Result<Self, RecordError> {
        if fields == 0 {
            return Err(RecordError::argument("a record needs at least one field"));
        }
        let record_bytes = fields
            .checked_mul(size_of::<T>())
            .ok_or_else(|| RecordError::argument(format!("{fields} fields overflow a record")))?;
        if stride < record_bytes {
            return Err(RecordError::argument(format!(
                "stride {stride} is shorter than {fields} x {} ({record_bytes} bytes)",
                T::KIND
            )));
        }
        if stride % align_of::<T>() != 0 {
            return Err(RecordError::argument(format!(
                "stride {stride} breaks {}-byte alignment of {}",
                align_of::<T>(),
                T::KIND
            )));
        }
        Ok(Self { fields, stride })
    }

    /// The 4-field layout (x, y, z, w).
    pub fn vec4<T: Scalar>() -> Self {
        Self {
            fields: 4,
            stride: 4 * size_of::<T>(),
        }
    }

    #[inline]
    pub fn fields(&self) -> usize {
        self.fields
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bytes actually occupied by the fields of one record, for element type `T`.
    #[inline]
    pub fn record_bytes<T: Scalar>(&self) -> usize {
        self.fields * size_of::<T>()
    }

    /// True when records sit back to back, so the whole array is one contiguous run
    /// of scalars.
    #[inline]
    pub fn is_packed<T: Scalar>(&self) -> bool {
        self.stride == self.record_bytes::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec4_is_packed_four_fields() {
        let l = RecordLayout::vec4::<f32>();
        assert_eq!(l.fields(), 4);
        assert_eq!(l.stride(), 16);
        assert!(l.is_packed::<f32>());
        assert_eq!(l, RecordLayout::packed::<f32>(4).unwrap());
        assert_eq!(RecordLayout::vec4::<f64>().stride(), 32);
    }

    #[test]
    fn strided_rejects_bad_shapes() {
        assert!(RecordLayout::packed::<f32>(0).unwrap_err().is_argument());
        assert!(RecordLayout::strided::<f32>(4, 12).unwrap_err().is_argument());
        assert!(RecordLayout::strided::<f64>(3, 26).unwrap_err().is_argument());
        assert!(RecordLayout::packed::<f64>(usize::MAX).unwrap_err().is_argument());
    }

    #[test]
    fn padded_stride_is_not_packed() {
        let l = RecordLayout::strided::<f32>(3, 16).unwrap();
        assert_eq!(l.record_bytes::<f32>(), 12);
        assert!(!l.is_packed::<f32>());
    }
}
