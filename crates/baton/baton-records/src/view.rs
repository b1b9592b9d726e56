//! Read-only window over a record array owned by another party.
//!
//! A [`RecordView`] holds no claim on the memory. It validates the address once, at
//! construction, and afterwards trusts the caller: the region must stay mapped, and
//! nobody may write it while a read is in progress. In the lock-step setup that is
//! exactly what owning the latch guarantees.

use crate::error::RecordError;
use crate::layout::RecordLayout;
use crate::projection::Projection;
use crate::raw::RawRecords;
use crate::scalar::Scalar;
use crate::vec4::Vec4;

pub struct RecordView<T: Scalar> {
    raw: RawRecords<T>,
}

impl<T: Scalar> RecordView<T> {
    /// Wraps `count` records of `layout` starting at `address`.
    ///
    /// # Errors
    /// - `PreconditionFailure` if the address is null or misaligned for `T`, if `count`
    ///   records don't fit in the address space from there, or if its first record
    ///   can't be read
    /// - `ArgumentError` if `layout` can't hold `T` fields
    ///
    /// # Safety
    /// The memory must stay mapped and readable for as long as the view is used, and
    /// must not be written while any accessor is running.
    pub unsafe fn from_raw(
        address: u64,
        count: usize,
        layout: RecordLayout,
    ) -> Result<Self, RecordError> {
        tracing::debug!(
            address = format_args!("{address:#x}"),
            count,
            fields = layout.fields(),
            scalar = %T::KIND,
            "about to try reading shared records"
        );
        // SAFETY: forwarded to our caller.
        let raw = unsafe { RawRecords::validate(address, count, layout)? };
        Ok(Self { raw })
    }

    /// Wraps `count` packed 4-field records at `address`.
    ///
    /// # Safety
    /// Same contract as [`RecordView::from_raw`].
    pub unsafe fn vec4(address: u64, count: usize) -> Result<Self, RecordError> {
        // SAFETY: forwarded to our caller.
        unsafe { Self::from_raw(address, count, RecordLayout::vec4::<T>()) }
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.count() == 0
    }

    #[inline]
    pub fn layout(&self) -> RecordLayout {
        self.raw.layout()
    }

    #[inline]
    pub fn fields(&self) -> usize {
        self.raw.layout().fields()
    }

    /// Base address the view was built from.
    #[inline]
    pub fn address(&self) -> u64 {
        self.raw.address()
    }

    /// The fields of record `index`, or `None` past the end.
    #[inline]
    pub fn record(&self, index: usize) -> Option<&[T]> {
        self.raw.record(index)
    }

    /// One field of one record.
    #[inline]
    pub fn get(&self, index: usize, field: usize) -> Option<T> {
        self.raw.record(index)?.get(field).copied()
    }

    /// Record `index` as a [`Vec4`], when records have exactly four fields.
    #[inline]
    pub fn vec4_at(&self, index: usize) -> Option<Vec4<T>> {
        Vec4::from_slice(self.raw.record(index)?)
    }

    /// Copies record `index` into `out`, which must hold exactly one record.
    pub fn copy_record(&self, index: usize, out: &mut [T]) -> Result<(), RecordError> {
        if out.len() != self.fields() {
            return Err(RecordError::argument(format!(
                "output holds {} values, records have {} fields",
                out.len(),
                self.fields()
            )));
        }
        let rec = self.raw.record(index).ok_or_else(|| {
            RecordError::argument(format!("record {index} out of range (len {})", self.len()))
        })?;
        out.copy_from_slice(rec);
        Ok(())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        (0..self.raw.count()).map(move |i| self.raw.record(i).unwrap_or(&[]))
    }

    /// Copies every record, in order, into a fresh `(len, fields)` row-major buffer.
    ///
    /// Reads exactly `len` records and never touches memory past the last one.
    ///
    /// # Errors
    /// `ArgumentError` if `len * fields` exceeds `max_elements` (use
    /// [`DEFAULT_MAX_ELEMENTS`](crate::DEFAULT_MAX_ELEMENTS) for the host's limit).
    pub fn project(&self, max_elements: usize) -> Result<Projection<T>, RecordError> {
        let total = self.element_count(max_elements)?;
        let mut out = vec![T::default(); total];
        self.fill(&mut out);
        Ok(Projection::from_parts(out, self.len(), self.fields()))
    }

    /// Like [`project`](Self::project) but into a caller-owned buffer of exactly
    /// `len * fields` elements.
    pub fn project_into(&self, out: &mut [T]) -> Result<(), RecordError> {
        let total = self.element_count(usize::MAX)?;
        if out.len() != total {
            return Err(RecordError::argument(format!(
                "output holds {} values, projection needs {total}",
                out.len()
            )));
        }
        self.fill(out);
        Ok(())
    }

    fn element_count(&self, max_elements: usize) -> Result<usize, RecordError> {
        let total = self
            .len()
            .checked_mul(self.fields())
            .ok_or_else(|| RecordError::argument("too many elements in projection"))?;
        if total > max_elements {
            return Err(RecordError::argument(format!(
                "too many elements in projection: {total} > {max_elements}"
            )));
        }
        Ok(total)
    }

    #[inline]
    fn fill(&self, out: &mut [T]) {
        if let Some(all) = self.raw.packed() {
            out.copy_from_slice(all);
            return;
        }
        let fields = self.fields();
        for (i, dst) in out.chunks_exact_mut(fields).enumerate() {
            if let Some(rec) = self.raw.record(i) {
                dst.copy_from_slice(rec);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<Vec4<f32>> {
        (0..n)
            .map(|i| {
                let f = i as f32;
                Vec4::new(f, f + 0.25, -f, f * 2.0)
            })
            .collect()
    }

    fn view_of<T: Scalar, R>(data: &[R], count: usize, layout: RecordLayout) -> RecordView<T> {
        unsafe { RecordView::from_raw(data.as_ptr() as u64, count, layout) }.unwrap()
    }

    #[test]
    fn projection_reproduces_every_field_in_order() {
        for n in [0usize, 1, 1000] {
            let data = records(n.max(1));
            let view: RecordView<f32> = view_of(&data, n, RecordLayout::vec4::<f32>());
            let out = view.project(crate::DEFAULT_MAX_ELEMENTS).unwrap();
            assert_eq!(out.shape(), (n, 4));
            assert_eq!(out.len(), n * 4);
            for (i, r) in data.iter().take(n).enumerate() {
                assert_eq!(&out.as_slice()[4 * i..4 * i + 4], &r.to_array(), "record {i}");
            }
        }
    }

    #[test]
    fn empty_view_projects_to_nothing() {
        let data = records(1);
        let view: RecordView<f32> = view_of(&data, 0, RecordLayout::vec4::<f32>());
        assert!(view.is_empty());
        assert!(view.record(0).is_none());
        let out = view.project(0).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.shape(), (0, 4));
    }

    #[test]
    fn invalid_address_is_a_precondition_failure() {
        let err = unsafe { RecordView::<f32>::vec4(16, 4) }.err().unwrap();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("0x10"));
    }

    #[test]
    fn element_limit_is_an_argument_error() {
        let data = records(10);
        let view: RecordView<f32> = view_of(&data, 10, RecordLayout::vec4::<f32>());
        assert!(view.project(39).unwrap_err().is_argument());
        assert_eq!(view.project(40).unwrap().len(), 40);
    }

    #[test]
    fn accessors_are_bounds_checked() {
        let data = records(3);
        let view: RecordView<f32> = view_of(&data, 3, RecordLayout::vec4::<f32>());
        assert_eq!(view.get(2, 3), Some(4.0));
        assert_eq!(view.get(2, 4), None);
        assert_eq!(view.get(3, 0), None);
        assert_eq!(view.vec4_at(1), Some(data[1]));

        let mut one = [0f32; 4];
        view.copy_record(1, &mut one).unwrap();
        assert_eq!(one, data[1].to_array());
        assert!(view.copy_record(3, &mut one).unwrap_err().is_argument());
        assert!(view.copy_record(0, &mut [0f32; 3]).unwrap_err().is_argument());
        assert_eq!(view.iter().count(), 3);
    }

    #[test]
    fn view_reads_only_the_requested_prefix() {
        let data = records(8);
        let view: RecordView<f32> = view_of(&data, 2, RecordLayout::vec4::<f32>());
        let out = view.project(usize::MAX).unwrap();
        assert_eq!(out.rows(), 2);
        assert_eq!(out.row(1).unwrap(), &data[1].to_array());
        assert!(out.row(2).is_none());
    }

    #[test]
    fn strided_records_skip_padding() {
        // 3 useful fields, 4th slot is padding that must not leak into the output.
        let raw: Vec<f64> = vec![1., 2., 3., 99., 4., 5., 6., 99.];
        let layout = RecordLayout::strided::<f64>(3, 32).unwrap();
        let view: RecordView<f64> = view_of(&raw, 2, layout);
        let out = view.project(usize::MAX).unwrap();
        assert_eq!(out.shape(), (2, 3));
        assert_eq!(out.as_slice(), &[1., 2., 3., 4., 5., 6.]);
    }

    #[test]
    fn project_into_demands_exact_length() {
        let data: Vec<i32> = (0..12).collect();
        let view: RecordView<i32> = view_of(&data, 3, RecordLayout::vec4::<i32>());
        let mut out = vec![0; 12];
        view.project_into(&mut out).unwrap();
        assert_eq!(out, data);
        assert!(view.project_into(&mut [0; 11]).unwrap_err().is_argument());
    }
}
