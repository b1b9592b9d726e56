/// Largest element count the host's numeric buffers can address (`i32::MAX`).
pub const DEFAULT_MAX_ELEMENTS: usize = i32::MAX as usize;

/// A flat, row-major `(rows, cols)` copy of a record array. Owned by the caller and
/// built fresh for every projection.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T> Projection<T> {
    pub(crate) fn from_parts(data: Vec<T>, rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { data, rows, cols }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn row(&self, index: usize) -> Option<&[T]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        (0..self.rows).map(move |i| &self.data[i * self.cols..(i + 1) * self.cols])
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}
