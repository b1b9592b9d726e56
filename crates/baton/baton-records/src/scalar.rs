use std::fmt;

/// Element types a record field can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    F32,
    F64,
    I32,
    I64,
}

impl ScalarKind {
    pub const fn size(self) -> usize {
        match self {
            ScalarKind::F32 | ScalarKind::I32 => 4,
            ScalarKind::F64 | ScalarKind::I64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    /// Only types with no invalid bit patterns get this.
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// Plain numeric types that can be read straight out of shared memory.
///
/// Every bit pattern must be a valid value (no niches), which holds for the four
/// implementors below. The trait is sealed, so other crates can't add a type that
/// would turn foreign bytes into an invalid value.
pub trait Scalar:
    sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const KIND: ScalarKind;
}

impl Scalar for f32 {
    const KIND: ScalarKind = ScalarKind::F32;
}

impl Scalar for f64 {
    const KIND: ScalarKind = ScalarKind::F64;
}

impl Scalar for i32 {
    const KIND: ScalarKind = ScalarKind::I32;
}

impl Scalar for i64 {
    const KIND: ScalarKind = ScalarKind::I64;
}
