// Four-component record as the simulation lays it out: position (x, y, z) plus one
// extra scalar in w (type id, mass, ...). repr(C) keeps field order = memory order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec4<T> {
    pub x: T,
    pub y: T,
    pub z: T,
    pub w: T,
}

impl<T: Copy> Vec4<T> {
    #[inline]
    pub const fn new(x: T, y: T, z: T, w: T) -> Self {
        Self { x, y, z, w }
    }

    #[inline]
    pub fn to_array(self) -> [T; 4] {
        [self.x, self.y, self.z, self.w]
    }

    #[inline]
    pub fn from_slice(fields: &[T]) -> Option<Self> {
        match *fields {
            [x, y, z, w] => Some(Self { x, y, z, w }),
            _ => None,
        }
    }
}
