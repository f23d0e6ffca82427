//! Column kinds and the precomputed value-block layout.
//!
//! Key columns may be any [`ColumnType`]; value columns must be fixed-width
//! because the value block is laid out once, at construction, as a run of
//! fields at precomputed offsets.

use crate::error::{FastMapError, Result};

/// Kinds of column a key or value field can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    /// Dictionary id of an interned string, stored as an `i32`.
    Symbol,
    Float,
    Long,
    /// Milliseconds since the epoch.
    Date,
    /// Microseconds since the epoch.
    Timestamp,
    Double,
    Long128,
    Long256,
    String,
    Binary,
}

impl ColumnType {
    /// Byte width of the field, or `None` for length-prefixed kinds.
    #[inline]
    pub const fn width(self) -> Option<usize> {
        match self {
            ColumnType::Boolean | ColumnType::Byte => Some(1),
            ColumnType::Short | ColumnType::Char => Some(2),
            ColumnType::Int | ColumnType::Symbol | ColumnType::Float => Some(4),
            ColumnType::Long | ColumnType::Date | ColumnType::Timestamp | ColumnType::Double => {
                Some(8)
            }
            ColumnType::Long128 => Some(16),
            ColumnType::Long256 => Some(32),
            ColumnType::String | ColumnType::Binary => None,
        }
    }

    #[inline]
    pub const fn is_fixed_width(self) -> bool {
        self.width().is_some()
    }
}

/// An ordered column schema, as handed over by the query planner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnTypes {
    types: Vec<ColumnType>,
}

impl ColumnTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style.
    pub fn with(mut self, column_type: ColumnType) -> Self {
        self.types.push(column_type);
        self
    }

    pub fn push(&mut self, column_type: ColumnType) {
        self.types.push(column_type);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    #[inline]
    pub fn column_type(&self, index: usize) -> ColumnType {
        self.types[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnType> + '_ {
        self.types.iter().copied()
    }
}

impl From<Vec<ColumnType>> for ColumnTypes {
    fn from(types: Vec<ColumnType>) -> Self {
        Self { types }
    }
}

impl From<&[ColumnType]> for ColumnTypes {
    fn from(types: &[ColumnType]) -> Self {
        Self {
            types: types.to_vec(),
        }
    }
}

impl<const N: usize> From<[ColumnType; N]> for ColumnTypes {
    fn from(types: [ColumnType; N]) -> Self {
        Self {
            types: types.to_vec(),
        }
    }
}

/// 256-bit unsigned integer stored as four little-endian limbs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Long256 {
    pub limbs: [u64; 4],
}

impl Long256 {
    pub const ZERO: Long256 = Long256 { limbs: [0; 4] };

    pub const fn new(l0: u64, l1: u64, l2: u64, l3: u64) -> Self {
        Self {
            limbs: [l0, l1, l2, l3],
        }
    }

    pub const fn from_u64(v: u64) -> Self {
        Self::new(v, 0, 0, 0)
    }

    /// Add with carry across limbs; overflow out of the top limb wraps.
    pub fn wrapping_add(self, other: Long256) -> Long256 {
        let mut out = [0u64; 4];
        let mut carry = false;
        for (i, slot) in out.iter_mut().enumerate() {
            let (s1, c1) = self.limbs[i].overflowing_add(other.limbs[i]);
            let (s2, c2) = s1.overflowing_add(carry as u64);
            *slot = s2;
            carry = c1 || c2;
        }
        Long256 { limbs: out }
    }

    pub fn to_le_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.limbs.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&limb.to_le_bytes());
        }
        out
    }

    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= 32);
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            *limb = u64::from_le_bytes(b);
        }
        Self { limbs }
    }
}

/// Field offsets of the value block, computed once from the value schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ValueLayout {
    types: ColumnTypes,
    offsets: Vec<usize>,
    size: usize,
}

impl ValueLayout {
    pub(crate) fn new(types: &ColumnTypes) -> Result<Self> {
        let mut offsets = Vec::with_capacity(types.len());
        let mut size = 0usize;
        for (column, column_type) in types.iter().enumerate() {
            let width = column_type.width().ok_or(FastMapError::UnsupportedType {
                column,
                column_type,
            })?;
            offsets.push(size);
            size += width;
        }
        Ok(Self {
            types: types.clone(),
            offsets,
            size,
        })
    }

    #[inline]
    pub(crate) fn offset(&self, index: usize) -> usize {
        self.offsets[index]
    }

    #[inline]
    pub(crate) fn column_type(&self, index: usize) -> ColumnType {
        self.types.column_type(index)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Total byte width of the value block.
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn types(&self) -> &ColumnTypes {
        &self.types
    }
}
