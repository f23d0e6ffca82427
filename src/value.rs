//! Typed accessors over a record's value block.

use crate::arena::Arena;
use crate::column::{ColumnType, Long256, ValueLayout};
use crate::record::MapRecord;

/// One of the three independently positioned value views a map keeps.
///
/// Ternary aggregate expressions hold positions in several records at once;
/// each position lives in its own slot so repositioning one never moves
/// another.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueSlot {
    #[default]
    First,
    Second,
    Third,
}

impl ValueSlot {
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            ValueSlot::First => 0,
            ValueSlot::Second => 1,
            ValueSlot::Third => 2,
        }
    }
}

/// Where a value view currently points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ViewPosition {
    pub(crate) address: usize,
    pub(crate) is_new: bool,
}

/// Mutable view over the value block of one record.
///
/// Fields are addressed by value-column index. Offsets come from the layout
/// computed when the map was built, so every access is a fixed offset from
/// [`address`](MapValue::address).
pub struct MapValue<'a> {
    arena: &'a mut Arena,
    layout: &'a ValueLayout,
    position: ViewPosition,
}

macro_rules! numeric_accessors {
    ($($kind:ident: $ty:ty => $get:ident, $put:ident, $add:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self, index: usize) -> $ty {
                self.check(index, ColumnType::$kind);
                <$ty>::from_le_bytes(self.arena.read_array(self.field(index)))
            }

            #[inline]
            pub fn $put(&mut self, index: usize, v: $ty) {
                self.check(index, ColumnType::$kind);
                let at = self.field(index);
                self.arena.write(at, &v.to_le_bytes());
            }

            #[inline]
            pub fn $add(&mut self, index: usize, delta: $ty) {
                let v = self.$get(index);
                self.$put(index, v.wrapping_add(delta));
            }
        )*
    };
}

macro_rules! float_accessors {
    ($($kind:ident: $ty:ty => $get:ident, $put:ident, $add:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self, index: usize) -> $ty {
                self.check(index, ColumnType::$kind);
                <$ty>::from_le_bytes(self.arena.read_array(self.field(index)))
            }

            #[inline]
            pub fn $put(&mut self, index: usize, v: $ty) {
                self.check(index, ColumnType::$kind);
                let at = self.field(index);
                self.arena.write(at, &v.to_le_bytes());
            }

            #[inline]
            pub fn $add(&mut self, index: usize, delta: $ty) {
                let v = self.$get(index);
                self.$put(index, v + delta);
            }
        )*
    };
}

macro_rules! min_max_accessors {
    ($($ty:ty => $get:ident, $put:ident, $min:ident, $max:ident;)*) => {
        $(
            /// Keep the smaller of the stored value and `v`.
            #[inline]
            pub fn $min(&mut self, index: usize, v: $ty) {
                if v < self.$get(index) {
                    self.$put(index, v);
                }
            }

            /// Keep the larger of the stored value and `v`.
            #[inline]
            pub fn $max(&mut self, index: usize, v: $ty) {
                if v > self.$get(index) {
                    self.$put(index, v);
                }
            }
        )*
    };
}

impl<'a> MapValue<'a> {
    pub(crate) fn new(arena: &'a mut Arena, layout: &'a ValueLayout, position: ViewPosition) -> Self {
        Self {
            arena,
            layout,
            position,
        }
    }

    /// `true` when the record was created by the lookup that produced this
    /// view: all fields are zero and carry no prior state.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.position.is_new
    }

    /// Arena offset of the value block; accepted by
    /// [`FastMap::value_at`](crate::FastMap::value_at).
    #[inline]
    pub fn address(&self) -> usize {
        self.position.address
    }

    #[inline]
    fn field(&self, index: usize) -> usize {
        self.position.address + self.layout.offset(index)
    }

    #[inline]
    fn check(&self, index: usize, kind: ColumnType) {
        debug_assert_eq!(
            self.layout.column_type(index).width(),
            kind.width(),
            "value column {index} is {:?}, accessed as {kind:?}",
            self.layout.column_type(index)
        );
    }

    pub fn get_bool(&self, index: usize) -> bool {
        self.check(index, ColumnType::Boolean);
        self.arena.read_array::<1>(self.field(index))[0] != 0
    }

    pub fn put_bool(&mut self, index: usize, v: bool) {
        self.check(index, ColumnType::Boolean);
        let at = self.field(index);
        self.arena.write(at, &[v as u8]);
    }

    pub fn get_char(&self, index: usize) -> u16 {
        self.check(index, ColumnType::Char);
        u16::from_le_bytes(self.arena.read_array(self.field(index)))
    }

    pub fn put_char(&mut self, index: usize, v: u16) {
        self.check(index, ColumnType::Char);
        let at = self.field(index);
        self.arena.write(at, &v.to_le_bytes());
    }

    numeric_accessors! {
        Byte: i8 => get_byte, put_byte, add_byte;
        Short: i16 => get_short, put_short, add_short;
        Int: i32 => get_int, put_int, add_int;
        Long: i64 => get_long, put_long, add_long;
        Long128: i128 => get_long128, put_long128, add_long128;
    }

    float_accessors! {
        Float: f32 => get_float, put_float, add_float;
        Double: f64 => get_double, put_double, add_double;
    }

    min_max_accessors! {
        i32 => get_int, put_int, min_int, max_int;
        i64 => get_long, put_long, min_long, max_long;
        f32 => get_float, put_float, min_float, max_float;
        f64 => get_double, put_double, min_double, max_double;
    }

    pub fn get_date(&self, index: usize) -> i64 {
        self.get_long(index)
    }

    pub fn put_date(&mut self, index: usize, v: i64) {
        self.put_long(index, v)
    }

    pub fn get_timestamp(&self, index: usize) -> i64 {
        self.get_long(index)
    }

    pub fn put_timestamp(&mut self, index: usize, v: i64) {
        self.put_long(index, v)
    }

    pub fn get_long256(&self, index: usize) -> Long256 {
        self.check(index, ColumnType::Long256);
        Long256::from_le_bytes(self.arena.slice(self.field(index), 32))
    }

    pub fn put_long256(&mut self, index: usize, v: Long256) {
        self.check(index, ColumnType::Long256);
        let at = self.field(index);
        self.arena.write(at, &v.to_le_bytes());
    }

    pub fn add_long256(&mut self, index: usize, delta: Long256) {
        let v = self.get_long256(index);
        self.put_long256(index, v.wrapping_add(delta));
    }

    /// Overwrite the whole value block with the one carried by `record`.
    /// Both maps must share the value schema.
    pub fn copy_from(&mut self, record: &MapRecord<'_>) {
        let size = self.layout.size();
        debug_assert_eq!(record.value_block().len(), size);
        let at = self.position.address;
        self.arena.slice_mut(at, size).copy_from_slice(record.value_block());
    }
}
