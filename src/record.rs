//! Read-only row view over one arena record.
//!
//! Record layout, all integers little endian:
//!
//! ```text
//! [len:4][value block][key end offsets: 4 * key_count][key data]
//! ```
//!
//! `len` covers the whole record. Each key end offset is measured from the
//! record start and points one past the last byte of its key column, so column
//! `k` starts where column `k - 1` ends (column 0 starts at the key data).
//! Variable-width key fields are `[len:4][bytes]`, with `len == -1` for null.
//!
//! Columns are indexed the way a group-by row is emitted: value columns first,
//! key columns after them.

use crate::arena::read_array;
use crate::column::{ColumnType, ColumnTypes, Long256, ValueLayout};

pub(crate) const RECORD_HEADER: usize = 4;
pub(crate) const KEY_OFFSET_WIDTH: usize = 4;
pub(crate) const NULL_LEN: i32 = -1;

/// Everything needed to decode records of one map.
#[derive(Clone, Copy)]
pub(crate) struct RecordLayout<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) values: &'a ValueLayout,
    pub(crate) keys: &'a ColumnTypes,
    pub(crate) key_data_offset: usize,
}

/// A key + value row, positioned at one record.
#[derive(Clone, Copy)]
pub struct MapRecord<'a> {
    layout: RecordLayout<'a>,
    offset: usize,
}

macro_rules! fixed_getters {
    ($($ty:ty => $get:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self, column: usize) -> $ty {
                <$ty>::from_le_bytes(read_array(self.layout.data, self.fixed_field(column, std::mem::size_of::<$ty>())))
            }
        )*
    };
}

impl<'a> MapRecord<'a> {
    pub(crate) fn new(layout: RecordLayout<'a>, offset: usize) -> Self {
        Self { layout, offset }
    }

    /// Arena offset of the record start.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Arena offset of the value block, as accepted by `FastMap::value_at`.
    #[inline]
    pub fn value_address(&self) -> usize {
        self.offset + RECORD_HEADER
    }

    pub(crate) fn key_types(&self) -> &'a ColumnTypes {
        self.layout.keys
    }

    pub(crate) fn key_data_offset(&self) -> usize {
        self.layout.key_data_offset
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.layout.values.len() + self.layout.keys.len()
    }

    /// Kind of the column at a unified (values first) index.
    pub fn column_type(&self, column: usize) -> ColumnType {
        let split = self.layout.values.len();
        if column < split {
            self.layout.values.column_type(column)
        } else {
            self.layout.keys.column_type(column - split)
        }
    }

    #[inline]
    fn record_len(&self) -> usize {
        i32::from_le_bytes(read_array(self.layout.data, self.offset)) as usize
    }

    pub(crate) fn value_block(&self) -> &'a [u8] {
        let at = self.value_address();
        &self.layout.data[at..at + self.layout.values.size()]
    }

    /// Serialized key offsets and key data, everything after the value block.
    pub(crate) fn key_tail(&self) -> &'a [u8] {
        let at = self.value_address() + self.layout.values.size();
        &self.layout.data[at..self.offset + self.record_len()]
    }

    /// The hashed portion of the record.
    pub fn key_bytes(&self) -> &'a [u8] {
        let at = self.offset + self.layout.key_data_offset;
        &self.layout.data[at..self.offset + self.record_len()]
    }

    /// Arena offset where key column `key` begins.
    fn key_field(&self, key: usize) -> usize {
        if key == 0 {
            return self.offset + self.layout.key_data_offset;
        }
        let at = self.value_address() + self.layout.values.size() + (key - 1) * KEY_OFFSET_WIDTH;
        self.offset + i32::from_le_bytes(read_array(self.layout.data, at)) as usize
    }

    fn fixed_field(&self, column: usize, width: usize) -> usize {
        debug_assert_eq!(self.column_type(column).width(), Some(width));
        let split = self.layout.values.len();
        if column < split {
            self.value_address() + self.layout.values.offset(column)
        } else {
            self.key_field(column - split)
        }
    }

    /// Length-prefixed payload of a variable-width key column.
    fn var_field(&self, column: usize) -> Option<&'a [u8]> {
        let split = self.layout.values.len();
        debug_assert!(column >= split, "value columns are fixed width");
        debug_assert!(!self.column_type(column).is_fixed_width());
        let at = self.key_field(column - split);
        let len = i32::from_le_bytes(read_array(self.layout.data, at));
        if len == NULL_LEN {
            return None;
        }
        let start = at + 4;
        Some(&self.layout.data[start..start + len as usize])
    }

    pub fn get_bool(&self, column: usize) -> bool {
        self.layout.data[self.fixed_field(column, 1)] != 0
    }

    fixed_getters! {
        i8 => get_byte;
        i16 => get_short;
        u16 => get_char;
        i32 => get_int;
        f32 => get_float;
        i64 => get_long;
        f64 => get_double;
        i128 => get_long128;
    }

    pub fn get_symbol(&self, column: usize) -> i32 {
        self.get_int(column)
    }

    pub fn get_date(&self, column: usize) -> i64 {
        self.get_long(column)
    }

    pub fn get_timestamp(&self, column: usize) -> i64 {
        self.get_long(column)
    }

    pub fn get_long256(&self, column: usize) -> Long256 {
        let at = self.fixed_field(column, 32);
        Long256::from_le_bytes(&self.layout.data[at..at + 32])
    }

    /// `None` for a null string. Bytes are valid UTF-8 because they were
    /// written from a `&str`.
    pub fn get_str(&self, column: usize) -> Option<&'a str> {
        self.var_field(column)
            .map(|bytes| std::str::from_utf8(bytes).unwrap_or_default())
    }

    /// Byte length of a string column, `-1` for null.
    pub fn get_str_len(&self, column: usize) -> i32 {
        self.var_field(column).map_or(NULL_LEN, |b| b.len() as i32)
    }

    pub fn get_bin(&self, column: usize) -> Option<&'a [u8]> {
        self.var_field(column)
    }

    /// Byte length of a binary column, `-1` for null.
    pub fn get_bin_len(&self, column: usize) -> i32 {
        self.get_str_len(column)
    }
}

impl std::fmt::Debug for MapRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapRecord")
            .field("offset", &self.offset)
            .field("key_bytes", &self.key_bytes())
            .finish()
    }
}
