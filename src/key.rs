//! Key construction in place at the arena tail.
//!
//! A candidate key is serialized directly after the last committed record.
//! If the key turns out to be new, committing it is just advancing the arena's
//! durable position; if it already exists, the bytes are left as scratch and
//! overwritten by the next key.

use crate::column::{ColumnType, Long256};
use crate::error::{FastMapError, Result};
use crate::hash::HashFunction;
use crate::map::FastMap;
use crate::record::{MapRecord, KEY_OFFSET_WIDTH, NULL_LEN, RECORD_HEADER};
use crate::value::{MapValue, ValueSlot};

/// Write cursors of the key under construction. All positions are arena
/// offsets.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct KeyBuilder {
    /// Record start.
    pub(crate) start: usize,
    /// Next write position in the key data block.
    pub(crate) append: usize,
    /// Next write position in the key end-offset block.
    pub(crate) next_col_offset: usize,
    /// Key columns written so far.
    pub(crate) column: usize,
}

impl KeyBuilder {
    pub(crate) fn begin(&mut self, start: usize, value_size: usize, key_data_offset: usize) {
        self.start = start;
        self.next_col_offset = start + RECORD_HEADER + value_size;
        self.append = start + key_data_offset;
        self.column = 0;
    }

    #[inline]
    pub(crate) fn record_len(&self) -> usize {
        self.append - self.start
    }
}

/// A key being written into a [`FastMap`].
///
/// Obtained from [`FastMap::with_key`]. Fields are written in key-column order
/// with the typed `put_*` methods, then the key is resolved with
/// [`create`](MapKey::create) or [`find`](MapKey::find). The handle borrows the
/// map mutably, so only one key can be under construction at a time; dropping
/// it without resolving discards the written bytes.
pub struct MapKey<'a, H> {
    map: &'a mut FastMap<H>,
}

impl<'a, H: HashFunction> MapKey<'a, H> {
    pub(crate) fn new(map: &'a mut FastMap<H>) -> Self {
        Self { map }
    }

    pub fn put_bool(&mut self, v: bool) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Boolean, &[v as u8])
    }

    pub fn put_byte(&mut self, v: i8) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Byte, &v.to_le_bytes())
    }

    pub fn put_short(&mut self, v: i16) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Short, &v.to_le_bytes())
    }

    pub fn put_char(&mut self, v: u16) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Char, &v.to_le_bytes())
    }

    pub fn put_int(&mut self, v: i32) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Int, &v.to_le_bytes())
    }

    pub fn put_symbol(&mut self, id: i32) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Symbol, &id.to_le_bytes())
    }

    pub fn put_float(&mut self, v: f32) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Float, &v.to_le_bytes())
    }

    pub fn put_long(&mut self, v: i64) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Long, &v.to_le_bytes())
    }

    pub fn put_date(&mut self, millis: i64) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Date, &millis.to_le_bytes())
    }

    pub fn put_timestamp(&mut self, micros: i64) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Timestamp, &micros.to_le_bytes())
    }

    pub fn put_double(&mut self, v: f64) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Double, &v.to_le_bytes())
    }

    pub fn put_long128(&mut self, v: i128) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Long128, &v.to_le_bytes())
    }

    pub fn put_long256(&mut self, v: Long256) -> Result<&mut Self> {
        self.put_fixed(ColumnType::Long256, &v.to_le_bytes())
    }

    /// `None` writes a null string.
    pub fn put_str(&mut self, v: Option<&str>) -> Result<&mut Self> {
        self.put_var(ColumnType::String, v.map(str::as_bytes))
    }

    /// `None` writes a null binary value.
    pub fn put_bin(&mut self, v: Option<&[u8]>) -> Result<&mut Self> {
        self.put_var(ColumnType::Binary, v)
    }

    /// Copy every key column of `record`, which must come from a map with the
    /// same key schema. Must be the only put for this key.
    pub fn put_record_key(&mut self, record: &MapRecord<'_>) -> Result<&mut Self> {
        let map = &mut *self.map;
        if record.key_types() != &map.key_types {
            return Err(FastMapError::Configuration(
                "record key schema does not match the map key schema".to_string(),
            ));
        }
        debug_assert_eq!(map.builder.column, 0, "put_record_key after other puts");

        let key_count = map.key_types.len();
        let tail = record.key_tail();
        let (src_offsets, data) = tail.split_at(key_count * KEY_OFFSET_WIDTH);
        let src_base = record.key_data_offset();
        let dst_base = map.key_data_offset;

        let end = map.builder.append + data.len();
        map.arena.ensure_end(end)?;
        for (k, chunk) in src_offsets.chunks_exact(KEY_OFFSET_WIDTH).enumerate() {
            let mut b = [0u8; 4];
            b.copy_from_slice(chunk);
            let src_end = i32::from_le_bytes(b) as usize;
            let dst_end = src_end - src_base + dst_base;
            map.arena
                .write_i32(map.builder.next_col_offset + k * KEY_OFFSET_WIDTH, dst_end as i32);
        }
        map.arena.write(map.builder.append, data);
        map.builder.append = end;
        map.builder.next_col_offset += key_count * KEY_OFFSET_WIDTH;
        map.builder.column = key_count;
        Ok(self)
    }

    /// Find the key, inserting it when absent. The returned view (first slot)
    /// reports [`is_new`](MapValue::is_new) accordingly.
    pub fn create(self) -> Result<MapValue<'a>> {
        self.create_in(ValueSlot::First)
    }

    /// Like [`create`](MapKey::create), positioning the given view slot.
    pub fn create_in(self, slot: ValueSlot) -> Result<MapValue<'a>> {
        self.map.create_value(slot)
    }

    /// Look the key up without inserting it.
    pub fn find(self) -> Result<Option<MapValue<'a>>> {
        self.find_in(ValueSlot::First)
    }

    pub fn find_in(self, slot: ValueSlot) -> Result<Option<MapValue<'a>>> {
        self.map.find_value(slot)
    }

    fn put_fixed(&mut self, kind: ColumnType, bytes: &[u8]) -> Result<&mut Self> {
        let map = &mut *self.map;
        map.expect_key_column(kind);
        let at = map.builder.append;
        let end = at + bytes.len();
        map.arena.ensure_end(end)?;
        map.arena.write(at, bytes);
        map.builder.append = end;
        map.close_key_column()?;
        Ok(self)
    }

    fn put_var(&mut self, kind: ColumnType, bytes: Option<&[u8]>) -> Result<&mut Self> {
        let map = &mut *self.map;
        map.expect_key_column(kind);
        let len = bytes.map_or(0, <[u8]>::len);
        if len > i32::MAX as usize {
            tracing::warn!(len, "key field exceeds the 4-byte length prefix");
            return Err(FastMapError::ResourceExhausted(format!(
                "key field of {len} bytes does not fit a 4-byte length"
            )));
        }

        let at = map.builder.append;
        let end = at + 4 + len;
        map.arena.ensure_end(end)?;
        match bytes {
            Some(bytes) => {
                map.arena.write_i32(at, len as i32);
                map.arena.write(at + 4, bytes);
            }
            None => map.arena.write_i32(at, NULL_LEN),
        }
        map.builder.append = end;
        map.close_key_column()?;
        Ok(self)
    }
}

impl<H> FastMap<H> {
    #[inline]
    fn expect_key_column(&self, kind: ColumnType) {
        debug_assert!(
            self.builder.column < self.key_types.len(),
            "more key columns written than the key schema has"
        );
        debug_assert_eq!(
            self.key_types.column_type(self.builder.column),
            kind,
            "key column {} type mismatch",
            self.builder.column
        );
    }

    /// Record the end offset of the column just written.
    fn close_key_column(&mut self) -> Result<()> {
        let end = self.builder.record_len();
        if end > i32::MAX as usize {
            tracing::warn!(len = end, "key record exceeds the 4-byte length header");
            return Err(FastMapError::ResourceExhausted(format!(
                "key record of {end} bytes does not fit a 4-byte length"
            )));
        }
        self.arena.write_i32(self.builder.next_col_offset, end as i32);
        self.builder.next_col_offset += KEY_OFFSET_WIDTH;
        self.builder.column += 1;
        Ok(())
    }
}

/// Compare two key data blocks, a word at a time where the length allows.
pub(crate) fn key_bytes_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.len() % 8 == 0 {
        return a
            .chunks_exact(8)
            .zip(b.chunks_exact(8))
            .all(|(x, y)| u64::from_ne_bytes(to_word(x)) == u64::from_ne_bytes(to_word(y)));
    }
    if a.len() % 4 == 0 {
        return a
            .chunks_exact(4)
            .zip(b.chunks_exact(4))
            .all(|(x, y)| u32::from_ne_bytes(to_word(x)) == u32::from_ne_bytes(to_word(y)));
    }
    a.iter().zip(b).all(|(x, y)| x == y)
}

#[inline]
fn to_word<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
