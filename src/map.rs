//! The map itself: configuration, probing, rehash and lifecycle.

use crate::arena::Arena;
use crate::column::{ColumnTypes, ValueLayout};
use crate::cursor::MapCursor;
use crate::directory::{OffsetsDirectory, EMPTY};
use crate::error::{FastMapError, Result};
use crate::hash::{HashFunction, Xxh3};
use crate::key::{key_bytes_equal, KeyBuilder, MapKey};
use crate::record::{MapRecord, RecordLayout, KEY_OFFSET_WIDTH, RECORD_HEADER};
use crate::value::{MapValue, ValueSlot, ViewPosition};

/// Smallest directory a map is built with.
pub const MIN_INITIAL_CAPACITY: usize = 128;

/// Construction parameters for a [`FastMap`].
#[derive(Debug, Clone)]
pub struct FastMapConfig {
    /// Initial arena size in bytes. Must be greater than 3.
    pub page_size: usize,
    /// Expected number of distinct keys; sizes the initial directory.
    pub key_capacity: usize,
    /// Fraction of directory slots that may be occupied before a rehash,
    /// strictly between 0 and 1.
    pub load_factor: f64,
    /// Number of arena reallocations allowed before inserts fail with
    /// [`FastMapError::ResourceExhausted`].
    pub max_resizes: u32,
}

impl Default for FastMapConfig {
    fn default() -> Self {
        Self {
            page_size: 4 * 1024 * 1024,
            key_capacity: MIN_INITIAL_CAPACITY,
            load_factor: 0.5,
            max_resizes: u32::MAX,
        }
    }
}

impl FastMapConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_key_capacity(mut self, key_capacity: usize) -> Self {
        self.key_capacity = key_capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn with_max_resizes(mut self, max_resizes: u32) -> Self {
        self.max_resizes = max_resizes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size <= 3 {
            return Err(FastMapError::Configuration(format!(
                "page size must be greater than 3, got {}",
                self.page_size
            )));
        }
        if !(self.load_factor > 0.0 && self.load_factor < 1.0) {
            return Err(FastMapError::Configuration(format!(
                "load factor must be in (0, 1), got {}",
                self.load_factor
            )));
        }
        Ok(())
    }

    /// Directory size for the configured key capacity.
    fn directory_capacity(&self) -> Result<usize> {
        let wanted = (self.key_capacity as f64 / self.load_factor).ceil();
        if wanted <= MIN_INITIAL_CAPACITY as f64 {
            return Ok(MIN_INITIAL_CAPACITY);
        }
        if wanted >= (usize::MAX / 2) as f64 {
            return Err(FastMapError::Configuration(format!(
                "key capacity {} is too large",
                self.key_capacity
            )));
        }
        (wanted as usize).checked_next_power_of_two().ok_or_else(|| {
            FastMapError::Configuration(format!("key capacity {} is too large", self.key_capacity))
        })
    }
}

/// Occupied slots allowed in a directory of `capacity` slots.
#[inline]
fn threshold(capacity: usize, load_factor: f64) -> usize {
    ((capacity as f64 * load_factor).floor() as usize).max(1)
}

enum Probe {
    /// Arena offset of the record holding an equal key.
    Found(usize),
    /// First empty slot on the probe sequence.
    Vacant(usize),
}

/// Open-addressing hash map from composite keys to fixed-layout value blocks.
///
/// Keys and their value blocks are serialized back to back into a single
/// arena; the directory maps buckets to record offsets. See the crate docs for
/// the write/lookup protocol.
///
/// The map is single-writer and holds no locks. Use one map per worker and
/// [`merge`](FastMap::merge) them afterwards.
pub struct FastMap<H = Xxh3> {
    pub(crate) arena: Arena,
    pub(crate) directory: OffsetsDirectory,
    pub(crate) key_types: ColumnTypes,
    pub(crate) values: ValueLayout,
    pub(crate) builder: KeyBuilder,
    /// Offset of the key data block from a record start.
    pub(crate) key_data_offset: usize,
    hasher: H,
    config: FastMapConfig,
    initial_capacity: usize,
    views: [ViewPosition; 3],
    size: usize,
    /// Inserts left before the next rehash.
    free: usize,
    closed: bool,
}

impl FastMap<Xxh3> {
    pub fn new(
        config: FastMapConfig,
        key_types: impl Into<ColumnTypes>,
        value_types: impl Into<ColumnTypes>,
    ) -> Result<Self> {
        Self::with_hasher(config, key_types, value_types, Xxh3)
    }
}

impl<H> FastMap<H> {
    pub fn with_hasher(
        config: FastMapConfig,
        key_types: impl Into<ColumnTypes>,
        value_types: impl Into<ColumnTypes>,
        hasher: H,
    ) -> Result<Self> {
        config.validate()?;
        let key_types = key_types.into();
        let values = ValueLayout::new(&value_types.into())?;
        let capacity = config.directory_capacity()?;
        let key_data_offset = RECORD_HEADER + values.size() + key_types.len() * KEY_OFFSET_WIDTH;

        Ok(Self {
            arena: Arena::new(config.page_size, config.max_resizes),
            directory: OffsetsDirectory::new(capacity),
            key_types,
            values,
            builder: KeyBuilder::default(),
            key_data_offset,
            hasher,
            initial_capacity: capacity,
            views: [ViewPosition::default(); 3],
            size: 0,
            free: threshold(capacity, config.load_factor),
            closed: false,
            config,
        })
    }

    /// Number of distinct keys.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Directory slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.directory.capacity()
    }

    #[inline]
    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Bytes used by committed records.
    #[inline]
    pub fn arena_size(&self) -> usize {
        self.arena.size()
    }

    pub fn used_heap_size(&self) -> usize {
        self.arena.capacity() + self.directory.heap_size()
    }

    pub fn resize_count(&self) -> u32 {
        self.arena.resize_count()
    }

    pub fn load_factor(&self) -> f64 {
        self.config.load_factor
    }

    pub fn key_types(&self) -> &ColumnTypes {
        &self.key_types
    }

    pub fn value_types(&self) -> &ColumnTypes {
        self.values.types()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn record_layout(&self) -> RecordLayout<'_> {
        RecordLayout {
            data: self.arena.bytes(),
            values: &self.values,
            keys: &self.key_types,
            key_data_offset: self.key_data_offset,
        }
    }

    /// Row view of the record starting at arena offset `offset`.
    pub fn record_at(&self, offset: usize) -> MapRecord<'_> {
        debug_assert!(offset < self.arena.size());
        MapRecord::new(self.record_layout(), offset)
    }

    /// Walk every live record in directory slot order.
    pub fn cursor(&self) -> MapCursor<'_> {
        MapCursor::new(&self.directory, self.record_layout(), self.size)
    }

    /// Position the first value view at a value block address previously
    /// obtained from [`MapValue::address`] or [`MapRecord::value_address`].
    pub fn value_at(&mut self, address: usize) -> MapValue<'_> {
        self.value_at_in(ValueSlot::First, address)
    }

    pub fn value_at_in(&mut self, slot: ValueSlot, address: usize) -> MapValue<'_> {
        debug_assert!(address < self.arena.size() || self.values.size() == 0);
        self.position(slot, address, false)
    }

    /// Re-acquire a view at its last position.
    pub fn view(&mut self, slot: ValueSlot) -> MapValue<'_> {
        let position = self.views[slot.index()];
        MapValue::new(&mut self.arena, &self.values, position)
    }

    fn position(&mut self, slot: ValueSlot, address: usize, is_new: bool) -> MapValue<'_> {
        let position = ViewPosition { address, is_new };
        self.views[slot.index()] = position;
        MapValue::new(&mut self.arena, &self.values, position)
    }

    /// Forget every key, keeping the current allocations.
    pub fn clear(&mut self) {
        tracing::trace!(size = self.size, capacity = self.capacity(), "clearing map");
        self.directory.zero_all();
        self.arena.reset();
        self.size = 0;
        self.free = threshold(self.directory.capacity(), self.config.load_factor);
        self.views = [ViewPosition::default(); 3];
    }

    /// Forget every key and shrink back to the construction-time capacities.
    pub fn restore_initial_capacity(&mut self) {
        tracing::debug!(
            capacity = self.directory.capacity(),
            initial_capacity = self.initial_capacity,
            arena_capacity = self.arena.capacity(),
            "restoring initial capacity"
        );
        if self.directory.capacity() == self.initial_capacity {
            self.directory.zero_all();
        } else {
            self.directory = OffsetsDirectory::new(self.initial_capacity);
        }
        self.arena.restore_initial_capacity();
        self.size = 0;
        self.free = threshold(self.initial_capacity, self.config.load_factor);
        self.views = [ViewPosition::default(); 3];
        self.closed = false;
    }

    /// Release the arena and directory. A later [`with_key`](FastMap::with_key)
    /// or [`reopen`](FastMap::reopen) allocates them again at initial capacity.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        tracing::debug!(size = self.size, "closing map");
        self.arena.release();
        self.directory.release();
        self.size = 0;
        self.free = 0;
        self.views = [ViewPosition::default(); 3];
        self.closed = true;
    }

    pub fn reopen(&mut self) {
        if self.closed {
            self.restore_initial_capacity();
        }
    }
}

impl<H: HashFunction> FastMap<H> {
    /// Start writing a new key. The map is reopened first if it was closed.
    pub fn with_key(&mut self) -> MapKey<'_, H> {
        self.reopen();
        self.builder
            .begin(self.arena.size(), self.values.size(), self.key_data_offset);
        MapKey::new(self)
    }

    /// Write the length header of the key under construction and hash its
    /// key data.
    fn commit_key(&mut self) -> Result<u64> {
        debug_assert_eq!(
            self.builder.column,
            self.key_types.len(),
            "key is missing columns"
        );
        let KeyBuilder { start, append, .. } = self.builder;
        self.arena.ensure_end(append)?;

        let len = append - start;
        if len > i32::MAX as usize {
            tracing::warn!(len, "key record exceeds the 4-byte length header");
            return Err(FastMapError::ResourceExhausted(format!(
                "key record of {len} bytes does not fit a 4-byte length"
            )));
        }
        self.arena.write_i32(start, len as i32);
        let data = start + self.key_data_offset;
        Ok(self.hasher.hash(self.arena.slice(data, append - data)))
    }

    fn probe(&self, hash: u64) -> Probe {
        let KeyBuilder { start, append, .. } = self.builder;
        let len = append - start;
        let data_len = len - self.key_data_offset;
        let candidate = self.arena.slice(start + self.key_data_offset, data_len);

        let mut index = self.directory.bucket(hash);
        loop {
            let slot = self.directory.get(index);
            if slot == EMPTY {
                return Probe::Vacant(index);
            }
            let offset = slot as usize;
            if self.arena.read_i32(offset) as usize == len
                && key_bytes_equal(
                    self.arena.slice(offset + self.key_data_offset, data_len),
                    candidate,
                )
            {
                return Probe::Found(offset);
            }
            index = self.directory.next(index);
        }
    }

    pub(crate) fn create_value(&mut self, slot: ValueSlot) -> Result<MapValue<'_>> {
        let hash = self.commit_key()?;
        match self.probe(hash) {
            Probe::Found(offset) => Ok(self.position(slot, offset + RECORD_HEADER, false)),
            Probe::Vacant(index) => {
                let KeyBuilder { start, append, .. } = self.builder;
                let value_size = self.values.size();
                self.arena
                    .slice_mut(start + RECORD_HEADER, value_size)
                    .fill(0);
                self.arena.commit_to(append);
                self.directory.set(index, start);
                self.size += 1;
                self.free -= 1;
                if self.free == 0 {
                    self.rehash()?;
                }
                Ok(self.position(slot, start + RECORD_HEADER, true))
            }
        }
    }

    pub(crate) fn find_value(&mut self, slot: ValueSlot) -> Result<Option<MapValue<'_>>> {
        let hash = self.commit_key()?;
        match self.probe(hash) {
            Probe::Found(offset) => Ok(Some(self.position(slot, offset + RECORD_HEADER, false))),
            Probe::Vacant(_) => Ok(None),
        }
    }

    /// Double the directory and reinsert every live record by re-hashing its
    /// stored key data.
    fn rehash(&mut self) -> Result<()> {
        let old_capacity = self.directory.capacity();
        let load_factor = self.config.load_factor;
        let mut new_capacity = old_capacity.checked_mul(2).ok_or_else(|| {
            FastMapError::ResourceExhausted(format!(
                "directory of {old_capacity} slots cannot grow"
            ))
        })?;
        while threshold(new_capacity, load_factor) <= self.size {
            new_capacity = new_capacity.checked_mul(2).ok_or_else(|| {
                FastMapError::ResourceExhausted(format!(
                    "directory of {new_capacity} slots cannot grow"
                ))
            })?;
        }

        let arena = &self.arena;
        let hasher = &self.hasher;
        let key_data_offset = self.key_data_offset;
        let grown = self.directory.grow(new_capacity, |offset| {
            let len = arena.read_i32(offset) as usize;
            hasher.hash(arena.slice(offset + key_data_offset, len - key_data_offset))
        });
        self.directory = grown;
        self.free = threshold(new_capacity, load_factor) - self.size;

        tracing::debug!(
            old_capacity,
            new_capacity,
            size = self.size,
            free = self.free,
            "rehashed directory"
        );
        Ok(())
    }

    /// Fold `other` into this map. Both maps must share key and value
    /// schemas. Keys missing here are copied with their value block; for keys
    /// present in both, `merge_fn` combines the source record into the
    /// destination value.
    pub fn merge<H2, F>(&mut self, other: &FastMap<H2>, mut merge_fn: F) -> Result<()>
    where
        F: FnMut(&mut MapValue<'_>, &MapRecord<'_>) -> Result<()>,
    {
        if other.key_types != self.key_types || other.values != self.values {
            return Err(FastMapError::Configuration(
                "cannot merge maps with different key or value schemas".to_string(),
            ));
        }

        let before = self.size;
        for record in other.cursor() {
            let mut key = self.with_key();
            key.put_record_key(&record)?;
            let mut value = key.create()?;
            if value.is_new() {
                value.copy_from(&record);
            } else {
                merge_fn(&mut value, &record)?;
            }
        }
        tracing::debug!(
            merged = other.size(),
            added = self.size - before,
            size = self.size,
            "merged map"
        );
        Ok(())
    }
}

impl<H> std::fmt::Debug for FastMap<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastMap")
            .field("size", &self.size)
            .field("capacity", &self.directory.capacity())
            .field("arena_size", &self.arena.size())
            .field("arena_capacity", &self.arena.capacity())
            .field("key_types", &self.key_types)
            .field("value_types", self.values.types())
            .finish()
    }
}

/// The capability the aggregation stage programs against.
pub trait Map {
    type Key<'a>
    where
        Self: 'a;
    type Value<'a>
    where
        Self: 'a;
    type Record<'a>
    where
        Self: 'a;
    type Cursor<'a>: Iterator<Item = Self::Record<'a>>
    where
        Self: 'a;

    fn with_key(&mut self) -> Self::Key<'_>;
    fn value_at(&mut self, address: usize) -> Self::Value<'_>;
    fn record_at(&self, offset: usize) -> Self::Record<'_>;
    fn cursor(&self) -> Self::Cursor<'_>;
    fn size(&self) -> usize;
    fn clear(&mut self);
    fn restore_initial_capacity(&mut self);
    fn close(&mut self);
}

impl<H: HashFunction> Map for FastMap<H> {
    type Key<'a> = MapKey<'a, H> where Self: 'a;
    type Value<'a> = MapValue<'a> where Self: 'a;
    type Record<'a> = MapRecord<'a> where Self: 'a;
    type Cursor<'a> = MapCursor<'a> where Self: 'a;

    fn with_key(&mut self) -> MapKey<'_, H> {
        FastMap::with_key(self)
    }

    fn value_at(&mut self, address: usize) -> MapValue<'_> {
        FastMap::value_at(self, address)
    }

    fn record_at(&self, offset: usize) -> MapRecord<'_> {
        FastMap::record_at(self, offset)
    }

    fn cursor(&self) -> MapCursor<'_> {
        FastMap::cursor(self)
    }

    fn size(&self) -> usize {
        FastMap::size(self)
    }

    fn clear(&mut self) {
        FastMap::clear(self)
    }

    fn restore_initial_capacity(&mut self) {
        FastMap::restore_initial_capacity(self)
    }

    fn close(&mut self) {
        FastMap::close(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnType, Long256};

    fn config() -> FastMapConfig {
        FastMapConfig::default()
            .with_page_size(64)
            .with_key_capacity(2)
    }

    fn str_int_map() -> FastMap {
        FastMap::new(config(), [ColumnType::String], [ColumnType::Int]).unwrap()
    }

    #[test]
    fn test_rejects_bad_config() {
        let bad_page = FastMap::new(
            config().with_page_size(3),
            [ColumnType::Int],
            [ColumnType::Int],
        );
        assert!(matches!(bad_page, Err(FastMapError::Configuration(_))));

        for lf in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            let r = FastMap::new(config().with_load_factor(lf), [ColumnType::Int], [ColumnType::Int]);
            assert!(matches!(r, Err(FastMapError::Configuration(_))), "lf={lf}");
        }
    }

    #[test]
    fn test_rejects_variable_width_values() {
        let r = FastMap::new(config(), [ColumnType::Int], [ColumnType::Long, ColumnType::Binary]);
        assert_eq!(
            r.unwrap_err(),
            FastMapError::UnsupportedType {
                column: 1,
                column_type: ColumnType::Binary,
            }
        );
    }

    #[test]
    fn test_initial_capacity() {
        let m = FastMap::new(config().with_key_capacity(2), [ColumnType::Int], [ColumnType::Int])
            .unwrap();
        assert_eq!(m.capacity(), 128);

        let m = FastMap::new(
            config().with_key_capacity(1000).with_load_factor(0.5),
            [ColumnType::Int],
            [ColumnType::Int],
        )
        .unwrap();
        assert_eq!(m.capacity(), 2048);
    }

    #[test]
    fn test_create_then_find() {
        let mut m = str_int_map();

        let mut key = m.with_key();
        key.put_str(Some("x")).unwrap();
        let mut v = key.create().unwrap();
        assert!(v.is_new());
        v.add_int(0, 5);
        let address = v.address();

        let mut key = m.with_key();
        key.put_str(Some("x")).unwrap();
        let mut v = key.create().unwrap();
        assert!(!v.is_new());
        assert_eq!(v.address(), address);
        v.add_int(0, 7);

        let mut key = m.with_key();
        key.put_str(Some("x")).unwrap();
        let v = key.find().unwrap().unwrap();
        assert_eq!(v.get_int(0), 12);
        assert_eq!(v.address(), address);
        assert_eq!(m.size(), 1);
    }

    #[test]
    fn test_find_missing_does_not_insert() {
        let mut m = str_int_map();
        let arena_before = m.arena_size();

        let mut key = m.with_key();
        key.put_str(Some("absent")).unwrap();
        assert!(key.find().unwrap().is_none());
        assert_eq!(m.size(), 0);
        assert_eq!(m.arena_size(), arena_before);
    }

    #[test]
    fn test_null_and_empty_strings_are_distinct() {
        let mut m = str_int_map();
        for s in [None, Some(""), None, Some("")] {
            let mut key = m.with_key();
            key.put_str(s).unwrap();
            key.create().unwrap().add_int(0, 1);
        }
        assert_eq!(m.size(), 2);

        let records: Vec<_> = m.cursor().collect();
        let mut seen: Vec<(Option<&str>, i32)> =
            records.iter().map(|r| (r.get_str(1), r.get_int(0))).collect();
        seen.sort();
        assert_eq!(seen, vec![(None, 2), (Some(""), 2)]);
    }

    #[test]
    fn test_collisions_resolve_by_bytes() {
        let mut m = FastMap::with_hasher(
            config(),
            [ColumnType::Long],
            [ColumnType::Long],
            |_: &[u8]| 0u64,
        )
        .unwrap();
        for i in 0..50i64 {
            let mut key = m.with_key();
            key.put_long(i).unwrap();
            key.create().unwrap().put_long(0, i * 10);
        }
        assert_eq!(m.size(), 50);
        for i in 0..50i64 {
            let mut key = m.with_key();
            key.put_long(i).unwrap();
            assert_eq!(key.find().unwrap().unwrap().get_long(0), i * 10);
        }
    }

    #[test]
    fn test_rehash_doubles_capacity() {
        let mut m = FastMap::new(
            config().with_load_factor(0.5),
            [ColumnType::Int],
            [ColumnType::Long],
        )
        .unwrap();
        assert_eq!(m.capacity(), 128);

        for i in 0..63 {
            let mut key = m.with_key();
            key.put_int(i).unwrap();
            key.create().unwrap().put_long(0, i as i64);
        }
        assert_eq!(m.capacity(), 128);

        let mut key = m.with_key();
        key.put_int(63).unwrap();
        key.create().unwrap().put_long(0, 63);
        assert_eq!(m.capacity(), 256);

        for i in 0..64 {
            let mut key = m.with_key();
            key.put_int(i).unwrap();
            assert_eq!(key.find().unwrap().unwrap().get_long(0), i as i64);
        }
    }

    #[test]
    fn test_all_key_types_round_trip() {
        let keys = [
            ColumnType::Boolean,
            ColumnType::Byte,
            ColumnType::Short,
            ColumnType::Char,
            ColumnType::Int,
            ColumnType::Symbol,
            ColumnType::Float,
            ColumnType::Long,
            ColumnType::Date,
            ColumnType::Timestamp,
            ColumnType::Double,
            ColumnType::Long128,
            ColumnType::Long256,
            ColumnType::String,
            ColumnType::Binary,
            ColumnType::String,
        ];
        let mut m = FastMap::new(config(), keys, [ColumnType::Long]).unwrap();
        let wide = Long256::new(1, 2, 3, 4);

        let mut key = m.with_key();
        key.put_bool(true)
            .unwrap()
            .put_byte(-3)
            .unwrap()
            .put_short(-300)
            .unwrap()
            .put_char(0x263A)
            .unwrap()
            .put_int(123_456)
            .unwrap()
            .put_symbol(9)
            .unwrap()
            .put_float(1.25)
            .unwrap()
            .put_long(-9_000_000_000)
            .unwrap()
            .put_date(1_600_000_000_000)
            .unwrap()
            .put_timestamp(1_600_000_000_000_000)
            .unwrap()
            .put_double(-2.5)
            .unwrap()
            .put_long128(-(1i128 << 100))
            .unwrap()
            .put_long256(wide)
            .unwrap()
            .put_str(Some("héllo"))
            .unwrap()
            .put_bin(Some(&[0u8, 1, 2, 255][..]))
            .unwrap()
            .put_str(None)
            .unwrap();
        key.create().unwrap().put_long(0, 77);

        let record = m.cursor().next().unwrap();
        assert_eq!(record.column_count(), 17);
        assert_eq!(record.get_long(0), 77);
        assert!(record.get_bool(1));
        assert_eq!(record.get_byte(2), -3);
        assert_eq!(record.get_short(3), -300);
        assert_eq!(record.get_char(4), 0x263A);
        assert_eq!(record.get_int(5), 123_456);
        assert_eq!(record.get_symbol(6), 9);
        assert_eq!(record.get_float(7), 1.25);
        assert_eq!(record.get_long(8), -9_000_000_000);
        assert_eq!(record.get_date(9), 1_600_000_000_000);
        assert_eq!(record.get_timestamp(10), 1_600_000_000_000_000);
        assert_eq!(record.get_double(11), -2.5);
        assert_eq!(record.get_long128(12), -(1i128 << 100));
        assert_eq!(record.get_long256(13), wide);
        assert_eq!(record.get_str(14), Some("héllo"));
        assert_eq!(record.get_str_len(14), "héllo".len() as i32);
        assert_eq!(record.get_bin(15), Some(&[0u8, 1, 2, 255][..]));
        assert_eq!(record.get_bin_len(15), 4);
        assert_eq!(record.get_str(16), None);
        assert_eq!(record.get_str_len(16), -1);
        assert_eq!(record.column_type(16), ColumnType::String);
    }

    #[test]
    fn test_three_views_are_independent() {
        let mut m = str_int_map();
        let mut key = m.with_key();
        key.put_str(Some("a")).unwrap();
        key.create_in(ValueSlot::First).unwrap().put_int(0, 1);

        let mut key = m.with_key();
        key.put_str(Some("b")).unwrap();
        key.create_in(ValueSlot::Second).unwrap().put_int(0, 2);

        let mut key = m.with_key();
        key.put_str(Some("c")).unwrap();
        key.create_in(ValueSlot::Third).unwrap().put_int(0, 3);

        assert_eq!(m.view(ValueSlot::First).get_int(0), 1);
        assert_eq!(m.view(ValueSlot::Second).get_int(0), 2);
        assert_eq!(m.view(ValueSlot::Third).get_int(0), 3);

        let address = m.view(ValueSlot::Third).address();
        m.value_at_in(ValueSlot::First, address).add_int(0, 10);
        assert_eq!(m.view(ValueSlot::Third).get_int(0), 13);
        assert_eq!(m.view(ValueSlot::Second).get_int(0), 2);
    }

    #[test]
    fn test_value_at_and_record_at() {
        let mut m = str_int_map();
        let mut key = m.with_key();
        key.put_str(Some("k")).unwrap();
        let address = key.create().unwrap().address();

        m.value_at(address).put_int(0, 99);
        let record = m.record_at(address - RECORD_HEADER);
        assert_eq!(record.value_address(), address);
        assert_eq!(record.get_int(0), 99);
        assert_eq!(record.get_str(1), Some("k"));
    }

    #[test]
    fn test_clear_restore_close() {
        let mut m = FastMap::new(
            config().with_load_factor(0.5),
            [ColumnType::Long],
            [ColumnType::Long],
        )
        .unwrap();
        for i in 0..500 {
            let mut key = m.with_key();
            key.put_long(i).unwrap();
            key.create().unwrap();
        }
        assert!(m.capacity() > 128);
        let grown = m.capacity();

        m.clear();
        assert_eq!(m.size(), 0);
        assert_eq!(m.capacity(), grown);
        assert_eq!(m.cursor().count(), 0);

        m.restore_initial_capacity();
        assert_eq!(m.capacity(), 128);
        assert_eq!(m.arena_capacity(), 64);

        m.close();
        assert!(m.is_closed());
        assert_eq!(m.used_heap_size(), 0);

        let mut key = m.with_key();
        key.put_long(1).unwrap();
        assert!(key.create().unwrap().is_new());
        assert!(!m.is_closed());
        assert_eq!(m.size(), 1);
    }

    #[test]
    fn test_merge() {
        let mut a = str_int_map();
        let mut b = str_int_map();
        for (m, words) in [(&mut a, ["x", "y", "x"]), (&mut b, ["y", "z", "z"])] {
            for w in words {
                let mut key = m.with_key();
                key.put_str(Some(w)).unwrap();
                key.create().unwrap().add_int(0, 1);
            }
        }

        a.merge(&b, |dst, src| {
            dst.add_int(0, src.get_int(0));
            Ok(())
        })
        .unwrap();

        assert_eq!(a.size(), 3);
        for (w, n) in [("x", 2), ("y", 2), ("z", 2)] {
            let mut key = a.with_key();
            key.put_str(Some(w)).unwrap();
            assert_eq!(key.find().unwrap().unwrap().get_int(0), n, "{w}");
        }
    }

    #[test]
    fn test_merge_rejects_other_schema() {
        let mut a = str_int_map();
        let b = FastMap::new(config(), [ColumnType::Int], [ColumnType::Int]).unwrap();
        let r = a.merge(&b, |_, _| Ok(()));
        assert!(matches!(r, Err(FastMapError::Configuration(_))));
    }

    #[test]
    fn test_zero_key_columns_is_a_single_group() {
        let mut m = FastMap::new(config(), ColumnTypes::new(), [ColumnType::Long]).unwrap();
        for _ in 0..3 {
            m.with_key().create().unwrap().add_long(0, 2);
        }
        assert_eq!(m.size(), 1);
        assert_eq!(m.cursor().next().unwrap().get_long(0), 6);
    }

    #[test]
    fn test_map_trait_object_style_usage() {
        fn count_groups<M: Map>(map: &M) -> usize {
            map.cursor().count()
        }

        let mut m = str_int_map();
        for w in ["a", "b", "a"] {
            let mut key = Map::with_key(&mut m);
            key.put_str(Some(w)).unwrap();
            key.create().unwrap();
        }
        assert_eq!(count_groups(&m), 2);
        assert_eq!(Map::size(&m), 2);
    }
}
