//! # fastmap
//!
//! A fixed-layout, open-addressing hash map for group-by aggregation.
//!
//! Keys are tuples of typed columns; values are fixed-width accumulator
//! blocks. Every key is serialized together with its value block into one
//! contiguous arena, and a power-of-two directory of 8-byte slots maps buckets
//! to record offsets. Collisions are resolved by linear probing with a
//! byte-level comparison of the stored key data.
//!
//! A key is written in place at the arena tail through a [`MapKey`], then
//! resolved with `create` (insert if absent) or `find`. Both yield a
//! [`MapValue`] positioned over the record's value block, whose
//! [`is_new`](MapValue::is_new) tells whether the accumulators need
//! initializing.
//!
//! ## Example
//!
//! ```rust
//! use fastmap::{ColumnType, FastMap, FastMapConfig};
//!
//! let mut map = FastMap::new(
//!     FastMapConfig::default(),
//!     [ColumnType::String],
//!     [ColumnType::Long],
//! )
//! .unwrap();
//!
//! for (city, amount) in [("paris", 3), ("oslo", 4), ("paris", 5)] {
//!     let mut key = map.with_key();
//!     key.put_str(Some(city)).unwrap();
//!     let mut value = key.create().unwrap();
//!     value.add_long(0, amount);
//! }
//!
//! assert_eq!(map.size(), 2);
//! let mut rows: Vec<(String, i64)> = map
//!     .cursor()
//!     .map(|r| (r.get_str(1).unwrap().to_string(), r.get_long(0)))
//!     .collect();
//! rows.sort();
//! assert_eq!(rows, vec![("oslo".to_string(), 4), ("paris".to_string(), 8)]);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

mod arena;
pub mod column;
pub mod cursor;
mod directory;
pub mod error;
pub mod hash;
pub mod key;
pub mod map;
pub mod record;
pub mod value;

pub use column::{ColumnType, ColumnTypes, Long256};
pub use cursor::MapCursor;
pub use error::{FastMapError, Result};
pub use hash::{HashFunction, Xxh3};
pub use key::MapKey;
pub use map::{FastMap, FastMapConfig, Map, MIN_INITIAL_CAPACITY};
pub use record::MapRecord;
pub use value::{MapValue, ValueSlot};

#[cfg(test)]
mod proptests;
