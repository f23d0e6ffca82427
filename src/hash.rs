//! Byte hashing capability used to bucket key records.

use xxhash_rust::xxh3::xxh3_64;

/// Hashes the serialized key-data bytes of a record.
///
/// Only the low bits of the result are used to choose a bucket (`hash & mask`),
/// so implementations should mix well into the low bits.
pub trait HashFunction {
    fn hash(&self, bytes: &[u8]) -> u64;
}

/// Default hash: XXH3 64-bit.
#[derive(Clone, Copy, Debug, Default)]
pub struct Xxh3;

impl HashFunction for Xxh3 {
    #[inline]
    fn hash(&self, bytes: &[u8]) -> u64 {
        xxh3_64(bytes)
    }
}

impl<F> HashFunction for F
where
    F: Fn(&[u8]) -> u64,
{
    #[inline]
    fn hash(&self, bytes: &[u8]) -> u64 {
        self(bytes)
    }
}
