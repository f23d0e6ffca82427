//! Contiguous growable byte arena holding serialized key records.
//!
//! Records are appended at the tail. Every position handed out by the arena is
//! a byte offset from its base, so a reallocation moves the bytes but leaves
//! every offset held by the key builder, the directory or a value view valid
//! without any rebasing.
//!
//! The arena distinguishes its durable size (`pos`, everything before it
//! belongs to a committed record) from scratch space past `pos`, where a
//! candidate key is written before the map knows whether it is new.

use crate::error::{FastMapError, Result};

pub(crate) struct Arena {
    /// Backing bytes; `data.len()` is the arena capacity.
    data: Vec<u8>,
    /// Durable append position.
    pos: usize,
    page_size: usize,
    resizes: u32,
    max_resizes: u32,
}

impl Arena {
    pub(crate) fn new(page_size: usize, max_resizes: u32) -> Self {
        Self {
            data: vec![0u8; page_size],
            pos: 0,
            page_size,
            resizes: 0,
            max_resizes,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes occupied by committed records.
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn resize_count(&self) -> u32 {
        self.resizes
    }

    /// Make sure offsets up to (excluding) `required` are addressable.
    ///
    /// Growth doubles the capacity, or jumps to the next power of two above
    /// `required` when doubling is not enough.
    pub(crate) fn ensure_end(&mut self, required: usize) -> Result<()> {
        if required <= self.data.len() {
            return Ok(());
        }

        if self.resizes >= self.max_resizes {
            tracing::warn!(
                capacity = self.data.len(),
                required,
                max_resizes = self.max_resizes,
                "arena resize limit reached"
            );
            return Err(FastMapError::ResourceExhausted(format!(
                "arena needs {required} bytes but the resize limit of {} was reached",
                self.max_resizes
            )));
        }

        let doubled = self.data.len().saturating_mul(2);
        let rounded = required.checked_next_power_of_two().ok_or_else(|| {
            FastMapError::ResourceExhausted(format!(
                "arena request of {required} bytes cannot be rounded to a power of two"
            ))
        })?;
        let new_capacity = doubled.max(rounded);

        tracing::debug!(
            old_capacity = self.data.len(),
            new_capacity,
            resizes = self.resizes + 1,
            "growing arena"
        );
        self.data.resize(new_capacity, 0);
        self.resizes += 1;
        Ok(())
    }

    /// Mark everything before `end` as committed.
    #[inline]
    pub(crate) fn commit_to(&mut self, end: usize) {
        debug_assert!(end >= self.pos && end <= self.data.len());
        self.pos = end;
    }

    /// Forget all records, keeping the allocation.
    pub(crate) fn reset(&mut self) {
        self.pos = 0;
    }

    /// Drop back to a single page and forget the resize history.
    pub(crate) fn restore_initial_capacity(&mut self) {
        if self.data.len() != self.page_size {
            self.data = vec![0u8; self.page_size];
        }
        self.pos = 0;
        self.resizes = 0;
    }

    /// Release the allocation entirely.
    pub(crate) fn release(&mut self) {
        self.data = Vec::new();
        self.pos = 0;
        self.resizes = 0;
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn slice(&self, at: usize, len: usize) -> &[u8] {
        &self.data[at..at + len]
    }

    #[inline]
    pub(crate) fn slice_mut(&mut self, at: usize, len: usize) -> &mut [u8] {
        &mut self.data[at..at + len]
    }

    #[inline]
    pub(crate) fn read_array<const N: usize>(&self, at: usize) -> [u8; N] {
        read_array(&self.data, at)
    }

    #[inline]
    pub(crate) fn write(&mut self, at: usize, bytes: &[u8]) {
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    #[inline]
    pub(crate) fn read_i32(&self, at: usize) -> i32 {
        i32::from_le_bytes(self.read_array(at))
    }

    #[inline]
    pub(crate) fn write_i32(&mut self, at: usize, v: i32) {
        self.write(at, &v.to_le_bytes());
    }
}

#[inline]
pub(crate) fn read_array<const N: usize>(data: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[at..at + N]);
    out
}
