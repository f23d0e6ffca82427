//! Offsets directory: one 8-byte slot per bucket.
//!
//! A slot is either [`EMPTY`] or the arena offset at which a record starts.
//! Capacity is always a power of two so buckets are chosen with `hash & mask`.

pub(crate) const EMPTY: i64 = -1;

#[derive(Clone)]
pub(crate) struct OffsetsDirectory {
    slots: Vec<i64>,
    mask: usize,
}

impl OffsetsDirectory {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            slots: vec![EMPTY; capacity],
            mask: capacity - 1,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn bucket(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    #[inline]
    pub(crate) fn next(&self, index: usize) -> usize {
        (index + 1) & self.mask
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> i64 {
        self.slots[index]
    }

    #[inline]
    pub(crate) fn set(&mut self, index: usize, offset: usize) {
        debug_assert_eq!(self.slots[index], EMPTY);
        self.slots[index] = offset as i64;
    }

    /// Mark every slot empty.
    pub(crate) fn zero_all(&mut self) {
        self.slots.fill(EMPTY);
    }

    /// First empty slot on the probe sequence starting at `hash & mask`.
    pub(crate) fn first_empty(&self, hash: u64) -> usize {
        let mut index = self.bucket(hash);
        while self.slots[index] != EMPTY {
            index = self.next(index);
        }
        index
    }

    /// Rebuild at `new_capacity`, placing each live record at the first empty
    /// slot of its probe sequence. `hash_of` re-hashes a record from its arena
    /// offset; old bucket indexes are not reused.
    ///
    /// Live records are visited in old slot order, so records sharing a probe
    /// chain keep their relative order.
    pub(crate) fn grow(&self, new_capacity: usize, mut hash_of: impl FnMut(usize) -> u64) -> Self {
        debug_assert!(new_capacity > self.capacity());
        let mut grown = Self::new(new_capacity);
        for offset in self.live() {
            let index = grown.first_empty(hash_of(offset));
            grown.slots[index] = offset as i64;
        }
        grown
    }

    /// Arena offsets of all live records in slot order.
    pub(crate) fn live(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .filter(|&&slot| slot != EMPTY)
            .map(|&slot| slot as usize)
    }

    /// Slot at or after `from` holding a live record, with its offset.
    #[inline]
    pub(crate) fn next_live(&self, from: usize) -> Option<(usize, usize)> {
        self.slots[from..]
            .iter()
            .position(|&slot| slot != EMPTY)
            .map(|i| (from + i, self.slots[from + i] as usize))
    }

    pub(crate) fn release(&mut self) {
        self.slots = Vec::new();
        self.mask = 0;
    }

    pub(crate) fn heap_size(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<i64>()
    }
}
