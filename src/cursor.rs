//! Iteration over live records in directory slot order.

use crate::directory::OffsetsDirectory;
use crate::record::{MapRecord, RecordLayout};

/// Walks the offsets directory, yielding a [`MapRecord`] for every occupied
/// slot.
///
/// Order is slot order, which is neither insertion nor key order and changes
/// whenever the directory is rehashed. The cursor borrows the map, so no
/// insert can happen while it is open.
pub struct MapCursor<'a> {
    directory: &'a OffsetsDirectory,
    layout: RecordLayout<'a>,
    slot: usize,
    remaining: usize,
    total: usize,
}

impl<'a> MapCursor<'a> {
    pub(crate) fn new(directory: &'a OffsetsDirectory, layout: RecordLayout<'a>, total: usize) -> Self {
        Self {
            directory,
            layout,
            slot: 0,
            remaining: total,
            total,
        }
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        self.remaining > 0
    }

    /// Live records in the map, independent of how many were consumed.
    #[inline]
    pub fn size(&self) -> usize {
        self.total
    }

    /// Rewind to the first slot.
    pub fn to_top(&mut self) {
        self.slot = 0;
        self.remaining = self.total;
    }
}

impl<'a> Iterator for MapCursor<'a> {
    type Item = MapRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (slot, offset) = self.directory.next_live(self.slot)?;
        self.slot = slot + 1;
        self.remaining -= 1;
        Some(MapRecord::new(self.layout, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for MapCursor<'_> {}
