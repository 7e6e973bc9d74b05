use core::ffi::CStr;
use std::collections::VecDeque;

use layout::Region;

use super::{RegionSource, bytes_at, out_of_bounds, str_at};
use crate::Error;

#[derive(Debug, Clone)]
struct Chunk {
    base: usize,
    bytes: Box<[u8]>,
}

/// Library-owned growable storage: an ordered list of immutable chunks.
///
/// Every chunk gets a virtual base offset that is never reused, so a
/// [`Region`] stays valid for as long as its chunk is kept, whatever is
/// appended or dropped around it.
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: VecDeque<Chunk>,
    next_base: usize,
}

/// Position in a [`ChunkStore`], see [`ChunkStore::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark(usize);

impl ChunkStore {
    /// An empty store.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            next_base: 0,
        }
    }

    /// Number of chunks held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// `true` when no chunk is held.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Drops every chunk. Previously issued regions become invalid.
    #[inline]
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Appends a chunk and returns its base offset.
    pub fn push(&mut self, bytes: Vec<u8>) -> usize {
        let base = self.next_base;
        self.next_base = base.saturating_add(bytes.len().max(1));
        self.chunks.push_back(Chunk {
            base,
            bytes: bytes.into_boxed_slice(),
        });
        base
    }

    /// The position the next pushed chunk will take.
    #[inline]
    #[must_use]
    pub const fn mark(&self) -> Mark {
        Mark(self.next_base)
    }

    /// Drops every chunk pushed since `mark`.
    pub fn rollback(&mut self, mark: Mark) {
        while self.chunks.back().is_some_and(|chunk| chunk.base >= mark.0) {
            self.chunks.pop_back();
        }
    }

    /// Drops every chunk pushed before `mark`.
    pub fn retain_from(&mut self, mark: Mark) {
        while self.chunks.front().is_some_and(|chunk| chunk.base < mark.0) {
            self.chunks.pop_front();
        }
    }

    /// Drops the chunks pushed between `from` (inclusive) and `until` (exclusive).
    pub fn prune(&mut self, from: Mark, until: Mark) {
        self.chunks
            .retain(|chunk| chunk.base < from.0 || chunk.base >= until.0);
    }

    /// Number of chunks pushed at or after `mark` that are still held.
    #[must_use]
    pub fn count_since(&self, mark: Mark) -> usize {
        self.chunks.len() - self.chunks.partition_point(|chunk| chunk.base < mark.0)
    }

    fn chunk_of(&self, region: Region) -> Result<(&[u8], usize), Error> {
        let index = self
            .chunks
            .partition_point(|chunk| chunk.base <= region.offset)
            .checked_sub(1)
            .ok_or_else(|| out_of_bounds(region, 0))?;
        let chunk = self
            .chunks
            .get(index)
            .ok_or_else(|| out_of_bounds(region, 0))?;
        Ok((&*chunk.bytes, region.offset - chunk.base))
    }

    /// Mutable access to the bytes of `region`, terminator excluded.
    #[cfg(test)]
    pub(crate) fn bytes_mut(&mut self, region: Region) -> Option<&mut [u8]> {
        let index = self
            .chunks
            .partition_point(|chunk| chunk.base <= region.offset)
            .checked_sub(1)?;
        let chunk = self.chunks.get_mut(index)?;
        let local = region.offset - chunk.base;
        chunk.bytes.get_mut(local..local + region.len)
    }
}

impl RegionSource for ChunkStore {
    #[inline]
    fn bytes(&self, region: Region) -> Result<&[u8], Error> {
        let (bytes, local) = self.chunk_of(region)?;
        bytes_at(bytes, local, region)
    }

    #[inline]
    fn c_str(&self, region: Region) -> Result<&CStr, Error> {
        let (bytes, local) = self.chunk_of(region)?;
        str_at(bytes, local, region)
    }
}
