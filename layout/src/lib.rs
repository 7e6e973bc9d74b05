//! Layout primitives shared by the `wusers` record writers.
//!
//! A serialized account record is a fixed header plus a set of variable-length
//! items (narrow strings and member tables). Instead of relying on the memory
//! order of C struct fields, every item is addressed by an explicit [`Region`]
//! and the space a record needs is computed up front with a [`LayoutPlan`].
#![cfg_attr(not(feature = "std"), no_std)]

use arrayvec::ArrayVec;
use thiserror::Error;

/// Alignment applied to member tables, as an offset from the start of the
/// buffer they are written to.
///
/// Tables are decoded byte by byte, so the absolute address of the buffer
/// does not matter.
pub const POINTER_ALIGN: usize = core::mem::size_of::<usize>();

/// Size in bytes of one encoded member table entry (`offset`, `len`, both `u64` LE).
pub const TABLE_ENTRY_SIZE: usize = 2 * core::mem::size_of::<u64>();

/// A variable-length item inside a buffer.
///
/// For strings `len` excludes the trailing NUL, which always follows the
/// region directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    /// Start of the item.
    pub offset: usize,
    /// Length of the item in bytes.
    pub len: usize,
}

impl Region {
    /// Creates a region.
    #[inline]
    #[must_use]
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }
}

/// What a region holds, which decides its alignment and its trailing bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// NUL-terminated narrow string.
    Str,
    /// Member table, see [`encode_table`].
    Table,
}

impl RegionKind {
    /// Bytes a region of this kind occupies for `len` bytes of payload.
    #[inline]
    #[must_use]
    pub const fn occupied(self, len: usize) -> Option<usize> {
        match self {
            Self::Str => len.checked_add(1),
            Self::Table => Some(len),
        }
    }

    /// Alignment required for the start of a region of this kind.
    #[inline]
    #[must_use]
    pub const fn align(self) -> usize {
        match self {
            Self::Str => 1,
            Self::Table => POINTER_ALIGN,
        }
    }

    /// End of `region` including its trailing bytes.
    #[inline]
    #[must_use]
    pub const fn end_of(self, region: Region) -> Option<usize> {
        match self.occupied(region.len) {
            Some(occupied) => region.offset.checked_add(occupied),
            None => None,
        }
    }
}

/// Errors raised while planning, validating or decoding a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A size computation overflowed `usize`.
    #[error("layout size overflows usize")]
    Overflow,
    /// A region does not fit into the buffer it is resolved against.
    #[error("region {offset}+{len} lies outside a buffer of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    /// Two regions share bytes.
    #[error("regions overlap at offset {offset}")]
    Overlap { offset: usize },
    /// A [`RegionList`] is full.
    #[error("too many regions (max {max})")]
    TooManyRegions { max: usize },
    /// A member table length is not a multiple of [`TABLE_ENTRY_SIZE`].
    #[error("table length {len} is not a multiple of the entry size")]
    MalformedTable { len: usize },
}

/// Rounds `offset` up to `align`, which must be a power of two.
#[inline]
#[must_use]
pub const fn align_up(offset: usize, align: usize) -> Option<usize> {
    let mask = align.saturating_sub(1);
    match offset.checked_add(mask) {
        Some(value) => Some(value & !mask),
        None => None,
    }
}

/// Byte length of a member table holding `entries` names.
#[inline]
#[must_use]
pub const fn table_len(entries: usize) -> Option<usize> {
    entries.checked_mul(TABLE_ENTRY_SIZE)
}

/// Dry run of a sequence of writes into a contiguous buffer starting at offset 0.
///
/// Placing items in the same order a writer will emit them yields the exact
/// capacity the writer needs, padding included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutPlan {
    cursor: usize,
}

impl LayoutPlan {
    /// An empty plan.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Reserves room for an item of `kind` with `len` payload bytes.
    ///
    /// # Errors
    /// [`LayoutError::Overflow`] if the plan no longer fits in `usize`.
    #[inline]
    pub const fn place(&mut self, kind: RegionKind, len: usize) -> Result<Region, LayoutError> {
        let Some(start) = align_up(self.cursor, kind.align()) else {
            return Err(LayoutError::Overflow);
        };
        let region = Region::new(start, len);
        let Some(end) = kind.end_of(region) else {
            return Err(LayoutError::Overflow);
        };
        self.cursor = end;
        Ok(region)
    }

    /// Reserves a NUL-terminated string of `len` bytes.
    ///
    /// # Errors
    /// See [`LayoutPlan::place`].
    #[inline]
    pub const fn str(&mut self, len: usize) -> Result<Region, LayoutError> {
        self.place(RegionKind::Str, len)
    }

    /// Reserves a member table for `entries` names.
    ///
    /// # Errors
    /// See [`LayoutPlan::place`].
    #[inline]
    pub const fn table(&mut self, entries: usize) -> Result<Region, LayoutError> {
        match table_len(entries) {
            Some(len) => self.place(RegionKind::Table, len),
            None => Err(LayoutError::Overflow),
        }
    }

    /// Total bytes reserved so far.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.cursor
    }
}

/// Bytes spanned by a set of regions, from the lowest start to the highest end.
///
/// Returns 0 for an empty set.
///
/// # Errors
/// [`LayoutError::Overflow`] if a region end does not fit in `usize`.
#[inline]
pub fn footprint<I>(regions: I) -> Result<usize, LayoutError>
where
    I: IntoIterator<Item = (RegionKind, Region)>,
{
    let mut bounds: Option<(usize, usize)> = None;
    for (kind, region) in regions {
        let end = kind.end_of(region).ok_or(LayoutError::Overflow)?;
        bounds = Some(match bounds {
            None => (region.offset, end),
            Some((lo, hi)) => (lo.min(region.offset), hi.max(end)),
        });
    }
    Ok(bounds.map_or(0, |(lo, hi)| hi - lo))
}

/// Checks that every region lies inside a buffer of `capacity` bytes.
///
/// # Errors
/// [`LayoutError::OutOfBounds`] for the first offending region.
#[inline]
pub fn check_bounds<I>(regions: I, capacity: usize) -> Result<(), LayoutError>
where
    I: IntoIterator<Item = (RegionKind, Region)>,
{
    for (kind, region) in regions {
        match kind.end_of(region) {
            Some(end) if end <= capacity => {}
            _ => {
                return Err(LayoutError::OutOfBounds {
                    offset: region.offset,
                    len: region.len,
                    capacity,
                });
            }
        }
    }
    Ok(())
}

/// Fixed-capacity list of the regions of one record header.
#[derive(Debug, Clone, Default)]
pub struct RegionList<const N: usize> {
    items: ArrayVec<(RegionKind, Region), N>,
}

impl<const N: usize> RegionList<N> {
    /// An empty list.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: ArrayVec::new_const(),
        }
    }

    /// Appends a region.
    ///
    /// # Errors
    /// [`LayoutError::TooManyRegions`] when the list already holds `N` regions.
    #[inline]
    pub fn push(&mut self, kind: RegionKind, region: Region) -> Result<(), LayoutError> {
        self.items
            .try_push((kind, region))
            .map_err(|_| LayoutError::TooManyRegions { max: N })
    }

    /// Iterates over the regions in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (RegionKind, Region)> + '_ {
        self.items.iter().copied()
    }

    /// See [`footprint`].
    ///
    /// # Errors
    /// See [`footprint`].
    #[inline]
    pub fn footprint(&self) -> Result<usize, LayoutError> {
        footprint(self.iter())
    }

    /// Checks bounds against `capacity` and that no two regions overlap.
    ///
    /// # Errors
    /// [`LayoutError::OutOfBounds`] or [`LayoutError::Overlap`].
    #[inline]
    pub fn validate(&self, capacity: usize) -> Result<(), LayoutError> {
        check_bounds(self.iter(), capacity)?;
        let mut sorted = self.items.clone();
        sorted.sort_unstable_by_key(|(_, region)| region.offset);
        let mut previous_end = 0usize;
        for (index, (kind, region)) in sorted.iter().enumerate() {
            if index > 0 && region.offset < previous_end {
                return Err(LayoutError::Overlap {
                    offset: region.offset,
                });
            }
            previous_end = kind.end_of(*region).ok_or(LayoutError::Overflow)?;
        }
        Ok(())
    }
}

/// Encodes member regions as consecutive `(offset, len)` pairs into `out`.
///
/// Returns the number of bytes written.
///
/// # Errors
/// [`LayoutError::OutOfBounds`] if `out` is too small; nothing is written then.
#[inline]
pub fn encode_table<I>(regions: I, out: &mut [u8]) -> Result<usize, LayoutError>
where
    I: IntoIterator<Item = Region>,
    I::IntoIter: ExactSizeIterator,
{
    let regions = regions.into_iter();
    let needed = table_len(regions.len()).ok_or(LayoutError::Overflow)?;
    if needed > out.len() {
        return Err(LayoutError::OutOfBounds {
            offset: 0,
            len: needed,
            capacity: out.len(),
        });
    }
    for (entry, region) in out.chunks_exact_mut(TABLE_ENTRY_SIZE).zip(regions) {
        let (offset, len) = entry.split_at_mut(TABLE_ENTRY_SIZE / 2);
        offset.copy_from_slice(&(region.offset as u64).to_le_bytes());
        len.copy_from_slice(&(region.len as u64).to_le_bytes());
    }
    Ok(needed)
}

/// Iterator over the regions stored in an encoded member table.
#[derive(Debug, Clone)]
pub struct TableIter<'a> {
    entries: core::slice::ChunksExact<'a, u8>,
}

impl Iterator for TableIter<'_> {
    type Item = Result<Region, LayoutError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        let (offset, len) = entry.split_at(TABLE_ENTRY_SIZE / 2);
        Some(read_u64(offset).zip(read_u64(len)).map_or(
            Err(LayoutError::Overflow),
            |(offset, len)| Ok(Region::new(offset, len)),
        ))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for TableIter<'_> {}

fn read_u64(bytes: &[u8]) -> Option<usize> {
    let array: [u8; 8] = bytes.try_into().ok()?;
    usize::try_from(u64::from_le_bytes(array)).ok()
}

/// Decodes a member table written by [`encode_table`].
///
/// # Errors
/// [`LayoutError::MalformedTable`] if the length is not a whole number of entries.
#[inline]
pub fn decode_table(bytes: &[u8]) -> Result<TableIter<'_>, LayoutError> {
    if bytes.len() % TABLE_ENTRY_SIZE != 0 {
        return Err(LayoutError::MalformedTable { len: bytes.len() });
    }
    Ok(TableIter {
        entries: bytes.chunks_exact(TABLE_ENTRY_SIZE),
    })
}
