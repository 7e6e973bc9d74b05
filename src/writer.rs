//! Output writers: where serialized records land.
//!
//! A record is written item by item through an [`OutWriter`], which hands
//! back a [`Region`] per item. The same regions are later resolved against
//! the backing storage through [`RegionSource`].

mod bounded;
mod growable;
mod store;

use core::ffi::CStr;

pub use bounded::BoundedWriter;
pub use growable::GrowableWriter;
use layout::{LayoutError, Region};
pub use store::{ChunkStore, Mark};
use widestring::U16CStr;

use crate::Error;

/// Sink for the variable-length items of a record.
pub trait OutWriter {
    /// Converts `value` to the current code page and stores it NUL-terminated.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if the string cannot be represented,
    /// [`Error::InsufficientBuffer`] if the target is bounded and full.
    fn write_wide(&mut self, value: &U16CStr) -> Result<Region, Error>;

    /// Stores an already narrow string NUL-terminated.
    ///
    /// # Errors
    /// [`Error::InsufficientBuffer`] if the target is bounded and full.
    fn write_narrow(&mut self, value: &CStr) -> Result<Region, Error>;

    /// Stores a member table referencing previously written strings.
    ///
    /// # Errors
    /// [`Error::InsufficientBuffer`] if the target is bounded and full.
    fn write_table(&mut self, members: &[Region]) -> Result<Region, Error>;
}

/// Storage that regions produced by an [`OutWriter`] can be resolved against.
pub trait RegionSource {
    /// Raw bytes of `region`, trailing NUL excluded.
    ///
    /// # Errors
    /// [`Error::Io`] if the region does not belong to this storage.
    fn bytes(&self, region: Region) -> Result<&[u8], Error>;

    /// The NUL-terminated string stored at `region`.
    ///
    /// # Errors
    /// [`Error::Io`] if the region does not hold a string of this storage.
    fn c_str(&self, region: Region) -> Result<&CStr, Error>;
}

fn out_of_bounds(region: Region, capacity: usize) -> Error {
    LayoutError::OutOfBounds {
        offset: region.offset,
        len: region.len,
        capacity,
    }
    .into()
}

fn str_at(bytes: &[u8], local: usize, region: Region) -> Result<&CStr, Error> {
    let with_nul = local
        .checked_add(region.len)
        .and_then(|end| end.checked_add(1))
        .and_then(|end| bytes.get(local..end))
        .ok_or_else(|| out_of_bounds(region, bytes.len()))?;
    CStr::from_bytes_with_nul(with_nul).map_err(|_| out_of_bounds(region, bytes.len()))
}

fn bytes_at(bytes: &[u8], local: usize, region: Region) -> Result<&[u8], Error> {
    local
        .checked_add(region.len)
        .and_then(|end| bytes.get(local..end))
        .ok_or_else(|| out_of_bounds(region, bytes.len()))
}

impl RegionSource for [u8] {
    #[inline]
    fn bytes(&self, region: Region) -> Result<&[u8], Error> {
        bytes_at(self, region.offset, region)
    }

    #[inline]
    fn c_str(&self, region: Region) -> Result<&CStr, Error> {
        str_at(self, region.offset, region)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use widestring::u16cstr;

    /// Writes the same items through any writer.
    fn write_sample<W: OutWriter>(writer: &mut W) -> Result<(Region, Region, Region), Error> {
        let first = writer.write_wide(u16cstr!("alice"))?;
        let second = writer.write_narrow(c"x")?;
        let table = writer.write_table(&[first, second])?;
        Ok((first, second, table))
    }

    #[test]
    fn both_writers_resolve_the_same_content() {
        let mut buf = [0u8; 64];
        let mut bounded = BoundedWriter::new(&mut buf);
        let (b_first, b_second, b_table) = write_sample(&mut bounded).unwrap();

        let mut store = ChunkStore::new();
        let (g_first, g_second, g_table) = write_sample(&mut GrowableWriter::new(&mut store)).unwrap();

        assert_eq!(buf.c_str(b_first).unwrap(), c"alice");
        assert_eq!(store.c_str(g_first).unwrap(), c"alice");
        assert_eq!(buf.c_str(b_second).unwrap(), store.c_str(g_second).unwrap());

        let members = |table: &[u8]| {
            layout::decode_table(table)
                .unwrap()
                .map(Result::unwrap)
                .collect::<Vec<_>>()
        };
        assert_eq!(members(buf.bytes(b_table).unwrap()), vec![b_first, b_second]);
        assert_eq!(members(store.bytes(g_table).unwrap()), vec![g_first, g_second]);
    }

    #[test]
    fn foreign_region_is_rejected() {
        let buf = [b'a', 0];
        assert_eq!(buf.c_str(Region::new(0, 1)).unwrap(), c"a");
        assert_eq!(buf.c_str(Region::new(1, 1)), Err(Error::Io));
        assert_eq!(buf.c_str(Region::new(0, 0)), Err(Error::Io));
    }
}
