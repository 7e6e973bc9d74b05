use core::ffi::CStr;

use layout::{POINTER_ALIGN, Region, align_up, encode_table, table_len};
use widestring::U16CStr;

use super::OutWriter;
use crate::Error;
use crate::codepage::{self, CodePage};

/// Writes into a caller-supplied buffer through a monotonically advancing cursor.
///
/// A write that does not fit fails with [`Error::InsufficientBuffer`] and
/// leaves both the buffer and the cursor untouched. Tables are aligned to
/// [`POINTER_ALIGN`] relative to the start of the buffer.
#[derive(Debug)]
pub struct BoundedWriter<'buf> {
    buf: &'buf mut [u8],
    cursor: usize,
}

impl<'buf> BoundedWriter<'buf> {
    /// Starts writing at the beginning of `buf`.
    #[inline]
    #[must_use]
    pub const fn new(buf: &'buf mut [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    /// Bytes written so far, padding included.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes still available.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.cursor)
    }

    /// Gives the buffer back.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> &'buf mut [u8] {
        self.buf
    }

    /// The `len + 1` bytes starting at the cursor, if they fit.
    fn reserve_str(&mut self, len: usize) -> Result<&mut [u8], Error> {
        let end = len
            .checked_add(1)
            .and_then(|occupied| self.cursor.checked_add(occupied))
            .ok_or(Error::InsufficientBuffer)?;
        self.buf
            .get_mut(self.cursor..end)
            .ok_or(Error::InsufficientBuffer)
    }

    fn commit_str(&mut self, len: usize) -> Region {
        let region = Region::new(self.cursor, len);
        self.cursor += len + 1;
        region
    }
}

impl OutWriter for BoundedWriter<'_> {
    fn write_wide(&mut self, value: &U16CStr) -> Result<Region, Error> {
        let code_page = CodePage::current();
        let len = codepage::encoded_len(code_page, value.as_ustr())?;
        let target = self.reserve_str(len)?;
        let (payload, nul) = target.split_at_mut(len);
        let written = codepage::encode_into(code_page, value.as_ustr(), payload)?;
        if written != len {
            tracing::warn!(len, written, "encoder length disagrees with its size query");
            return Err(Error::Io);
        }
        nul.fill(0);
        Ok(self.commit_str(len))
    }

    fn write_narrow(&mut self, value: &CStr) -> Result<Region, Error> {
        let with_nul = value.to_bytes_with_nul();
        self.reserve_str(value.count_bytes())?
            .copy_from_slice(with_nul);
        Ok(self.commit_str(value.count_bytes()))
    }

    fn write_table(&mut self, members: &[Region]) -> Result<Region, Error> {
        let start = align_up(self.cursor, POINTER_ALIGN).ok_or(Error::InsufficientBuffer)?;
        let len = table_len(members.len()).ok_or(Error::InsufficientBuffer)?;
        let end = start.checked_add(len).ok_or(Error::InsufficientBuffer)?;
        if end > self.buf.len() {
            return Err(Error::InsufficientBuffer);
        }
        let target = self
            .buf
            .get_mut(self.cursor..end)
            .ok_or(Error::InsufficientBuffer)?;
        let (padding, table) = target.split_at_mut(start - self.cursor);
        encode_table(members.iter().copied(), table)?;
        padding.fill(0);
        self.cursor = end;
        Ok(Region::new(start, len))
    }
}
