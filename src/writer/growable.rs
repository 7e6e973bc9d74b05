use core::ffi::CStr;

use layout::{Region, encode_table, table_len};
use widestring::U16CStr;

use super::{ChunkStore, OutWriter};
use crate::Error;
use crate::codepage::{self, CodePage, EncodeError};

/// Writes into a [`ChunkStore`], one new chunk per item.
///
/// Never runs out of space; conversion starts with a chunk of the wide
/// length and doubles it until the string fits.
#[derive(Debug)]
pub struct GrowableWriter<'s> {
    store: &'s mut ChunkStore,
}

impl<'s> GrowableWriter<'s> {
    /// Appends to `store`.
    #[inline]
    #[must_use]
    pub const fn new(store: &'s mut ChunkStore) -> Self {
        Self { store }
    }
}

impl OutWriter for GrowableWriter<'_> {
    fn write_wide(&mut self, value: &U16CStr) -> Result<Region, Error> {
        let code_page = CodePage::current();
        let mut capacity = value.len().max(1);
        loop {
            let mut bytes = vec![0u8; capacity];
            match codepage::encode_into(code_page, value.as_ustr(), &mut bytes) {
                Ok(written) => {
                    bytes.truncate(written);
                    bytes.push(0);
                    return Ok(Region::new(self.store.push(bytes), written));
                }
                Err(EncodeError::InsufficientBuffer) => {
                    capacity = capacity.checked_mul(2).ok_or(Error::Io)?;
                    tracing::trace!(capacity, "growing string chunk");
                }
                Err(err @ EncodeError::Invalid(_)) => return Err(err.into()),
            }
        }
    }

    fn write_narrow(&mut self, value: &CStr) -> Result<Region, Error> {
        let base = self.store.push(value.to_bytes_with_nul().to_vec());
        Ok(Region::new(base, value.count_bytes()))
    }

    fn write_table(&mut self, members: &[Region]) -> Result<Region, Error> {
        let len = table_len(members.len()).ok_or(Error::Io)?;
        let mut bytes = vec![0u8; len];
        encode_table(members.iter().copied(), &mut bytes)?;
        Ok(Region::new(self.store.push(bytes), len))
    }
}
