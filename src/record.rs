//! Serialized account records.
//!
//! A record is a fixed header of scalars plus one [`Region`] per
//! variable-length item. The regions are only meaningful together with the
//! storage the record was written to, see [`RegionSource`].

mod group;
mod passwd;

use core::fmt::Debug;

pub use group::{Group, GroupBuf, GroupRecord};
use layout::Region;
pub use passwd::{Passwd, PasswdBuf, PasswdRecord};

use crate::entity::EntityKind;
use crate::writer::{BoundedWriter, OutWriter, RegionSource};
use crate::{Config, Error};

/// The borrowed view of the records of kind `K`.
pub type ViewOf<'a, K> = <<K as EntityKind>::Record as Record>::View<'a>;

/// A record header whose variable data lives in some storage.
pub trait Record: Copy + Debug {
    /// Directory entry the record is built from.
    type Info;
    /// Borrowed form handed to callers.
    type View<'a>;

    /// The numeric id (`pw_uid` / `gr_gid`).
    fn id(&self) -> u32;

    /// Region of the account name.
    fn name(&self) -> Region;

    /// Writes `info` through `writer`, mapping directory attributes to fields.
    ///
    /// # Errors
    /// Whatever the writer reports.
    fn serialize<W: OutWriter>(info: &Self::Info, config: &Config, writer: &mut W)
    -> Result<Self, Error>;

    /// Copies the record stored in `src` through `writer`, in write order.
    ///
    /// # Errors
    /// [`Error::Io`] if `src` does not hold the record, or whatever the
    /// writer reports.
    fn relocate<S, W>(&self, src: &S, writer: &mut W) -> Result<Self, Error>
    where
        S: RegionSource + ?Sized,
        W: OutWriter;

    /// Exact number of bytes [`Record::relocate`] needs in a fresh
    /// [`BoundedWriter`](crate::writer::BoundedWriter).
    ///
    /// # Errors
    /// [`Error::Io`] if `src` does not hold the record.
    fn required_size<S: RegionSource + ?Sized>(&self, src: &S) -> Result<usize, Error>;

    /// Borrows the record's fields from `src`.
    ///
    /// # Errors
    /// [`Error::Io`] if `src` does not hold the record.
    fn resolve<'a, S: RegionSource + ?Sized>(&self, src: &'a S) -> Result<Self::View<'a>, Error>;

    /// Checks that the regions of a record written to `buf` lie inside it
    /// and do not overlap.
    ///
    /// # Errors
    /// [`Error::Io`] for the first offending region.
    fn validate(&self, buf: &[u8]) -> Result<(), Error>;
}

/// Copies `record` from `src` into `buf` if the whole entry fits.
///
/// # Errors
/// [`Error::InsufficientBuffer`] without touching `buf` when it is too small.
pub(crate) fn copy_into<'b, R, S>(record: R, src: &S, buf: &'b mut [u8]) -> Result<R::View<'b>, Error>
where
    R: Record,
    S: RegionSource + ?Sized,
{
    let required = record.required_size(src)?;
    if required > buf.len() {
        tracing::debug!(required, capacity = buf.len(), "caller buffer too small");
        return Err(Error::InsufficientBuffer);
    }
    let mut writer = BoundedWriter::new(buf);
    let moved = record.relocate(src, &mut writer)?;
    debug_assert_eq!(writer.position(), required, "layout plan and writer disagree");
    let buf: &'b [u8] = writer.into_inner();
    debug_assert!(moved.validate(buf).is_ok(), "relocated record escapes the caller buffer");
    moved.resolve(buf)
}
