use core::ffi::CStr;
use std::ffi::CString;

use layout::{LayoutPlan, Region, RegionKind, RegionList, check_bounds, decode_table};
use smallvec::SmallVec;

use super::Record;
use crate::directory::GroupInfo;
use crate::writer::{OutWriter, RegionSource};
use crate::{Config, Error, Gid};

type Members<T> = SmallVec<[T; 8]>;

/// Header of a serialized `struct group`.
///
/// The member strings are written after `passwd`, followed by the member
/// table that references them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRecord {
    /// `gr_name`
    pub name: Region,
    /// `gr_passwd`
    pub passwd: Region,
    /// `gr_gid`
    pub gid: Gid,
    /// `gr_mem` as a member table.
    pub members: Region,
}

/// A group entry borrowed from its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'a> {
    /// Group name.
    pub name: &'a CStr,
    /// Password placeholder.
    pub passwd: &'a CStr,
    /// Group id.
    pub gid: Gid,
    /// Member user names.
    pub members: Members<&'a CStr>,
    footprint: usize,
}

/// An owned group entry, see [`Group::dup`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs, reason = "Fields mirror the borrowed entry")]
pub struct GroupBuf {
    pub name: CString,
    pub passwd: CString,
    pub gid: Gid,
    pub members: Vec<CString>,
}

impl GroupRecord {
    fn member_regions<S: RegionSource + ?Sized>(&self, src: &S) -> Result<Members<Region>, Error> {
        let mut regions = Members::new();
        for region in decode_table(src.bytes(self.members)?)? {
            regions.push(region?);
        }
        Ok(regions)
    }
}

impl Record for GroupRecord {
    type Info = GroupInfo;
    type View<'a> = Group<'a>;

    #[inline]
    fn id(&self) -> u32 {
        self.gid
    }

    #[inline]
    fn name(&self) -> Region {
        self.name
    }

    fn serialize<W: OutWriter>(
        info: &GroupInfo,
        config: &Config,
        writer: &mut W,
    ) -> Result<Self, Error> {
        let name = writer.write_wide(&info.name)?;
        let passwd = writer.write_narrow(config.password_placeholder)?;
        let members = info
            .members
            .iter()
            .map(|member| writer.write_wide(member))
            .collect::<Result<Members<Region>, Error>>()?;
        Ok(Self {
            name,
            passwd,
            gid: info.group_id,
            members: writer.write_table(&members)?,
        })
    }

    fn relocate<S, W>(&self, src: &S, writer: &mut W) -> Result<Self, Error>
    where
        S: RegionSource + ?Sized,
        W: OutWriter,
    {
        let mut copy = |region| src.c_str(region).and_then(|s| writer.write_narrow(s));
        let name = copy(self.name)?;
        let passwd = copy(self.passwd)?;
        let members = self
            .member_regions(src)?
            .into_iter()
            .map(&mut copy)
            .collect::<Result<Members<Region>, Error>>()?;
        Ok(Self {
            name,
            passwd,
            gid: self.gid,
            members: writer.write_table(&members)?,
        })
    }

    fn required_size<S: RegionSource + ?Sized>(&self, src: &S) -> Result<usize, Error> {
        let mut plan = LayoutPlan::new();
        plan.str(src.c_str(self.name)?.count_bytes())?;
        plan.str(src.c_str(self.passwd)?.count_bytes())?;
        let members = self.member_regions(src)?;
        for member in &members {
            plan.str(src.c_str(*member)?.count_bytes())?;
        }
        plan.table(members.len())?;
        Ok(plan.size())
    }

    fn resolve<'a, S: RegionSource + ?Sized>(&self, src: &'a S) -> Result<Group<'a>, Error> {
        let regions = self.member_regions(src)?;
        let members = regions
            .iter()
            .map(|region| src.c_str(*region))
            .collect::<Result<_, _>>()?;
        let footprint = layout::footprint(
            [
                (RegionKind::Str, self.name),
                (RegionKind::Str, self.passwd),
                (RegionKind::Table, self.members),
            ]
            .into_iter()
            .chain(regions.iter().map(|region| (RegionKind::Str, *region))),
        )?;
        Ok(Group {
            name: src.c_str(self.name)?,
            passwd: src.c_str(self.passwd)?,
            gid: self.gid,
            members,
            footprint,
        })
    }

    fn validate(&self, buf: &[u8]) -> Result<(), Error> {
        let mut header = RegionList::<3>::new();
        header.push(RegionKind::Str, self.name)?;
        header.push(RegionKind::Str, self.passwd)?;
        header.push(RegionKind::Table, self.members)?;
        header.validate(buf.len())?;
        let members = self.member_regions(buf)?;
        check_bounds(
            members.iter().map(|region| (RegionKind::Str, *region)),
            buf.len(),
        )?;
        Ok(())
    }
}

impl Group<'_> {
    /// Bytes spanned by the strings and the member table of this entry.
    ///
    /// For an entry returned by a reentrant lookup this is exactly the
    /// buffer size the entry needs.
    #[inline]
    #[must_use]
    pub const fn footprint(&self) -> usize {
        self.footprint
    }

    /// An owned copy that outlives the storage.
    #[must_use]
    pub fn dup(&self) -> GroupBuf {
        GroupBuf {
            name: self.name.to_owned(),
            passwd: self.passwd.to_owned(),
            gid: self.gid,
            members: self.members.iter().map(|&member| member.to_owned()).collect(),
        }
    }
}

impl PartialEq<GroupBuf> for Group<'_> {
    fn eq(&self, other: &GroupBuf) -> bool {
        self.dup() == *other
    }
}
