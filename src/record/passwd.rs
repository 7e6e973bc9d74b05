use core::ffi::CStr;
use std::ffi::CString;
use std::time::{SystemTime, UNIX_EPOCH};

use layout::{LayoutPlan, Region, RegionKind, RegionList};

use super::Record;
use crate::directory::{ACCOUNT_NEVER_EXPIRES, UserInfo};
use crate::writer::{OutWriter, RegionSource};
use crate::{Config, Error, Gid, Uid};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// Field mapping from USER_INFO_3:
//   pw_name   usri3_name
//   pw_passwd Config::password_placeholder, hashes are never exposed
//   pw_uid    usri3_user_id
//   pw_gid    usri3_primary_group_id
//   pw_change midnight today if usri3_password_expired, else pw_expire
//   pw_class  usri3_priv
//   pw_gecos  usri3_full_name
//   pw_dir    usri3_home_dir
//   pw_shell  Config::default_shell
//   pw_expire usri3_acct_expires, 0 for never

/// Header of a serialized `struct passwd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswdRecord {
    /// `pw_name`
    pub name: Region,
    /// `pw_passwd`
    pub passwd: Region,
    /// `pw_uid`
    pub uid: Uid,
    /// `pw_gid`
    pub gid: Gid,
    /// `pw_change`
    pub change: i64,
    /// `pw_class`
    pub class: Region,
    /// `pw_gecos`
    pub gecos: Region,
    /// `pw_dir`
    pub dir: Region,
    /// `pw_shell`, always written last.
    pub shell: Region,
    /// `pw_expire`
    pub expire: i64,
}

/// A user entry borrowed from its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passwd<'a> {
    /// User name.
    pub name: &'a CStr,
    /// Password placeholder.
    pub passwd: &'a CStr,
    /// User id.
    pub uid: Uid,
    /// Primary group id.
    pub gid: Gid,
    /// Password change deadline, seconds since the epoch (0 if none).
    pub change: i64,
    /// Login class, the privilege level of the account.
    pub class: &'a CStr,
    /// Full name.
    pub gecos: &'a CStr,
    /// Home directory.
    pub dir: &'a CStr,
    /// Login shell.
    pub shell: &'a CStr,
    /// Account expiry, seconds since the epoch (0 if never).
    pub expire: i64,
    footprint: usize,
}

/// An owned user entry, see [`Passwd::dup`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs, reason = "Fields mirror the borrowed entry")]
pub struct PasswdBuf {
    pub name: CString,
    pub passwd: CString,
    pub uid: Uid,
    pub gid: Gid,
    pub change: i64,
    pub class: CString,
    pub gecos: CString,
    pub dir: CString,
    pub shell: CString,
    pub expire: i64,
}

fn today_midnight() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_secs());
    i64::try_from(now - now % SECONDS_PER_DAY).unwrap_or(i64::MAX)
}

fn expiry(info: &UserInfo) -> i64 {
    if info.acct_expires == ACCOUNT_NEVER_EXPIRES {
        0
    } else {
        i64::from(info.acct_expires)
    }
}

impl PasswdRecord {
    fn strings(&self) -> [Region; 6] {
        [
            self.name,
            self.passwd,
            self.class,
            self.gecos,
            self.dir,
            self.shell,
        ]
    }

    fn regions(&self) -> Result<RegionList<6>, Error> {
        let mut list = RegionList::new();
        for region in self.strings() {
            list.push(RegionKind::Str, region)?;
        }
        Ok(list)
    }
}

impl Record for PasswdRecord {
    type Info = UserInfo;
    type View<'a> = Passwd<'a>;

    #[inline]
    fn id(&self) -> u32 {
        self.uid
    }

    #[inline]
    fn name(&self) -> Region {
        self.name
    }

    fn serialize<W: OutWriter>(
        info: &UserInfo,
        config: &Config,
        writer: &mut W,
    ) -> Result<Self, Error> {
        let name = writer.write_wide(&info.name)?;
        let passwd = writer.write_narrow(config.password_placeholder)?;
        let class = writer.write_narrow(info.privilege.class_name())?;
        let gecos = writer.write_wide(&info.full_name)?;
        let dir = writer.write_wide(&info.home_dir)?;
        let shell = writer.write_narrow(config.default_shell)?;
        let expire = expiry(info);
        Ok(Self {
            name,
            passwd,
            uid: info.user_id,
            gid: info.primary_group_id,
            change: if info.password_expired {
                today_midnight()
            } else {
                expire
            },
            class,
            gecos,
            dir,
            shell,
            expire,
        })
    }

    fn relocate<S, W>(&self, src: &S, writer: &mut W) -> Result<Self, Error>
    where
        S: RegionSource + ?Sized,
        W: OutWriter,
    {
        let mut copy = |region| src.c_str(region).and_then(|s| writer.write_narrow(s));
        Ok(Self {
            name: copy(self.name)?,
            passwd: copy(self.passwd)?,
            class: copy(self.class)?,
            gecos: copy(self.gecos)?,
            dir: copy(self.dir)?,
            shell: copy(self.shell)?,
            ..*self
        })
    }

    fn required_size<S: RegionSource + ?Sized>(&self, src: &S) -> Result<usize, Error> {
        let mut plan = LayoutPlan::new();
        for region in self.strings() {
            src.c_str(region)?;
            plan.str(region.len)?;
        }
        Ok(plan.size())
    }

    fn resolve<'a, S: RegionSource + ?Sized>(&self, src: &'a S) -> Result<Passwd<'a>, Error> {
        Ok(Passwd {
            name: src.c_str(self.name)?,
            passwd: src.c_str(self.passwd)?,
            uid: self.uid,
            gid: self.gid,
            change: self.change,
            class: src.c_str(self.class)?,
            gecos: src.c_str(self.gecos)?,
            dir: src.c_str(self.dir)?,
            shell: src.c_str(self.shell)?,
            expire: self.expire,
            footprint: self.regions()?.footprint()?,
        })
    }

    fn validate(&self, buf: &[u8]) -> Result<(), Error> {
        self.regions()?.validate(buf.len())?;
        Ok(())
    }
}

impl Passwd<'_> {
    /// Bytes spanned by the strings of this entry, terminators included.
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
    pub fn dup(&self) -> PasswdBuf {
        PasswdBuf {
            name: self.name.to_owned(),
            passwd: self.passwd.to_owned(),
            uid: self.uid,
            gid: self.gid,
            change: self.change,
            class: self.class.to_owned(),
            gecos: self.gecos.to_owned(),
            dir: self.dir.to_owned(),
            shell: self.shell.to_owned(),
            expire: self.expire,
        }
    }
}

impl PartialEq<PasswdBuf> for Passwd<'_> {
    fn eq(&self, other: &PasswdBuf) -> bool {
        self.dup() == *other
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
#[allow(clippy::indexing_slicing, reason = "Indexing is not an issue in test")]
mod tests {
    use super::*;
    use crate::directory::Privilege;
    use crate::writer::{BoundedWriter, ChunkStore, GrowableWriter};

    fn alice() -> UserInfo {
        UserInfo::new("alice", 1001, 513)
            .with_full_name("Alice Liddell")
            .with_home_dir("C:\\Users\\alice")
            .with_privilege(Privilege::Administrator)
    }

    #[test]
    fn fields_follow_the_mapping() {
        let mut store = ChunkStore::new();
        let config = Config::DEFAULT;
        let record =
            PasswdRecord::serialize(&alice(), &config, &mut GrowableWriter::new(&mut store)).unwrap();
        let pw = record.resolve(&store).unwrap();
        assert_eq!(pw.name, c"alice");
        assert_eq!(pw.passwd, c"*");
        assert_eq!((pw.uid, pw.gid), (1001, 513));
        assert_eq!(pw.class, c"Administrator");
        assert_eq!(pw.gecos, c"Alice Liddell");
        assert_eq!(pw.dir, c"C:\\Users\\alice");
        assert_eq!(pw.shell, c"cmd.exe");
        assert_eq!((pw.change, pw.expire), (0, 0));
    }

    #[test]
    fn expiry_and_password_change() {
        let mut store = ChunkStore::new();
        let info = alice()
            .with_acct_expires(1_700_000_000)
            .with_password_expired(true);
        let record = PasswdRecord::serialize(
            &info,
            &Config::DEFAULT,
            &mut GrowableWriter::new(&mut store),
        )
        .unwrap();
        assert_eq!(record.expire, 1_700_000_000);
        assert_eq!(record.change % 86_400, 0);
        assert!(record.change > record.expire, "midnight today is after 2023");
    }

    #[test]
    fn relocation_needs_exactly_the_planned_size() {
        let mut store = ChunkStore::new();
        let staged = PasswdRecord::serialize(
            &alice(),
            &Config::DEFAULT,
            &mut GrowableWriter::new(&mut store),
        )
        .unwrap();
        let size = staged.required_size(&store).unwrap();

        let mut short = vec![0u8; size - 1];
        assert_eq!(
            staged.relocate(&store, &mut BoundedWriter::new(&mut short)),
            Err(Error::InsufficientBuffer)
        );

        let mut exact = vec![0u8; size];
        let mut writer = BoundedWriter::new(&mut exact);
        let moved = staged.relocate(&store, &mut writer).unwrap();
        assert_eq!(writer.position(), size);
        assert_eq!(moved.validate(&exact), Ok(()));
        assert_eq!(moved.validate(&exact[..size - 1]), Err(Error::Io));
        let overlapping = PasswdRecord {
            gecos: moved.name,
            ..moved
        };
        assert_eq!(overlapping.validate(&exact), Err(Error::Io));
        let view = moved.resolve(exact.as_slice()).unwrap();
        assert_eq!(view.footprint(), size);
        assert_eq!(view, staged.resolve(&store).unwrap().dup());
    }
}
