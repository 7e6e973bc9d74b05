use widestring::U16CStr;

use crate::directory::{
    Directory, GROUP_LEVEL, GroupInfo, RawPage, ResumeToken, USER_LEVEL, UserInfo,
};
use crate::record::{GroupRecord, PasswdRecord, Record};
use crate::{Error, Status};

/// Binds an account kind to its directory calls and its record type.
pub trait EntityKind {
    /// Directory entry of this kind.
    type Info: Clone;
    /// Serialized form of [`EntityKind::Info`].
    type Record: Record<Info = Self::Info>;

    /// Used in log messages.
    const NOUN: &'static str;
    /// Status the directory reports for an unknown name of this kind.
    const NOT_FOUND: Status;
    /// Information level passed to the directory.
    const LEVEL: u32;

    /// The numeric id of an entry.
    fn id_of(info: &Self::Info) -> u32;

    /// The name of an entry.
    fn name_of(info: &Self::Info) -> &U16CStr;

    /// Point query by name.
    ///
    /// # Errors
    /// Any status of the directory.
    fn get_by_name<D: Directory + ?Sized>(dir: &D, name: &U16CStr) -> Result<Self::Info, Status>;

    /// One enumeration page.
    ///
    /// # Errors
    /// Any status of the directory.
    fn enumerate<D: Directory + ?Sized>(
        dir: &D,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<Self::Info>, Status>;

    /// Maps a directory status for this kind to an [`Error`].
    #[inline]
    #[must_use]
    fn classify(status: Status) -> Error {
        if status == Self::NOT_FOUND {
            tracing::trace!(kind = Self::NOUN, "no such account");
            Error::NotFound
        } else {
            status.into_error()
        }
    }
}

/// User accounts, `<pwd.h>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct User;

/// Group accounts, `<grp.h>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Group;

impl EntityKind for User {
    type Info = UserInfo;
    type Record = PasswdRecord;

    const NOUN: &'static str = "user";
    const NOT_FOUND: Status = Status::UserNotFound;
    const LEVEL: u32 = USER_LEVEL;

    #[inline]
    fn id_of(info: &UserInfo) -> u32 {
        info.user_id
    }

    #[inline]
    fn name_of(info: &UserInfo) -> &U16CStr {
        &info.name
    }

    #[inline]
    fn get_by_name<D: Directory + ?Sized>(dir: &D, name: &U16CStr) -> Result<UserInfo, Status> {
        dir.user_info(name, Self::LEVEL)
    }

    #[inline]
    fn enumerate<D: Directory + ?Sized>(
        dir: &D,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<UserInfo>, Status> {
        dir.enum_users(Self::LEVEL, page_hint, resume)
    }
}

impl EntityKind for Group {
    type Info = GroupInfo;
    type Record = GroupRecord;

    const NOUN: &'static str = "group";
    const NOT_FOUND: Status = Status::GroupNotFound;
    const LEVEL: u32 = GROUP_LEVEL;

    #[inline]
    fn id_of(info: &GroupInfo) -> u32 {
        info.group_id
    }

    #[inline]
    fn name_of(info: &GroupInfo) -> &U16CStr {
        &info.name
    }

    #[inline]
    fn get_by_name<D: Directory + ?Sized>(dir: &D, name: &U16CStr) -> Result<GroupInfo, Status> {
        dir.group_info(name, Self::LEVEL)
    }

    #[inline]
    fn enumerate<D: Directory + ?Sized>(
        dir: &D,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<GroupInfo>, Status> {
        dir.enum_groups(Self::LEVEL, page_hint, resume)
    }
}
