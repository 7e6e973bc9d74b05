//! The platform account directory seam.
//!
//! [`Directory`] mirrors the subset of the LAN Manager account API the
//! lookups need: point queries by name and page-based enumeration with a
//! resume handle. [`MemoryDirectory`] is a portable in-memory
//! implementation; on Windows [`NetDirectory`] talks to the local account
//! database.

mod memory;
#[cfg(windows)]
mod windows;

pub use memory::{Call, MemoryDirectory};
use num_enum::{IntoPrimitive, TryFromPrimitive};
#[cfg(windows)]
pub use windows::NetDirectory;

use core::ffi::CStr;
use delegate::delegate;
use widestring::{U16CStr, U16CString};

use crate::Status;

/// Information level queried for users (`USER_INFO_3`).
pub const USER_LEVEL: u32 = 3;
/// Information level queried for groups (`GROUP_INFO_2`).
pub const GROUP_LEVEL: u32 = 2;
/// `acct_expires` value of an account that never expires (`TIMEQ_FOREVER`).
pub const ACCOUNT_NEVER_EXPIRES: u32 = u32::MAX;

/// Opaque continuation handle of a paged enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResumeToken(pub usize);

impl ResumeToken {
    /// Starts an enumeration from the first entry.
    pub const START: Self = Self(0);
}

/// One page returned by an enumeration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage<I> {
    /// Entries of this page, in directory order.
    pub entries: Vec<I>,
    /// Entries left from the start of this page, this page included.
    pub total_entries: usize,
    /// Handle to pass to fetch the next page.
    pub resume: ResumeToken,
    /// `true` when the call reported more data.
    pub more: bool,
}

/// Access level of a user account (`usri3_priv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Privilege {
    /// `USER_PRIV_GUEST`
    Guest = 0,
    /// `USER_PRIV_USER`
    User = 1,
    /// `USER_PRIV_ADMIN`
    Administrator = 2,
}

impl Privilege {
    /// Name used as the login class of the account.
    #[inline]
    #[must_use]
    pub const fn class_name(self) -> &'static CStr {
        match self {
            Self::Guest => c"Guest",
            Self::User => c"User",
            Self::Administrator => c"Administrator",
        }
    }

    /// Maps a raw privilege level, treating unknown values as [`Privilege::Guest`].
    #[inline]
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self::try_from(raw).unwrap_or(Self::Guest)
    }
}

/// The user attributes the lookups consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Account name.
    pub name: U16CString,
    /// Display name; becomes `pw_gecos`.
    pub full_name: U16CString,
    /// Home directory; becomes `pw_dir`.
    pub home_dir: U16CString,
    /// Relative identifier of the account; becomes `pw_uid`.
    pub user_id: u32,
    /// Relative identifier of the primary group; becomes `pw_gid`.
    pub primary_group_id: u32,
    /// Access level; its name becomes `pw_class`.
    pub privilege: Privilege,
    /// The password must be changed at next logon.
    pub password_expired: bool,
    /// Seconds since the epoch, or [`ACCOUNT_NEVER_EXPIRES`].
    pub acct_expires: u32,
}

impl UserInfo {
    /// A user with empty optional attributes.
    #[must_use]
    pub fn new(name: &str, user_id: u32, primary_group_id: u32) -> Self {
        Self {
            name: U16CString::from_str_truncate(name),
            full_name: U16CString::new(),
            home_dir: U16CString::new(),
            user_id,
            primary_group_id,
            privilege: Privilege::User,
            password_expired: false,
            acct_expires: ACCOUNT_NEVER_EXPIRES,
        }
    }

    /// Sets [`UserInfo::full_name`].
    #[must_use]
    pub fn with_full_name(mut self, full_name: &str) -> Self {
        self.full_name = U16CString::from_str_truncate(full_name);
        self
    }

    /// Sets [`UserInfo::home_dir`].
    #[must_use]
    pub fn with_home_dir(mut self, home_dir: &str) -> Self {
        self.home_dir = U16CString::from_str_truncate(home_dir);
        self
    }

    /// Sets [`UserInfo::privilege`].
    #[must_use]
    pub const fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    /// Sets [`UserInfo::password_expired`].
    #[must_use]
    pub const fn with_password_expired(mut self, expired: bool) -> Self {
        self.password_expired = expired;
        self
    }

    /// Sets [`UserInfo::acct_expires`].
    #[must_use]
    pub const fn with_acct_expires(mut self, acct_expires: u32) -> Self {
        self.acct_expires = acct_expires;
        self
    }
}

/// The group attributes the lookups consume, members included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Account name.
    pub name: U16CString,
    /// Relative identifier of the group; becomes `gr_gid`.
    pub group_id: u32,
    /// Names of the member users.
    pub members: Vec<U16CString>,
}

impl GroupInfo {
    /// A group without members.
    #[must_use]
    pub fn new(name: &str, group_id: u32) -> Self {
        Self {
            name: U16CString::from_str_truncate(name),
            group_id,
            members: Vec::new(),
        }
    }

    /// Adds a member.
    #[must_use]
    pub fn with_member(mut self, member: &str) -> Self {
        self.members.push(U16CString::from_str_truncate(member));
        self
    }
}

/// A source of account information.
///
/// All calls are synchronous. Buffers the platform allocates for a call are
/// released before the call returns.
pub trait Directory {
    /// Looks a user up by name at `level`.
    ///
    /// # Errors
    /// [`Status::UserNotFound`] or any other platform status.
    fn user_info(&self, name: &U16CStr, level: u32) -> Result<UserInfo, Status>;

    /// Fetches one page of users starting at `resume`, sized to roughly
    /// `page_hint` bytes.
    ///
    /// # Errors
    /// [`Status::BufferTooSmall`] if not even one entry fits `page_hint`,
    /// or any other platform status.
    fn enum_users(
        &self,
        level: u32,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<UserInfo>, Status>;

    /// Looks a group up by name at `level`, members included.
    ///
    /// # Errors
    /// [`Status::GroupNotFound`] or any other platform status.
    fn group_info(&self, name: &U16CStr, level: u32) -> Result<GroupInfo, Status>;

    /// Fetches one page of groups, members included. See [`Directory::enum_users`].
    ///
    /// # Errors
    /// See [`Directory::enum_users`].
    fn enum_groups(
        &self,
        level: u32,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<GroupInfo>, Status>;

    /// Name of the user running the process: the logon user when
    /// `effective` is `false`, the user of the current security context
    /// otherwise.
    ///
    /// # Errors
    /// Any platform status.
    fn current_user_name(&self, effective: bool) -> Result<U16CString, Status>;
}

impl<D: Directory + ?Sized> Directory for &D {
    delegate! {
        to (**self) {
            fn user_info(&self, name: &U16CStr, level: u32) -> Result<UserInfo, Status>;
            fn enum_users(&self, level: u32, page_hint: usize, resume: ResumeToken) -> Result<RawPage<UserInfo>, Status>;
            fn group_info(&self, name: &U16CStr, level: u32) -> Result<GroupInfo, Status>;
            fn enum_groups(&self, level: u32, page_hint: usize, resume: ResumeToken) -> Result<RawPage<GroupInfo>, Status>;
            fn current_user_name(&self, effective: bool) -> Result<U16CString, Status>;
        }
    }
}
