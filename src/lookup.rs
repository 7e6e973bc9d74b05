use core::ffi::CStr;

use delegate::delegate;

use crate::cache::LookupCache;
use crate::directory::{Directory, UserInfo};
use crate::entity::{self, EntityKind, User};
use crate::{Config, Error, Gid, Group, Passwd, Status, Uid};

/// A lookup context: the `<pwd.h>` and `<grp.h>` entry points over a
/// [`Directory`].
///
/// Each context owns one cache slot and one enumeration cursor per account
/// kind. An entry returned by a non-reentrant call borrows the context, so
/// it stays valid exactly until the next call that may replace it. The
/// reentrant `*_r` calls take `&self` and write into a caller buffer.
///
/// Use one context per thread; contexts share nothing.
///
/// # Examples
/// ```rust
/// use wusers::{GroupInfo, Lookup, MemoryDirectory, UserInfo};
///
/// let dir = MemoryDirectory::new()
///     .with_user(UserInfo::new("alice", 1001, 513).with_full_name("Alice"))
///     .with_group(GroupInfo::new("staff", 513).with_member("alice"));
/// let mut lookup = Lookup::new(dir);
///
/// let pw = lookup.getpwnam(c"alice").unwrap();
/// assert_eq!((pw.uid, pw.gecos), (1001, c"Alice"));
///
/// let mut buf = [0u8; 64];
/// let gr = lookup.getgrgid_r(513, &mut buf).unwrap();
/// assert_eq!(gr.members.as_slice(), [c"alice"]);
/// ```
#[derive(Debug)]
pub struct Lookup<D: Directory> {
    directory: D,
    users: LookupCache<User>,
    groups: LookupCache<entity::Group>,
    config: Config,
}

impl<D: Directory> Lookup<D> {
    /// A context with [`Config::DEFAULT`].
    #[inline]
    #[must_use]
    pub const fn new(directory: D) -> Self {
        Self::with_config(directory, Config::DEFAULT)
    }

    /// A context with a custom configuration.
    #[must_use]
    pub const fn with_config(directory: D, config: Config) -> Self {
        Self {
            directory,
            users: LookupCache::new(config),
            groups: LookupCache::new(config),
            config,
        }
    }

    /// The directory queried by this context.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// The configuration of this context.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Drops both cache slots and both cursors.
    pub fn reset(&mut self) {
        self.users.reset();
        self.groups.reset();
    }

    /// The user called `name`.
    ///
    /// # Errors
    /// [`Error::NotFound`], [`Error::InvalidArgument`] for an empty or
    /// unconvertible name, or the mapped directory status.
    pub fn getpwnam(&mut self, name: &CStr) -> Result<Passwd<'_>, Error> {
        self.users.query_by_name(&self.directory, name)
    }

    /// The user with `uid`.
    ///
    /// # Errors
    /// [`Error::NotFound`] or the mapped directory status.
    pub fn getpwuid(&mut self, uid: Uid) -> Result<Passwd<'_>, Error> {
        self.users.query_by_id(&self.directory, uid)
    }

    /// Reentrant [`Lookup::getpwnam`].
    ///
    /// # Errors
    /// [`Error::InsufficientBuffer`] if the entry does not fit `buf`;
    /// otherwise as [`Lookup::getpwnam`].
    pub fn getpwnam_r<'b>(&self, name: &CStr, buf: &'b mut [u8]) -> Result<Passwd<'b>, Error> {
        self.users.query_by_name_into(&self.directory, name, buf)
    }

    /// Reentrant [`Lookup::getpwuid`].
    ///
    /// # Errors
    /// See [`Lookup::getpwnam_r`].
    pub fn getpwuid_r<'b>(&self, uid: Uid, buf: &'b mut [u8]) -> Result<Passwd<'b>, Error> {
        self.users.query_by_id_into(&self.directory, uid, buf)
    }

    delegate! {
        to self.users {
            /// Rewinds the user enumeration.
            #[call(begin_enum)]
            pub fn setpwent(&mut self);
            /// Ends the user enumeration.
            #[call(end_enum)]
            pub fn endpwent(&mut self);
        }
        to self.groups {
            /// Rewinds the group enumeration.
            #[call(begin_enum)]
            pub fn setgrent(&mut self);
            /// Ends the group enumeration.
            #[call(end_enum)]
            pub fn endgrent(&mut self);
        }
    }

    /// Same as [`Lookup::setpwent`]; there is no database to keep open.
    #[inline]
    pub fn setpassent(&mut self, stay_open: bool) {
        tracing::trace!(stay_open, "setpassent");
        self.setpwent();
    }

    /// The next user of the enumeration, `None` once all were returned.
    ///
    /// # Errors
    /// The mapped directory status.
    pub fn getpwent(&mut self) -> Result<Option<Passwd<'_>>, Error> {
        self.users.next_entry(&self.directory)
    }

    /// The uid of the user called `name`.
    ///
    /// # Errors
    /// See [`Lookup::getpwnam`].
    pub fn uid_from_user(&mut self, name: &CStr) -> Result<Uid, Error> {
        self.users.name_to_id(&self.directory, name)
    }

    /// The name of the user with `uid`; unknown ids render as decimal
    /// unless `no_such_user` is set.
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown id with `no_such_user`, or the
    /// mapped directory status.
    pub fn user_from_uid(&mut self, uid: Uid, no_such_user: bool) -> Result<&CStr, Error> {
        self.users.id_to_name(&self.directory, uid, no_such_user)
    }

    /// Password hashes are never exposed.
    ///
    /// # Errors
    /// Always [`Error::PermissionDenied`].
    #[inline]
    pub fn getpwnam_shadow(&self, name: &CStr) -> Result<Passwd<'static>, Error> {
        tracing::debug!(?name, "shadow lookup refused");
        Err(Error::PermissionDenied)
    }

    /// Password hashes are never exposed.
    ///
    /// # Errors
    /// Always [`Error::PermissionDenied`].
    #[inline]
    pub fn getpwuid_shadow(&self, uid: Uid) -> Result<Passwd<'static>, Error> {
        tracing::debug!(uid, "shadow lookup refused");
        Err(Error::PermissionDenied)
    }

    /// The group called `name`.
    ///
    /// # Errors
    /// See [`Lookup::getpwnam`].
    pub fn getgrnam(&mut self, name: &CStr) -> Result<Group<'_>, Error> {
        self.groups.query_by_name(&self.directory, name)
    }

    /// The group with `gid`.
    ///
    /// # Errors
    /// See [`Lookup::getpwuid`].
    pub fn getgrgid(&mut self, gid: Gid) -> Result<Group<'_>, Error> {
        self.groups.query_by_id(&self.directory, gid)
    }

    /// Reentrant [`Lookup::getgrnam`].
    ///
    /// # Errors
    /// See [`Lookup::getpwnam_r`].
    pub fn getgrnam_r<'b>(&self, name: &CStr, buf: &'b mut [u8]) -> Result<Group<'b>, Error> {
        self.groups.query_by_name_into(&self.directory, name, buf)
    }

    /// Reentrant [`Lookup::getgrgid`].
    ///
    /// # Errors
    /// See [`Lookup::getpwnam_r`].
    pub fn getgrgid_r<'b>(&self, gid: Gid, buf: &'b mut [u8]) -> Result<Group<'b>, Error> {
        self.groups.query_by_id_into(&self.directory, gid, buf)
    }

    /// Same as [`Lookup::setgrent`].
    #[inline]
    pub fn setgroupent(&mut self, stay_open: bool) {
        tracing::trace!(stay_open, "setgroupent");
        self.setgrent();
    }

    /// The next group of the enumeration, `None` once all were returned.
    ///
    /// # Errors
    /// The mapped directory status.
    pub fn getgrent(&mut self) -> Result<Option<Group<'_>>, Error> {
        self.groups.next_entry(&self.directory)
    }

    /// The gid of the group called `name`.
    ///
    /// # Errors
    /// See [`Lookup::getgrnam`].
    pub fn gid_from_group(&mut self, name: &CStr) -> Result<Gid, Error> {
        self.groups.name_to_id(&self.directory, name)
    }

    /// The name of the group with `gid`, see [`Lookup::user_from_uid`].
    ///
    /// # Errors
    /// See [`Lookup::user_from_uid`].
    pub fn group_from_gid(&mut self, gid: Gid, no_such_group: bool) -> Result<&CStr, Error> {
        self.groups.id_to_name(&self.directory, gid, no_such_group)
    }

    fn current_user(&self, effective: bool) -> Result<UserInfo, Error> {
        let name = self
            .directory
            .current_user_name(effective)
            .map_err(Status::into_error)?;
        User::get_by_name(&self.directory, &name).map_err(User::classify)
    }

    /// Id of the logon user.
    ///
    /// # Errors
    /// The mapped directory status.
    pub fn getuid(&self) -> Result<Uid, Error> {
        self.current_user(false).map(|user| User::id_of(&user))
    }

    /// Id of the user of the current security context.
    ///
    /// # Errors
    /// The mapped directory status.
    pub fn geteuid(&self) -> Result<Uid, Error> {
        self.current_user(true).map(|user| User::id_of(&user))
    }

    /// Primary group of the logon user.
    ///
    /// # Errors
    /// The mapped directory status.
    pub fn getgid(&self) -> Result<Gid, Error> {
        self.current_user(false).map(|user| user.primary_group_id)
    }

    /// Primary group of the user of the current security context.
    ///
    /// # Errors
    /// The mapped directory status.
    pub fn getegid(&self) -> Result<Gid, Error> {
        self.current_user(true).map(|user| user.primary_group_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use crate::directory::{Call, MemoryDirectory, UserInfo};

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new()
            .with_user(UserInfo::new("alice", 1001, 513).with_full_name("Alice Liddell"))
            .with_user(UserInfo::new("bob", 1002, 514).with_full_name("Bob"))
            .with_current_user("alice", "bob")
    }

    #[test]
    fn reentrant_lookup_does_not_disturb_the_slot() {
        let mut lookup = Lookup::new(directory());
        lookup.getpwnam(c"alice").unwrap();
        let record = lookup.users.slot().record().unwrap();
        lookup
            .users
            .slot_mut()
            .store_mut()
            .bytes_mut(record.gecos)
            .unwrap()
            .fill(b'#');

        let mut buf = [0u8; 256];
        assert_eq!(lookup.getpwnam_r(c"bob", &mut buf).unwrap().name, c"bob");
        assert_eq!(lookup.users.slot().record(), Some(record));

        let pw = lookup.getpwnam(c"alice").unwrap();
        assert_eq!(pw.gecos, c"Alice Liddell");
    }

    #[test]
    fn current_user_ids_bypass_the_cache() {
        let lookup = Lookup::new(directory());
        assert_eq!(lookup.getuid(), Ok(1001));
        assert_eq!(lookup.geteuid(), Ok(1002));
        assert_eq!(lookup.getgid(), Ok(513));
        assert_eq!(lookup.getegid(), Ok(514));
        assert!(lookup.users.slot().record().is_none());
        assert_eq!(lookup.directory().calls(Call::CurrentUserName), 4);
    }

    #[test]
    fn unknown_current_user() {
        let lookup = Lookup::new(MemoryDirectory::new());
        assert_eq!(lookup.getuid(), Err(Error::NotFound));
    }

    #[test]
    fn shadow_lookups_are_refused() {
        let lookup = Lookup::new(directory());
        assert_eq!(lookup.getpwnam_shadow(c"alice"), Err(Error::PermissionDenied));
        assert_eq!(lookup.getpwuid_shadow(1001), Err(Error::PermissionDenied));
        assert_eq!(lookup.directory().total_calls(), 0);
    }

    #[test]
    fn reset_forgets_the_slot() {
        let mut lookup = Lookup::new(directory());
        lookup.getpwuid(1002).unwrap();
        lookup.reset();
        assert!(lookup.users.slot().record().is_none());
        assert!(lookup.users.slot().store().is_empty());
    }
}
