use core::cell::Cell;

use widestring::{U16CStr, U16CString};

use super::{
    Directory, GROUP_LEVEL, GroupInfo, RawPage, ResumeToken, USER_LEVEL, UserInfo,
};
use crate::Status;

/// Fixed per-entry cost charged against a page hint, on top of the strings.
const ENTRY_OVERHEAD: usize = 64;

/// The [`Directory`] calls, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    /// [`Directory::user_info`]
    UserInfo,
    /// [`Directory::enum_users`]
    EnumUsers,
    /// [`Directory::group_info`]
    GroupInfo,
    /// [`Directory::enum_groups`]
    EnumGroups,
    /// [`Directory::current_user_name`]
    CurrentUserName,
}

impl Call {
    const COUNT: usize = 5;

    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct Injected {
    call: Call,
    status: Status,
    persistent: bool,
}

/// In-memory account directory.
///
/// Pages are cut to the byte budget of the page hint the way the LAN
/// Manager API does, so the enumeration retry and resume logic runs against
/// it unchanged.
///
/// # Examples
/// ```rust
/// use wusers::{Call, Directory, MemoryDirectory, UserInfo};
/// use widestring::u16cstr;
///
/// let dir = MemoryDirectory::new().with_user(UserInfo::new("alice", 1001, 513));
/// assert_eq!(dir.user_info(u16cstr!("alice"), 3).unwrap().user_id, 1001);
/// assert_eq!(dir.calls(Call::UserInfo), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: Vec<UserInfo>,
    groups: Vec<GroupInfo>,
    page_limit: Option<usize>,
    real_user: Option<U16CString>,
    effective_user: Option<U16CString>,
    injected: Cell<Option<Injected>>,
    calls: [Cell<usize>; Call::COUNT],
}

impl MemoryDirectory {
    /// An empty directory.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user.
    #[must_use]
    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.users.push(user);
        self
    }

    /// Adds a group.
    #[must_use]
    pub fn with_group(mut self, group: GroupInfo) -> Self {
        self.groups.push(group);
        self
    }

    /// Caps the number of entries per page regardless of the page hint.
    #[must_use]
    pub const fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(if limit == 0 { 1 } else { limit });
        self
    }

    /// Sets the logon user and the user of the current security context.
    #[must_use]
    pub fn with_current_user(mut self, real: &str, effective: &str) -> Self {
        self.real_user = Some(U16CString::from_str_truncate(real));
        self.effective_user = Some(U16CString::from_str_truncate(effective));
        self
    }

    /// Makes the next `call` fail with `status`.
    #[inline]
    pub fn fail_next(&self, call: Call, status: Status) {
        self.injected.set(Some(Injected {
            call,
            status,
            persistent: false,
        }));
    }

    /// Makes every `call` fail with `status` until [`MemoryDirectory::heal`].
    #[inline]
    pub fn fail_always(&self, call: Call, status: Status) {
        self.injected.set(Some(Injected {
            call,
            status,
            persistent: true,
        }));
    }

    /// Removes any injected failure.
    #[inline]
    pub fn heal(&self) {
        self.injected.set(None);
    }

    /// How many times `call` was issued.
    #[inline]
    #[must_use]
    pub fn calls(&self, call: Call) -> usize {
        self.calls.get(call.index()).map_or(0, Cell::get)
    }

    /// Total number of calls issued.
    #[inline]
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(Cell::get).sum()
    }

    fn enter(&self, call: Call) -> Result<(), Status> {
        if let Some(counter) = self.calls.get(call.index()) {
            counter.set(counter.get() + 1);
        }
        match self.injected.get() {
            Some(injected) if injected.call == call => {
                if !injected.persistent {
                    self.injected.set(None);
                }
                Err(injected.status)
            }
            _ => Ok(()),
        }
    }

    fn page<I: Clone>(
        &self,
        entries: &[I],
        cost: impl Fn(&I) -> usize,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<I>, Status> {
        let remaining = entries.get(resume.0..).unwrap_or_default();
        let limit = self.page_limit.unwrap_or(usize::MAX);
        let mut budget = page_hint;
        let mut taken = 0usize;
        for entry in remaining.iter().take(limit) {
            let Some(left) = budget.checked_sub(cost(entry)) else {
                break;
            };
            budget = left;
            taken += 1;
        }
        if taken == 0 && !remaining.is_empty() {
            return Err(Status::BufferTooSmall);
        }
        let page: Vec<I> = remaining.iter().take(taken).cloned().collect();
        Ok(RawPage {
            total_entries: remaining.len(),
            resume: ResumeToken(resume.0 + taken),
            more: taken < remaining.len(),
            entries: page,
        })
    }
}

fn wide_cost(s: &U16CStr) -> usize {
    (s.len() + 1) * 2
}

fn user_cost(user: &UserInfo) -> usize {
    ENTRY_OVERHEAD + wide_cost(&user.name) + wide_cost(&user.full_name) + wide_cost(&user.home_dir)
}

fn group_cost(group: &GroupInfo) -> usize {
    ENTRY_OVERHEAD
        + wide_cost(&group.name)
        + group.members.iter().map(|m| wide_cost(m)).sum::<usize>()
}

impl Directory for MemoryDirectory {
    fn user_info(&self, name: &U16CStr, level: u32) -> Result<UserInfo, Status> {
        self.enter(Call::UserInfo)?;
        if level != USER_LEVEL {
            return Err(Status::InvalidLevel);
        }
        self.users
            .iter()
            .find(|user| user.name.as_ucstr() == name)
            .cloned()
            .ok_or(Status::UserNotFound)
    }

    fn enum_users(
        &self,
        level: u32,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<UserInfo>, Status> {
        self.enter(Call::EnumUsers)?;
        if level != USER_LEVEL {
            return Err(Status::InvalidLevel);
        }
        self.page(&self.users, user_cost, page_hint, resume)
    }

    fn group_info(&self, name: &U16CStr, level: u32) -> Result<GroupInfo, Status> {
        self.enter(Call::GroupInfo)?;
        if level != GROUP_LEVEL {
            return Err(Status::InvalidLevel);
        }
        self.groups
            .iter()
            .find(|group| group.name.as_ucstr() == name)
            .cloned()
            .ok_or(Status::GroupNotFound)
    }

    fn enum_groups(
        &self,
        level: u32,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<GroupInfo>, Status> {
        self.enter(Call::EnumGroups)?;
        if level != GROUP_LEVEL {
            return Err(Status::InvalidLevel);
        }
        self.page(&self.groups, group_cost, page_hint, resume)
    }

    fn current_user_name(&self, effective: bool) -> Result<U16CString, Status> {
        self.enter(Call::CurrentUserName)?;
        let user = if effective {
            &self.effective_user
        } else {
            &self.real_user
        };
        user.clone().ok_or(Status::UserNotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use widestring::u16cstr;

    fn sample(count: u32) -> MemoryDirectory {
        (0..count).fold(MemoryDirectory::new(), |dir, i| {
            dir.with_user(UserInfo::new(&format!("user{i}"), 1000 + i, 513))
        })
    }

    #[test]
    fn pages_follow_the_byte_budget() {
        let dir = sample(5);
        let one = user_cost(&dir.users[0]);
        let page = dir.enum_users(USER_LEVEL, one * 2, ResumeToken::START).unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.total_entries, 5);
        assert!(page.more);
        let page = dir.enum_users(USER_LEVEL, one * 10, page.resume).unwrap();
        assert_eq!(page.entries.len(), 3);
        assert_eq!(page.total_entries, 3);
        assert!(!page.more);
    }

    #[test]
    fn tiny_hint_reports_buffer_too_small() {
        let dir = sample(1);
        assert_eq!(
            dir.enum_users(USER_LEVEL, 1, ResumeToken::START),
            Err(Status::BufferTooSmall)
        );
    }

    #[test]
    fn page_limit_caps_entries() {
        let dir = sample(4).with_page_limit(1);
        let page = dir.enum_users(USER_LEVEL, usize::MAX, ResumeToken::START).unwrap();
        assert_eq!(page.entries.len(), 1);
    }

    #[test]
    fn injected_failures_and_counters() {
        let dir = sample(1);
        dir.fail_next(Call::UserInfo, Status::AccessDenied);
        assert_eq!(
            dir.user_info(u16cstr!("user0"), USER_LEVEL),
            Err(Status::AccessDenied)
        );
        assert!(dir.user_info(u16cstr!("user0"), USER_LEVEL).is_ok());
        dir.fail_always(Call::EnumUsers, Status::BadNetPath);
        for _ in 0..2 {
            assert_eq!(
                dir.enum_users(USER_LEVEL, 4096, ResumeToken::START),
                Err(Status::BadNetPath)
            );
        }
        dir.heal();
        assert!(dir.enum_users(USER_LEVEL, 4096, ResumeToken::START).is_ok());
        assert_eq!(dir.calls(Call::UserInfo), 2);
        assert_eq!(dir.calls(Call::EnumUsers), 3);
        assert_eq!(dir.total_calls(), 5);
    }

    #[test]
    fn wrong_level_is_rejected() {
        let dir = sample(1);
        assert_eq!(
            dir.user_info(u16cstr!("user0"), GROUP_LEVEL),
            Err(Status::InvalidLevel)
        );
    }
}
