use core::num::NonZeroU32;
use core::ptr::{null, null_mut};
use core::slice;

use widestring::{U16CStr, U16CString};
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::NetworkManagement::NetManagement::{
    FILTER_NORMAL_ACCOUNT, GROUP_INFO_2, GROUP_USERS_INFO_0, MAX_PREFERRED_LENGTH,
    NetApiBufferFree, NetGroupEnum, NetGroupGetInfo, NetGroupGetUsers, NetUserEnum,
    NetUserGetInfo, USER_INFO_3,
};
use windows_sys::Win32::System::Environment::ExpandEnvironmentStringsW;
use windows_sys::Win32::System::WindowsProgramming::GetUserNameW;

use super::{Directory, GroupInfo, Privilege, RawPage, ResumeToken, UserInfo};
use crate::Status;

/// `UNLEN + 1`
const USER_NAME_CAPACITY: usize = 257;
const PERCENT: u16 = b'%' as u16;

/// The local account database, through the LAN Manager API.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetDirectory;

impl NetDirectory {
    /// Queries the local machine.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Owns a buffer allocated by a `Net*` call.
struct NetApiBuffer(*mut u8);

impl NetApiBuffer {
    const fn new() -> Self {
        Self(null_mut())
    }

    const fn out(&mut self) -> *mut *mut u8 {
        &raw mut self.0
    }

    /// Views the buffer as `count` records.
    ///
    /// # Safety
    /// The buffer must have been filled by a call that returns `count`
    /// consecutive `T`.
    unsafe fn records<T>(&self, count: u32) -> &[T] {
        if self.0.is_null() || count == 0 {
            return &[];
        }
        // SAFETY: guaranteed by the caller; the buffer lives as long as `self`.
        unsafe { slice::from_raw_parts(self.0.cast::<T>(), count as usize) }
    }
}

impl Drop for NetApiBuffer {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer was allocated by the NetApi and is freed once.
            unsafe { NetApiBufferFree(self.0.cast_const().cast()) };
        }
    }
}

fn check(code: u32) -> Result<(), Status> {
    NonZeroU32::new(code).map_or(Ok(()), |code| Err(Status::from(code)))
}

/// `Ok(true)` when more data is available.
fn check_page(code: u32) -> Result<bool, Status> {
    match check(code) {
        Ok(()) => Ok(false),
        Err(Status::MoreData) => Ok(true),
        Err(status) => Err(status),
    }
}

fn last_status() -> Status {
    // SAFETY: GetLastError can be called immediately after a failing FFI call.
    let code = unsafe { GetLastError() };
    NonZeroU32::new(code).map_or(Status::Other(0), Status::from)
}

/// Copies a string owned by a NetApi buffer.
///
/// # Safety
/// `ptr` is null or points to a NUL-terminated UTF-16 string.
unsafe fn copy_wide(ptr: *const u16) -> U16CString {
    if ptr.is_null() {
        return U16CString::new();
    }
    // SAFETY: guaranteed by the caller.
    unsafe { U16CStr::from_ptr_str(ptr) }.to_ucstring()
}

fn expand_environment(value: U16CString) -> U16CString {
    if !value.as_slice().contains(&PERCENT) {
        return value;
    }
    // SAFETY: `value` is NUL-terminated; a null output asks for the size only.
    let needed = unsafe { ExpandEnvironmentStringsW(value.as_ptr(), null_mut(), 0) };
    if needed == 0 {
        return value;
    }
    let mut expanded = vec![0u16; needed as usize];
    // SAFETY: `expanded` holds `needed` units.
    let written =
        unsafe { ExpandEnvironmentStringsW(value.as_ptr(), expanded.as_mut_ptr(), needed) };
    if written == 0 || written > needed {
        tracing::debug!(written, needed, "home directory expansion failed");
        return value;
    }
    U16CString::from_vec_truncate(expanded)
}

fn user_from_raw(raw: &USER_INFO_3) -> UserInfo {
    #[expect(
        clippy::multiple_unsafe_ops_per_block,
        reason = "Same operation so same safety doc"
    )]
    // SAFETY: the string fields of a returned USER_INFO_3 are null or NUL-terminated.
    let (name, full_name, home_dir) = unsafe {
        (
            copy_wide(raw.usri3_name),
            copy_wide(raw.usri3_full_name),
            copy_wide(raw.usri3_home_dir),
        )
    };
    UserInfo {
        name,
        full_name,
        home_dir: expand_environment(home_dir),
        user_id: raw.usri3_user_id,
        primary_group_id: raw.usri3_primary_group_id,
        privilege: Privilege::from_raw(raw.usri3_priv),
        password_expired: raw.usri3_password_expired != 0,
        acct_expires: raw.usri3_acct_expires,
    }
}

fn page_length(page_hint: usize) -> u32 {
    u32::try_from(page_hint).unwrap_or(MAX_PREFERRED_LENGTH)
}

fn group_members(group: &U16CStr) -> Result<Vec<U16CString>, Status> {
    let mut buffer = NetApiBuffer::new();
    let mut read = 0u32;
    let mut total = 0u32;
    // SAFETY: every pointer is valid; a maximal page returns all members at once.
    let code = unsafe {
        NetGroupGetUsers(
            null(),
            group.as_ptr(),
            0,
            buffer.out(),
            MAX_PREFERRED_LENGTH,
            &raw mut read,
            &raw mut total,
            null_mut(),
        )
    };
    check(code)?;
    if read < total {
        tracing::warn!(read, total, "group member list truncated");
    }
    // SAFETY: level 0 fills the buffer with `read` GROUP_USERS_INFO_0.
    let members = unsafe { buffer.records::<GROUP_USERS_INFO_0>(read) };
    Ok(members
        .iter()
        // SAFETY: `grui0_name` is null or NUL-terminated.
        .map(|member| unsafe { copy_wide(member.grui0_name) })
        .collect())
}

fn group_from_raw(raw: &GROUP_INFO_2) -> Result<GroupInfo, Status> {
    // SAFETY: `grpi2_name` is null or NUL-terminated.
    let name = unsafe { copy_wide(raw.grpi2_name) };
    let members = group_members(&name)?;
    Ok(GroupInfo {
        name,
        group_id: raw.grpi2_group_id,
        members,
    })
}

impl Directory for NetDirectory {
    fn user_info(&self, name: &U16CStr, level: u32) -> Result<UserInfo, Status> {
        if level != super::USER_LEVEL {
            return Err(Status::InvalidLevel);
        }
        let mut buffer = NetApiBuffer::new();
        // SAFETY: `name` is NUL-terminated and `buffer.out()` is a valid out pointer.
        check(unsafe { NetUserGetInfo(null(), name.as_ptr(), level, buffer.out()) })?;
        // SAFETY: level 3 fills the buffer with one USER_INFO_3.
        let raw = unsafe { buffer.records::<USER_INFO_3>(1) };
        raw.first().map(user_from_raw).ok_or(Status::UserNotFound)
    }

    fn enum_users(
        &self,
        level: u32,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<UserInfo>, Status> {
        if level != super::USER_LEVEL {
            return Err(Status::InvalidLevel);
        }
        let mut handle = u32::try_from(resume.0).map_err(|_| Status::InvalidParameter)?;
        let mut buffer = NetApiBuffer::new();
        let mut read = 0u32;
        let mut total = 0u32;
        // SAFETY: every out pointer is valid for the duration of the call.
        let code = unsafe {
            NetUserEnum(
                null(),
                level,
                FILTER_NORMAL_ACCOUNT,
                buffer.out(),
                page_length(page_hint),
                &raw mut read,
                &raw mut total,
                &raw mut handle,
            )
        };
        let more = check_page(code)?;
        // SAFETY: level 3 fills the buffer with `read` USER_INFO_3.
        let entries = unsafe { buffer.records::<USER_INFO_3>(read) }
            .iter()
            .map(user_from_raw)
            .collect();
        Ok(RawPage {
            entries,
            total_entries: total as usize,
            resume: ResumeToken(handle as usize),
            more,
        })
    }

    fn group_info(&self, name: &U16CStr, level: u32) -> Result<GroupInfo, Status> {
        if level != super::GROUP_LEVEL {
            return Err(Status::InvalidLevel);
        }
        let mut buffer = NetApiBuffer::new();
        // SAFETY: `name` is NUL-terminated and `buffer.out()` is a valid out pointer.
        check(unsafe { NetGroupGetInfo(null(), name.as_ptr(), level, buffer.out()) })?;
        // SAFETY: level 2 fills the buffer with one GROUP_INFO_2.
        let raw = unsafe { buffer.records::<GROUP_INFO_2>(1) };
        raw.first()
            .ok_or(Status::GroupNotFound)
            .and_then(group_from_raw)
    }

    fn enum_groups(
        &self,
        level: u32,
        page_hint: usize,
        resume: ResumeToken,
    ) -> Result<RawPage<GroupInfo>, Status> {
        if level != super::GROUP_LEVEL {
            return Err(Status::InvalidLevel);
        }
        let mut handle = resume.0;
        let mut buffer = NetApiBuffer::new();
        let mut read = 0u32;
        let mut total = 0u32;
        // SAFETY: every out pointer is valid for the duration of the call.
        let code = unsafe {
            NetGroupEnum(
                null(),
                level,
                buffer.out(),
                page_length(page_hint),
                &raw mut read,
                &raw mut total,
                &raw mut handle,
            )
        };
        let more = check_page(code)?;
        // SAFETY: level 2 fills the buffer with `read` GROUP_INFO_2.
        let entries = unsafe { buffer.records::<GROUP_INFO_2>(read) }
            .iter()
            .map(group_from_raw)
            .collect::<Result<_, _>>()?;
        Ok(RawPage {
            entries,
            total_entries: total as usize,
            resume: ResumeToken(handle),
            more,
        })
    }

    fn current_user_name(&self, effective: bool) -> Result<U16CString, Status> {
        if !effective {
            if let Some(name) = std::env::var_os("USERNAME").filter(|name| !name.is_empty()) {
                return Ok(U16CString::from_os_str_truncate(name));
            }
        }
        let mut name = vec![0u16; USER_NAME_CAPACITY];
        let mut len = USER_NAME_CAPACITY as u32;
        // SAFETY: `name` holds `len` units.
        if unsafe { GetUserNameW(name.as_mut_ptr(), &raw mut len) } == 0 {
            return Err(last_status());
        }
        Ok(U16CString::from_vec_truncate(name))
    }
}
