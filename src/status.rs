use core::num::NonZeroU32;

use crate::Error;

// Win32 / LAN Manager status codes returned by the NetApi account functions.
pub(crate) const ERROR_ACCESS_DENIED: u32 = 5;
pub(crate) const ERROR_BAD_NETPATH: u32 = 53;
pub(crate) const ERROR_INVALID_PARAMETER: u32 = 87;
pub(crate) const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
pub(crate) const ERROR_INVALID_LEVEL: u32 = 124;
pub(crate) const ERROR_MORE_DATA: u32 = 234;
pub(crate) const ERROR_NO_UNICODE_TRANSLATION: u32 = 1113;
pub(crate) const NERR_BUF_TOO_SMALL: u32 = 2123;
pub(crate) const NERR_GROUP_NOT_FOUND: u32 = 2220;
pub(crate) const NERR_USER_NOT_FOUND: u32 = 2221;
pub(crate) const NERR_INVALID_COMPUTER: u32 = 2351;

/// Non-success status reported by a [`Directory`](crate::Directory) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The caller may not read the account database.
    AccessDenied,
    /// The server name does not resolve.
    BadNetPath,
    /// A parameter is invalid.
    InvalidParameter,
    /// The requested information level is not supported.
    InvalidLevel,
    /// The server name is not a valid computer name.
    InvalidComputer,
    /// No user account with the given name.
    UserNotFound,
    /// No group account with the given name.
    GroupNotFound,
    /// The preferred page length cannot hold a single entry; retry with a larger one.
    BufferTooSmall,
    /// The output buffer is too small.
    InsufficientBuffer,
    /// More entries are available than were returned.
    MoreData,
    /// A string could not be translated.
    NoUnicodeTranslation,
    /// Any other Win32 error code not handled above.
    Other(u32),
}

impl From<NonZeroU32> for Status {
    #[inline]
    fn from(code: NonZeroU32) -> Self {
        match code.get() {
            ERROR_ACCESS_DENIED => Self::AccessDenied,
            ERROR_BAD_NETPATH => Self::BadNetPath,
            ERROR_INVALID_PARAMETER => Self::InvalidParameter,
            ERROR_INVALID_LEVEL => Self::InvalidLevel,
            NERR_INVALID_COMPUTER => Self::InvalidComputer,
            NERR_USER_NOT_FOUND => Self::UserNotFound,
            NERR_GROUP_NOT_FOUND => Self::GroupNotFound,
            NERR_BUF_TOO_SMALL => Self::BufferTooSmall,
            ERROR_INSUFFICIENT_BUFFER => Self::InsufficientBuffer,
            ERROR_MORE_DATA => Self::MoreData,
            ERROR_NO_UNICODE_TRANSLATION => Self::NoUnicodeTranslation,
            other => Self::Other(other),
        }
    }
}

impl From<Status> for u32 {
    #[inline]
    fn from(status: Status) -> Self {
        match status {
            Status::AccessDenied => ERROR_ACCESS_DENIED,
            Status::BadNetPath => ERROR_BAD_NETPATH,
            Status::InvalidParameter => ERROR_INVALID_PARAMETER,
            Status::InvalidLevel => ERROR_INVALID_LEVEL,
            Status::InvalidComputer => NERR_INVALID_COMPUTER,
            Status::UserNotFound => NERR_USER_NOT_FOUND,
            Status::GroupNotFound => NERR_GROUP_NOT_FOUND,
            Status::BufferTooSmall => NERR_BUF_TOO_SMALL,
            Status::InsufficientBuffer => ERROR_INSUFFICIENT_BUFFER,
            Status::MoreData => ERROR_MORE_DATA,
            Status::NoUnicodeTranslation => ERROR_NO_UNICODE_TRANSLATION,
            Status::Other(other) => other,
        }
    }
}

impl Status {
    /// Classifies a status that is not a "not found" answer for the queried kind.
    ///
    /// Not-found codes are kind specific and are matched by the caller against
    /// [`EntityKind::NOT_FOUND`](crate::EntityKind::NOT_FOUND) first.
    #[must_use]
    pub(crate) fn into_error(self) -> Error {
        let error = match self {
            Self::AccessDenied => Error::PermissionDenied,
            Self::InvalidLevel | Self::InvalidParameter | Self::NoUnicodeTranslation => {
                Error::InvalidArgument
            }
            Self::BadNetPath | Self::InvalidComputer => Error::HostUnreachable,
            Self::UserNotFound | Self::GroupNotFound => Error::NotFound,
            Self::BufferTooSmall | Self::InsufficientBuffer | Self::MoreData | Self::Other(_) => {
                Error::Io
            }
        };
        tracing::debug!(status = u32::from(self), %error, "directory call failed");
        error
    }
}

#[cfg(all(windows, feature = "windows_result"))]
impl From<Status> for windows_result::HRESULT {
    fn from(value: Status) -> Self {
        let code: u32 = value.into();
        windows_result::HRESULT::from_win32(code)
    }
}

#[cfg(all(windows, feature = "windows_result"))]
impl From<Status> for windows_result::Error {
    fn from(value: Status) -> Self {
        use windows_result::Error;
        let hresult: windows_result::HRESULT = value.into();
        Error::from_hresult(hresult)
    }
}
