use thiserror::Error;

/// Failure kinds reported by every lookup entry point.
///
/// Each platform status is mapped to exactly one kind. Use [`Error::errno`]
/// when the result has to be handed to code that expects the C `errno`
/// convention of `<pwd.h>` and `<grp.h>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// No account matches the query.
    #[error("no matching account")]
    NotFound,
    /// The account service denied access.
    #[error("access to the account directory was denied")]
    PermissionDenied,
    /// The account service could not be reached.
    #[error("account directory host unreachable")]
    HostUnreachable,
    /// Empty or unconvertible input, or an unsupported query level.
    #[error("invalid argument")]
    InvalidArgument,
    /// The caller buffer of a reentrant lookup is too small for the result.
    #[error("buffer too small for the result")]
    InsufficientBuffer,
    /// Any platform failure that has no better classification.
    #[error("account directory I/O error")]
    Io,
}

impl Error {
    /// The POSIX `errno` value for this error.
    ///
    /// # Examples
    /// ```rust
    /// # use wusers::Error;
    /// assert_ne!(Error::InsufficientBuffer.errno(), Error::NotFound.errno());
    /// ```
    #[inline]
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::NotFound => errno::ENOENT,
            Self::PermissionDenied => errno::EACCES,
            Self::HostUnreachable => errno::EHOSTUNREACH,
            Self::InvalidArgument => errno::EINVAL,
            Self::InsufficientBuffer => errno::ERANGE,
            Self::Io => errno::EIO,
        }
    }
}

impl From<layout::LayoutError> for Error {
    #[inline]
    fn from(err: layout::LayoutError) -> Self {
        tracing::warn!(%err, "record layout rejected");
        Self::Io
    }
}

#[cfg(unix)]
mod errno {
    pub use libc::{EACCES, EHOSTUNREACH, EINVAL, EIO, ENOENT, ERANGE};
}

// Values from the UCRT <errno.h>.
#[cfg(not(unix))]
mod errno {
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EACCES: i32 = 13;
    pub const EINVAL: i32 = 22;
    pub const ERANGE: i32 = 34;
    pub const EHOSTUNREACH: i32 = 110;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_values_are_distinct() {
        let all = [
            Error::NotFound,
            Error::PermissionDenied,
            Error::HostUnreachable,
            Error::InvalidArgument,
            Error::InsufficientBuffer,
            Error::Io,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                assert_ne!(a.errno(), b.errno(), "{a} and {b} share an errno");
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn range_maps_to_erange() {
        assert_eq!(Error::InsufficientBuffer.errno(), libc::ERANGE);
    }
}
