//! Narrow ↔ wide string conversion under a configurable code page.
//!
//! The directory speaks UTF-16; callers of the POSIX surface speak narrow
//! strings. The code page used for a conversion is resolved on every call:
//!
//! 1. the calling thread's override ([`set_thread_code_page`]),
//! 2. the process-wide override ([`set_process_code_page`]),
//! 3. UTF-8.
//!
//! Windows builds delegate to `MultiByteToWideChar`/`WideCharToMultiByte` and
//! therefore accept any installed code page. Other targets support
//! [`CodePage::UTF8`], [`CodePage::US_ASCII`] and [`CodePage::LATIN1`].

use core::cell::Cell;
use core::ffi::CStr;
use core::sync::atomic::{AtomicU32, Ordering};
use std::ffi::CString;

use thiserror::Error as ThisError;
use widestring::{U16CStr, U16CString, U16Str};

use crate::Error;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        use windows as backend;
    } else {
        mod portable;
        use portable as backend;
    }
}

const UNSET: u32 = u32::MAX;

static PROCESS_CODE_PAGE: AtomicU32 = AtomicU32::new(UNSET);

thread_local! {
    static THREAD_CODE_PAGE: Cell<u32> = const { Cell::new(UNSET) };
}

/// A Windows code page identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodePage(u32);

impl CodePage {
    /// `CP_UTF8`, the default.
    pub const UTF8: Self = Self(65001);
    /// US-ASCII.
    pub const US_ASCII: Self = Self(20127);
    /// ISO-8859-1.
    pub const LATIN1: Self = Self(28591);

    /// Wraps a raw code page identifier.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// The code page conversions on this thread use right now.
    #[inline]
    #[must_use]
    pub fn current() -> Self {
        thread_code_page()
            .or_else(process_code_page)
            .unwrap_or(Self::UTF8)
    }
}

const fn decode_slot(raw: u32) -> Option<CodePage> {
    if raw == UNSET {
        None
    } else {
        Some(CodePage(raw))
    }
}

const fn encode_slot(code_page: Option<CodePage>) -> u32 {
    match code_page {
        Some(CodePage(id)) => id,
        None => UNSET,
    }
}

/// Sets (or with `None` clears) the process-wide code page override.
#[inline]
pub fn set_process_code_page(code_page: Option<CodePage>) {
    PROCESS_CODE_PAGE.store(encode_slot(code_page), Ordering::Relaxed);
}

/// Sets (or with `None` clears) the calling thread's code page override.
#[inline]
pub fn set_thread_code_page(code_page: Option<CodePage>) {
    THREAD_CODE_PAGE.with(|slot| slot.set(encode_slot(code_page)));
}

/// The process-wide override, if any.
#[inline]
#[must_use]
pub fn process_code_page() -> Option<CodePage> {
    decode_slot(PROCESS_CODE_PAGE.load(Ordering::Relaxed))
}

/// The calling thread's override, if any.
#[inline]
#[must_use]
pub fn thread_code_page() -> Option<CodePage> {
    decode_slot(THREAD_CODE_PAGE.with(Cell::get))
}

/// Conversion failures of the encoding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum EncodeError {
    /// The target slice cannot hold the converted string.
    #[error("output buffer too small")]
    InsufficientBuffer,
    /// The input cannot be represented in the code page, or the code page is unsupported.
    #[error("string cannot be converted with code page {0}")]
    Invalid(u32),
}

impl From<EncodeError> for Error {
    #[inline]
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::InsufficientBuffer => Self::InsufficientBuffer,
            EncodeError::Invalid(_) => Self::InvalidArgument,
        }
    }
}

/// Converts a narrow string in the current code page to UTF-16.
///
/// # Errors
/// [`Error::InvalidArgument`] if `narrow` is empty and `reject_empty` is set,
/// or if it is not valid in the current code page.
///
/// # Examples
/// ```rust
/// let wide = wusers::codepage::to_wide(c"Ren\u{e9}", true).unwrap();
/// assert_eq!(wide.to_string_lossy(), "Ren\u{e9}");
/// assert!(wusers::codepage::to_wide(c"", true).is_err());
/// ```
#[inline]
pub fn to_wide(narrow: &CStr, reject_empty: bool) -> Result<U16CString, Error> {
    let bytes = narrow.to_bytes();
    if bytes.is_empty() {
        return if reject_empty {
            Err(Error::InvalidArgument)
        } else {
            Ok(U16CString::new())
        };
    }
    let wide = backend::decode(CodePage::current(), bytes)?;
    U16CString::from_vec(wide).map_err(|_| Error::InvalidArgument)
}

/// Converts a UTF-16 string to an owned narrow string in the current code page.
///
/// # Errors
/// [`Error::InvalidArgument`] if the string cannot be represented.
#[inline]
pub fn to_narrow(wide: &U16CStr) -> Result<CString, Error> {
    let code_page = CodePage::current();
    let mut narrow = vec![0u8; encoded_len(code_page, wide.as_ustr())?];
    let written = encode_into(code_page, wide.as_ustr(), &mut narrow)?;
    narrow.truncate(written);
    CString::new(narrow).map_err(|_| Error::InvalidArgument)
}

/// Number of bytes `wide` needs in `code_page`, terminator excluded.
///
/// # Errors
/// [`EncodeError::Invalid`] if the string cannot be represented.
#[inline]
pub fn encoded_len(code_page: CodePage, wide: &U16Str) -> Result<usize, EncodeError> {
    if wide.is_empty() {
        return Ok(0);
    }
    backend::encoded_len(code_page, wide.as_slice())
}

/// Converts `wide` into `out`, returning the number of bytes written.
///
/// No terminator is written.
///
/// # Errors
/// [`EncodeError::InsufficientBuffer`] if `out` is too small, in which case
/// its content is unspecified; [`EncodeError::Invalid`] if the string cannot
/// be represented.
#[inline]
pub fn encode_into(code_page: CodePage, wide: &U16Str, out: &mut [u8]) -> Result<usize, EncodeError> {
    if wide.is_empty() {
        return Ok(0);
    }
    backend::encode_into(code_page, wide.as_slice(), out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use widestring::u16str;

    proptest! {
        #[test]
        fn utf8_narrow_wide_agree(s in r"[^\x00]{1,40}") {
            let narrow = CString::new(s.clone()).unwrap();
            let wide = to_wide(&narrow, true).unwrap();
            prop_assert_eq!(wide.to_string_lossy(), s.clone());
            prop_assert_eq!(encoded_len(CodePage::UTF8, wide.as_ustr()).unwrap(), s.len());
            prop_assert_eq!(to_narrow(&wide).unwrap(), narrow);
        }
    }

    #[test]
    fn thread_override_can_be_set_and_cleared() {
        // The process override is global and tested in its own binary.
        assert_eq!(thread_code_page(), None);
        set_thread_code_page(Some(CodePage::LATIN1));
        assert_eq!(CodePage::current(), CodePage::LATIN1);
        set_thread_code_page(None);
        assert_eq!(thread_code_page(), None);
    }

    #[test]
    fn override_applies_to_the_next_conversion() {
        let wide = U16CString::from_str_truncate("caf\u{e9}");
        set_thread_code_page(Some(CodePage::LATIN1));
        let latin = to_narrow(&wide).unwrap();
        set_thread_code_page(None);
        let utf8 = to_narrow(&wide).unwrap();
        assert_eq!(latin.as_bytes(), b"caf\xe9");
        assert_eq!(utf8.as_bytes(), "caf\u{e9}".as_bytes());
    }

    #[test]
    fn empty_input_policy() {
        assert_eq!(to_wide(c"", true), Err(Error::InvalidArgument));
        assert!(to_wide(c"", false).unwrap().is_empty());
    }

    // WideCharToMultiByte substitutes unmappable characters instead of failing.
    #[cfg(not(windows))]
    #[test]
    fn unrepresentable_character_is_invalid() {
        let err = encoded_len(CodePage::US_ASCII, u16str!("\u{e9}")).unwrap_err();
        assert_eq!(err, EncodeError::Invalid(CodePage::US_ASCII.id()));
        assert_eq!(Error::from(err), Error::InvalidArgument);
    }

    #[test]
    fn short_output_reports_insufficient_buffer() {
        let mut out = [0u8; 3];
        assert_eq!(
            encode_into(CodePage::UTF8, u16str!("abcd"), &mut out),
            Err(EncodeError::InsufficientBuffer)
        );
        assert_eq!(encode_into(CodePage::UTF8, u16str!("abc"), &mut out), Ok(3));
    }

    // MultiByteToWideChar substitutes U+FFFD instead of failing.
    #[cfg(not(windows))]
    #[test]
    fn invalid_utf8_input_is_rejected() {
        let narrow = CStr::from_bytes_with_nul(b"\xff\xfe\0").unwrap();
        assert_eq!(to_wide(narrow, true), Err(Error::InvalidArgument));
    }
}
