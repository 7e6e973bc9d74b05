use core::ptr::{null, null_mut};

use windows_sys::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, GetLastError};
use windows_sys::Win32::Globalization::{MultiByteToWideChar, WideCharToMultiByte};

use super::{CodePage, EncodeError};

pub(super) fn decode(code_page: CodePage, narrow: &[u8]) -> Result<Vec<u16>, EncodeError> {
    let invalid = EncodeError::Invalid(code_page.id());
    let narrow_len = i32::try_from(narrow.len()).map_err(|_| invalid)?;
    // SAFETY: `narrow` is valid for `narrow_len` bytes; a null output with
    // zero length asks for the required size only.
    let needed = unsafe {
        MultiByteToWideChar(code_page.id(), 0, narrow.as_ptr(), narrow_len, null_mut(), 0)
    };
    let capacity = usize::try_from(needed).ok().filter(|&n| n > 0).ok_or(invalid)?;
    let mut wide = vec![0u16; capacity];
    // SAFETY: `wide` holds exactly `needed` elements.
    let written = unsafe {
        MultiByteToWideChar(
            code_page.id(),
            0,
            narrow.as_ptr(),
            narrow_len,
            wide.as_mut_ptr(),
            needed,
        )
    };
    let written = usize::try_from(written).ok().filter(|&n| n > 0).ok_or(invalid)?;
    wide.truncate(written);
    Ok(wide)
}

pub(super) fn encoded_len(code_page: CodePage, wide: &[u16]) -> Result<usize, EncodeError> {
    let invalid = EncodeError::Invalid(code_page.id());
    let wide_len = i32::try_from(wide.len()).map_err(|_| invalid)?;
    // SAFETY: `wide` is valid for `wide_len` units; a null output with zero
    // length asks for the required size only.
    let needed = unsafe {
        WideCharToMultiByte(
            code_page.id(),
            0,
            wide.as_ptr(),
            wide_len,
            null_mut(),
            0,
            null(),
            null_mut(),
        )
    };
    usize::try_from(needed).ok().filter(|&n| n > 0).ok_or(invalid)
}

pub(super) fn encode_into(
    code_page: CodePage,
    wide: &[u16],
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    let invalid = EncodeError::Invalid(code_page.id());
    let wide_len = i32::try_from(wide.len()).map_err(|_| invalid)?;
    if out.is_empty() {
        return Err(EncodeError::InsufficientBuffer);
    }
    let out_len = i32::try_from(out.len()).unwrap_or(i32::MAX);
    // SAFETY: both slices are valid for the lengths passed.
    let written = unsafe {
        WideCharToMultiByte(
            code_page.id(),
            0,
            wide.as_ptr(),
            wide_len,
            out.as_mut_ptr(),
            out_len,
            null(),
            null_mut(),
        )
    };
    if written > 0 {
        return usize::try_from(written).map_err(|_| invalid);
    }
    // SAFETY: GetLastError can be called immediately after a failing FFI call.
    match unsafe { GetLastError() } {
        ERROR_INSUFFICIENT_BUFFER => Err(EncodeError::InsufficientBuffer),
        _ => Err(invalid),
    }
}
