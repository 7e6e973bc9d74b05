use super::{CodePage, EncodeError};

pub(super) fn decode(code_page: CodePage, narrow: &[u8]) -> Result<Vec<u16>, EncodeError> {
    let invalid = EncodeError::Invalid(code_page.id());
    match code_page {
        CodePage::UTF8 => core::str::from_utf8(narrow)
            .map(|s| s.encode_utf16().collect())
            .map_err(|_| invalid),
        CodePage::US_ASCII => narrow
            .iter()
            .map(|&b| if b.is_ascii() { Ok(u16::from(b)) } else { Err(invalid) })
            .collect(),
        CodePage::LATIN1 => Ok(narrow.iter().map(|&b| u16::from(b)).collect()),
        _ => Err(invalid),
    }
}

/// Feeds the encoded bytes of every character of `wide` to `sink`.
fn each_encoded<F>(code_page: CodePage, wide: &[u16], mut sink: F) -> Result<(), EncodeError>
where
    F: FnMut(&[u8]) -> Result<(), EncodeError>,
{
    let invalid = EncodeError::Invalid(code_page.id());
    for ch in char::decode_utf16(wide.iter().copied()) {
        let ch = ch.map_err(|_| invalid)?;
        match code_page {
            CodePage::UTF8 => {
                let mut utf8 = [0u8; 4];
                sink(ch.encode_utf8(&mut utf8).as_bytes())?;
            }
            CodePage::US_ASCII | CodePage::LATIN1 => {
                let byte = u8::try_from(u32::from(ch)).map_err(|_| invalid)?;
                if code_page == CodePage::US_ASCII && !byte.is_ascii() {
                    return Err(invalid);
                }
                sink(&[byte])?;
            }
            _ => return Err(invalid),
        }
    }
    Ok(())
}

pub(super) fn encoded_len(code_page: CodePage, wide: &[u16]) -> Result<usize, EncodeError> {
    let mut len = 0usize;
    each_encoded(code_page, wide, |bytes| {
        len += bytes.len();
        Ok(())
    })?;
    Ok(len)
}

pub(super) fn encode_into(
    code_page: CodePage,
    wide: &[u16],
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    let mut written = 0usize;
    each_encoded(code_page, wide, |bytes| {
        let target = out
            .get_mut(written..written + bytes.len())
            .ok_or(EncodeError::InsufficientBuffer)?;
        target.copy_from_slice(bytes);
        written += bytes.len();
        Ok(())
    })?;
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
#[allow(clippy::indexing_slicing, reason = "Indexing is not an issue in test")]
mod tests {
    use super::*;

    #[test]
    fn unsupported_code_page_is_invalid() {
        let shift_jis = CodePage::new(932);
        assert_eq!(decode(shift_jis, b"a"), Err(EncodeError::Invalid(932)));
        assert_eq!(encoded_len(shift_jis, &[0x61]), Err(EncodeError::Invalid(932)));
    }

    #[test]
    fn lone_surrogate_is_invalid() {
        assert_eq!(
            encoded_len(CodePage::UTF8, &[0xD800]),
            Err(EncodeError::Invalid(CodePage::UTF8.id()))
        );
    }

    #[test]
    fn multibyte_expansion_is_counted() {
        // U+00E9 and U+1F600 take 2 and 4 bytes in UTF-8.
        let wide: Vec<u16> = "\u{e9}\u{1f600}".encode_utf16().collect();
        assert_eq!(encoded_len(CodePage::UTF8, &wide).unwrap(), 6);
        assert_eq!(encoded_len(CodePage::LATIN1, &wide[..1]).unwrap(), 1);
    }
}
