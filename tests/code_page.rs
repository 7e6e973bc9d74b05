// The process-wide override is global state; this binary holds the only test
// that touches it.
#![allow(clippy::unwrap_used, reason = "Unwrap is not an issue in tests")]

use std::thread;

use widestring::U16CString;
use wusers::codepage::{self, CodePage, set_process_code_page, set_thread_code_page};
use wusers::{Lookup, MemoryDirectory, UserInfo};

fn narrow_in_current_code_page(text: &str) -> Vec<u8> {
    let wide = U16CString::from_str_truncate(text);
    codepage::to_narrow(&wide).unwrap().into_bytes()
}

#[test]
fn thread_then_process_then_utf8() {
    assert_eq!(CodePage::current(), CodePage::UTF8);

    set_process_code_page(Some(CodePage::LATIN1));
    assert_eq!(codepage::process_code_page(), Some(CodePage::LATIN1));
    assert_eq!(CodePage::current(), CodePage::LATIN1);
    assert_eq!(narrow_in_current_code_page("caf\u{e9}"), b"caf\xe9");
    // Every thread without its own override follows the process override.
    let other = thread::spawn(CodePage::current).join().unwrap();
    assert_eq!(other, CodePage::LATIN1);

    let cafe = UserInfo::new("caf", 2000, 513).with_full_name("Caf\u{e9}");
    let mut lookup = Lookup::new(MemoryDirectory::new().with_user(cafe));
    assert_eq!(lookup.getpwuid(2000).unwrap().gecos.to_bytes(), b"Caf\xe9");

    set_thread_code_page(Some(CodePage::UTF8));
    assert_eq!(CodePage::current(), CodePage::UTF8);
    assert_eq!(narrow_in_current_code_page("caf\u{e9}"), "caf\u{e9}".as_bytes());
    assert_eq!(
        lookup.getpwuid(2000).unwrap().gecos.to_bytes(),
        "Caf\u{e9}".as_bytes()
    );
    let other = thread::spawn(CodePage::current).join().unwrap();
    assert_eq!(other, CodePage::LATIN1);

    set_thread_code_page(None);
    set_process_code_page(None);
    assert_eq!(codepage::process_code_page(), None);
    assert_eq!(CodePage::current(), CodePage::UTF8);
    assert_eq!(narrow_in_current_code_page("caf\u{e9}"), "caf\u{e9}".as_bytes());
}
