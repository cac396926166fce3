use std::ptr;

use crate::{
    brx_compile, brx_regex_destroy, brx_regex_match, brx_regex_new,
    brx_regex_parse, BRX_CAPTURE, BRX_REGEX,
};

fn compile(pattern: &[u8]) -> *mut BRX_REGEX {
    unsafe { brx_compile(pattern.as_ptr(), pattern.len()) }
}

fn matches(regex: *const BRX_REGEX, subject: &[u8]) -> bool {
    unsafe {
        brx_regex_match(
            regex,
            subject.as_ptr(),
            subject.len(),
            ptr::null_mut(),
            0,
        )
    }
}

#[test]
fn compile_match_destroy() {
    let regex = compile(b"^(TEST\\20REGEX)$");
    assert!(!regex.is_null());

    assert!(matches(regex, b"TEST REGEX"));
    assert!(!matches(regex, b" TEST REGEX"));
    assert!(!matches(regex, b"TEST REGEX "));
    assert!(!matches(regex, b"TEST_REGEX"));

    unsafe { brx_regex_destroy(regex) };
}

#[test]
fn null_regex_matches_anything() {
    assert!(matches(ptr::null(), b"TEST REGEX"));
    assert!(matches(ptr::null(), b"zero length string"));
    assert!(matches(ptr::null(), b""));
}

#[test]
fn malformed_patterns_compile_to_null() {
    assert!(compile(b"++??.+*?").is_null());
    assert!(compile(b"(())()(").is_null());
    assert!(compile(b"[\\s][").is_null());
}

#[test]
fn parse_into_preallocated_storage() {
    // No capacity, nothing fits, not even a valid pattern.
    let regex = unsafe { brx_regex_new(0) };
    assert!(!unsafe { brx_regex_parse(regex, b"test".as_ptr(), 4) });
    unsafe { brx_regex_destroy(regex) };

    let regex = unsafe { brx_regex_new(128) };
    let pattern = b"^(\\s+|\\S+)$";
    assert!(unsafe { brx_regex_parse(regex, pattern.as_ptr(), pattern.len()) });
    assert!(matches(regex, b"onetoken"));
    assert!(!matches(regex, b"two tokens"));
    unsafe { brx_regex_destroy(regex) };
}

#[test]
fn captures_are_written_in_open_order() {
    let regex = compile(b"matchthis(\\s+|\\S+)!endofline([abcd\\\\]*)");
    assert!(!regex.is_null());

    let subject: &[u8] = b"but nonmixed at end will matchthisregex!endofline";
    let mut captures = [BRX_CAPTURE { offset: 0, length: 0 }; 16];
    let matched = unsafe {
        brx_regex_match(
            regex,
            subject.as_ptr(),
            subject.len(),
            captures.as_mut_ptr(),
            captures.len(),
        )
    };
    assert!(matched);
    assert_eq!(
        &subject[captures[0].offset..][..captures[0].length],
        b"regex"
    );
    assert_eq!(captures[1].length, 0);
    // There is no group 2; its entry keeps the caller's value.
    assert_eq!(captures[2].offset, 0);
    assert_eq!(captures[2].length, 0);

    unsafe { brx_regex_destroy(regex) };
}
