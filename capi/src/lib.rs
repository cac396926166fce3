#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::slice;

use bregex::{Capture, Regex};

/// A compiled regular expression.
pub struct BRX_REGEX(Regex);

/// The span of one capturing group within the subject, as a byte offset
/// and a length.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BRX_CAPTURE {
    pub offset: usize,
    pub length: usize,
}

/// Compiles a pattern of `len` bytes.
///
/// Returns a null pointer when the pattern is malformed. On success the
/// returned regex must be destroyed with [`brx_regex_destroy`]. The regex
/// never refers back to `pattern`, which can be freed right after this
/// call. A compiled regex is immutable and can be used from any number of
/// threads at the same time.
#[no_mangle]
pub unsafe extern "C" fn brx_compile(
    pattern: *const u8,
    len: usize,
) -> *mut BRX_REGEX {
    if pattern.is_null() && len > 0 {
        return std::ptr::null_mut();
    }
    let pattern =
        if len == 0 { &[][..] } else { slice::from_raw_parts(pattern, len) };
    match bregex::compile(pattern) {
        Ok(regex) => Box::into_raw(Box::new(BRX_REGEX(regex))),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Creates an empty regex backed by storage for at most `capacity`
/// instructions, to be filled with [`brx_regex_parse`].
///
/// Until parsed, the empty regex matches any subject. It must be destroyed
/// with [`brx_regex_destroy`].
#[no_mangle]
pub unsafe extern "C" fn brx_regex_new(capacity: usize) -> *mut BRX_REGEX {
    Box::into_raw(Box::new(BRX_REGEX(Regex::with_capacity(capacity))))
}

/// Compiles a pattern into an existing regex, under the same validation
/// rules as [`brx_compile`] plus the regex's instruction capacity.
///
/// Returns `true` on success. Returns `false`, leaving the regex cleared,
/// when the pattern is malformed or its compiled form doesn't fit in the
/// capacity the regex was created with.
#[no_mangle]
pub unsafe extern "C" fn brx_regex_parse(
    regex: *mut BRX_REGEX,
    pattern: *const u8,
    len: usize,
) -> bool {
    let Some(regex) = regex.as_mut() else {
        return false;
    };
    if pattern.is_null() && len > 0 {
        return false;
    }
    let pattern =
        if len == 0 { &[][..] } else { slice::from_raw_parts(pattern, len) };
    regex.0.parse_into(pattern)
}

/// Matches a subject of `len` bytes against a compiled regex.
///
/// A null `regex` is the always-matching sentinel: the function returns
/// `true` for any subject. `captures` may be null (or `capacity` zero)
/// when the caller doesn't need capture spans; otherwise, on success, the
/// span of the i-th capturing group (in the order the groups open in the
/// pattern) is written to `captures[i]`. Entries for groups that did not
/// participate in the match, and entries beyond `capacity`, are left
/// exactly as the caller initialized them. Nothing is written unless the
/// whole match succeeds.
#[no_mangle]
pub unsafe extern "C" fn brx_regex_match(
    regex: *const BRX_REGEX,
    subject: *const u8,
    len: usize,
    captures: *mut BRX_CAPTURE,
    capacity: usize,
) -> bool {
    let Some(regex) = regex.as_ref() else {
        return true;
    };
    if subject.is_null() && len > 0 {
        return false;
    }
    let subject =
        if len == 0 { &[][..] } else { slice::from_raw_parts(subject, len) };

    if captures.is_null() || capacity == 0 {
        return regex.0.matches(subject);
    }

    let out = slice::from_raw_parts_mut(captures, capacity);
    let mut staged: Vec<Capture> = out
        .iter()
        .map(|c| Capture { offset: c.offset, length: c.length })
        .collect();
    let matched = regex.0.captures(subject, &mut staged);
    if matched {
        for (entry, capture) in out.iter_mut().zip(staged) {
            entry.offset = capture.offset;
            entry.length = capture.length;
        }
    }
    matched
}

/// Destroys a regex created by [`brx_compile`] or [`brx_regex_new`],
/// releasing everything it owns. Passing a null pointer is a no-op.
#[no_mangle]
pub unsafe extern "C" fn brx_regex_destroy(regex: *mut BRX_REGEX) {
    if !regex.is_null() {
        drop(Box::from_raw(regex))
    }
}

#[cfg(test)]
mod tests;
