//! FFI safety wrappers.

use std::ffi::CStr;
use std::os::raw::c_char;

/// Converts a C string pointer to a Rust `String`.
///
/// Returns `None` if the pointer is null or not UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives the call.
pub unsafe fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_c_str_to_string() {
        let owned = CString::new("memory-storage").unwrap();
        assert_eq!(
            unsafe { c_str_to_string(owned.as_ptr()) }.as_deref(),
            Some("memory-storage")
        );
        assert_eq!(unsafe { c_str_to_string(std::ptr::null()) }, None);
    }
}
