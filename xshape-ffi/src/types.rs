use std::ffi::CString;

/// Owned, NUL-terminated UTF-8 string handed to the caller.
///
/// Release with `xshape_string_free`.
#[repr(C)]
pub struct FfiString {
    pub ptr: *mut std::os::raw::c_char,
}

impl From<String> for FfiString {
    fn from(value: String) -> Self {
        // Interior NULs cannot cross the boundary; replace them rather than fail.
        let c = CString::new(value).unwrap_or_else(|err| {
            let mut bytes = err.into_vec();
            bytes.retain(|b| *b != 0);
            CString::new(bytes).unwrap_or_default()
        });
        FfiString { ptr: c.into_raw() }
    }
}
