use xshape_core::ErrorKind;

/// Classification of a failed call, mirroring [`ErrorKind`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorKind {
    None,
    TypeMismatch,
    InvalidQuery,
    Runtime,
    /// A pointer argument was null or not UTF-8.
    InvalidArgument,
}

impl From<ErrorKind> for FfiErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::TypeMismatch => FfiErrorKind::TypeMismatch,
            ErrorKind::InvalidQuery => FfiErrorKind::InvalidQuery,
            ErrorKind::Runtime => FfiErrorKind::Runtime,
        }
    }
}

#[repr(C)]
pub struct FfiResult<T> {
    pub ok: bool,
    pub value: T,
    pub kind: FfiErrorKind,
    pub error: *mut std::os::raw::c_char,
}

impl<T> FfiResult<T> {
    pub fn ok(value: T) -> Self {
        Self {
            ok: true,
            value,
            kind: FfiErrorKind::None,
            error: std::ptr::null_mut(),
        }
    }

    pub fn err(kind: FfiErrorKind, message: String) -> Self {
        let c = std::ffi::CString::new(message).unwrap_or_else(|_| {
            std::ffi::CString::new("ffi error").unwrap_or_default()
        });
        Self {
            ok: false,
            value: unsafe { std::mem::zeroed() },
            kind,
            error: c.into_raw(),
        }
    }

    pub fn invalid_argument(message: String) -> Self {
        Self::err(FfiErrorKind::InvalidArgument, message)
    }
}

impl<T> From<xshape_core::Error> for FfiResult<T> {
    fn from(err: xshape_core::Error) -> Self {
        Self::err(err.kind().into(), err.to_string())
    }
}

#[unsafe(no_mangle)]
/// # Safety
/// `error` must be null or a pointer previously returned in `FfiResult::error`,
/// and must not be freed twice.
pub unsafe extern "C" fn xshape_error_free(error: *mut std::os::raw::c_char) {
    if !error.is_null() {
        unsafe { drop(std::ffi::CString::from_raw(error)) };
    }
}
