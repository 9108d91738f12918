//! C ABI bindings for xshape.
//!
//! Every call returns an [`FfiResult`]. On failure `error` holds an owned
//! message (release with [`xshape_error_free`]) and `kind` classifies it.
use std::ffi::CStr;
use std::os::raw::c_char;

use xshape_core::{PrettyPrintOptions, TransformOptions};

mod error;
mod types;

pub use error::{FfiErrorKind, FfiResult, xshape_error_free};
pub use types::FfiString;

fn required_string(ptr: *const c_char, label: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("{label} is null"));
    }
    let value = unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| format!("{label} is not valid utf-8"))?;
    Ok(value.to_string())
}

/// A null pointer means default options.
fn options_from_ptr(ptr: *const c_char) -> Result<TransformOptions, (FfiErrorKind, String)> {
    if ptr.is_null() {
        return Ok(TransformOptions::default());
    }
    let json =
        required_string(ptr, "options").map_err(|message| (FfiErrorKind::InvalidArgument, message))?;
    TransformOptions::from_json(&json).map_err(|err| {
        let err = xshape_core::Error::from(err);
        (err.kind().into(), err.to_string())
    })
}

macro_rules! try_ffi {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(message) => return FfiResult::invalid_argument(message),
        }
    };
}

macro_rules! try_options {
    ($ptr:expr) => {
        match options_from_ptr($ptr) {
            Ok(options) => options,
            Err((kind, message)) => return FfiResult::err(kind, message),
        }
    };
}

#[unsafe(no_mangle)]
/// # Safety
/// `value` must have been returned by this library and not freed before.
pub unsafe extern "C" fn xshape_string_free(value: FfiString) {
    if !value.ptr.is_null() {
        unsafe { drop(std::ffi::CString::from_raw(value.ptr)) };
    }
}

#[unsafe(no_mangle)]
/// Library version as a static string; do not free.
pub extern "C" fn xshape_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

#[unsafe(no_mangle)]
/// Shape `xml` with the JSON `template` and return the result as JSON text.
///
/// `options` is a JSON object such as `{"check":"valid_xml"}`, or null.
///
/// # Safety
/// `xml` and `template` must be valid NUL-terminated strings; `options` must
/// be null or a valid NUL-terminated string.
pub unsafe extern "C" fn xshape_transform(
    xml: *const c_char,
    template: *const c_char,
    options: *const c_char,
) -> FfiResult<FfiString> {
    let xml = try_ffi!(required_string(xml, "xml"));
    let template = try_ffi!(required_string(template, "template"));
    let options = try_options!(options);
    let template: serde_json::Value = match serde_json::from_str(&template) {
        Ok(value) => value,
        Err(err) => {
            return FfiResult::err(
                FfiErrorKind::TypeMismatch,
                format!("template is not valid json: {err}"),
            );
        }
    };
    match xshape_core::transform(&xml, &template, &options) {
        Ok(value) => FfiResult::ok(FfiString::from(value.to_string())),
        Err(err) => err.into(),
    }
}

#[unsafe(no_mangle)]
/// Convert `xml` into the generic JSON tree and return it as JSON text.
///
/// # Safety
/// `xml` must be a valid NUL-terminated string; `options` must be null or a
/// valid NUL-terminated string.
pub unsafe extern "C" fn xshape_to_json(
    xml: *const c_char,
    options: *const c_char,
) -> FfiResult<FfiString> {
    let xml = try_ffi!(required_string(xml, "xml"));
    let options = try_options!(options);
    match xshape_core::to_json(&xml, &options) {
        Ok(value) => FfiResult::ok(FfiString::from(value.to_string())),
        Err(err) => err.into(),
    }
}

#[unsafe(no_mangle)]
/// # Safety
/// `xml` must be a valid NUL-terminated string; `options` must be null or a
/// valid NUL-terminated string.
pub unsafe extern "C" fn xshape_pretty_print(
    xml: *const c_char,
    indent_size: usize,
    options: *const c_char,
) -> FfiResult<FfiString> {
    let xml = try_ffi!(required_string(xml, "xml"));
    let options = try_options!(options);
    match xshape_core::pretty_print(&xml, &PrettyPrintOptions::new(indent_size), &options) {
        Ok(value) => FfiResult::ok(FfiString::from(value)),
        Err(err) => err.into(),
    }
}

#[unsafe(no_mangle)]
/// Succeeds with `true` when `xml` is well-formed.
///
/// # Safety
/// `xml` must be a valid NUL-terminated string.
pub unsafe extern "C" fn xshape_check(xml: *const c_char) -> FfiResult<bool> {
    let xml = try_ffi!(required_string(xml, "xml"));
    match xshape_core::document::check_well_formed(&xml) {
        Ok(()) => FfiResult::ok(true),
        Err(err) => xshape_core::Error::from(err).into(),
    }
}
