//! FFI interface for C++ interop
//!
//! Provides C-compatible functions for extracting product fields from HTML.
//! Requests and results cross the boundary as JSON.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use serde::Serialize;
use tracing::warn;

use crate::extractors::{extract_product, ExtractionRequest};
use crate::trainees::TraineeRegistry;

/// Result struct returned to C++
/// Both pointers are owned by Rust and must be freed via free_extraction_result
#[repr(C)]
pub struct ExtractionResultFFI {
    /// JSON-serialized result (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if extraction failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Extract title, price and image from HTML.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `request_json` - JSON-serialized ExtractionRequest (null-terminated), or
///   null for the default request
///
/// # Returns
/// ExtractionResultFFI with either json_ptr set (success) or error_ptr set (failure)
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `request_json` must be null or a valid null-terminated C string
/// - Caller must free the result via `free_extraction_result`
#[no_mangle]
pub unsafe extern "C" fn extract_product_from_html(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    let html = if html_ptr.is_null() || html_len == 0 {
        ""
    } else {
        let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
        match std::str::from_utf8(slice) {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in HTML content"),
        }
    };

    let request = if request_json.is_null() {
        ExtractionRequest::default()
    } else {
        let request_str = match CStr::from_ptr(request_json).to_str() {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in request JSON"),
        };
        match serde_json::from_str(request_str) {
            Ok(r) => r,
            Err(e) => return make_error_result(&format!("Failed to parse request JSON: {}", e)),
        }
    };

    match extract_product(html, &request) {
        Ok(result) => make_json_result(&result),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// List the trainable rulesets with their seed coefficients and slot names.
///
/// Caller must free the result via `free_extraction_result`
#[no_mangle]
pub extern "C" fn list_trainees_ffi() -> ExtractionResultFFI {
    make_json_result(&TraineeRegistry::standard().summaries())
}

/// Free an ExtractionResultFFI returned by this module
///
/// # Safety
/// - `result` must have been returned by a function in this module
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_extraction_result(result: ExtractionResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

fn make_json_result<T: Serialize>(value: &T) -> ExtractionResultFFI {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ExtractionResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> ExtractionResultFFI {
    warn!(error = msg, "Extraction failed");
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    ExtractionResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<body>
        <img id="main-image" src="/widget.jpg" width="500" height="500">
        <h1>Acme Widget</h1>
        <span class="price">$19.99</span>
    </body>"#;

    unsafe fn take(result: ExtractionResultFFI) -> Result<serde_json::Value, String> {
        let out = if result.error_ptr.is_null() {
            let json = CStr::from_ptr(result.json_ptr).to_str().unwrap();
            Ok(serde_json::from_str(json).unwrap())
        } else {
            Err(CStr::from_ptr(result.error_ptr).to_str().unwrap().to_string())
        };
        free_extraction_result(result);
        out
    }

    #[test]
    fn test_extract_product_from_html() {
        let request = CString::new(r#"{"base_url": "https://example.com/p/1"}"#).unwrap();
        let value = unsafe {
            take(extract_product_from_html(
                HTML.as_ptr() as *const c_char,
                HTML.len(),
                request.as_ptr(),
            ))
        }
        .unwrap();

        assert_eq!(value["product"]["title"]["value"], "Acme Widget");
        assert_eq!(value["product"]["title"]["source"], "ruleset");
        assert_eq!(value["product"]["price"]["value"], "$19.99");
        assert_eq!(value["product"]["price_amount"], 19.99);
        assert_eq!(value["product"]["image"]["value"], "https://example.com/widget.jpg");
        assert!(value.get("rankings").is_none());
    }

    #[test]
    fn test_null_request_uses_defaults() {
        let value = unsafe {
            take(extract_product_from_html(
                HTML.as_ptr() as *const c_char,
                HTML.len(),
                ptr::null(),
            ))
        }
        .unwrap();
        assert_eq!(value["product"]["image"]["value"], "/widget.jpg");
    }

    #[test]
    fn test_errors_are_reported() {
        let bad_json = CString::new("{not json").unwrap();
        let err = unsafe {
            take(extract_product_from_html(
                HTML.as_ptr() as *const c_char,
                HTML.len(),
                bad_json.as_ptr(),
            ))
        }
        .unwrap_err();
        assert!(err.starts_with("Failed to parse request JSON"));

        let short = CString::new(r#"{"coefficients": {"image": [1.0]}}"#).unwrap();
        let err = unsafe {
            take(extract_product_from_html(
                HTML.as_ptr() as *const c_char,
                HTML.len(),
                short.as_ptr(),
            ))
        }
        .unwrap_err();
        assert_eq!(err, "image ruleset expects 14 coefficients, got 1");

        let invalid = [0xffu8, 0xfe];
        let err = unsafe {
            take(extract_product_from_html(
                invalid.as_ptr() as *const c_char,
                invalid.len(),
                ptr::null(),
            ))
        }
        .unwrap_err();
        assert_eq!(err, "Invalid UTF-8 in HTML content");
    }

    #[test]
    fn test_list_trainees() {
        let value = unsafe { take(list_trainees_ffi()) }.unwrap();
        let names: Vec<_> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["image", "price", "title"]);
        assert_eq!(value[0]["coeffs"].as_array().unwrap().len(), 4);
    }
}
