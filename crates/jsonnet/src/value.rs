//! Value marshaling between `serde_json::Value` and the engine value ABI
//!
//! Host to engine covers the full JSON model, built recursively with the
//! engine's `jsonnet_json_make_*` constructors. Engine to host is limited to
//! what the ABI can extract (null, booleans, numbers, strings), which is
//! exactly what native-function arguments can be. The language has a single
//! number type, so every host numeric becomes a double and `1` comes back
//! indistinguishable from `1.0`.

use std::ffi::{CStr, CString};

use jsonnet_sys as sys;
use serde_json::{Number, Value};

use crate::error::{Error, Result};

/// Convert a host value into an engine value.
///
/// The returned handle is owned by the caller until it is appended to a
/// parent or handed to the engine. On failure every partially built engine
/// value has already been destroyed.
///
/// # Safety
/// `vm` must be a live engine context, and the call must happen on the
/// thread currently driving that context.
pub(crate) unsafe fn to_native(vm: *mut sys::JsonnetVm, value: &Value) -> Result<*mut sys::JsonnetJsonValue> {
    match value {
        Value::Null => Ok(sys::jsonnet_json_make_null(vm)),
        Value::Bool(b) => Ok(sys::jsonnet_json_make_bool(vm, *b as i32)),
        Value::Number(n) => Ok(sys::jsonnet_json_make_number(vm, number_to_f64(n)?)),
        Value::String(s) => string_to_native(vm, s),
        Value::Array(items) => {
            let arr = sys::jsonnet_json_make_array(vm);
            for item in items {
                match to_native(vm, item) {
                    Ok(v) => sys::jsonnet_json_array_append(vm, arr, v),
                    Err(e) => {
                        sys::jsonnet_json_destroy(vm, arr);
                        return Err(e);
                    }
                }
            }
            Ok(arr)
        }
        Value::Object(fields) => {
            let obj = sys::jsonnet_json_make_object(vm);
            for (key, item) in fields {
                let key_c = match nul_free(key, "object key") {
                    Ok(k) => k,
                    Err(e) => {
                        sys::jsonnet_json_destroy(vm, obj);
                        return Err(e);
                    }
                };
                match to_native(vm, item) {
                    Ok(v) => {
                        sys::jsonnet_json_object_append(vm, obj, key_c.as_ptr(), v);
                    }
                    Err(e) => {
                        sys::jsonnet_json_destroy(vm, obj);
                        return Err(e);
                    }
                }
            }
            Ok(obj)
        }
    }
}

/// Convert an engine value into a host value.
///
/// Arrays and objects cannot be read back through the engine's value ABI
/// and fail as marshaling errors.
///
/// # Safety
/// `vm` must be a live engine context and `value` a handle belonging to it.
pub(crate) unsafe fn from_native(vm: *mut sys::JsonnetVm, value: *const sys::JsonnetJsonValue) -> Result<Value> {
    let s = sys::jsonnet_json_extract_string(vm, value);
    if !s.is_null() {
        let bytes = CStr::from_ptr(s).to_bytes();
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::Marshaling("non-UTF-8 engine string".into()))?;
        return Ok(Value::String(s.to_owned()));
    }

    let mut num = 0.0;
    if sys::jsonnet_json_extract_number(vm, value, &mut num) != 0 {
        let n = Number::from_f64(num)
            .ok_or_else(|| Error::Marshaling("non-finite number".into()))?;
        return Ok(Value::Number(n));
    }

    match sys::jsonnet_json_extract_bool(vm, value) {
        0 => return Ok(Value::Bool(false)),
        1 => return Ok(Value::Bool(true)),
        _ => {}
    }

    if sys::jsonnet_json_extract_null(vm, value) != 0 {
        return Ok(Value::Null);
    }

    Err(Error::Marshaling("array or object engine value".into()))
}

unsafe fn string_to_native(vm: *mut sys::JsonnetVm, s: &str) -> Result<*mut sys::JsonnetJsonValue> {
    let c = nul_free(s, "string")?;
    Ok(sys::jsonnet_json_make_string(vm, c.as_ptr()))
}

fn number_to_f64(n: &Number) -> Result<f64> {
    n.as_f64()
        .ok_or_else(|| Error::Marshaling(format!("number {n}")))
}

/// NUL-terminate `s` for the engine; its strings cannot carry interior NULs.
fn nul_free(s: &str, what: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::Marshaling(format!("{what} containing a NUL byte")))
}
