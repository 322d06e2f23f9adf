//! Raw FFI declarations for the libjsonnet C API
//!
//! This crate declares the engine's C surface one-to-one and adds nothing on
//! top: no lifetimes, no ownership tracking, no error translation. The safe
//! wrapper lives in the `jsonnet` crate.
//!
//! The declarations target the libjsonnet 0.17 line, the last release with
//! this `JsonnetImportCallback` shape. Linking against 0.18 or newer would
//! silently mismatch the import-callback ABI; don't.
//!
//! Memory contract (from `libjsonnet.h`): every `char *` returned by an
//! evaluation entry point, and every buffer handed *to* the engine from a
//! callback, is allocated on the engine's own allocator via
//! [`jsonnet_realloc`] and must be released through it (size 0 frees).
//! `JsonnetJsonValue` handles returned by the `jsonnet_json_make_*`
//! constructors are owned by the caller until appended to a parent value or
//! returned from a native callback, after which the engine owns them.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_double, c_int, c_uint, c_void};

/// Opaque engine context. One per VM; never shared between VMs.
#[repr(C)]
pub struct JsonnetVm {
    _private: [u8; 0],
}

/// Opaque engine-side JSON value, used by the native-callback value ABI.
#[repr(C)]
pub struct JsonnetJsonValue {
    _private: [u8; 0],
}

/// Import resolution callback.
///
/// On success the callee sets `*success` to 1, stores the resolved path in
/// `*found_here` and returns the file content. On failure it sets `*success`
/// to 0 and returns an error message. All three strings must be
/// NUL-terminated and allocated with [`jsonnet_realloc`] on `ctx`'s VM.
pub type JsonnetImportCallback = unsafe extern "C" fn(
    ctx: *mut c_void,
    base: *const c_char,
    rel: *const c_char,
    found_here: *mut *mut c_char,
    success: *mut c_int,
) -> *mut c_char;

/// Native extension callback.
///
/// `argv` holds exactly as many arguments as the function was registered
/// with. On success the callee sets `*success` to 1 and returns the result
/// value; on failure it sets `*success` to 0 and returns a string value
/// holding the error message. Either way ownership of the returned value
/// passes to the engine.
pub type JsonnetNativeCallback = unsafe extern "C" fn(
    ctx: *mut c_void,
    argv: *const *const JsonnetJsonValue,
    success: *mut c_int,
) -> *mut JsonnetJsonValue;

extern "C" {
    pub fn jsonnet_version() -> *const c_char;

    pub fn jsonnet_make() -> *mut JsonnetVm;
    pub fn jsonnet_destroy(vm: *mut JsonnetVm);

    pub fn jsonnet_max_stack(vm: *mut JsonnetVm, v: c_uint);
    pub fn jsonnet_gc_min_objects(vm: *mut JsonnetVm, v: c_uint);
    pub fn jsonnet_gc_growth_trigger(vm: *mut JsonnetVm, v: c_double);
    pub fn jsonnet_string_output(vm: *mut JsonnetVm, v: c_int);
    pub fn jsonnet_max_trace(vm: *mut JsonnetVm, v: c_uint);

    pub fn jsonnet_ext_var(vm: *mut JsonnetVm, key: *const c_char, val: *const c_char);
    pub fn jsonnet_ext_code(vm: *mut JsonnetVm, key: *const c_char, val: *const c_char);
    pub fn jsonnet_tla_var(vm: *mut JsonnetVm, key: *const c_char, val: *const c_char);
    pub fn jsonnet_tla_code(vm: *mut JsonnetVm, key: *const c_char, val: *const c_char);
    pub fn jsonnet_jpath_add(vm: *mut JsonnetVm, path: *const c_char);

    pub fn jsonnet_import_callback(
        vm: *mut JsonnetVm,
        cb: JsonnetImportCallback,
        ctx: *mut c_void,
    );
    pub fn jsonnet_native_callback(
        vm: *mut JsonnetVm,
        name: *const c_char,
        cb: JsonnetNativeCallback,
        ctx: *mut c_void,
        params: *const *const c_char,
    );

    // Value ABI used inside native callbacks. The extract functions return
    // 0/null when the value has a different type; extract_bool returns 2
    // for non-booleans.
    pub fn jsonnet_json_extract_string(
        vm: *mut JsonnetVm,
        v: *const JsonnetJsonValue,
    ) -> *const c_char;
    pub fn jsonnet_json_extract_number(
        vm: *mut JsonnetVm,
        v: *const JsonnetJsonValue,
        out: *mut c_double,
    ) -> c_int;
    pub fn jsonnet_json_extract_bool(vm: *mut JsonnetVm, v: *const JsonnetJsonValue) -> c_int;
    pub fn jsonnet_json_extract_null(vm: *mut JsonnetVm, v: *const JsonnetJsonValue) -> c_int;

    pub fn jsonnet_json_make_string(
        vm: *mut JsonnetVm,
        v: *const c_char,
    ) -> *mut JsonnetJsonValue;
    pub fn jsonnet_json_make_number(vm: *mut JsonnetVm, v: c_double) -> *mut JsonnetJsonValue;
    pub fn jsonnet_json_make_bool(vm: *mut JsonnetVm, v: c_int) -> *mut JsonnetJsonValue;
    pub fn jsonnet_json_make_null(vm: *mut JsonnetVm) -> *mut JsonnetJsonValue;
    pub fn jsonnet_json_make_array(vm: *mut JsonnetVm) -> *mut JsonnetJsonValue;
    pub fn jsonnet_json_array_append(
        vm: *mut JsonnetVm,
        arr: *mut JsonnetJsonValue,
        v: *mut JsonnetJsonValue,
    );
    pub fn jsonnet_json_make_object(vm: *mut JsonnetVm) -> *mut JsonnetJsonValue;
    pub fn jsonnet_json_object_append(
        vm: *mut JsonnetVm,
        obj: *mut JsonnetJsonValue,
        f: *const c_char,
        v: *mut JsonnetJsonValue,
    );
    pub fn jsonnet_json_destroy(vm: *mut JsonnetVm, v: *mut JsonnetJsonValue);

    pub fn jsonnet_evaluate_snippet(
        vm: *mut JsonnetVm,
        filename: *const c_char,
        snippet: *const c_char,
        error: *mut c_int,
    ) -> *mut c_char;
    pub fn jsonnet_evaluate_file(
        vm: *mut JsonnetVm,
        filename: *const c_char,
        error: *mut c_int,
    ) -> *mut c_char;
    pub fn jsonnet_evaluate_snippet_multi(
        vm: *mut JsonnetVm,
        filename: *const c_char,
        snippet: *const c_char,
        error: *mut c_int,
    ) -> *mut c_char;
    pub fn jsonnet_evaluate_file_multi(
        vm: *mut JsonnetVm,
        filename: *const c_char,
        error: *mut c_int,
    ) -> *mut c_char;
    pub fn jsonnet_evaluate_snippet_stream(
        vm: *mut JsonnetVm,
        filename: *const c_char,
        snippet: *const c_char,
        error: *mut c_int,
    ) -> *mut c_char;
    pub fn jsonnet_evaluate_file_stream(
        vm: *mut JsonnetVm,
        filename: *const c_char,
        error: *mut c_int,
    ) -> *mut c_char;

    pub fn jsonnet_realloc(vm: *mut JsonnetVm, buf: *mut c_char, sz: usize) -> *mut c_char;
}
