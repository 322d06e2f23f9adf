//! Import and native-function bridges
//!
//! The engine re-enters host code through two C callbacks: import resolution
//! and native-function invocation. Both trampolines here follow the same
//! outcome protocol:
//!
//! - the handler returns `Ok`: the call completes and the engine receives
//!   the marshaled value (or resolved content),
//! - the handler returns `Err`: the failure is reported to the engine,
//!   which formats it into an ordinary evaluation error with a trace,
//! - the handler panics: the payload is parked in the VM's escape slot and
//!   a failure is reported so the engine abandons the evaluation; once the
//!   engine hands control back, [`Vm`](crate::Vm) re-raises the parked
//!   payload unmodified instead of reporting an evaluation error.
//!
//! Unwinding must never cross the `extern "C"` frames, so every handler
//! invocation sits inside `catch_unwind`.

use std::any::Any;
use std::cell::Cell;
use std::error::Error as StdError;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::rc::Rc;

use jsonnet_sys as sys;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::value::{from_native, to_native};

/// A successfully resolved import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// Substitute content for the imported file
    pub content: String,
    /// Canonical path, used in diagnostics and as the base for the
    /// content's own relative imports
    pub path: PathBuf,
}

/// Host handler for a native function. Arguments arrive positionally, one
/// per declared parameter.
pub type NativeHandler =
    Box<dyn Fn(&[Value]) -> std::result::Result<Value, Box<dyn StdError>>>;

/// Host resolver for `import` expressions: `(base, rel)` to content + path.
pub type ImportHandler =
    Box<dyn Fn(&str, &str) -> std::result::Result<Resolved, Box<dyn StdError>>>;

// ============================================================================
// Escape slot
// ============================================================================

/// Parking spot for a panic payload captured inside a callback.
///
/// The engine has no notion of host unwinding; the trampoline stashes the
/// payload here, tells the engine the callback failed, and the evaluation
/// entry point re-raises the payload once the engine has unwound its own
/// frames. First payload wins if several callbacks trip during one
/// evaluation.
pub(crate) struct EscapeSlot(Cell<Option<Box<dyn Any + Send>>>);

impl EscapeSlot {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(EscapeSlot(Cell::new(None)))
    }

    fn park(&self, payload: Box<dyn Any + Send>) {
        let first = self.0.take().unwrap_or(payload);
        self.0.set(Some(first));
    }

    pub(crate) fn take(&self) -> Option<Box<dyn Any + Send>> {
        self.0.take()
    }
}

// ============================================================================
// Callback contexts
// ============================================================================

// Heap-pinned context handed to the engine as the callback's `void *ctx`.
// The owning Vm keeps the box alive for as long as the engine may call back.
pub(crate) struct ImportCtx {
    pub(crate) vm: *mut sys::JsonnetVm,
    pub(crate) escape: Rc<EscapeSlot>,
    pub(crate) resolver: ImportHandler,
}

pub(crate) struct NativeCtx {
    pub(crate) vm: *mut sys::JsonnetVm,
    pub(crate) escape: Rc<EscapeSlot>,
    pub(crate) name: String,
    pub(crate) arity: usize,
    pub(crate) handler: NativeHandler,
}

// ============================================================================
// Registration-time validation
// ============================================================================

/// Check that `name` can be called through `std.native`.
pub(crate) fn validate_function_name(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::Argument(format!(
            "invalid native function name `{name}`"
        )))
    }
}

/// Check that every parameter is a plain, fixed-position identifier.
///
/// Anything else (rest/keyword markers such as `*args`, `**opts`, `key:`,
/// duplicates, empty names) is rejected here, never at call time.
pub(crate) fn validate_params<S: AsRef<str>>(name: &str, params: &[S]) -> Result<()> {
    for (i, param) in params.iter().enumerate() {
        let param = param.as_ref();
        if !is_identifier(param) {
            return Err(Error::Argument(format!(
                "parameter `{param}` of native function `{name}` is not a fixed positional parameter"
            )));
        }
        if params[..i].iter().any(|p| p.as_ref() == param) {
            return Err(Error::Argument(format!(
                "duplicate parameter `{param}` in native function `{name}`"
            )));
        }
    }
    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Trampolines
// ============================================================================

pub(crate) unsafe extern "C" fn import_trampoline(
    ctx: *mut c_void,
    base: *const c_char,
    rel: *const c_char,
    found_here: *mut *mut c_char,
    success: *mut c_int,
) -> *mut c_char {
    let ctx = &*(ctx as *const ImportCtx);
    let base_str = CStr::from_ptr(base).to_string_lossy();
    let rel_str = CStr::from_ptr(rel).to_string_lossy();

    let outcome = catch_unwind(AssertUnwindSafe(|| (ctx.resolver)(&base_str, &rel_str)));
    match outcome {
        Ok(Ok(resolved)) => {
            let path = resolved.path.to_string_lossy().into_owned();
            let content_buf = engine_cstr(ctx.vm, resolved.content.as_bytes());
            let path_buf = engine_cstr(ctx.vm, path.as_bytes());
            match (content_buf, path_buf) {
                (Some(content), Some(path)) => {
                    *found_here = path;
                    *success = 1;
                    content
                }
                (content, path) => {
                    if let Some(buf) = content {
                        sys::jsonnet_realloc(ctx.vm, buf, 0);
                    }
                    if let Some(buf) = path {
                        sys::jsonnet_realloc(ctx.vm, buf, 0);
                    }
                    import_failure(
                        ctx.vm,
                        success,
                        "import callback returned text containing a NUL byte",
                    )
                }
            }
        }
        Ok(Err(e)) => {
            let msg = e.to_string();
            let msg = if msg.is_empty() {
                format!("cannot import {rel_str} from {base_str}")
            } else {
                msg
            };
            import_failure(ctx.vm, success, &msg)
        }
        Err(payload) => {
            ctx.escape.park(payload);
            import_failure(ctx.vm, success, "import callback escaped")
        }
    }
}

pub(crate) unsafe extern "C" fn native_trampoline(
    ctx: *mut c_void,
    argv: *const *const sys::JsonnetJsonValue,
    success: *mut c_int,
) -> *mut sys::JsonnetJsonValue {
    let ctx = &*(ctx as *const NativeCtx);

    let mut args = Vec::with_capacity(ctx.arity);
    for i in 0..ctx.arity {
        match from_native(ctx.vm, *argv.add(i)) {
            Ok(v) => args.push(v),
            Err(e) => return native_failure(ctx.vm, success, &e.to_string()),
        }
    }

    match catch_unwind(AssertUnwindSafe(|| (ctx.handler)(&args))) {
        Ok(Ok(value)) => match to_native(ctx.vm, &value) {
            Ok(v) => {
                *success = 1;
                v
            }
            Err(e) => native_failure(ctx.vm, success, &e.to_string()),
        },
        Ok(Err(e)) => {
            let msg = e.to_string();
            let msg = if msg.is_empty() {
                format!("something wrong in native function {}", ctx.name)
            } else {
                msg
            };
            native_failure(ctx.vm, success, &msg)
        }
        Err(payload) => {
            ctx.escape.park(payload);
            native_failure(ctx.vm, success, "native function escaped")
        }
    }
}

// ============================================================================
// Engine-allocator helpers
// ============================================================================

/// Copy `text` into a NUL-terminated buffer on the engine's allocator.
/// Returns `None` if the text itself contains a NUL byte.
unsafe fn engine_cstr(vm: *mut sys::JsonnetVm, text: &[u8]) -> Option<*mut c_char> {
    if text.contains(&0) {
        return None;
    }
    let buf = sys::jsonnet_realloc(vm, ptr::null_mut(), text.len() + 1);
    ptr::copy_nonoverlapping(text.as_ptr(), buf as *mut u8, text.len());
    *buf.add(text.len()) = 0;
    Some(buf)
}

unsafe fn import_failure(vm: *mut sys::JsonnetVm, success: *mut c_int, msg: &str) -> *mut c_char {
    *success = 0;
    match engine_cstr(vm, msg.as_bytes()) {
        Some(buf) => buf,
        None => {
            // msg had a NUL byte; fall back to a fixed message
            engine_cstr(vm, b"import failed").unwrap_or(ptr::null_mut())
        }
    }
}

unsafe fn native_failure(
    vm: *mut sys::JsonnetVm,
    success: *mut c_int,
    msg: &str,
) -> *mut sys::JsonnetJsonValue {
    *success = 0;
    let c = CString::new(msg.replace('\0', "?")).unwrap_or_default();
    sys::jsonnet_json_make_string(vm, c.as_ptr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("myPow"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("*args"));
        assert!(!is_identifier("key:"));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn test_param_validation() {
        assert!(validate_params("f", &["x", "y"]).is_ok());
        assert!(validate_params::<&str>("f", &[]).is_ok());
        assert!(validate_params("f", &["*args"]).is_err());
        assert!(validate_params("f", &["**opts"]).is_err());
        assert!(validate_params("f", &["&blk"]).is_err());
        assert!(validate_params("f", &["x", "x"]).is_err());
    }

    #[test]
    fn test_escape_slot_keeps_first_payload() {
        let slot = EscapeSlot::new();
        slot.park(Box::new("first"));
        slot.park(Box::new("second"));
        let payload = slot.take().expect("payload parked");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"first"));
        assert!(slot.take().is_none());
    }
}
