//! The Jsonnet VM
//!
//! [`Vm`] wraps one engine context: configuration setters, import/native
//! callback registration, and the snippet/file evaluation entry points in
//! single and multi mode. The context is created on construction and
//! released exactly once on drop; it is never shared between `Vm` values.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::panic;
use std::path::Path;
use std::ptr;
use std::rc::Rc;

use jsonnet_sys as sys;
use serde_json::Value;

use crate::callbacks::{
    import_trampoline, native_trampoline, validate_function_name, validate_params, EscapeSlot,
    ImportCtx, NativeCtx, Resolved,
};
use crate::encoding::{EncodedText, Encoding};
use crate::error::{Error, Result};

pub(crate) const DEFAULT_FILENAME: &str = "(jsonnet)";

/// Result of one evaluation: a single document, or one document per output
/// file in multi mode.
#[derive(Clone, Debug)]
pub enum Output {
    /// Serialized result of the whole program
    Single(EncodedText),
    /// Multi mode: output file name to serialized sub-value
    Multi(BTreeMap<String, EncodedText>),
}

impl Output {
    /// The single-mode document, if this is one.
    pub fn into_single(self) -> Option<EncodedText> {
        match self {
            Output::Single(text) => Some(text),
            Output::Multi(_) => None,
        }
    }

    /// The multi-mode file mapping, if this is one.
    pub fn into_multi(self) -> Option<BTreeMap<String, EncodedText>> {
        match self {
            Output::Single(_) => None,
            Output::Multi(fileset) => Some(fileset),
        }
    }
}

/// A Jsonnet evaluator.
///
/// Every setter takes effect for all subsequent evaluations on this VM;
/// there is no rollback. During an evaluation the engine may re-enter host
/// code any number of times through the registered import resolver and
/// native functions, always on the calling thread.
///
/// # Thread safety
///
/// `Vm` is neither `Send` nor `Sync`: it owns a raw engine context that
/// must be driven from one thread at a time. Use one `Vm` per thread, or
/// serialize access externally.
///
/// # Example
///
/// ```no_run
/// use jsonnet::Vm;
///
/// let vm = Vm::new();
/// let result = vm.evaluate("{ foo: \"bar\" }").unwrap();
/// assert_eq!(result.to_str().unwrap(), "{\n   \"foo\": \"bar\"\n}\n");
/// ```
pub struct Vm {
    vm: *mut sys::JsonnetVm,
    escape: Rc<EscapeSlot>,
    import: Option<Box<ImportCtx>>,
    natives: Vec<Box<NativeCtx>>,
}

impl Vm {
    /// Create a VM with default settings.
    pub fn new() -> Vm {
        let vm = unsafe { sys::jsonnet_make() };
        debug_assert!(!vm.is_null());
        Vm {
            vm,
            escape: EscapeSlot::new(),
            import: None,
            natives: Vec::new(),
        }
    }

    // ========================================================================
    // Configuration setters
    // ========================================================================

    /// Bind the external variable `key` to a string value.
    pub fn ext_var(&mut self, key: &str, val: &str) -> Result<()> {
        let key = cstr(key, "variable name")?;
        let val = cstr(val, "variable value")?;
        unsafe { sys::jsonnet_ext_var(self.vm, key.as_ptr(), val.as_ptr()) };
        Ok(())
    }

    /// Bind the external variable `key` to a code fragment.
    pub fn ext_code(&mut self, key: &str, code: &str) -> Result<()> {
        let key = cstr(key, "variable name")?;
        let code = cstr(code, "code fragment")?;
        unsafe { sys::jsonnet_ext_code(self.vm, key.as_ptr(), code.as_ptr()) };
        Ok(())
    }

    /// Bind the top-level argument `key` to a string value.
    pub fn tla_var(&mut self, key: &str, val: &str) -> Result<()> {
        let key = cstr(key, "argument name")?;
        let val = cstr(val, "argument value")?;
        unsafe { sys::jsonnet_tla_var(self.vm, key.as_ptr(), val.as_ptr()) };
        Ok(())
    }

    /// Bind the top-level argument `key` to a code fragment.
    pub fn tla_code(&mut self, key: &str, code: &str) -> Result<()> {
        let key = cstr(key, "argument name")?;
        let code = cstr(code, "code fragment")?;
        unsafe { sys::jsonnet_tla_code(self.vm, key.as_ptr(), code.as_ptr()) };
        Ok(())
    }

    /// Maximum evaluation stack depth. Runaway recursion becomes a reported
    /// evaluation error instead of exhausting the process stack.
    pub fn max_stack(&mut self, depth: u32) {
        unsafe { sys::jsonnet_max_stack(self.vm, depth) };
    }

    /// Engine GC tuning: live objects required before collection runs.
    pub fn gc_min_objects(&mut self, count: u32) {
        unsafe { sys::jsonnet_gc_min_objects(self.vm, count) };
    }

    /// Engine GC tuning: heap growth ratio that triggers collection.
    pub fn gc_growth_trigger(&mut self, ratio: f64) {
        unsafe { sys::jsonnet_gc_growth_trigger(self.vm, ratio) };
    }

    /// Maximum number of stack frames shown in error traces.
    pub fn max_trace(&mut self, depth: u32) {
        unsafe { sys::jsonnet_max_trace(self.vm, depth) };
    }

    /// When set, evaluation returns the program's result as a raw string
    /// (with a trailing newline) instead of serializing it to JSON. Only
    /// valid when the evaluated value is itself a single string.
    pub fn string_output(&mut self, enable: bool) {
        unsafe { sys::jsonnet_string_output(self.vm, enable as c_int) };
    }

    /// Append a directory to the library search path.
    ///
    /// The engine's default import resolution tries the importing file's
    /// own directory first, then each search path in the order added.
    /// Ignored while a custom import callback is registered.
    pub fn jpath_add(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = path_cstr(dir.as_ref())?;
        unsafe { sys::jsonnet_jpath_add(self.vm, dir.as_ptr()) };
        Ok(())
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Install a custom resolver for `import` expressions.
    ///
    /// On each import the resolver receives the importing file's base
    /// directory and the literal requested path, and returns the content
    /// plus the canonical path of the imported file; the content's own
    /// relative imports resolve against that path. An `Err` becomes an
    /// ordinary evaluation failure; a panic aborts the whole evaluation
    /// call and resumes unwinding in the caller.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use jsonnet::{Resolved, Vm};
    ///
    /// let mut vm = Vm::new();
    /// vm.import_callback(|_base, rel| {
    ///     Ok(Resolved {
    ///         content: "{ a: 1 }".to_owned(),
    ///         path: format!("/virtual/{rel}").into(),
    ///     })
    /// });
    /// ```
    pub fn import_callback<F>(&mut self, resolver: F)
    where
        F: Fn(&str, &str) -> std::result::Result<Resolved, Box<dyn StdError>> + 'static,
    {
        let ctx = Box::new(ImportCtx {
            vm: self.vm,
            escape: self.escape.clone(),
            resolver: Box::new(resolver),
        });
        unsafe {
            sys::jsonnet_import_callback(
                self.vm,
                import_trampoline,
                &*ctx as *const ImportCtx as *mut c_void,
            );
        }
        self.import = Some(ctx);
    }

    /// Alias for [`import_callback`](Vm::import_callback).
    pub fn handle_import<F>(&mut self, resolver: F)
    where
        F: Fn(&str, &str) -> std::result::Result<Resolved, Box<dyn StdError>> + 'static,
    {
        self.import_callback(resolver);
    }

    /// Register a native extension callable as `std.native(name)`.
    ///
    /// `params` declares the function's fixed positional parameters; the
    /// handler receives exactly one argument per parameter, marshaled to
    /// [`serde_json::Value`], and returns a value marshaled back into the
    /// program. Parameter shapes that cannot be expressed as fixed
    /// positional slots are rejected here with [`Error::Argument`], never
    /// at call time.
    ///
    /// An `Err` from the handler becomes an ordinary evaluation failure
    /// carrying the error's message; a panic aborts the whole evaluation
    /// call and resumes unwinding in the caller.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use jsonnet::Vm;
    /// use serde_json::json;
    ///
    /// let mut vm = Vm::new();
    /// vm.define_function("myPow", &["x", "y"], |args| {
    ///     let x = args[0].as_f64().ok_or("x must be a number")?;
    ///     let y = args[1].as_f64().ok_or("y must be a number")?;
    ///     Ok(json!(x.powf(y)))
    /// })
    /// .unwrap();
    ///
    /// let result = vm.evaluate("std.native('myPow')(3, 4)").unwrap();
    /// assert_eq!(result.to_str().unwrap(), "81\n");
    /// ```
    pub fn define_function<F>(&mut self, name: &str, params: &[&str], handler: F) -> Result<()>
    where
        F: Fn(&[Value]) -> std::result::Result<Value, Box<dyn StdError>> + 'static,
    {
        validate_function_name(name)?;
        validate_params(name, params)?;

        // Identifiers are NUL-free by construction.
        let name_c = cstr(name, "function name")?;
        let param_cs: Vec<CString> = params
            .iter()
            .map(|p| cstr(p, "parameter name"))
            .collect::<Result<_>>()?;
        let mut param_ptrs: Vec<*const c_char> = param_cs.iter().map(|c| c.as_ptr()).collect();
        param_ptrs.push(ptr::null());

        let ctx = Box::new(NativeCtx {
            vm: self.vm,
            escape: self.escape.clone(),
            name: name.to_owned(),
            arity: params.len(),
            handler: Box::new(handler),
        });
        unsafe {
            sys::jsonnet_native_callback(
                self.vm,
                name_c.as_ptr(),
                native_trampoline,
                &*ctx as *const NativeCtx as *mut c_void,
                param_ptrs.as_ptr(),
            );
        }
        self.natives.push(ctx);
        Ok(())
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluate a snippet with the default filename, returning the JSON
    /// text of the result.
    ///
    /// # Errors
    ///
    /// [`Error::Evaluation`] on any engine-side failure: parse and static
    /// errors, runtime errors, and failures propagated from import/native
    /// callbacks.
    pub fn evaluate(&self, snippet: &str) -> Result<EncodedText> {
        single(self.eval_snippet(DEFAULT_FILENAME, snippet, false)?)
    }

    /// Evaluate a file with the process-default encoding, returning the
    /// JSON text of the result.
    pub fn evaluate_file(&self, path: impl AsRef<Path>) -> Result<EncodedText> {
        single(self.eval_file(path, None, false)?)
    }

    /// Evaluate in-memory source. `filename` is used in diagnostics and as
    /// the base for relative imports. With `multi` set, the program's
    /// top-level object maps output file names to documents.
    pub fn eval_snippet(&self, filename: &str, snippet: &str, multi: bool) -> Result<Output> {
        let fname = cstr(filename, "filename")?;
        let code = cstr(snippet, "snippet")?;
        let mut error: c_int = 0;
        let buf = unsafe {
            if multi {
                sys::jsonnet_evaluate_snippet_multi(
                    self.vm,
                    fname.as_ptr(),
                    code.as_ptr(),
                    &mut error,
                )
            } else {
                sys::jsonnet_evaluate_snippet(self.vm, fname.as_ptr(), code.as_ptr(), &mut error)
            }
        };
        self.translate(buf, error != 0, multi, Encoding::Utf8)
    }

    /// Evaluate a source file.
    ///
    /// `encoding` declares the encoding of the file's bytes (default: the
    /// process encoding, [`Encoding::system`]); it must be an
    /// ASCII-compatible superset or the call fails with
    /// [`Error::UnsupportedEncoding`] before the engine is involved. The
    /// engine consumes and reproduces the bytes unchanged, so the result is
    /// tagged with that same encoding, as is any error message (messages
    /// interleave source text).
    pub fn eval_file(
        &self,
        path: impl AsRef<Path>,
        encoding: Option<Encoding>,
        multi: bool,
    ) -> Result<Output> {
        let encoding = encoding.unwrap_or_else(Encoding::system);
        if !encoding.is_ascii_compatible() {
            return Err(Error::UnsupportedEncoding(encoding.name().to_owned()));
        }
        let fname = path_cstr(path.as_ref())?;
        let mut error: c_int = 0;
        let buf = unsafe {
            if multi {
                sys::jsonnet_evaluate_file_multi(self.vm, fname.as_ptr(), &mut error)
            } else {
                sys::jsonnet_evaluate_file(self.vm, fname.as_ptr(), &mut error)
            }
        };
        self.translate(buf, error != 0, multi, encoding)
    }

    // ========================================================================
    // Outcome translation
    // ========================================================================

    // Turn the engine's result buffer into the caller-facing outcome. A
    // payload parked in the escape slot wins over whatever the engine
    // reported: the buffer is released and unwinding resumes as if the
    // callback's panic had crossed the engine transparently.
    fn translate(
        &self,
        buf: *mut c_char,
        failed: bool,
        multi: bool,
        encoding: Encoding,
    ) -> Result<Output> {
        unsafe {
            if let Some(payload) = self.escape.take() {
                sys::jsonnet_realloc(self.vm, buf, 0);
                panic::resume_unwind(payload);
            }
            if failed {
                let message = CStr::from_ptr(buf).to_bytes().to_vec();
                sys::jsonnet_realloc(self.vm, buf, 0);
                return Err(Error::Evaluation(EncodedText::new(message, encoding)));
            }
            if multi {
                self.fileset(buf, encoding).map(Output::Multi)
            } else {
                let text = CStr::from_ptr(buf).to_bytes().to_vec();
                sys::jsonnet_realloc(self.vm, buf, 0);
                Ok(Output::Single(EncodedText::new(text, encoding)))
            }
        }
    }

    // Parse the engine's multi-mode buffer: NUL-separated (name, body)
    // pairs, terminated by an empty name. Frees the buffer.
    unsafe fn fileset(
        &self,
        buf: *mut c_char,
        encoding: Encoding,
    ) -> Result<BTreeMap<String, EncodedText>> {
        let mut files = BTreeMap::new();
        let mut cursor = buf as *const c_char;
        loop {
            let name = CStr::from_ptr(cursor);
            if name.to_bytes().is_empty() {
                break;
            }
            let body_ptr = cursor.add(name.to_bytes().len() + 1);
            let body = CStr::from_ptr(body_ptr);
            if body.to_bytes().is_empty() {
                let message = format!("output file {} without body", name.to_string_lossy());
                sys::jsonnet_realloc(self.vm, buf, 0);
                return Err(Error::Evaluation(EncodedText::new(
                    message.into_bytes(),
                    encoding,
                )));
            }
            files.insert(
                name.to_string_lossy().into_owned(),
                EncodedText::new(body.to_bytes().to_vec(), encoding),
            );
            cursor = body_ptr.add(body.to_bytes().len() + 1);
        }
        sys::jsonnet_realloc(self.vm, buf, 0);
        Ok(files)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        // Engine first; afterwards nothing can call into the contexts the
        // boxes below keep alive.
        unsafe { sys::jsonnet_destroy(self.vm) };
        self.import.take();
        self.natives.clear();
    }
}

fn single(output: Output) -> Result<EncodedText> {
    match output {
        Output::Single(text) => Ok(text),
        Output::Multi(_) => unreachable!("single-mode evaluation produced a fileset"),
    }
}

fn cstr(s: &str, what: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::Argument(format!("{what} contains a NUL byte")))
}

fn path_cstr(path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| Error::Argument(format!("path {} is not valid UTF-8", path.display())))?;
    cstr(s, "path")
}
