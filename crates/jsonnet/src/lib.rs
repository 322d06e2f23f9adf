//! Safe bindings for the Jsonnet configuration language
//!
//! Jsonnet programs evaluate to JSON. The engine itself is the native
//! libjsonnet library (declared in `jsonnet-sys`); this crate is the bridge
//! on top: VM configuration, import and native-function callbacks with
//! value marshaling, single/multi evaluation, and error translation.
//!
//! # Quick start
//!
//! ```no_run
//! let config: serde_json::Value = jsonnet::evaluate("{ foo: \"bar\" }").unwrap();
//! assert_eq!(config["foo"], "bar");
//! ```
//!
//! For anything beyond one-shot evaluation, build a [`Vm`]:
//!
//! ```no_run
//! use jsonnet::Vm;
//! use serde_json::json;
//!
//! let mut vm = Vm::new();
//! vm.ext_var("env", "production").unwrap();
//! vm.define_function("double", &["x"], |args| {
//!     let x = args[0].as_f64().ok_or("x must be a number")?;
//!     Ok(json!(x * 2.0))
//! })
//! .unwrap();
//!
//! let out = vm
//!     .evaluate("{ env: std.extVar('env'), n: std.native('double')(21) }")
//!     .unwrap();
//! println!("{out}");
//! ```
//!
//! # Callbacks and control flow
//!
//! During evaluation the engine may call back into host code (the import
//! resolver and any registered native functions), always on the calling
//! thread. A callback that returns `Err` produces an ordinary
//! [`Error::Evaluation`] with the engine's formatted trace. A callback that
//! *panics* does not: the panic unwinds out of the evaluation call
//! unchanged, as if the engine were not in between.
//!
//! # Encodings
//!
//! Sources may be in any ASCII-compatible encoding; the engine passes the
//! bytes through untouched. Results and error messages are [`EncodedText`]
//! tagged with the source's declared encoding; see [`Vm::eval_file`].

mod callbacks;
mod encoding;
mod error;
mod options;
mod value;
mod vm;

use std::ffi::CStr;
use std::path::Path;

use jsonnet_sys as sys;
use serde::de::DeserializeOwned;

pub use callbacks::{ImportHandler, NativeHandler, Resolved};
pub use encoding::{EncodedText, Encoding};
pub use error::{Error, Result};
pub use options::{eval_file_with, eval_snippet_with, NativeFunction, OptionValue};
pub use vm::{Output, Vm};

/// Version of the underlying engine library.
pub fn libversion() -> &'static str {
    let version = unsafe { CStr::from_ptr(sys::jsonnet_version()) };
    version.to_str().unwrap_or("(unknown)")
}

/// Evaluate a snippet and decode the resulting JSON.
///
/// One-shot form of [`Vm::evaluate`] composed with [`serde_json`]: the
/// target type is whatever the caller deserializes into, typically
/// [`serde_json::Value`].
///
/// # Example
///
/// ```no_run
/// #[derive(serde::Deserialize)]
/// struct Config {
///     replicas: u32,
/// }
///
/// let config: Config = jsonnet::evaluate("{ replicas: 2 + 1 }").unwrap();
/// assert_eq!(config.replicas, 3);
/// ```
pub fn evaluate<T: DeserializeOwned>(snippet: &str) -> Result<T> {
    evaluate_with(snippet, Vec::new())
}

/// Like [`evaluate`], with a combined option mapping as accepted by
/// [`eval_snippet_with`].
pub fn evaluate_with<T, I>(snippet: &str, options: I) -> Result<T>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = (String, OptionValue)>,
{
    decode(eval_snippet_with(snippet, options)?)
}

/// Evaluate a file and decode the resulting JSON.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    load_with(path, Vec::new())
}

/// Like [`load`], with a combined option mapping as accepted by
/// [`eval_file_with`].
pub fn load_with<T, I>(path: impl AsRef<Path>, options: I) -> Result<T>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = (String, OptionValue)>,
{
    decode(eval_file_with(path, options)?)
}

fn decode<T: DeserializeOwned>(output: Output) -> Result<T> {
    match output {
        Output::Single(text) => Ok(serde_json::from_slice(text.as_bytes())?),
        Output::Multi(_) => Err(Error::Argument(
            "multi-mode output cannot be decoded as a single document".to_owned(),
        )),
    }
}
