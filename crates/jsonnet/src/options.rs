//! Option configuration
//!
//! Two layers. [`Vm::configure`] applies an ordered name-to-value mapping
//! against the closed set of recognized VM options, failing on the first
//! unknown key (options already applied stay applied). On top of that,
//! [`eval_snippet_with`] and [`eval_file_with`] take one combined mapping,
//! split off the call-scoped keys (`filename`/`multi` for snippets,
//! `encoding`/`multi` for files), and apply the rest to a fresh VM.
//!
//! Typed callers use the `Vm` setters directly; this module exists for the
//! dictionary-shaped entry points, which still dispatch over a fixed key
//! set rather than anything open-ended.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use crate::callbacks::{ImportHandler, NativeHandler, Resolved};
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::vm::{Output, Vm, DEFAULT_FILENAME};

use serde_json::Value;

/// Keys applied per evaluation call rather than to the VM.
const SNIPPET_CALL_KEYS: &[&str] = &["filename", "multi"];
const FILE_CALL_KEYS: &[&str] = &["encoding", "multi"];

/// A value for one named VM option.
pub enum OptionValue {
    Bool(bool),
    UInt(u32),
    Float(f64),
    Str(String),
    /// Name/value pairs for the binding options (`ext_var`, `tla_code`, ...)
    Bindings(Vec<(String, String)>),
    /// Directories for `jpath_add`
    Paths(Vec<PathBuf>),
    /// Resolver for `import_callback`
    Import(ImportHandler),
    /// Registrations for `native_callbacks`
    Natives(Vec<NativeFunction>),
}

/// One native-function registration carried through the option mapping.
pub struct NativeFunction {
    pub name: String,
    pub params: Vec<String>,
    pub handler: NativeHandler,
}

impl NativeFunction {
    pub fn new<F>(name: &str, params: &[&str], handler: F) -> NativeFunction
    where
        F: Fn(&[Value]) -> std::result::Result<Value, Box<dyn StdError>> + 'static,
    {
        NativeFunction {
            name: name.to_owned(),
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            handler: Box::new(handler),
        }
    }
}

impl OptionValue {
    /// Wrap an import resolver.
    pub fn import<F>(resolver: F) -> OptionValue
    where
        F: Fn(&str, &str) -> std::result::Result<Resolved, Box<dyn StdError>> + 'static,
    {
        OptionValue::Import(Box::new(resolver))
    }

    /// Collect binding pairs for `ext_var`/`ext_code`/`tla_var`/`tla_code`.
    pub fn bindings<'a, I>(pairs: I) -> OptionValue
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        OptionValue::Bindings(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }

    fn expect_bool(self, key: &str) -> Result<bool> {
        match self {
            OptionValue::Bool(b) => Ok(b),
            _ => Err(type_error(key, "a boolean")),
        }
    }

    fn expect_uint(self, key: &str) -> Result<u32> {
        match self {
            OptionValue::UInt(n) => Ok(n),
            _ => Err(type_error(key, "an unsigned integer")),
        }
    }

    fn expect_float(self, key: &str) -> Result<f64> {
        match self {
            OptionValue::Float(f) => Ok(f),
            OptionValue::UInt(n) => Ok(f64::from(n)),
            _ => Err(type_error(key, "a number")),
        }
    }

    fn expect_str(self, key: &str) -> Result<String> {
        match self {
            OptionValue::Str(s) => Ok(s),
            _ => Err(type_error(key, "a string")),
        }
    }

    fn expect_bindings(self, key: &str) -> Result<Vec<(String, String)>> {
        match self {
            OptionValue::Bindings(pairs) => Ok(pairs),
            _ => Err(type_error(key, "name/value bindings")),
        }
    }

    fn expect_paths(self, key: &str) -> Result<Vec<PathBuf>> {
        match self {
            OptionValue::Paths(paths) => Ok(paths),
            _ => Err(type_error(key, "a list of directories")),
        }
    }

    fn expect_import(self, key: &str) -> Result<ImportHandler> {
        match self {
            OptionValue::Import(resolver) => Ok(resolver),
            _ => Err(type_error(key, "an import resolver")),
        }
    }

    fn expect_natives(self, key: &str) -> Result<Vec<NativeFunction>> {
        match self {
            OptionValue::Natives(natives) => Ok(natives),
            _ => Err(type_error(key, "native function registrations")),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<u32> for OptionValue {
    fn from(n: u32) -> Self {
        OptionValue::UInt(n)
    }
}

impl From<f64> for OptionValue {
    fn from(f: f64) -> Self {
        OptionValue::Float(f)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

fn type_error(key: &str, expected: &str) -> Error {
    Error::Argument(format!("option {key} expects {expected}"))
}

impl Vm {
    /// Apply an ordered name-to-value option mapping to this VM.
    ///
    /// Each entry is dispatched against the fixed set of recognized keys:
    /// `ext_var`, `ext_code`, `tla_var`, `tla_code`, `max_stack`,
    /// `gc_min_objects`, `gc_growth_trigger`, `max_trace`, `string_output`,
    /// `jpath_add`, `import_callback`, `native_callbacks`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedOption`] on the first unrecognized key;
    /// [`Error::Argument`] on a value of the wrong shape. Options applied
    /// before the failing entry remain applied.
    pub fn configure<I>(&mut self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, OptionValue)>,
    {
        for (key, value) in options {
            self.apply(&key, value)?;
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: OptionValue) -> Result<()> {
        match key {
            "ext_var" => {
                for (name, val) in value.expect_bindings(key)? {
                    self.ext_var(&name, &val)?;
                }
            }
            "ext_code" => {
                for (name, code) in value.expect_bindings(key)? {
                    self.ext_code(&name, &code)?;
                }
            }
            "tla_var" => {
                for (name, val) in value.expect_bindings(key)? {
                    self.tla_var(&name, &val)?;
                }
            }
            "tla_code" => {
                for (name, code) in value.expect_bindings(key)? {
                    self.tla_code(&name, &code)?;
                }
            }
            "max_stack" => self.max_stack(value.expect_uint(key)?),
            "gc_min_objects" => self.gc_min_objects(value.expect_uint(key)?),
            "gc_growth_trigger" => self.gc_growth_trigger(value.expect_float(key)?),
            "max_trace" => self.max_trace(value.expect_uint(key)?),
            "string_output" => self.string_output(value.expect_bool(key)?),
            "jpath_add" => {
                for dir in value.expect_paths(key)? {
                    self.jpath_add(dir)?;
                }
            }
            "import_callback" => self.import_callback(value.expect_import(key)?),
            "native_callbacks" => {
                for native in value.expect_natives(key)? {
                    let params: Vec<&str> = native.params.iter().map(String::as_str).collect();
                    self.define_function(&native.name, &params, native.handler)?;
                }
            }
            _ => return Err(Error::UnsupportedOption(key.to_owned())),
        }
        Ok(())
    }
}

/// Evaluate a snippet on a fresh VM configured from one combined mapping.
///
/// `filename` and `multi` apply to the evaluation call; every other entry
/// is a VM option as in [`Vm::configure`].
pub fn eval_snippet_with<I>(snippet: &str, options: I) -> Result<Output>
where
    I: IntoIterator<Item = (String, OptionValue)>,
{
    let (call, vm_options) = split_options(options, SNIPPET_CALL_KEYS);
    let mut vm = Vm::new();
    vm.configure(vm_options)?;

    let mut filename = DEFAULT_FILENAME.to_owned();
    let mut multi = false;
    for (key, value) in call {
        match key.as_str() {
            "filename" => filename = value.expect_str(&key)?,
            "multi" => multi = value.expect_bool(&key)?,
            _ => unreachable!("non-call key {key} after split"),
        }
    }
    vm.eval_snippet(&filename, snippet, multi)
}

/// Evaluate a file on a fresh VM configured from one combined mapping.
///
/// `encoding` (a label accepted by [`Encoding::for_label`]) and `multi`
/// apply to the evaluation call; every other entry is a VM option as in
/// [`Vm::configure`].
pub fn eval_file_with<I>(path: impl AsRef<Path>, options: I) -> Result<Output>
where
    I: IntoIterator<Item = (String, OptionValue)>,
{
    let (call, vm_options) = split_options(options, FILE_CALL_KEYS);
    let mut vm = Vm::new();
    vm.configure(vm_options)?;

    let mut encoding = None;
    let mut multi = false;
    for (key, value) in call {
        match key.as_str() {
            "encoding" => {
                let label = value.expect_str(&key)?;
                encoding = Some(
                    Encoding::for_label(&label).ok_or(Error::UnsupportedEncoding(label))?,
                );
            }
            "multi" => multi = value.expect_bool(&key)?,
            _ => unreachable!("non-call key {key} after split"),
        }
    }
    vm.eval_file(path, encoding, multi)
}

// Partition one combined mapping into call-scoped and VM-scoped subsets,
// preserving the supplied order within each.
fn split_options<I>(
    options: I,
    call_keys: &[&str],
) -> (Vec<(String, OptionValue)>, Vec<(String, OptionValue)>)
where
    I: IntoIterator<Item = (String, OptionValue)>,
{
    options
        .into_iter()
        .partition(|(key, _)| call_keys.contains(&key.as_str()))
}
