//! Text encodings across the engine boundary
//!
//! The engine consumes and produces byte strings in any ASCII-compatible
//! encoding; it never re-encodes them. The bridge mirrors that: source bytes
//! go in unchanged, result and error bytes come out unchanged, tagged with
//! the encoding the caller declared for the source. [`EncodedText`] is that
//! tagged byte string. Decoding to `str` is strictly opt-in.

use std::borrow::Cow;
use std::fmt;
use std::str::Utf8Error;

use once_cell::sync::Lazy;

/// A text encoding the bridge knows how to tag sources and results with.
///
/// This is a closed set. The engine requires the *source* encoding to be an
/// ASCII-compatible superset; the UTF-16 variants exist so that a caller
/// declaring one gets a clean error instead of garbage diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
    EucJp,
    ShiftJis,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    /// Canonical name of the encoding.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Ascii => "US-ASCII",
            Encoding::Latin1 => "ISO-8859-1",
            Encoding::EucJp => "EUC-JP",
            Encoding::ShiftJis => "Shift_JIS",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
        }
    }

    /// Whether the encoding is a superset of ASCII, byte for byte.
    ///
    /// The engine's lexer walks source text bytewise, so only these
    /// encodings may be declared for evaluation input.
    pub fn is_ascii_compatible(self) -> bool {
        !matches!(self, Encoding::Utf16Le | Encoding::Utf16Be)
    }

    /// Look up an encoding by label, case-insensitively.
    ///
    /// Accepts the common aliases seen in locale strings and HTTP charsets
    /// (`utf8`, `latin1`, `sjis`, ...). Returns `None` for unknown labels.
    pub fn for_label(label: &str) -> Option<Encoding> {
        match label.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "us-ascii" | "ascii" | "ansi_x3.4-1968" | "646" => Some(Encoding::Ascii),
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" => Some(Encoding::Latin1),
            "euc-jp" | "eucjp" => Some(Encoding::EucJp),
            "shift_jis" | "shift-jis" | "sjis" | "cp932" | "windows-31j" => {
                Some(Encoding::ShiftJis)
            }
            "utf-16le" | "utf16le" => Some(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Some(Encoding::Utf16Be),
            _ => None,
        }
    }

    /// The process-default encoding.
    ///
    /// Derived from the platform locale (`LC_ALL`, `LC_CTYPE`, `LANG`, in
    /// that order) once at first use and cached for the process lifetime.
    /// Falls back to UTF-8 when the locale names no known charset.
    pub fn system() -> Encoding {
        *SYSTEM
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static SYSTEM: Lazy<Encoding> = Lazy::new(|| {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| from_locale(&value))
        .unwrap_or(Encoding::Utf8)
});

fn from_locale(locale: &str) -> Option<Encoding> {
    if locale == "C" || locale == "POSIX" {
        return Some(Encoding::Ascii);
    }
    // "ja_JP.eucJP", "en_US.UTF-8@calendar" and the like
    let charset = locale.split('.').nth(1)?;
    let charset = charset.split('@').next()?;
    Encoding::for_label(charset)
}

/// A byte string together with its declared encoding.
///
/// Evaluation results and engine error messages are `EncodedText`: the
/// engine interleaves source-location text with source bytes, so the bridge
/// hands the bytes through untouched and lets the caller decide how to
/// decode them. For the overwhelmingly common UTF-8 case, [`to_str`]
/// (strict) and [`Display`] (lossy) cover it.
///
/// [`to_str`]: EncodedText::to_str
/// [`Display`]: fmt::Display
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedText {
    bytes: Vec<u8>,
    encoding: Encoding,
}

impl EncodedText {
    pub(crate) fn new(bytes: Vec<u8>, encoding: Encoding) -> Self {
        EncodedText { bytes, encoding }
    }

    /// The raw bytes, exactly as produced by the engine.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The encoding the text was declared with.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Strict view as UTF-8.
    pub fn to_str(&self) -> std::result::Result<&str, Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    /// Lossy view: invalid UTF-8 sequences become U+FFFD.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Consume into the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Display for EncodedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for EncodedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedText({:?}, {})", self.to_string_lossy(), self.encoding)
    }
}

impl PartialEq<str> for EncodedText {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for EncodedText {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}
