//! Error types for the Jsonnet bridge

use crate::encoding::EncodedText;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the bridge.
///
/// Every engine-side failure (parse, static analysis, runtime, or an
/// ordinary failure propagated out of an import/native callback) surfaces
/// as [`Error::Evaluation`] carrying the engine-formatted message (with a
/// stack trace bounded by [`Vm::max_trace`](crate::Vm::max_trace)). The
/// message keeps the bytes and declared encoding of the triggering source;
/// it is never transcoded.
///
/// Panics raised inside host callbacks are *not* part of this taxonomy:
/// they unwind out of the evaluation call unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine reported an evaluation failure
    #[error("{0}")]
    Evaluation(EncodedText),

    /// Unknown configuration key
    #[error("Jsonnet VM does not support {0} option")]
    UnsupportedOption(String),

    /// Invalid argument shape, detected before the engine is involved
    #[error("{0}")]
    Argument(String),

    /// Value with no representation across the engine boundary
    #[error("no cross-boundary representation for {0}")]
    Marshaling(String),

    /// Declared source encoding the engine cannot consume
    #[error("jsonnet encoding must be ASCII-compatible but got {0}")]
    UnsupportedEncoding(String),

    /// The convenience layer failed to decode the engine's JSON output
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}
