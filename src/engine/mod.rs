//! # Speech Engine Module
//!
//! Two interchangeable speech-to-text backends behind one capability trait:
//!
//! - **Native engine** (`cpp` feature): whisper.cpp via FFI bindings, loading
//!   a GGML artifact from local storage. Preferred when compiled in.
//! - **Candle engine**: pure-Rust Whisper inference, model fetched and cached
//!   by logical hub name. The fallback when the native bindings are absent.
//!
//! The choice between them is made exactly once at startup by the resolver
//! and never re-evaluated; every request for the lifetime of the process
//! goes through the same engine. See [`resolver::resolve`].

pub mod faster;
pub mod resolver;

#[cfg(feature = "cpp")]
pub mod cpp;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub use resolver::resolve;

/// Which backend was selected at startup.
///
/// The wire names (`"cpp"` / `"faster"`) are part of the response contract
/// and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    /// Native whisper.cpp bindings.
    #[serde(rename = "cpp")]
    Cpp,

    /// Pure-Rust Candle inference.
    #[serde(rename = "faster")]
    Faster,
}

impl EngineKind {
    /// The tag as it appears in API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Cpp => "cpp",
            EngineKind::Faster => "faster",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors produced while preparing or running a speech engine.
#[derive(Debug)]
pub enum EngineError {
    /// Remote model artifact unreachable or corrupt. Fatal at startup.
    ModelFetch(String),

    /// Model files present but could not be loaded into memory.
    ModelLoad(String),

    /// The uploaded payload could not be decoded as audio.
    Decode(String),

    /// Inference itself failed.
    Inference(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ModelFetch(msg) => write!(f, "model fetch failed: {}", msg),
            EngineError::ModelLoad(msg) => write!(f, "model load failed: {}", msg),
            EngineError::Decode(msg) => write!(f, "audio decode failed: {}", msg),
            EngineError::Inference(msg) => write!(f, "inference failed: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// A timed piece of transcript produced by the Candle engine.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Start offset within the audio, in seconds.
    pub start: f64,

    /// End offset within the audio, in seconds.
    pub end: f64,

    /// Transcribed text for this window.
    pub text: String,
}

/// Collapse timed segments into the response transcript.
///
/// Segment texts are concatenated in order with no separator inserted
/// between them. This matches the observed output of the original service;
/// whether a separator is intended is unconfirmed, so none is added.
pub fn concat_segments(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// The capability every backend provides: turn an audio file on disk into a
/// transcript.
///
/// ## Contract:
/// - Implementations are `Send + Sync` and safe for concurrent calls; the
///   loaded model is read-only after construction.
/// - `transcribe` blocks for the full inference duration. Callers on an
///   async runtime must dispatch it to a blocking worker.
/// - Failures propagate as [`EngineError`]; no partial transcript is ever
///   returned.
pub trait SpeechEngine: Send + Sync {
    /// The tag reported in every response.
    fn kind(&self) -> EngineKind;

    /// Identity of the loaded model, for diagnostics.
    fn model_name(&self) -> &str;

    /// Transcribe the audio file at `path` into a single string.
    fn transcribe(&self, path: &Path) -> Result<String, EngineError>;
}
