//! # Transcribe Backend
//!
//! A minimal HTTP service that accepts an uploaded audio file and returns a
//! transcript, backed by one of two interchangeable speech-to-text engines
//! selected once at process start:
//!
//! - **whisper.cpp** (native bindings, `cpp` feature) when compiled in
//! - **Candle** (pure Rust) as the fallback
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **engine**: the two backends behind one `SpeechEngine` trait, plus the
//!   startup resolver that picks between them
//! - **audio**: decoding uploaded files into 16kHz mono PCM
//! - **handlers**: the `/transcribe` endpoint and its scratch-file handling
//! - **state**: dependency-injected shared state (engine handle, metrics)
//! - **health** / **middleware**: service monitoring and request telemetry
//! - **error**: typed errors mapped to JSON HTTP responses
//! - **manifest**: standalone requirements-manifest rewriter (see the
//!   `flexify_requirements` binary)

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod health;
pub mod manifest;
pub mod middleware;
pub mod state;
