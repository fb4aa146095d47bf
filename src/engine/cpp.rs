//! # Native Whisper Engine
//!
//! whisper.cpp through the `whisper-rs` FFI bindings. This is the
//! performance backend: a GGML artifact loaded from local storage and run
//! with a fixed thread count. Only compiled when the `cpp` feature is
//! enabled; the resolver falls back to the Candle engine otherwise.

use std::path::Path;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::decode_audio_file;
use crate::engine::{EngineError, EngineKind, SpeechEngine};

/// whisper.cpp context loaded from a GGML artifact.
///
/// The context itself is immutable after load; each transcription call
/// creates its own inference state, so concurrent calls are safe.
pub struct CppEngine {
    context: WhisperContext,
    threads: usize,
    model_name: String,
}

impl CppEngine {
    /// Load the GGML artifact at `model_path`.
    pub fn load(model_path: &Path, threads: usize) -> Result<Self, EngineError> {
        if !model_path.exists() {
            return Err(EngineError::ModelLoad(format!(
                "model artifact not found at {}",
                model_path.display()
            )));
        }

        let path_str = model_path
            .to_str()
            .ok_or_else(|| EngineError::ModelLoad("model path is not valid UTF-8".to_string()))?;

        tracing::info!(path = path_str, threads, "Loading whisper.cpp model");
        let start_time = std::time::Instant::now();

        let context =
            WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
                .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

        tracing::info!(
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "whisper.cpp model ready"
        );

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.to_string());

        Ok(Self {
            context,
            threads,
            model_name,
        })
    }
}

impl SpeechEngine for CppEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Cpp
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn transcribe(&self, path: &Path) -> Result<String, EngineError> {
        let pcm = decode_audio_file(path)?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads as i32);
        params.set_language(Some("auto"));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let mut state = self
            .context
            .create_state()
            .map_err(|e| EngineError::Inference(format!("create state: {}", e)))?;

        state
            .full(params, &pcm)
            .map_err(|e| EngineError::Inference(format!("run model: {}", e)))?;

        // whisper.cpp hands back internal segments; the response contract is
        // one aggregate string.
        let num_segments = state
            .full_n_segments()
            .map_err(|e| EngineError::Inference(format!("segment count: {}", e)))?;

        let mut text = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| EngineError::Inference(format!("segment {}: {}", i, e)))?;
            text.push_str(&segment);
        }

        Ok(text.trim().to_string())
    }
}
