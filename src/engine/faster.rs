//! # Candle Whisper Engine
//!
//! Pure-Rust Whisper inference via Candle. This is the compatibility
//! backend: no native libraries, model weights fetched from the Hugging Face
//! Hub by logical name and cached wherever the hub client keeps them — the
//! service has no explicit path control over that cache.
//!
//! ## Inference shape:
//! Audio is split into 30-second windows; each window is greedy-decoded into
//! a timed [`Segment`], and the segments are concatenated in order into the
//! response transcript.

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::tokio::Api;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

use crate::audio::{decode_audio_file, TARGET_SAMPLE_RATE};
use crate::engine::{concat_segments, EngineError, EngineKind, Segment, SpeechEngine};

/// Upper bound on decoded tokens per 30-second window.
const MAX_DECODE_TOKENS: usize = 224;

/// Whisper model loaded through Candle.
///
/// The decoder mutates its KV cache during generation, so the model sits
/// behind a mutex; windows from one request decode sequentially, and
/// concurrent requests serialize on inference. The tokenizer, config and mel
/// filters are read-only.
pub struct FasterEngine {
    model: Mutex<m::model::Whisper>,
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    mel_filters: Vec<f32>,
    model_name: String,
}

impl FasterEngine {
    /// Fetch and load the model identified by `model_id`.
    ///
    /// ## Loading Process:
    /// 1. Resolve config, tokenizer and safetensors weights through the hub
    ///    client (downloads on first use, cached afterwards)
    /// 2. Fetch the precomputed mel filter bank matching the model's bin count
    /// 3. Memory-map the weights and build the model on CPU
    pub async fn load(model_id: &str) -> Result<Self, EngineError> {
        tracing::info!(model = model_id, "Loading Candle Whisper model");
        let start_time = std::time::Instant::now();

        let device = Device::Cpu;

        let api = Api::new().map_err(|e| EngineError::ModelFetch(e.to_string()))?;
        let repo = api.model(model_id.to_string());

        let config_path = repo
            .get("config.json")
            .await
            .map_err(|e| EngineError::ModelFetch(format!("config.json: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| EngineError::ModelFetch(format!("tokenizer.json: {}", e)))?;
        let weights_path = repo
            .get("model.safetensors")
            .await
            .map_err(|e| EngineError::ModelFetch(format!("model.safetensors: {}", e)))?;

        let config_contents = std::fs::read_to_string(&config_path)
            .map_err(|e| EngineError::ModelLoad(format!("read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| EngineError::ModelLoad(format!("parse config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EngineError::ModelLoad(format!("tokenizer: {}", e)))?;

        let mel_filters = fetch_mel_filters(&api, &config).await?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)
                .map_err(|e| EngineError::ModelLoad(format!("weights: {}", e)))?
        };

        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| EngineError::ModelLoad(format!("model: {}", e)))?;

        tracing::info!(
            model = model_id,
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "Candle Whisper model ready"
        );

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            config,
            device,
            mel_filters,
            model_name: model_id.to_string(),
        })
    }

    /// Greedy-decode one mel window into text.
    fn decode_window(
        &self,
        model: &mut m::model::Whisper,
        mel: &Tensor,
    ) -> Result<String, EngineError> {
        let sot_token = self.token_id(m::SOT_TOKEN)?;
        let transcribe_token = self.token_id(m::TRANSCRIBE_TOKEN)?;
        let no_timestamps_token = self.token_id(m::NO_TIMESTAMPS_TOKEN)?;
        let eot_token = self.token_id(m::EOT_TOKEN)?;

        let audio_features = model
            .encoder
            .forward(mel, true)
            .map_err(|e| EngineError::Inference(format!("encoder: {}", e)))?;

        let mut tokens = vec![sot_token, transcribe_token, no_timestamps_token];
        let prompt_len = tokens.len();
        let mut output_tokens: Vec<u32> = Vec::new();

        for _ in 0..MAX_DECODE_TOKENS {
            let token_tensor = Tensor::new(tokens.as_slice(), &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(|e| EngineError::Inference(format!("token tensor: {}", e)))?;

            let decoder_output = model
                .decoder
                .forward(&token_tensor, &audio_features, tokens.len() == prompt_len)
                .map_err(|e| EngineError::Inference(format!("decoder: {}", e)))?;

            let logits = decoder_output
                .squeeze(0)
                .and_then(|t| model.decoder.final_linear(&t))
                .map_err(|e| EngineError::Inference(format!("projection: {}", e)))?;

            let seq_len = logits
                .dim(0)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
            let next_token = logits
                .get(seq_len - 1)
                .and_then(|t| t.argmax(0))
                .and_then(|t| t.to_scalar::<u32>())
                .map_err(|e| EngineError::Inference(format!("argmax: {}", e)))?;

            if next_token == eot_token {
                break;
            }

            tokens.push(next_token);
            output_tokens.push(next_token);
        }

        model.reset_kv_cache();

        let text = self
            .tokenizer
            .decode(&output_tokens, true)
            .map_err(|e| EngineError::Inference(format!("detokenize: {}", e)))?;

        Ok(text.trim().to_string())
    }

    fn token_id(&self, token: &str) -> Result<u32, EngineError> {
        self.tokenizer
            .token_to_id(token)
            .ok_or_else(|| EngineError::Inference(format!("token not found: {}", token)))
    }
}

impl SpeechEngine for FasterEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Faster
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn transcribe(&self, path: &Path) -> Result<String, EngineError> {
        let pcm = decode_audio_file(path)?;

        // Mel spectrograms for all windows are computed up front so the
        // model lock is held only for decoding.
        let mut windows = Vec::new();
        for (i, chunk) in pcm.chunks(m::N_SAMPLES).enumerate() {
            let samples = if chunk.len() < m::N_SAMPLES {
                let mut padded = chunk.to_vec();
                padded.resize(m::N_SAMPLES, 0.0);
                padded
            } else {
                chunk.to_vec()
            };

            let mel_data = m::audio::pcm_to_mel(&self.config, &samples, &self.mel_filters);
            let n_mel = self.config.num_mel_bins;
            let n_frames = mel_data.len() / n_mel;

            let mel = Tensor::from_vec(mel_data, (1, n_mel, n_frames), &self.device)
                .map_err(|e| EngineError::Inference(format!("mel tensor: {}", e)))?;

            let start = (i * m::N_SAMPLES) as f64 / TARGET_SAMPLE_RATE as f64;
            let end = start + chunk.len() as f64 / TARGET_SAMPLE_RATE as f64;
            windows.push((start, end, mel));
        }

        let mut model = self
            .model
            .lock()
            .map_err(|_| EngineError::Inference("model lock poisoned".to_string()))?;

        let mut segments = Vec::new();
        for (start, end, mel) in &windows {
            let text = self.decode_window(&mut model, mel)?;
            if !text.is_empty() {
                segments.push(Segment {
                    start: *start,
                    end: *end,
                    text,
                });
            }
        }

        tracing::debug!(
            segments = segments.len(),
            "Candle transcription completed"
        );

        Ok(concat_segments(&segments))
    }
}

/// Fetch the precomputed mel filter bank for the model's bin count.
///
/// The filter banks are published as raw little-endian f32 files; 80-bin and
/// 128-bin variants cover every Whisper release.
async fn fetch_mel_filters(api: &Api, config: &Config) -> Result<Vec<f32>, EngineError> {
    let filename = match config.num_mel_bins {
        128 => "melfilters128.bytes",
        _ => "melfilters.bytes",
    };

    let repo = api.model("FL33TW00D-HF/whisper-base".to_string());
    let path = repo
        .get(filename)
        .await
        .map_err(|e| EngineError::ModelFetch(format!("{}: {}", filename, e)))?;

    let bytes =
        std::fs::read(&path).map_err(|e| EngineError::ModelLoad(format!("mel filters: {}", e)))?;

    let expected_len = config.num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(EngineError::ModelLoad(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    let filters = bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(filters)
}
