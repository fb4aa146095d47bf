//! # Engine Resolver
//!
//! Picks a transcription backend at process start and makes it ready to
//! serve requests. The choice is static, one-time and irreversible: when the
//! native whisper.cpp bindings are compiled in (`cpp` feature) the
//! performance engine is selected, otherwise the Candle compatibility engine
//! is. There is no runtime switching and no per-request selection.
//!
//! Any failure here — unreachable model artifact, corrupt weights — is fatal
//! to startup; the process never reaches a ready state. No retry logic.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::{EngineError, SpeechEngine};

/// Resolve the speech engine for this process.
///
/// Returns the loaded engine as a shared trait object; callers store it in
/// application state and treat it as read-only for the rest of execution.
#[cfg(feature = "cpp")]
pub async fn resolve(config: &AppConfig) -> Result<Arc<dyn SpeechEngine>, EngineError> {
    tracing::info!("Engine selection: whisper.cpp (native performance)");

    let artifact = ensure_artifact(config).await?;
    let engine = super::cpp::CppEngine::load(&artifact, config.engine.threads)?;
    Ok(Arc::new(engine))
}

/// Resolve the speech engine for this process.
///
/// The native bindings are not compiled in, so the Candle engine is selected
/// directly; no GGML artifact fetch is attempted.
#[cfg(not(feature = "cpp"))]
pub async fn resolve(config: &AppConfig) -> Result<Arc<dyn SpeechEngine>, EngineError> {
    tracing::info!("Engine selection: Candle (pure-Rust compatibility)");

    let engine = super::faster::FasterEngine::load(&config.engine.compat_model).await?;
    Ok(Arc::new(engine))
}

/// Make sure the GGML artifact exists under the model storage directory.
///
/// The artifact is fetched from the hub by its `(repository, filename)` pair
/// on first start and stored under the configured directory, named after its
/// source filename. Integrity is covered by the hub client's own
/// etag-verified blob handling.
#[cfg(feature = "cpp")]
async fn ensure_artifact(config: &AppConfig) -> Result<std::path::PathBuf, EngineError> {
    use hf_hub::api::tokio::Api;

    let artifact_path = config.model_artifact_path();
    if artifact_path.exists() {
        tracing::debug!(path = %artifact_path.display(), "Model artifact already present");
        return Ok(artifact_path);
    }

    std::fs::create_dir_all(&config.storage.model_dir)
        .map_err(|e| EngineError::ModelFetch(format!("create model dir: {}", e)))?;

    tracing::info!(
        repo = %config.engine.model_repo,
        file = %config.engine.model_file,
        "Downloading GGML model artifact"
    );

    let api = Api::new().map_err(|e| EngineError::ModelFetch(e.to_string()))?;
    let cached = api
        .model(config.engine.model_repo.clone())
        .get(&config.engine.model_file)
        .await
        .map_err(|e| {
            EngineError::ModelFetch(format!(
                "{}/{}: {}",
                config.engine.model_repo, config.engine.model_file, e
            ))
        })?;

    std::fs::copy(&cached, &artifact_path)
        .map_err(|e| EngineError::ModelFetch(format!("store artifact: {}", e)))?;

    tracing::info!(path = %artifact_path.display(), "Model artifact stored");
    Ok(artifact_path)
}
