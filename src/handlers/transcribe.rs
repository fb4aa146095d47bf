//! # Transcription Endpoint
//!
//! Converts one HTTP upload into one transcript using the engine resolved at
//! startup.
//!
//! ## Endpoint: `POST /transcribe`
//!
//! Request: multipart/form-data with one file field named `audio`.
//!
//! Response:
//! ```json
//! { "text": "transcribed speech", "engine": "cpp" }
//! ```
//!
//! The upload is written to a per-request scratch file, the engine runs on a
//! blocking worker (inference is CPU-bound and has no cancellation hook),
//! and the scratch file is removed on every exit path. Engine failures
//! surface as a server error with no partial transcript.

use crate::error::AppError;
use crate::handlers::scratch::ScratchAudio;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Serialize;

use crate::engine::EngineKind;

/// Body of a successful transcription response.
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub engine: EngineKind,
}

/// Handle `POST /transcribe`.
pub async fn transcribe(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    let audio_bytes = read_audio_field(payload, config.limits.max_upload_bytes).await?;

    // Unique path per request; removed by the guard when the handler
    // returns, whether transcription succeeded or failed.
    let scratch = ScratchAudio::write(&config.storage.scratch_dir, &audio_bytes)?;

    let engine = state.engine();
    let path = scratch.path().to_path_buf();
    let text = web::block(move || engine.transcribe(&path)).await??;

    state.record_transcription();

    Ok(HttpResponse::Ok().json(TranscribeResponse {
        text,
        engine: state.engine_kind(),
    }))
}

/// Collect the bytes of the `audio` field, enforcing the upload size cap
/// while streaming.
async fn read_audio_field(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    let mut audio_bytes: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(|name| name.to_string());

        if field_name.as_deref() != Some("audio") {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;

            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::ValidationError(format!(
                    "File too large (max: {} bytes)",
                    max_bytes
                )));
            }

            bytes.extend_from_slice(&chunk);
        }

        audio_bytes = Some(bytes);
    }

    audio_bytes.ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::engine::{EngineError, SpeechEngine};
    use actix_web::{test, App};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Engine that returns a fixed aggregate string, like the native backend.
    struct FixedEngine {
        kind: EngineKind,
        text: &'static str,
    }

    impl SpeechEngine for FixedEngine {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        fn model_name(&self) -> &str {
            "fixed"
        }

        fn transcribe(&self, _path: &Path) -> Result<String, EngineError> {
            Ok(self.text.to_string())
        }
    }

    /// Engine that echoes the uploaded bytes back as the transcript, which
    /// makes cross-request contamination observable.
    struct EchoEngine;

    impl SpeechEngine for EchoEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Faster
        }

        fn model_name(&self) -> &str {
            "echo"
        }

        fn transcribe(&self, path: &Path) -> Result<String, EngineError> {
            let bytes = std::fs::read(path).map_err(|e| EngineError::Decode(e.to_string()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    /// Engine that always fails, standing in for corrupt audio.
    struct FailingEngine;

    impl SpeechEngine for FailingEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Faster
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn transcribe(&self, _path: &Path) -> Result<String, EngineError> {
            Err(EngineError::Decode("unsupported audio container".to_string()))
        }
    }

    fn unique_scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("transcribe-test-{}", uuid::Uuid::new_v4()))
    }

    fn test_state(engine: Arc<dyn SpeechEngine>, scratch_dir: PathBuf) -> AppState {
        let mut config = AppConfig::default();
        config.storage.scratch_dir = scratch_dir;
        AppState::new(config, engine)
    }

    fn multipart_request(field_name: &str, body: &str) -> test::TestRequest {
        let boundary = "test-boundary";
        let payload = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field_name}\"; filename=\"clip.wav\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {body}\r\n\
             --{boundary}--\r\n"
        );

        test::TestRequest::post()
            .uri("/transcribe")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(payload)
    }

    #[actix_web::test]
    async fn test_transcript_and_engine_tag_in_response() {
        let scratch_dir = unique_scratch_dir();
        let state = test_state(
            Arc::new(FixedEngine {
                kind: EngineKind::Cpp,
                text: "hello world",
            }),
            scratch_dir.clone(),
        );

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;

        let resp = test::call_service(&app, multipart_request("audio", "anything").to_request()).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["text"], "hello world");
        assert_eq!(body["engine"], "cpp");

        std::fs::remove_dir_all(&scratch_dir).unwrap();
    }

    #[actix_web::test]
    async fn test_engine_tag_matches_startup_selection() {
        let scratch_dir = unique_scratch_dir();
        let state = test_state(Arc::new(EchoEngine), scratch_dir.clone());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;

        for body in ["first", "second"] {
            let resp = test::call_service(&app, multipart_request("audio", body).to_request()).await;
            let json: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(json["engine"], "faster");
        }

        std::fs::remove_dir_all(&scratch_dir).unwrap();
    }

    #[actix_web::test]
    async fn test_concurrent_requests_get_their_own_transcripts() {
        let scratch_dir = unique_scratch_dir();
        let state = test_state(Arc::new(EchoEngine), scratch_dir.clone());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;

        let first = test::call_service(&app, multipart_request("audio", "payload one").to_request());
        let second =
            test::call_service(&app, multipart_request("audio", "payload two").to_request());
        let (resp_one, resp_two) = tokio::join!(first, second);

        let body_one: serde_json::Value = test::read_body_json(resp_one).await;
        let body_two: serde_json::Value = test::read_body_json(resp_two).await;
        assert_eq!(body_one["text"], "payload one");
        assert_eq!(body_two["text"], "payload two");

        std::fs::remove_dir_all(&scratch_dir).unwrap();
    }

    #[actix_web::test]
    async fn test_scratch_file_removed_after_success() {
        let scratch_dir = unique_scratch_dir();
        let state = test_state(Arc::new(EchoEngine), scratch_dir.clone());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;

        let resp = test::call_service(&app, multipart_request("audio", "payload").to_request()).await;
        assert!(resp.status().is_success());

        assert_eq!(std::fs::read_dir(&scratch_dir).unwrap().count(), 0);
        std::fs::remove_dir_all(&scratch_dir).unwrap();
    }

    #[actix_web::test]
    async fn test_scratch_file_removed_after_engine_failure() {
        let scratch_dir = unique_scratch_dir();
        let state = test_state(Arc::new(FailingEngine), scratch_dir.clone());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;

        let resp = test::call_service(&app, multipart_request("audio", "payload").to_request()).await;
        assert_eq!(resp.status().as_u16(), 500);

        assert_eq!(std::fs::read_dir(&scratch_dir).unwrap().count(), 0);
        std::fs::remove_dir_all(&scratch_dir).unwrap();
    }

    #[actix_web::test]
    async fn test_missing_audio_field_is_rejected() {
        let scratch_dir = unique_scratch_dir();
        let state = test_state(Arc::new(EchoEngine), scratch_dir.clone());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;

        let resp = test::call_service(&app, multipart_request("other", "payload").to_request()).await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_rejected() {
        let scratch_dir = unique_scratch_dir();
        let mut config = AppConfig::default();
        config.storage.scratch_dir = scratch_dir;
        config.limits.max_upload_bytes = 4;
        let state = AppState::new(config, Arc::new(EchoEngine));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;

        let resp = test::call_service(
            &app,
            multipart_request("audio", "more than four bytes").to_request(),
        )
        .await;
        assert_eq!(resp.status().as_u16(), 400);
    }
}
