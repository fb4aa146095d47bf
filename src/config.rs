//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_ENGINE_THREADS, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! The engine fetch parameters (artifact repository, filename, storage path)
//! were compile-time constants in earlier revisions; they now live here, but
//! the two-tier engine fallback itself is decided once at startup and never
//! re-evaluated per request.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any interface (the default,
///   matching how the service is deployed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Speech-engine configuration.
///
/// ## Fields:
/// - `model_repo` / `model_file`: the Hugging Face repository and filename of
///   the GGML artifact used by the native (performance) engine
/// - `compat_model`: logical hub name of the model used by the Candle
///   (compatibility) engine; the hub client manages its own cache for it
/// - `threads`: inference thread count for the native engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub model_repo: String,
    pub model_file: String,
    pub compat_model: String,
    pub threads: usize,
}

/// Filesystem locations used by the service.
///
/// ## Fields:
/// - `model_dir`: where the downloaded GGML artifact is stored, named after
///   its source filename (created if absent)
/// - `scratch_dir`: where per-request audio uploads are written transiently;
///   each request gets its own unique file under this directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub model_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

/// Request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            engine: EngineConfig {
                model_repo: "reach-vb/whisper-large-v3-turbo-ggml".to_string(),
                model_file: "ggml-large-v3-turbo.bin".to_string(),
                compat_model: "openai/whisper-large-v3-turbo".to_string(),
                threads: 4,
            },
            storage: StorageConfig {
                model_dir: PathBuf::from("storage"),
                scratch_dir: env::temp_dir(),
            },
            limits: LimitsConfig {
                max_upload_bytes: 50 * 1024 * 1024,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_PORT=8080`: Override server port
    /// - `APP_ENGINE_THREADS=8`: Override native engine thread count
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching configuration errors early prevents runtime failures and
    /// provides clear error messages about what's wrong.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.engine.threads == 0 {
            return Err(anyhow::anyhow!("Engine thread count must be greater than 0"));
        }

        if self.engine.model_repo.is_empty() || self.engine.model_file.is_empty() {
            return Err(anyhow::anyhow!(
                "Performance engine artifact identifiers cannot be empty"
            ));
        }

        if self.engine.compat_model.is_empty() {
            return Err(anyhow::anyhow!("Compatibility engine model name cannot be empty"));
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        Ok(())
    }

    /// Full local path of the performance-engine model artifact.
    pub fn model_artifact_path(&self) -> PathBuf {
        self.storage.model_dir.join(&self.engine.model_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.engine.threads, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.engine.threads = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.engine.compat_model.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_artifact_path() {
        let config = AppConfig::default();
        assert_eq!(
            config.model_artifact_path(),
            PathBuf::from("storage").join("ggml-large-v3-turbo.bin")
        );
    }
}
