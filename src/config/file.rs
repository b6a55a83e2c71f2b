//! TOML configuration file loading
//!
//! Supports `~/.config/tutor/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TutorConfigFile {
    /// Hosted model provider settings
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Model selection
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Prompt overrides
    #[serde(default)]
    pub prompts: PromptsFileConfig,

    /// Microphone recording
    #[serde(default)]
    pub recording: RecordingFileConfig,

    /// Session scratch space
    #[serde(default)]
    pub session: SessionFileConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// API key (the `OPENAI_API_KEY` env var takes precedence)
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub base_url: Option<String>,
}

/// Model configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    /// Image understanding model (e.g. "gpt-4o")
    pub vision: Option<String>,

    /// Chat completion model (e.g. "gpt-4o")
    pub chat: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub voice: Option<String>,

    /// Response length budget for the image analysis
    pub analysis_max_tokens: Option<u32>,
}

/// Prompt overrides
#[derive(Debug, Default, Deserialize)]
pub struct PromptsFileConfig {
    pub analysis: Option<String>,
    pub instructions: Option<String>,
    pub greeting: Option<String>,
}

/// Recording configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecordingFileConfig {
    /// Hard cap on one recording
    pub max_secs: Option<u64>,

    /// Trailing silence that ends an utterance
    pub silence_ms: Option<u64>,
}

/// Session scratch configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub scratch_dir: Option<String>,
    pub retain_artifacts: Option<bool>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP port
    pub port: Option<u16>,

    /// Directory with a custom web UI
    pub static_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `TutorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> TutorConfigFile {
    config_file_path().map_or_else(TutorConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
pub fn load_from(path: &Path) -> TutorConfigFile {
    if !path.exists() {
        return TutorConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TutorConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TutorConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/tutor/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tutor").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let fc: TutorConfigFile = toml::from_str(
            r#"
            [models]
            voice = "alloy"

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(fc.models.voice.as_deref(), Some("alloy"));
        assert_eq!(fc.server.port, Some(9000));
        assert!(fc.provider.api_key.is_none());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_from(&dir.path().join("absent.toml"));
        assert!(fc.models.chat.is_none());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let fc = load_from(&path);
        assert!(fc.server.port.is_none());
    }
}
