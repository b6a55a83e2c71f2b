//! Configuration management for the tutor

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

pub use file::TutorConfigFile;

/// Default OpenAI-compatible API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8501;

/// Prompt sent alongside the uploaded image
pub const DEFAULT_ANALYSIS_PROMPT: &str = "What's in this image?";

/// Tutoring instructions appended to the image analysis in the system turn
pub const DEFAULT_INSTRUCTIONS: &str = "You are my tutor. Guide me through the problem gradually. \
Never expose the answer directly. Do not answer to anything that is not related to learning subjects. \
Please respond only in English.";

/// First assistant turn of every conversation
pub const DEFAULT_GREETING: &str = "Hello! I'm here to help you with your learning problem. \
Let's work through it step-by-step. Please ask your first question.";

/// Tutor configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the hosted model provider
    pub api_key: SecretString,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Model selection
    pub models: ModelConfig,

    /// Conversation prompts
    pub prompts: PromptConfig,

    /// Microphone recording
    pub recording: RecordingConfig,

    /// Per-session scratch space
    pub session: SessionConfig,

    /// HTTP server
    pub server: ServerConfig,
}

/// Hosted model selection
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Image understanding model
    pub vision: String,

    /// Chat completion model
    pub chat: String,

    /// Speech-to-text model
    pub stt: String,

    /// Text-to-speech model
    pub tts: String,

    /// TTS voice identifier
    pub voice: String,

    /// Response length budget for the image analysis
    pub analysis_max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vision: "gpt-4o".to_string(),
            chat: "gpt-4o".to_string(),
            stt: "whisper-1".to_string(),
            tts: "tts-1".to_string(),
            voice: "nova".to_string(),
            analysis_max_tokens: 300,
        }
    }
}

/// Conversation prompts
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub analysis: String,
    pub instructions: String,
    pub greeting: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            analysis: DEFAULT_ANALYSIS_PROMPT.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

/// Microphone recording limits
#[derive(Debug, Clone, Copy)]
pub struct RecordingConfig {
    /// Hard cap on a single recording
    pub max_duration: Duration,

    /// Trailing silence that ends an utterance
    pub silence: Duration,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(30),
            silence: Duration::from_millis(1000),
        }
    }
}

/// Per-session scratch space
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Parent directory of the per-session directories
    pub scratch_dir: PathBuf,

    /// Keep uploaded images and turn audio after the session ends
    pub retain_artifacts: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            retain_artifacts: false,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to a static files directory replacing the embedded UI
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: None,
        }
    }
}

/// Default scratch directory: `~/.local/share/tutor/sessions` on Linux
fn default_scratch_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || std::env::temp_dir().join("tutor").join("sessions"),
        |d| d.data_dir().join("tutor").join("sessions"),
    )
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from `.env`, the TOML file and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if the provider credential is missing
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }

        let fc = file::load_config_file();
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration with precedence env > TOML > default
    ///
    /// # Errors
    ///
    /// Returns error if the provider credential is missing or empty
    pub fn from_sources<F>(env: F, fc: TutorConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let nonblank = |k: &String| !k.trim().is_empty();
        let api_key = env("OPENAI_API_KEY")
            .filter(nonblank)
            .or_else(|| fc.provider.api_key.filter(nonblank))
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is missing".to_string()))?;

        let base_url = env("OPENAI_BASE_URL")
            .or(fc.provider.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let default_models = ModelConfig::default();
        let models = ModelConfig {
            vision: env("TUTOR_VISION_MODEL")
                .or(fc.models.vision)
                .unwrap_or(default_models.vision),
            chat: env("TUTOR_CHAT_MODEL")
                .or(fc.models.chat)
                .unwrap_or(default_models.chat),
            stt: env("TUTOR_STT_MODEL")
                .or(fc.models.stt)
                .unwrap_or(default_models.stt),
            tts: env("TUTOR_TTS_MODEL")
                .or(fc.models.tts)
                .unwrap_or(default_models.tts),
            voice: env("TUTOR_TTS_VOICE")
                .or(fc.models.voice)
                .unwrap_or(default_models.voice),
            analysis_max_tokens: env("TUTOR_ANALYSIS_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .or(fc.models.analysis_max_tokens)
                .unwrap_or(default_models.analysis_max_tokens),
        };

        let default_prompts = PromptConfig::default();
        let prompts = PromptConfig {
            analysis: fc.prompts.analysis.unwrap_or(default_prompts.analysis),
            instructions: fc
                .prompts
                .instructions
                .unwrap_or(default_prompts.instructions),
            greeting: fc.prompts.greeting.unwrap_or(default_prompts.greeting),
        };

        let default_recording = RecordingConfig::default();
        let recording = RecordingConfig {
            max_duration: env("TUTOR_MAX_RECORDING_SECS")
                .and_then(|s| s.parse().ok())
                .or(fc.recording.max_secs)
                .map_or(default_recording.max_duration, Duration::from_secs),
            silence: env("TUTOR_SILENCE_MS")
                .and_then(|s| s.parse().ok())
                .or(fc.recording.silence_ms)
                .map_or(default_recording.silence, Duration::from_millis),
        };

        let session = SessionConfig {
            scratch_dir: env("TUTOR_SCRATCH_DIR")
                .or(fc.session.scratch_dir)
                .map_or_else(default_scratch_dir, PathBuf::from),
            retain_artifacts: env("TUTOR_RETAIN_ARTIFACTS")
                .map(|v| parse_bool(&v))
                .or(fc.session.retain_artifacts)
                .unwrap_or(false),
        };

        let server = ServerConfig {
            port: env("TUTOR_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            static_dir: env("TUTOR_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            models,
            prompts,
            recording,
            session,
            server,
        })
    }
}
