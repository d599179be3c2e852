//! Process-wide configuration, resolved once at startup.
//!
//! Everything the bridge needs to reach the Gemini Live API (credential,
//! model, endpoint) and the session defaults it configures upstream with
//! (instructions, voice, language) live here. The loaded `Config` is
//! immutable and shared via `AppState`.

use std::net::SocketAddr;
use tracing::Level;

/// Default system prompt for the Rev assistant, used when
/// `SYSTEM_INSTRUCTIONS` is not set.
const DEFAULT_INSTRUCTIONS: &str = "You are Rev, the Revolt Motors assistant. \
Only discuss Revolt Motors products, pricing, service, test rides, dealership \
locations, financing, and company policies. Politely refuse unrelated topics.";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Credential injected into the upstream connection URL. Never sent to
    /// or received from the browser client.
    pub api_key: String,
    pub model: String,
    /// Base endpoint for the Gemini Live WebSocket API. Overridable so tests
    /// can point the bridge at a local fake upstream.
    pub upstream_url: String,
    pub instructions: String,
    pub spoken_language: String,
    pub voice: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        // GOOGLE_API_KEY takes precedence over GEMINI_API_KEY.
        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| {
                ConfigError::MissingVar("GOOGLE_API_KEY or GEMINI_API_KEY".to_string())
            })?;

        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash-live-001".to_string());

        let upstream_url = std::env::var("GEMINI_LIVE_URL")
            .unwrap_or_else(|_| "wss://generativelanguage.googleapis.com/v1beta".to_string());

        let instructions = std::env::var("SYSTEM_INSTRUCTIONS")
            .unwrap_or_else(|_| DEFAULT_INSTRUCTIONS.to_string());

        let spoken_language =
            std::env::var("SPOKEN_LANGUAGE").unwrap_or_else(|_| "en-IN".to_string());

        let voice = std::env::var("VOICE").unwrap_or_else(|_| "Puck".to_string());

        let log_level_str = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "LOG_LEVEL".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            api_key,
            model,
            upstream_url,
            instructions,
            spoken_language,
            voice,
            log_level,
        })
    }
}
