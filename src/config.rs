use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::agents::OutputLanguage;
use crate::types::LLMProvider;

pub const DEFAULT_AGGREGATOR_BASE_URL: &str = "https://api.tailvy.com/v1";
pub const DEFAULT_GEOCODER_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_EMBEDDING_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub aggregator: AggregatorConfig,
    pub geocoding: GeocodingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub sessions: SessionConfig,
    pub attractions: AttractionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub model: String,
    /// Process-wide fallback key; sessions may supply their own.
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stage_timeout_secs: u64,
}

impl LLMConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl AggregatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub language: OutputLanguage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Zero keeps idle sessions forever.
    pub idle_ttl_secs: u64,
    pub max_chat_turns: usize,
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttractionsConfig {
    pub enabled: bool,
    /// Process-wide embedding key; sessions may supply their own.
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub dimensions: u32,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let provider_id = var("LLM_PROVIDER", "google");
        let provider = LLMProvider::from_id(&provider_id)
            .with_context(|| format!("Unsupported LLM_PROVIDER: {}", provider_id))?;

        let language_code = var("OUTPUT_LANGUAGE", "en");

        Ok(Self {
            server: ServerConfig {
                port: var("PORT", "3000")
                    .parse()
                    .context("PORT must be a valid port number")?,
                host: var("HOST", "0.0.0.0"),
                cors_allowed_origins: var(
                    "ALLOWED_ORIGINS",
                    "http://localhost:3000,http://localhost:5173",
                )
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            llm: LLMConfig {
                provider,
                model: var("LLM_MODEL", default_model(provider)),
                api_key: lookup("LLM_API_KEY")
                    .or_else(|| lookup("GEMINI_API_KEY"))
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                max_tokens: var("LLM_MAX_TOKENS", "2048")
                    .parse()
                    .context("LLM_MAX_TOKENS must be an integer")?,
                temperature: var("LLM_TEMPERATURE", "0.7")
                    .parse()
                    .context("LLM_TEMPERATURE must be a number")?,
                stage_timeout_secs: var("STAGE_TIMEOUT_SECS", "120")
                    .parse()
                    .context("STAGE_TIMEOUT_SECS must be an integer")?,
            },
            aggregator: AggregatorConfig {
                base_url: var("AGGREGATOR_BASE_URL", DEFAULT_AGGREGATOR_BASE_URL),
                api_key: var("AGGREGATOR_API_KEY", ""),
                timeout_secs: var("AGGREGATOR_TIMEOUT_SECS", "30")
                    .parse()
                    .context("AGGREGATOR_TIMEOUT_SECS must be an integer")?,
            },
            geocoding: GeocodingConfig {
                enabled: var("GEOCODER_ENABLED", "true")
                    .parse()
                    .context("GEOCODER_ENABLED must be true or false")?,
                base_url: var("GEOCODER_BASE_URL", DEFAULT_GEOCODER_BASE_URL),
                user_agent: var("GEOCODER_USER_AGENT", "travel_app"),
            },
            output: OutputConfig {
                language: OutputLanguage::from_code(&language_code),
            },
            logging: LoggingConfig {
                log_dir: lookup("LOG_DIR")
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
            },
            sessions: SessionConfig {
                idle_ttl_secs: var("SESSION_IDLE_TTL_SECS", "86400")
                    .parse()
                    .context("SESSION_IDLE_TTL_SECS must be an integer")?,
                max_chat_turns: var("SESSION_MAX_CHAT_TURNS", "50")
                    .parse()
                    .context("SESSION_MAX_CHAT_TURNS must be an integer")?,
            },
            attractions: AttractionsConfig {
                enabled: var("ATTRACTIONS_ENABLED", "true")
                    .parse()
                    .context("ATTRACTIONS_ENABLED must be true or false")?,
                api_key: lookup("EMBEDDING_API_KEY")
                    .or_else(|| lookup("OPENAI_API_KEY"))
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                api_base: var("EMBEDDING_API_BASE", DEFAULT_EMBEDDING_API_BASE),
                model: var("EMBEDDING_MODEL", "text-embedding-3-small"),
                dimensions: var("EMBEDDING_DIMENSIONS", "256")
                    .parse()
                    .context("EMBEDDING_DIMENSIONS must be an integer")?,
                catalog_path: lookup("ATTRACTIONS_FILE")
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
            },
        })
    }
}

fn default_model(provider: LLMProvider) -> &'static str {
    match provider {
        LLMProvider::Google => "gemini-2.0-flash",
        LLMProvider::OpenAI => "gpt-4o-mini",
        LLMProvider::Groq => "llama-3.3-70b-versatile",
        LLMProvider::OpenRouter => "openai/gpt-4o-mini",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.llm.provider, LLMProvider::Google);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert!(config.llm.api_key.is_empty());
        assert_eq!(config.aggregator.timeout(), Duration::from_secs(30));
        assert_eq!(config.aggregator.base_url, DEFAULT_AGGREGATOR_BASE_URL);
        assert_eq!(config.output.language, OutputLanguage::English);
        assert!(config.logging.log_dir.is_none());
        assert_eq!(config.sessions.idle_ttl(), Some(Duration::from_secs(86400)));
        assert_eq!(config.sessions.max_chat_turns, 50);
        assert!(config.attractions.enabled);
        assert_eq!(config.attractions.model, "text-embedding-3-small");
        assert_eq!(config.attractions.dimensions, 256);
        assert!(config.attractions.catalog_path.is_none());
    }

    #[test]
    fn test_session_and_embedding_settings() {
        let config = config_from(&[
            ("SESSION_IDLE_TTL_SECS", "0"),
            ("SESSION_MAX_CHAT_TURNS", "5"),
            ("OPENAI_API_KEY", "sk-fallback"),
        ])
        .unwrap();
        assert!(config.sessions.idle_ttl().is_none());
        assert_eq!(config.sessions.max_chat_turns, 5);
        assert_eq!(config.attractions.api_key, "sk-fallback");

        let config = config_from(&[("EMBEDDING_API_KEY", "sk-embed"), ("OPENAI_API_KEY", "sk-x")]).unwrap();
        assert_eq!(config.attractions.api_key, "sk-embed");
        assert!(config_from(&[("EMBEDDING_DIMENSIONS", "many")]).is_err());
    }

    #[test]
    fn test_gemini_key_fallback() {
        let config = config_from(&[("GEMINI_API_KEY", "AIza-test")]).unwrap();
        assert_eq!(config.llm.api_key, "AIza-test");

        let config = config_from(&[("GEMINI_API_KEY", "AIza-a"), ("LLM_API_KEY", "AIza-b")]).unwrap();
        assert_eq!(config.llm.api_key, "AIza-b");
    }

    #[test]
    fn test_provider_model_default() {
        let config = config_from(&[("LLM_PROVIDER", "groq")]).unwrap();
        assert_eq!(config.llm.provider, LLMProvider::Groq);
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("PORT", "not-a-port")]).is_err());
        assert!(config_from(&[("LLM_PROVIDER", "unknown")]).is_err());
    }

    #[test]
    fn test_origins_split() {
        let config = config_from(&[("ALLOWED_ORIGINS", "http://a.test, http://b.test,")]).unwrap();
        assert_eq!(
            config.server.cors_allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
