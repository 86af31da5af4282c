//! Runtime settings loaded from the environment (and `.env` when present)

use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 1800;
pub const DEFAULT_CACHE_PREFIX: &str = "multiasset:";
pub const DEFAULT_SPECIALIST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONTEXT_WINDOW: usize = 5;
pub const DEFAULT_CONTEXT_MESSAGE_CHARS: usize = 200;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct Settings {
    /// TTL applied to cached analyses
    pub cache_ttl_secs: u64,
    /// Namespace prepended to every cache key
    pub cache_prefix: String,
    /// Upper bound on a single specialist invocation
    pub specialist_timeout_secs: u64,
    /// Number of recent messages used for context injection
    pub context_window: usize,
    /// Per-message truncation inside the injection text
    pub context_message_chars: usize,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub database_url: Option<String>,
    /// Shared cache; in-memory when unset
    pub redis_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            specialist_timeout_secs: DEFAULT_SPECIALIST_TIMEOUT_SECS,
            context_window: DEFAULT_CONTEXT_WINDOW,
            context_message_chars: DEFAULT_CONTEXT_MESSAGE_CHARS,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            database_url: None,
            redis_url: None,
        }
    }
}

impl Settings {
    /// Load settings from process environment, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            cache_ttl_secs: parse_var("CACHE_TTL", defaults.cache_ttl_secs)?,
            cache_prefix: non_empty_var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix),
            specialist_timeout_secs: parse_var(
                "SPECIALIST_TIMEOUT_SECS",
                defaults.specialist_timeout_secs,
            )?,
            context_window: parse_var("CONTEXT_WINDOW", defaults.context_window)?,
            context_message_chars: parse_var(
                "CONTEXT_MESSAGE_CHARS",
                defaults.context_message_chars,
            )?,
            gemini_api_key: non_empty_var("GEMINI_API_KEY")
                .filter(|key| key != "your_gemini_api_key_here"),
            gemini_model: non_empty_var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            database_url: non_empty_var("POSTGRES_URL").or_else(|| non_empty_var("DATABASE_URL")),
            redis_url: non_empty_var("REDIS_URL"),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn specialist_timeout(&self) -> Duration {
        Duration::from_secs(self.specialist_timeout_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_var(name) {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            OrchestrationError::Configuration(format!("{} has invalid value '{}'", name, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cache_ttl(), Duration::from_secs(1800));
        assert_eq!(settings.specialist_timeout(), Duration::from_secs(30));
        assert_eq!(settings.context_window, 5);
        assert_eq!(settings.cache_prefix, "multiasset:");
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("ASSET_ORCH_TEST_BAD_NUMBER", "soon");
        let parsed: Result<u64> = parse_var("ASSET_ORCH_TEST_BAD_NUMBER", 7);
        assert!(matches!(parsed, Err(OrchestrationError::Configuration(_))));
        env::remove_var("ASSET_ORCH_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_parse_var_falls_back_when_unset() {
        let parsed: u64 = parse_var("ASSET_ORCH_TEST_UNSET_NUMBER", 42).unwrap();
        assert_eq!(parsed, 42);
    }
}
