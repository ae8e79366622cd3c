use crate::core::config::data::{Config, UpstreamKind};
use tracing::warn;

pub const BACKEND_URL_ENV: &str = "RELAYCHAT_BACKEND_URL";
pub const BIND_ENV: &str = "RELAYCHAT_BIND";
pub const RELAY_URL_ENV: &str = "RELAYCHAT_RELAY_URL";
pub const UPSTREAM_ENV: &str = "RELAYCHAT_UPSTREAM";
pub const OPENAI_BASE_URL_ENV: &str = "RELAYCHAT_OPENAI_BASE_URL";
pub const OPENAI_API_KEY_ENV: &str = "RELAYCHAT_OPENAI_API_KEY";
pub const OPENAI_MODEL_ENV: &str = "RELAYCHAT_OPENAI_MODEL";
pub const OPENAI_SYSTEM_PROMPT_ENV: &str = "RELAYCHAT_OPENAI_SYSTEM_PROMPT";
/// Conventional key variable, consulted when the prefixed one is unset.
pub const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";

impl Config {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Layers values from `lookup` over the file settings. Empty values are
    /// treated as unset.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get(BACKEND_URL_ENV) {
            self.backend_url = Some(value);
        }
        if let Some(value) = get(BIND_ENV) {
            self.bind = Some(value);
        }
        if let Some(value) = get(RELAY_URL_ENV) {
            self.relay_url = Some(value);
        }
        if let Some(value) = get(UPSTREAM_ENV) {
            match UpstreamKind::parse(&value) {
                Some(kind) => self.upstream = Some(kind),
                None => warn!(variable = UPSTREAM_ENV, value = %value, "Ignoring unknown upstream"),
            }
        }
        if let Some(value) = get(OPENAI_BASE_URL_ENV) {
            self.openai.base_url = Some(value);
        }
        if let Some(value) = get(OPENAI_API_KEY_ENV).or_else(|| {
            if self.openai.api_key.is_none() {
                get(FALLBACK_API_KEY_ENV)
            } else {
                None
            }
        }) {
            self.openai.api_key = Some(value);
        }
        if let Some(value) = get(OPENAI_MODEL_ENV) {
            self.openai.model = Some(value);
        }
        if let Some(value) = get(OPENAI_SYSTEM_PROMPT_ENV) {
            self.openai.system_prompt = Some(value);
        }
    }
}
