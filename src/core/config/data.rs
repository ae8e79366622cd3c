use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3000";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.95;

/// Where the relay sends chat requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamKind {
    /// A backend exposing `POST /chat/stream` with `{token}` frames.
    #[default]
    Backend,
    /// An OpenAI-compatible `chat/completions` endpoint.
    #[value(name = "openai")]
    OpenAi,
}

impl UpstreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamKind::Backend => "backend",
            UpstreamKind::OpenAi => "openai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backend" => Some(UpstreamKind::Backend),
            "openai" => Some(UpstreamKind::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl OpenAiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn top_p(&self) -> f32 {
        self.top_p.unwrap_or(DEFAULT_TOP_P)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the streaming chat backend.
    pub backend_url: Option<String>,
    /// Socket address `relaychat serve` listens on.
    pub bind: Option<String>,
    /// Base URL of the relay the front-ends talk to.
    pub relay_url: Option<String>,
    pub upstream: Option<UpstreamKind>,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

impl Config {
    pub fn backend_url(&self) -> &str {
        self.backend_url.as_deref().unwrap_or(DEFAULT_BACKEND_URL)
    }

    pub fn bind_address(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }

    pub fn relay_url(&self) -> &str {
        self.relay_url.as_deref().unwrap_or(DEFAULT_RELAY_URL)
    }

    pub fn upstream(&self) -> UpstreamKind {
        self.upstream.unwrap_or_default()
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
