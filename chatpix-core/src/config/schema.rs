//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for chatpix
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote API endpoint and credentials
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Chat completion settings
    #[serde(default)]
    pub chat: ChatConfig,
    /// Image generation settings
    #[serde(default)]
    pub image: ImageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// API key, or a configuration error when none was provided
    pub fn require_api_key(&self) -> crate::Result<&str> {
        let key = self.provider.api_key.trim();
        if key.is_empty() {
            return Err(crate::Error::Config(
                "provider.api_key is not set; export OPENAI_API_KEY or run `chatpix onboard`"
                    .to_string(),
            ));
        }
        Ok(key)
    }
}

/// Provider endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub extra_headers: Option<HashMap<String, String>>,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            extra_headers: None,
        }
    }
}

/// Chat completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Instruction seeded as the first message of every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_system_prompt() -> String {
    concat!(
        "You are an intelligent, reliable AI assistant. ",
        "Your tasks include writing clear and efficient code, answering questions accurately, ",
        "providing helpful personal assistance, and creating safe, appropriate images when requested. ",
        "If a user asks for any image that is unsafe or not allowed, you must decline the request politely ",
        "and suggest a safe, suitable alternative instead. ",
        "Always respond in a friendly, respectful, and professional manner."
    )
    .to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Image generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_model")]
    pub model: String,
    /// Image dimensions as `<width>x<height>`
    #[serde(default = "default_image_size")]
    pub size: String,
    /// Number of images requested per prompt
    #[serde(default = "default_image_count")]
    pub count: u32,
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_image_count() -> u32 {
    1
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            size: default_image_size(),
            count: default_image_count(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files; relative paths resolve against the config directory
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}
