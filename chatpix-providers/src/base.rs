//! Base traits for remote model providers

use async_trait::async_trait;
use chatpix_core::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        /// Machine-readable error code from the response body, if any
        code: Option<String>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Response from a chat completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: Option<String>,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: HashMap<String, i64>,
}

fn default_finish_reason() -> String {
    "stop".to_string()
}

/// Parameters for an image generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    /// Number of images to generate
    pub n: u32,
    /// Dimensions as `<width>x<height>`
    pub size: String,
}

/// One generated image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

/// Response from an image generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    pub images: Vec<GeneratedImage>,
}

impl ImageResponse {
    /// URL of the first generated image
    pub fn first_url(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }
}

/// Trait for chat completion providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request with the full ordered context
    async fn chat(&self, messages: &[Message], model: &str) -> ProviderResult<LLMResponse>;
}

/// Trait for image generation providers
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate_image(&self, request: ImageRequest) -> ProviderResult<ImageResponse>;
}
