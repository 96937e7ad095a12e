//! Remote model integrations for chatpix
//!
//! This crate provides the provider traits used by the router and an
//! OpenAI-compatible HTTP client implementing them.

pub mod base;
pub mod openai;

pub use base::{
    GeneratedImage, ImageProvider, ImageRequest, ImageResponse, LLMProvider, LLMResponse,
    ProviderError, ProviderResult,
};
pub use openai::OpenAIClient;
