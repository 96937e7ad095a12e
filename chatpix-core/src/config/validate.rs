//! Configuration validation rules.

use super::schema::Config;
use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9][0-9]*x[1-9][0-9]*$").unwrap());

/// Validate configuration and return aggregated validation errors.
///
/// The API key is not checked here; commands that never reach the network
/// must still be able to load the configuration.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let api_base = config.provider.api_base.trim();
    if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
        errors.push("provider.api_base must be an http(s) URL".to_string());
    }

    if config.chat.model.trim().is_empty() {
        errors.push("chat.model must not be empty".to_string());
    }
    if config.chat.system_prompt.trim().is_empty() {
        errors.push("chat.system_prompt must not be empty".to_string());
    }

    if config.image.model.trim().is_empty() {
        errors.push("image.model must not be empty".to_string());
    }
    if !IMAGE_SIZE.is_match(&config.image.size) {
        errors.push("image.size must look like <width>x<height>".to_string());
    }
    if !(1..=10).contains(&config.image.count) {
        errors.push("image.count must be in [1, 10]".to_string());
    }

    if !matches!(config.logging.format.to_lowercase().as_str(), "text" | "json") {
        errors.push("logging.format must be text or json".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
