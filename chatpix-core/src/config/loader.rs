//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for path-style environment overrides, e.g. `CHATPIX__CHAT__MODEL`
const ENV_PREFIX: &str = "CHATPIX__";

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".chatpix"))
            .unwrap_or_else(|| PathBuf::from(".chatpix"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_path();
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            debug!("Loading configuration from {}", config_path.display());
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_values(&mut merged, file_value);
        }

        apply_alias_overrides(&mut merged);
        apply_path_overrides(&mut merged);

        let mut config: Config = serde_json::from_value(merged)?;
        validate_config(&config)?;

        let log_dir = Path::new(&config.logging.dir);
        if log_dir.is_relative() {
            config.logging.dir = self.config_dir.join(log_dir).to_string_lossy().to_string();
        }
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the JSON config file
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(raw.to_string())
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        map.insert(last.clone(), value);
    }
}

fn apply_alias_overrides(config: &mut Value) {
    let aliases = [
        ("OPENAI_API_KEY", "provider.api_key"),
        ("OPENAI_BASE_URL", "provider.api_base"),
    ];

    for (env_key, target_path) in aliases {
        if let Ok(value) = std::env::var(env_key) {
            if value.trim().is_empty() {
                continue;
            }
            let path: Vec<String> = target_path.split('.').map(ToString::to_string).collect();
            set_path_value(config, &path, Value::String(value));
        }
    }
}

fn apply_path_overrides(config: &mut Value) {
    for (key, value) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        // Keys and endpoints stay strings even when they happen to parse as JSON.
        let parsed = match segments.last().map(String::as_str) {
            Some("api_key") | Some("api_base") | Some("model") | Some("system_prompt") => {
                Value::String(value)
            }
            _ => parse_env_value(&value),
        };
        set_path_value(config, &segments, parsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn unset(key: &str) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe { std::env::remove_var(key) };
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.original {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::set_var(&self.key, value) };
            } else {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::remove_var(&self.key) };
            }
        }
    }

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clean_env() -> Vec<EnvVarGuard> {
        vec![
            EnvVarGuard::unset("OPENAI_API_KEY"),
            EnvVarGuard::unset("OPENAI_BASE_URL"),
            EnvVarGuard::unset("CHATPIX__LOGGING__DIR"),
        ]
    }

    #[test]
    fn test_load_default_config() {
        let _lock = lock_env();
        let _env = clean_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.chat.model, "gpt-4o");
        assert_eq!(config.image.size, "1024x1024");
        assert!(config.provider.api_key.is_empty());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_relative_log_dir_lives_under_config_dir() {
        let _lock = lock_env();
        let _env = clean_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        let config = loader.load().unwrap();
        assert_eq!(Path::new(&config.logging.dir), temp_dir.path().join("logs"));

        let absolute = temp_dir.path().join("elsewhere");
        let _dir_guard =
            EnvVarGuard::set("CHATPIX__LOGGING__DIR", absolute.to_str().unwrap());
        let config = loader.load().unwrap();
        assert_eq!(Path::new(&config.logging.dir), absolute);
    }

    #[test]
    fn test_save_and_load_config() {
        let _lock = lock_env();
        let _env = clean_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path().join("nested"));

        let mut config = Config::default();
        config.chat.model = "gpt-4o-mini".to_string();
        config.provider.api_key = "sk-saved".to_string();

        loader.save(&config).unwrap();
        assert!(loader.config_path().exists());
        let loaded = loader.load().unwrap();

        assert_eq!(loaded.chat.model, "gpt-4o-mini");
        assert_eq!(loaded.provider.api_key, "sk-saved");
    }

    #[test]
    fn test_load_applies_alias_env_overrides() {
        let _lock = lock_env();
        let _env = clean_env();
        let _api_key_guard = EnvVarGuard::set("OPENAI_API_KEY", "sk-openai-from-env");
        let _base_guard = EnvVarGuard::set("OPENAI_BASE_URL", "http://localhost:8080/v1");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.provider.api_key, "sk-openai-from-env");
        assert_eq!(config.provider.api_base, "http://localhost:8080/v1");
        assert_eq!(config.require_api_key().unwrap(), "sk-openai-from-env");
    }

    #[test]
    fn test_blank_alias_is_ignored() {
        let _lock = lock_env();
        let _env = clean_env();
        let _api_key_guard = EnvVarGuard::set("OPENAI_API_KEY", "   ");

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.json"),
            r#"{"provider":{"api_key":"sk-file"}}"#,
        )
        .unwrap();

        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(config.provider.api_key, "sk-file");
    }

    #[test]
    fn test_load_applies_path_env_overrides() {
        let _lock = lock_env();
        let _env = clean_env();
        let _model_guard = EnvVarGuard::set("CHATPIX__CHAT__MODEL", "gpt-4.1");
        let _count_guard = EnvVarGuard::set("CHATPIX__IMAGE__COUNT", "2");
        let _format_guard = EnvVarGuard::set("CHATPIX__LOGGING__FORMAT", "json");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.chat.model, "gpt-4.1");
        assert_eq!(config.image.count, 2);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_path_env_overrides_alias_and_file() {
        let _lock = lock_env();
        let _env = clean_env();
        let _alias_guard = EnvVarGuard::set("OPENAI_API_KEY", "sk-openai-alias");
        let _path_guard = EnvVarGuard::set("CHATPIX__PROVIDER__API_KEY", "sk-path-override");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        std::fs::write(
            loader.config_path(),
            r#"{"provider":{"api_key":"sk-openai-file"}}"#,
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.provider.api_key, "sk-path-override");
    }

    #[test]
    fn test_numeric_looking_key_stays_string() {
        let _lock = lock_env();
        let _env = clean_env();
        let _path_guard = EnvVarGuard::set("CHATPIX__PROVIDER__API_KEY", "12345");

        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(config.provider.api_key, "12345");
    }

    #[test]
    fn test_validation_rejects_invalid_image_count() {
        let _lock = lock_env();
        let _env = clean_env();
        let _count_guard = EnvVarGuard::set("CHATPIX__IMAGE__COUNT", "0");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let err = loader.load().unwrap_err();
        assert!(err.to_string().contains("image.count"));
    }

    #[test]
    fn test_malformed_file_is_serialization_error() {
        let _lock = lock_env();
        let _env = clean_env();
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("config.json"), "{not json").unwrap();

        let err = ConfigLoader::with_dir(temp_dir.path()).load().unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
