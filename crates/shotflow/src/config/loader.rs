use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SUPPORTED_VERSION: &str = "1.0";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(invalid("worker_count must be greater than 0"));
    }

    if config.database_url.trim().is_empty() {
        return Err(invalid("database_url must not be empty"));
    }

    let polling = &config.polling;
    if polling.max_poll_count == 0 {
        return Err(invalid("polling.max_poll_count must be greater than 0"));
    }
    if polling.query_attempts == 0 {
        return Err(invalid("polling.query_attempts must be greater than 0"));
    }

    if config.artifacts.inline_threshold == 0 {
        return Err(invalid("artifacts.inline_threshold must be greater than 0"));
    }

    let defaults = &config.generation;
    if defaults.image_model.trim().is_empty() || defaults.video_model.trim().is_empty() {
        return Err(invalid("generation models must not be empty"));
    }
    if defaults.video_duration_secs == 0 {
        return Err(invalid("generation.video_duration_secs must be greater than 0"));
    }

    if !config.storage.public_base_url.starts_with("http://")
        && !config.storage.public_base_url.starts_with("https://")
    {
        return Err(invalid("storage.public_base_url must be an http(s) URL"));
    }

    for job_type in &config.recovery.job_types {
        if !job_type.is_provider_async() {
            return Err(ConfigError::Validation {
                message: format!(
                    "recovery.job_types contains '{}', which is not tracked by polling",
                    job_type
                ),
            });
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}
