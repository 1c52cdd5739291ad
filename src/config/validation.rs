use crate::config::types::{Config, OutputConfig, ScraperConfig, SinkKind, StoreBackend, StoreConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound for the connection gate
const MAX_CONNECTIONS_LIMIT: usize = 100_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_store_config(&config.store)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates fetch and extraction settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.max_connections < 1 || config.max_connections > MAX_CONNECTIONS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_connections must be between 1 and {}, got {}",
            MAX_CONNECTIONS_LIMIT, config.max_connections
        )));
    }

    if config.buffer_size < 1 {
        return Err(ConfigError::Validation(format!(
            "buffer_size must be >= 1, got {}",
            config.buffer_size
        )));
    }

    if config.max_recursion_depth < 1 {
        return Err(ConfigError::Validation(format!(
            "max_recursion_depth must be >= 1, got {}",
            config.max_recursion_depth
        )));
    }

    Ok(())
}

/// Validates the selector/job store settings
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.backend != StoreBackend::Redis {
        return Ok(());
    }

    let redis_url = config.redis_url.as_deref().ok_or_else(|| {
        ConfigError::Validation("redis_url is required for the redis backend".to_string())
    })?;

    let url = Url::parse(redis_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redis_url '{}': {}", redis_url, e)))?;

    if url.scheme() != "redis" && url.scheme() != "rediss" {
        return Err(ConfigError::InvalidUrl(format!(
            "redis_url must use the redis:// or rediss:// scheme, got '{}'",
            redis_url
        )));
    }

    Ok(())
}

/// Validates output sink settings
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (i, sink) in config.sinks.iter().enumerate() {
        if config.sinks[..i].contains(sink) {
            return Err(ConfigError::Validation(format!(
                "sink {:?} is listed more than once",
                sink
            )));
        }
    }

    if config.sinks.contains(&SinkKind::Elastic) {
        let url = Url::parse(&config.elastic_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid elastic_url '{}': {}", config.elastic_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "elastic_url must use HTTP or HTTPS, got '{}'",
                config.elastic_url
            )));
        }

        validate_index_name(&config.elastic_index)?;
    }

    if config.sinks.contains(&SinkKind::File) && config.file_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "file_dir cannot be empty when the file sink is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates a search index name
fn validate_index_name(index: &str) -> Result<(), ConfigError> {
    if index.is_empty() {
        return Err(ConfigError::Validation(
            "elastic_index cannot be empty".to_string(),
        ));
    }

    if !index
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "elastic_index must contain only lowercase letters, digits, '-' and '_', got '{}'",
            index
        )));
    }

    Ok(())
}
