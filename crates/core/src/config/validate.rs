use super::{types::Config, ConfigError};
use crate::classify::Language;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.resources.seed_time_hours == 0 {
        return Err(ConfigError::ValidationError(
            "resources.seed_time_hours must be greater than 0".to_string(),
        ));
    }

    if config.resources.metadata_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "resources.metadata_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.resources.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "resources.sweep_interval_secs must be greater than 0".to_string(),
        ));
    }

    if config.search.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "search.concurrency must be greater than 0".to_string(),
        ));
    }

    if Language::from_code(&config.ranking.target_language).is_none() {
        return Err(ConfigError::ValidationError(format!(
            "ranking.target_language '{}' is not a known language code",
            config.ranking.target_language
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_seed_window_fails() {
        let mut config = Config::default();
        config.resources.seed_time_hours = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_unknown_language_fails() {
        let mut config = Config::default();
        config.ranking.target_language = "KLINGON".to_string();
        assert!(validate_config(&config).is_err());

        config.ranking.target_language = "eng".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
