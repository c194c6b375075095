//! Layered configuration loading.
//!
//! Layers, lowest first: built-in defaults, the TOML file (when there is
//! one), then `SEEDSTREAM_*` environment variables with `__` separating
//! nested keys (`SEEDSTREAM_RESOURCES__SEED_TIME_HOURS=12`). The merged
//! result is validated before it is handed out.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, validate::validate_config, ConfigError};

const ENV_PREFIX: &str = "SEEDSTREAM_";

/// Load and validate configuration.
///
/// With `None` the service runs on defaults plus environment overrides. A
/// path that is given must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }
    extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Load and validate configuration from a TOML string, without environment
/// overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    extract(Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml_str)))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    let config: Config = figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}
