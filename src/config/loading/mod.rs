use std::{fs, path::Path};

use tracing::{debug, info, instrument};

use super::{Config, ConfigPaths};
use crate::{CyprusError, Result};

impl Config {
    /// Loads the configuration from `path`.
    ///
    /// A missing file is not an error: defaults are returned instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, is not valid
    /// TOML, or contains values that fail validation.
    #[instrument]
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            info!("No configuration at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| CyprusError::toml_parse(e, Some(path)))?;
        config.validate()?;

        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Loads the configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be resolved or
    /// the file is invalid.
    pub fn load_default() -> Result<Config> {
        let path = ConfigPaths::main_config()?;
        Self::load(&path)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config =
            toml::from_str(content).map_err(|e| CyprusError::toml_parse(e, None))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the bridge cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfigField` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.server.channel_capacity == 0 {
            return Err(CyprusError::invalid_field(
                "server.channel_capacity",
                "must be greater than zero",
            ));
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err(CyprusError::invalid_field(
                "server.shutdown_timeout_secs",
                "must be greater than zero",
            ));
        }

        if self.media.signal_buffer == 0 {
            return Err(CyprusError::invalid_field(
                "media.signal_buffer",
                "must be greater than zero",
            ));
        }

        if self.media.handshake_timeout_ms == 0 {
            return Err(CyprusError::invalid_field(
                "media.handshake_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.discovery.instance_name.trim().is_empty() {
            return Err(CyprusError::invalid_field(
                "discovery.instance_name",
                "must not be empty",
            ));
        }

        Ok(())
    }
}
