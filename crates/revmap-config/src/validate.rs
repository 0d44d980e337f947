//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Log formats the telemetry layer understands.
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Level names accepted as the default filter.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_map(config)?;
    validate_commit(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_map(config: &Config) -> ConfigResult<()> {
    let m = &config.map;

    if let Some(id) = m.master_map_id {
        if id <= 0 {
            return Err(invalid(
                "map.master_map_id",
                format!("map id {id} must be positive"),
            ));
        }
    }

    if m.call_timeout_ms == 0 {
        return Err(invalid("map.call_timeout_ms", "must be greater than 0"));
    }

    if m.state_path.as_os_str().is_empty() {
        return Err(invalid("map.state_path", "must not be empty"));
    }

    if m.signing_key_path.as_os_str().is_empty() {
        return Err(invalid("map.signing_key_path", "must not be empty"));
    }

    Ok(())
}

fn validate_commit(config: &Config) -> ConfigResult<()> {
    let c = &config.commit;

    if c.initial_delay_ms > c.max_delay_ms {
        return Err(invalid(
            "commit.initial_delay_ms",
            format!(
                "initial delay {}ms exceeds max delay {}ms",
                c.initial_delay_ms, c.max_delay_ms
            ),
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !LOG_FORMATS.contains(&l.format.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }

    if !LOG_LEVELS.contains(&l.level.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: {}",
                l.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_master_map_id() {
        let mut config = Config::default();
        config.map.master_map_id = Some(0);
        assert_eq!(field_of(validate(&config)), "map.master_map_id");

        config.map.master_map_id = Some(17);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = Config::default();
        config.map.call_timeout_ms = 0;
        assert_eq!(field_of(validate(&config)), "map.call_timeout_ms");
    }

    #[test]
    fn test_rejects_inverted_retry_delays() {
        let mut config = Config::default();
        config.commit.initial_delay_ms = 500;
        config.commit.max_delay_ms = 100;
        assert_eq!(field_of(validate(&config)), "commit.initial_delay_ms");
    }

    #[test]
    fn test_zero_retries_is_allowed() {
        let mut config = Config::default();
        config.commit.max_retries = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_unknown_log_format_and_level() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");

        let mut config = Config::default();
        config.logging.format = "JSON".to_owned();
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");
    }
}
