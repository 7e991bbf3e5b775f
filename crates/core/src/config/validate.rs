use chrono::NaiveTime;
use std::collections::HashSet;

use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    let queue = &config.queue;

    if !(-12..=14).contains(&queue.utc_offset_hours) {
        return Err(ConfigError::ValidationError(format!(
            "queue.utc_offset_hours must be between -12 and 14, got {}",
            queue.utc_offset_hours
        )));
    }

    if queue.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_attempts must be at least 1".to_string(),
        ));
    }

    if queue.enforce_time_slots && queue.time_slots.is_empty() {
        return Err(ConfigError::ValidationError(
            "queue.time_slots cannot be empty when queue.enforce_time_slots is set".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for slot in &queue.time_slots {
        if !is_valid_slot(slot) {
            return Err(ConfigError::ValidationError(format!(
                "queue.time_slots: '{}' is not a HH:MM time",
                slot
            )));
        }
        if !seen.insert(slot.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "queue.time_slots: '{}' is listed twice",
                slot
            )));
        }
    }

    if config.qr.enabled && config.qr.scale == 0 {
        return Err(ConfigError::ValidationError(
            "qr.scale cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// Strict "HH:MM", 24-hour.
pub fn is_valid_slot(slot: &str) -> bool {
    slot.len() == 5 && NaiveTime::parse_from_str(slot, "%H:%M").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AuthConfig, DatabaseConfig, LoggingConfig, QrConfig, QueueConfig, ServerConfig,
    };
    use std::net::IpAddr;

    fn valid_config() -> Config {
        Config {
            auth: AuthConfig {
                method: AuthMethod::TrustedHeaders,
                api_key: None,
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            qr: QrConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn assert_invalid(config: &Config) {
        let result = validate_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server = ServerConfig {
            host: "0.0.0.0".parse::<IpAddr>().unwrap(),
            port: 0,
        };
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_api_key_required() {
        let mut config = valid_config();
        config.auth.method = AuthMethod::ApiKey;
        assert_invalid(&config);

        config.auth.api_key = Some(String::new());
        assert_invalid(&config);

        config.auth.api_key = Some("k".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_utc_offset_range() {
        let mut config = valid_config();
        config.queue.utc_offset_hours = 15;
        assert_invalid(&config);

        config.queue.utc_offset_hours = -12;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_max_attempts_zero_fails() {
        let mut config = valid_config();
        config.queue.max_attempts = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_empty_slots() {
        let mut config = valid_config();
        config.queue.time_slots.clear();
        assert_invalid(&config);

        config.queue.enforce_time_slots = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_malformed_slot() {
        let mut config = valid_config();
        config.queue.time_slots = vec!["8:00".to_string()];
        assert_invalid(&config);

        config.queue.time_slots = vec!["25:00".to_string()];
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_duplicate_slot() {
        let mut config = valid_config();
        config.queue.time_slots = vec!["08:00".to_string(), "08:00".to_string()];
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_qr_scale() {
        let mut config = valid_config();
        config.qr.scale = 0;
        assert_invalid(&config);

        config.qr.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_is_valid_slot() {
        assert!(is_valid_slot("08:30"));
        assert!(is_valid_slot("23:59"));
        assert!(!is_valid_slot("8:30"));
        assert!(!is_valid_slot("08:60"));
        assert!(!is_valid_slot("08:30:00"));
    }
}
