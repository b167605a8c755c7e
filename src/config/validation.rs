//! Configuration validation functions.

use super::Config;
use std::net::IpAddr;

/// Validate the loaded configuration before the listener starts.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    config
        .bind_address
        .trim()
        .parse::<IpAddr>()
        .map_err(|err| {
            anyhow::anyhow!(
                "bind_address must be an IP address (configured: {:?}): {err}",
                config.bind_address
            )
        })?;

    config.relay.validate()?;

    if config.security.require_metrics_auth {
        let token_present = config
            .security
            .metrics_auth_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());

        if !token_present {
            anyhow::bail!(
                "Metrics authentication is enabled but no token is configured.\n\
                 Set SIGNAL_RELAY__SECURITY__METRICS_AUTH_TOKEN or disable it with\n\
                 SIGNAL_RELAY__SECURITY__REQUIRE_METRICS_AUTH=false"
            );
        }
    }

    if config.relay.max_connections == 1 {
        eprintln!(
            "WARNING: relay.max_connections is 1; at least two participants are needed to relay anything"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_non_ip_bind_address() {
        let mut config = Config::default();
        config.bind_address = "localhost".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("bind_address"));
    }

    #[test]
    fn rejects_relative_signal_path() {
        let mut config = Config::default();
        config.relay.path = "signal".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let mut config = Config::default();
        config.relay.outbound_queue_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_send_timeout() {
        let mut config = Config::default();
        config.relay.send_timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn metrics_auth_requires_token() {
        let mut config = Config::default();
        config.security.require_metrics_auth = true;
        assert!(validate_config(&config).is_err());

        config.security.metrics_auth_token = Some(String::new());
        assert!(validate_config(&config).is_err());

        config.security.metrics_auth_token = Some("a-long-enough-token".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
