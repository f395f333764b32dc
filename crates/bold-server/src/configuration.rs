use crate::error::{to_env_var, ConfigError};
use bold::backend::BackendConfig;
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

/// Older deployments configure the backend through these plain names
const LEGACY_URL_VAR: &str = "BACKEND_URL";
const LEGACY_KEY_VAR: &str = "BOLD_API_KEY";

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|source| ConfigError::InvalidAddress { address, source })
    }
}

/// Where the video backend lives and how to authenticate to it.
///
/// Both are optional at startup: the relay answers 500 per request until they
/// are set, and search falls back to the public host.
#[derive(Debug, Default, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl BackendSettings {
    pub fn into_config(self) -> BackendConfig {
        BackendConfig {
            url: self.url,
            api_key: self.api_key,
        }
    }

    /// Names of the settings still missing, as environment variables
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.url.as_deref().map_or(true, |url| url.trim().is_empty()) {
            missing.push(to_env_var("backend.url"));
        }
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            missing.push(to_env_var("backend.api_key"));
        }
        missing
    }

    fn with_legacy_fallbacks(mut self) -> Self {
        if self.url.is_none() {
            self.url = std::env::var(LEGACY_URL_VAR).ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var(LEGACY_KEY_VAR).ok();
        }
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub backend: BackendSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .add_source(
                Environment::with_prefix("BOLD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            ConfigError::Other(err)
        })?;
        settings.backend = settings.backend.with_legacy_fallbacks();

        Ok(settings)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("BOLD_") {
                env::remove_var(&key);
            }
        }
        env::remove_var(LEGACY_URL_VAR);
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.backend.url, None);
        assert_eq!(settings.backend.api_key, None);
        assert_eq!(
            settings.backend.missing(),
            vec!["BOLD_BACKEND__URL", "BOLD_BACKEND__API_KEY"]
        );
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("BOLD_SERVER__PORT", "8080");
        env::set_var("BOLD_BACKEND__URL", "api.example.com");
        env::set_var("BOLD_BACKEND__API_KEY", "test_api_key_0123456789");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.backend.url.as_deref(), Some("api.example.com"));
        assert_eq!(
            settings.backend.api_key.as_deref(),
            Some("test_api_key_0123456789")
        );
        assert!(settings.backend.missing().is_empty());

        clean_env();
    }

    #[test]
    #[serial]
    fn test_legacy_variables() {
        clean_env();
        env::set_var(LEGACY_URL_VAR, "https://legacy.example.com");
        env::set_var(LEGACY_KEY_VAR, "legacy_key_0123456789");

        let settings = Settings::new().unwrap();
        let config = settings.backend.into_config();
        assert_eq!(config.url.as_deref(), Some("https://legacy.example.com"));
        assert_eq!(config.api_key.as_deref(), Some("legacy_key_0123456789"));
        assert!(config.is_complete());

        clean_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port() {
        clean_env();
        env::set_var("BOLD_SERVER__PORT", "not-a-port");

        assert!(matches!(Settings::new(), Err(ConfigError::Other(_))));

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(matches!(
            bad.socket_addr(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }
}
