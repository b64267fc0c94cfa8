use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::services::HostServiceConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub memo: MemoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Memoization settings of the host service. TTLs are in seconds; an unset
/// TTL keeps results until the cache is cleared.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoConfig {
    pub default_domain: String,
    pub lookup_ttl_secs: Option<u64>,
    pub domain_ttl_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            default_domain: "internal".to_string(),
            lookup_ttl_secs: Some(30),
            domain_ttl_secs: None,
        }
    }
}

impl MemoConfig {
    pub fn host_service_config(&self) -> HostServiceConfig {
        HostServiceConfig {
            lookup_ttl: self.lookup_ttl_secs.map(Duration::from_secs),
            domain_ttl: self.domain_ttl_secs.map(Duration::from_secs),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.memo.default_domain, "internal");
    }

    #[test]
    fn test_host_service_config_from_memo() {
        let memo = MemoConfig {
            default_domain: "corp".to_string(),
            lookup_ttl_secs: Some(10),
            domain_ttl_secs: None,
        };

        let service = memo.host_service_config();
        assert_eq!(service.lookup_ttl, Some(Duration::from_secs(10)));
        assert_eq!(service.domain_ttl, None);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[memo]\ndefault_domain = \"corp\"\nlookup_ttl_secs = 5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.memo.default_domain, "corp");
        assert_eq!(config.memo.lookup_ttl_secs, Some(5));
        assert_eq!(config.memo.domain_ttl_secs, None);
        assert_eq!(config.server.port, 8080);
    }
}
