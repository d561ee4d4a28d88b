use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub reconciler: ReconcilerConfig,
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

/// Upstream key provider API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Admin credential for the provider's key management API
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub limit_check_interval_secs: u64,
    pub daily_report_interval_secs: u64,
    pub reset_check_interval_secs: u64,
    /// When set, rotate every active key on this cadence
    pub rotation_interval_secs: Option<u64>,
    pub top_usage_count: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NotifierConfig {
    /// Alerts and reports are POSTed here when set
    pub webhook_url: Option<String>,
    /// Shared secret for signing webhook payloads
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            storage: StorageConfig::default(),
            reconciler: ReconcilerConfig::default(),
            notifier: NotifierConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.provider.example".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            limit_check_interval_secs: 900,
            daily_report_interval_secs: 86_400,
            reset_check_interval_secs: 3_600,
            rotation_interval_secs: None,
            top_usage_count: 10,
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

        assert_eq!(config.reconciler.limit_check_interval_secs, 900);
        assert_eq!(config.reconciler.daily_report_interval_secs, 86_400);
        assert_eq!(config.reconciler.reset_check_interval_secs, 3_600);
        assert!(config.reconciler.rotation_interval_secs.is_none());
        assert_eq!(config.reconciler.top_usage_count, 10);
        assert_eq!(config.provider.timeout_secs, 30);
        assert!(config.notifier.webhook_url.is_none());
    }
}
