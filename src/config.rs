use std::env;
use std::path::PathBuf;

/// Option-data provider configuration.
#[derive(Debug, Clone)]
pub struct OptionProviderConfig {
    /// Base URL of the option quote provider. None disables live lookups;
    /// every quote is then synthetic.
    pub base_url: Option<String>,
    /// API key sent with provider requests.
    pub api_key: Option<String>,
    /// Bound on how long a quote lookup may take (ms).
    pub timeout_ms: u64,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Path of the persisted account document.
    pub data_file: PathBuf,
    /// Seed cash balance for newly created accounts.
    pub starting_balance: f64,
    /// Timeframe label used when an alert carries no recognizable interval.
    pub default_timeframe: String,
    /// Option-data provider settings.
    pub options: OptionProviderConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Self {
            host,
            port,
            data_file: env::var("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("paper_accounts.json")),
            starting_balance: env::var("STARTING_BALANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000.0),
            default_timeframe: env::var("DEFAULT_TIMEFRAME").unwrap_or_else(|_| "1H".to_string()),
            options: OptionProviderConfig {
                base_url: env::var("OPTION_PROVIDER_URL").ok(),
                api_key: env::var("OPTION_PROVIDER_API_KEY").ok(),
                timeout_ms: env::var("OPTION_LOOKUP_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2_000),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_explicit_values() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 9000,
            data_file: PathBuf::from("/tmp/accounts.json"),
            starting_balance: 25_000.0,
            default_timeframe: "4H".to_string(),
            options: OptionProviderConfig {
                base_url: Some("https://quotes.example.com".to_string()),
                api_key: Some("key".to_string()),
                timeout_ms: 500,
            },
        };

        assert_eq!(config.port, 9000);
        assert_eq!(config.starting_balance, 25_000.0);
        assert_eq!(config.default_timeframe, "4H");
        assert_eq!(config.options.timeout_ms, 500);
    }

    #[test]
    fn test_option_provider_disabled_without_url() {
        let options = OptionProviderConfig {
            base_url: None,
            api_key: None,
            timeout_ms: 2_000,
        };
        assert!(options.base_url.is_none());
    }

    #[test]
    fn test_config_clone() {
        let config = Config {
            host: "test".to_string(),
            port: 1234,
            data_file: PathBuf::from("accounts.json"),
            starting_balance: 10_000.0,
            default_timeframe: "1H".to_string(),
            options: OptionProviderConfig {
                base_url: None,
                api_key: None,
                timeout_ms: 2_000,
            },
        };

        let cloned = config.clone();
        assert_eq!(cloned.host, config.host);
        assert_eq!(cloned.data_file, config.data_file);
    }
}
