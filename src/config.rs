//! Configuration types for provider and storage initialization.
//!
//! Configuration is assembled once at startup (from code, a JSON file, or
//! environment variables) and handed explicitly to the
//! [`PassManager`](crate::PassManager). Nothing in the lifecycle engine reads
//! ambient global state.

use crate::{Result, WalletError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Provider type identifier.
///
/// Each variant corresponds to a wallet ecosystem adapter. Adapters must be
/// enabled via Cargo feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Apple Wallet signed `.pkpass` archives (local build)
    Apple,
    /// Google Wallet objects API
    Google,
    /// Samsung Wallet partner card API
    Samsung,
    /// In-memory adapter for tests and dry runs
    Mock,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apple => write!(f, "apple"),
            Self::Google => write!(f, "google"),
            Self::Samsung => write!(f, "samsung"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "apple" => Ok(Self::Apple),
            "google" => Ok(Self::Google),
            "samsung" => Ok(Self::Samsung),
            "mock" => Ok(Self::Mock),
            other => Err(WalletError::Configuration(format!(
                "unknown provider type: {}",
                other
            ))),
        }
    }
}

/// Configuration for creating a provider adapter.
///
/// Use the builder pattern for ergonomic configuration:
///
/// ```no_run
/// use walletmux::{Config, ProviderType};
///
/// let config = Config::new(ProviderType::Apple)
///     .with_option("pass_type_identifier", "pass.com.example.events")
///     .with_option("team_identifier", "ABCDE12345")
///     .with_option("certificate_path", "certs/pass.pem")
///     .with_option("private_key_path", "certs/pass.key")
///     .with_option("trust_chain_path", "certs/wwdr.pem");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider type
    pub provider: ProviderType,

    /// Name the provider is registered under in the manager
    /// (default: the provider type name)
    #[serde(default)]
    pub name: Option<String>,

    /// Timeout applied to every remote call (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// Provider-specific options
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderType::Mock,
            name: None,
            request_timeout: default_timeout(),
            options: HashMap::new(),
        }
    }
}

impl Config {
    /// Creates a new configuration for the specified provider.
    ///
    /// # Example
    ///
    /// ```
    /// use walletmux::{Config, ProviderType};
    ///
    /// let config = Config::new(ProviderType::Google);
    /// assert_eq!(config.provider, ProviderType::Google);
    /// assert_eq!(config.provider_name(), "google");
    /// ```
    pub fn new(provider: ProviderType) -> Self {
        Self {
            provider,
            ..Default::default()
        }
    }

    /// Overrides the name the provider is registered under.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the timeout for remote calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Adds a provider-specific option.
    ///
    /// Options by provider:
    ///
    /// **Apple:**
    /// - `pass_type_identifier`, `team_identifier` (required)
    /// - `organization_name` (default: the template's organization id)
    /// - `certificate_path`, `private_key_path`, `trust_chain_path` (required)
    /// - `web_service_url`: base URL for update registration and downloads
    /// - `manifest_digest`: `sha1` (default) or `sha256`
    ///
    /// **Google:**
    /// - `issuer_id` (required)
    /// - `service_account_file` or `access_token` (one required)
    /// - `api_base_url`, `token_uri`, `save_url`, `origins` (comma separated)
    ///
    /// **Samsung:**
    /// - `issuer_id`, `service_id`, `api_key` (required)
    /// - `api_base_url`
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Gets a provider-specific option value.
    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }

    /// Gets a required option, failing with a configuration error naming
    /// the provider and key when it is missing or blank.
    pub fn require_option(&self, key: &str) -> Result<&str> {
        match self.options.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value.as_str()),
            _ => Err(WalletError::Configuration(format!(
                "{} provider requires option '{}'",
                self.provider, key
            ))),
        }
    }

    /// Returns the name the provider is registered under.
    pub fn provider_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.provider.to_string())
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local map; records vanish on exit.
    Memory,
    /// One JSON file per record under `path`.
    Filesystem {
        /// Root directory
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("passes"),
        }
    }
}

/// Complete process configuration: configured providers plus storage.
///
/// ```json
/// {
///   "providers": [
///     { "provider": "apple", "options": { "pass_type_identifier": "pass.com.example" } },
///     { "provider": "samsung", "request_timeout": 10, "options": { "service_id": "svc" } }
///   ],
///   "storage": { "type": "filesystem", "path": "/var/lib/walletmux" }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Providers to construct, in order
    #[serde(default)]
    pub providers: Vec<Config>,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Environment variable prefix read by [`WalletConfig::from_env`].
pub const ENV_PREFIX: &str = "WALLETMUX_";

impl WalletConfig {
    /// Loads configuration from a JSON file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            WalletError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&data).map_err(|e| {
            WalletError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Builds configuration from `WALLETMUX_*` environment variables.
    ///
    /// - `WALLETMUX_PROVIDERS`: comma separated provider types
    /// - `WALLETMUX_<PROVIDER>_<OPTION>`: provider option, e.g.
    ///   `WALLETMUX_APPLE_TEAM_IDENTIFIER`
    /// - `WALLETMUX_STORAGE`: `memory` or `filesystem`
    /// - `WALLETMUX_STORAGE_PATH`: filesystem root
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Same as [`from_env`](Self::from_env) over an explicit variable set.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();

        let mut providers = Vec::new();
        if let Some(list) = vars.get("WALLETMUX_PROVIDERS") {
            for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let provider: ProviderType = entry.parse()?;
                let prefix = format!("{}{}_", ENV_PREFIX, provider.to_string().to_uppercase());
                let mut config = Config::new(provider);
                for (key, value) in &vars {
                    if let Some(option) = key.strip_prefix(&prefix) {
                        config = config.with_option(option.to_lowercase(), value.clone());
                    }
                }
                if let Some(secs) = config.options.remove("request_timeout") {
                    let secs: u64 = secs.parse().map_err(|_| {
                        WalletError::Configuration(format!(
                            "{} request_timeout is not a number of seconds",
                            provider
                        ))
                    })?;
                    config.request_timeout = Duration::from_secs(secs);
                }
                providers.push(config);
            }
        }

        let storage = match vars.get("WALLETMUX_STORAGE").map(String::as_str) {
            None | Some("filesystem") => match vars.get("WALLETMUX_STORAGE_PATH") {
                Some(path) => StorageConfig::Filesystem { path: path.into() },
                None => StorageConfig::default(),
            },
            Some("memory") => StorageConfig::Memory,
            Some(other) => {
                return Err(WalletError::Configuration(format!(
                    "unknown storage type: {}",
                    other
                )))
            }
        };

        Ok(Self { providers, storage })
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = Config::new(ProviderType::Samsung)
            .with_option("service_id", "svc-1")
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.provider, ProviderType::Samsung);
        assert_eq!(config.get_option("service_id"), Some(&"svc-1".to_string()));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.provider_name(), "samsung");
    }

    #[test]
    fn test_require_option() {
        let config = Config::new(ProviderType::Google).with_option("issuer_id", "  ");
        let err = config.require_option("issuer_id").unwrap_err();
        assert!(err.to_string().contains("google provider requires option 'issuer_id'"));
    }

    #[test]
    fn test_provider_type_round_trip() {
        for provider in [
            ProviderType::Apple,
            ProviderType::Google,
            ProviderType::Samsung,
            ProviderType::Mock,
        ] {
            assert_eq!(provider.to_string().parse::<ProviderType>().unwrap(), provider);
        }
        assert!("passkit".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_wallet_config_json() {
        let json = r#"{
            "providers": [
                { "provider": "apple", "options": { "team_identifier": "ABCDE12345" } },
                { "provider": "samsung", "name": "samsung-eu", "request_timeout": 10 }
            ],
            "storage": { "type": "memory" }
        }"#;

        let config: WalletConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].request_timeout, Duration::from_secs(30));
        assert_eq!(config.providers[1].provider_name(), "samsung-eu");
        assert_eq!(config.providers[1].request_timeout, Duration::from_secs(10));
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[tokio::test]
    async fn test_wallet_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walletmux.json");
        tokio::fs::write(&path, br#"{"providers":[{"provider":"mock"}]}"#)
            .await
            .unwrap();

        let config = WalletConfig::from_json_file(&path).await.unwrap();
        assert_eq!(config.providers[0].provider, ProviderType::Mock);
        assert_eq!(config.storage, StorageConfig::default());

        let missing = WalletConfig::from_json_file(dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(WalletError::Configuration(_))));
    }

    #[test]
    fn test_wallet_config_from_vars() {
        let vars = vec![
            ("WALLETMUX_PROVIDERS".to_string(), "apple, samsung".to_string()),
            ("WALLETMUX_APPLE_TEAM_IDENTIFIER".to_string(), "ABCDE12345".to_string()),
            ("WALLETMUX_SAMSUNG_REQUEST_TIMEOUT".to_string(), "7".to_string()),
            ("WALLETMUX_STORAGE".to_string(), "memory".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];

        let config = WalletConfig::from_vars(vars).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(
            config.providers[0].get_option("team_identifier"),
            Some(&"ABCDE12345".to_string())
        );
        assert_eq!(config.providers[1].request_timeout, Duration::from_secs(7));
        assert_eq!(config.storage, StorageConfig::Memory);
    }
}
