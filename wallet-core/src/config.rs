//! Configuration for the wallet core

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wallet core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Amount policy limits and fees
    pub policy: PolicyConfig,

    /// Payment provider settings
    pub provider: ProviderConfig,

    /// RocksDB tuning
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/wallet"),
            policy: PolicyConfig::default(),
            provider: ProviderConfig::default(),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// Amount policy: minimums and fees, in major currency units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum funding amount
    pub min_fund_amount: Decimal,

    /// Minimum withdrawal amount
    pub min_withdraw_amount: Decimal,

    /// Flat fee debited on top of every withdrawal
    pub withdraw_fee: Decimal,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_fund_amount: Decimal::new(100, 0),
            min_withdraw_amount: Decimal::new(1000, 0),
            withdraw_fee: Decimal::new(50, 0),
        }
    }
}

/// Payment provider settings.
///
/// The secret key doubles as the webhook signing secret, matching the
/// provider's scheme. Injected into the bridge and reconciler constructors;
/// never read from process globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider API base URL
    pub base_url: String,

    /// Bearer credential for provider calls and webhook HMAC verification
    pub secret_key: String,

    /// URL the provider redirects to after a hosted payment completes
    pub callback_url: String,

    /// Bound on every outbound provider call, seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.paystack.co".to_string(),
            secret_key: String::new(),
            callback_url: "http://localhost:3000/success".to_string(),
            timeout_secs: 30,
        }
    }
}

/// RocksDB tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("WALLET_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(url) = std::env::var("WALLET_PROVIDER_BASE_URL") {
            config.provider.base_url = url;
        }

        if let Ok(secret) = std::env::var("WALLET_PROVIDER_SECRET_KEY") {
            config.provider.secret_key = secret;
        }

        if let Ok(url) = std::env::var("WALLET_PROVIDER_CALLBACK_URL") {
            config.provider.callback_url = url;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_policy() {
        let config = Config::default();
        assert_eq!(config.policy.min_withdraw_amount, dec!(1000));
        assert_eq!(config.policy.withdraw_fee, dec!(50));
        assert_eq!(config.provider.timeout_secs, 30);
    }

    #[test]
    fn test_from_toml() {
        let toml_str = r#"
            data_dir = "/tmp/wallet"

            [policy]
            min_fund_amount = "100"
            min_withdraw_amount = "500"
            withdraw_fee = "25"

            [provider]
            base_url = "https://provider.test"
            secret_key = "sk_test_abc"
            callback_url = "https://app.test/success"
            timeout_secs = 10

            [rocksdb]
            write_buffer_size_mb = 32
            max_write_buffer_number = 2
            max_background_jobs = 2
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.policy.min_withdraw_amount, dec!(500));
        assert_eq!(config.provider.base_url, "https://provider.test");
    }
}
