use crate::domain::{validate_wallet_address, Address, AddressPolicy};
use crate::engine::FetchConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// CryptoPunks market contract on Ethereum mainnet.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xb47e3cd837ddf8e4c57f05d70ab865de6e193bbb";
pub const DEFAULT_EXPORT_PATH: &str = "wallet_transactions.csv";

#[derive(Debug, Clone)]
pub struct Config {
    /// Only the `fetch` command needs a node.
    pub rpc_url: Option<String>,
    pub contract_address: Address,
    pub export_path: PathBuf,
    pub start_block: u64,
    pub fetch: FetchConfig,
    pub wallet_concurrency: usize,
    pub fetch_deadline: Option<Duration>,
    /// Applies to `fetch` wallets; the PnL stage always uses the prefix rule.
    pub address_policy: AddressPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let rpc_url = env_map
            .get("LEDGER_RPC_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let contract_raw = env_map
            .get("CONTRACT_ADDRESS")
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_CONTRACT_ADDRESS);
        let contract_address = validate_wallet_address(contract_raw, AddressPolicy::Prefix)
            .map_err(|e| ConfigError::InvalidValue("CONTRACT_ADDRESS".to_string(), e.to_string()))?;

        let export_path = PathBuf::from(
            env_map
                .get("EXPORT_PATH")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_EXPORT_PATH),
        );

        let start_block = parse_or_default::<u64>(&env_map, "START_BLOCK", 0)?;

        let defaults = FetchConfig::default();
        let initial_step =
            parse_or_default::<u64>(&env_map, "INITIAL_BLOCK_STEP", defaults.initial_step)?;
        let min_step = parse_or_default::<u64>(&env_map, "MIN_BLOCK_STEP", defaults.min_step)?;
        if min_step == 0 {
            return Err(ConfigError::InvalidValue(
                "MIN_BLOCK_STEP".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if initial_step < min_step {
            return Err(ConfigError::InvalidValue(
                "INITIAL_BLOCK_STEP".to_string(),
                format!("must be at least MIN_BLOCK_STEP ({})", min_step),
            ));
        }
        let retry_delay_ms = parse_or_default::<u64>(
            &env_map,
            "RETRY_DELAY_MS",
            defaults.retry_delay.as_millis() as u64,
        )?;

        let wallet_concurrency = parse_or_default::<usize>(&env_map, "WALLET_CONCURRENCY", 1)?;
        if wallet_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "WALLET_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let fetch_deadline = match env_map.get("FETCH_DEADLINE_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "FETCH_DEADLINE_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?)),
            None => None,
        };

        let address_policy = match env_map
            .get("ADDRESS_POLICY")
            .map(|s| s.as_str())
            .unwrap_or("checksum")
        {
            "checksum" => AddressPolicy::Checksum,
            "prefix" => AddressPolicy::Prefix,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ADDRESS_POLICY".to_string(),
                    format!("must be checksum or prefix, got {}", other),
                ))
            }
        };

        Ok(Config {
            rpc_url,
            contract_address,
            export_path,
            start_block,
            fetch: FetchConfig {
                initial_step,
                min_step,
                retry_delay: Duration::from_millis(retry_delay_ms),
            },
            wallet_concurrency,
            fetch_deadline,
            address_policy,
        })
    }

    /// The node URL, or an error naming the variable to set.
    pub fn require_rpc_url(&self) -> Result<&str, ConfigError> {
        self.rpc_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnv("LEDGER_RPC_URL".to_string()))
    }
}

fn parse_or_default<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(
                key.to_string(),
                format!("must be a valid {}", std::any::type_name::<T>()),
            )
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            "LEDGER_RPC_URL".to_string(),
            "https://eth.example.invalid".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.contract_address.as_str(), DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.export_path, PathBuf::from("wallet_transactions.csv"));
        assert_eq!(config.start_block, 0);
        assert_eq!(config.fetch, FetchConfig::default());
        assert_eq!(config.wallet_concurrency, 1);
        assert_eq!(config.fetch_deadline, None);
        assert_eq!(config.address_policy, AddressPolicy::Checksum);
    }

    #[test]
    fn test_missing_rpc_url_only_fails_on_demand() {
        let mut env_map = setup_required_env();
        env_map.remove("LEDGER_RPC_URL");
        let config = Config::from_env_map(env_map).unwrap();
        match config.require_rpc_url() {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "LEDGER_RPC_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("START_BLOCK".to_string(), "3914495".to_string());
        env_map.insert("INITIAL_BLOCK_STEP".to_string(), "50000".to_string());
        env_map.insert("MIN_BLOCK_STEP".to_string(), "500".to_string());
        env_map.insert("RETRY_DELAY_MS".to_string(), "250".to_string());
        env_map.insert("WALLET_CONCURRENCY".to_string(), "4".to_string());
        env_map.insert("FETCH_DEADLINE_SECS".to_string(), "600".to_string());
        env_map.insert("ADDRESS_POLICY".to_string(), "prefix".to_string());

        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.start_block, 3_914_495);
        assert_eq!(
            config.fetch,
            FetchConfig {
                initial_step: 50_000,
                min_step: 500,
                retry_delay: Duration::from_millis(250),
            }
        );
        assert_eq!(config.wallet_concurrency, 4);
        assert_eq!(config.fetch_deadline, Some(Duration::from_secs(600)));
        assert_eq!(config.address_policy, AddressPolicy::Prefix);
    }

    #[test]
    fn test_invalid_start_block() {
        let mut env_map = setup_required_env();
        env_map.insert("START_BLOCK".to_string(), "genesis".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "START_BLOCK"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_initial_step_below_min_step() {
        let mut env_map = setup_required_env();
        env_map.insert("INITIAL_BLOCK_STEP".to_string(), "100".to_string());
        env_map.insert("MIN_BLOCK_STEP".to_string(), "1000".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "INITIAL_BLOCK_STEP"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_wallet_concurrency() {
        let mut env_map = setup_required_env();
        env_map.insert("WALLET_CONCURRENCY".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "WALLET_CONCURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_address_policy() {
        let mut env_map = setup_required_env();
        env_map.insert("ADDRESS_POLICY".to_string(), "loose".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "ADDRESS_POLICY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_contract_address() {
        let mut env_map = setup_required_env();
        env_map.insert("CONTRACT_ADDRESS".to_string(), "b47e3cd8".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CONTRACT_ADDRESS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
