//! Configuration management for the batch minter
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::error::{MinterError, MinterResult};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub minter: MinterConfig,
    pub chain: ChainConfig,
    pub token: TokenConfig,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinterConfig {
    /// CSV file with `recipient,quantity` columns
    pub recipients_csv: PathBuf,
    /// Pause after each terminal outcome, to be polite to the RPC endpoint
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,
    /// Interval between receipt polls while waiting for inclusion
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// First URL is primary; the rest are failover spares for read calls
    pub rpc_urls: Vec<String>,
    /// Fixed gas ceiling per mint transaction, not simulated per call
    pub gas_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub contract_address: String,
    /// Mint function signature, fixed to the `name(address,uint256)` shape
    #[serde(default = "default_mint_signature")]
    pub mint_signature: String,
    /// Used when the token's decimals() call fails at startup
    #[serde(default = "default_decimals")]
    pub default_decimals: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the signing key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

fn default_courtesy_delay_ms() -> u64 {
    1000
}

fn default_receipt_poll_interval_ms() -> u64 {
    1500
}

fn default_mint_signature() -> String {
    "mint(address,uint256)".to_string()
}

fn default_decimals() -> u32 {
    18
}

fn default_private_key_env() -> String {
    "MINTER_PRIVATE_KEY".to_string()
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = env::var("MINTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from a TOML string with `${VAR}` substitution
    pub fn parse(raw: &str) -> Result<Self> {
        let substituted = substitute_env_vars(raw);

        let settings: Settings =
            toml::from_str(&substituted).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration at load time
    fn validate(&self) -> Result<()> {
        if self.chain.rpc_urls.is_empty() {
            anyhow::bail!("At least one RPC URL must be configured");
        }

        if self.chain.gas_limit == 0 {
            anyhow::bail!("Gas limit must be non-zero");
        }

        self.token.parsed_contract_address()?;
        self.token.selector()?;

        Ok(())
    }
}

impl TokenConfig {
    /// Target contract address, parsed
    pub fn parsed_contract_address(&self) -> MinterResult<Address> {
        self.contract_address
            .parse::<Address>()
            .map_err(|e| MinterError::Config(format!("Invalid contract address: {}", e)))
    }

    /// 4-byte selector of the configured mint function
    ///
    /// The signature is constrained to exactly one `(address,uint256)`
    /// argument list so the builder's fixed calldata encoding stays valid.
    pub fn selector(&self) -> MinterResult<[u8; 4]> {
        let shape = regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\(address,uint256\)$")
            .expect("static regex");
        if !shape.is_match(&self.mint_signature) {
            return Err(MinterError::Config(format!(
                "Mint signature {:?} is not of the form name(address,uint256)",
                self.mint_signature
            )));
        }

        let hash = ethers::utils::keccak256(self.mint_signature.as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);
        Ok(selector)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
        [minter]
        recipients_csv = "recipients.csv"

        [chain]
        chain_id = 11155111
        rpc_urls = ["http://localhost:8545"]
        gas_limit = 200000

        [token]
        contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

        [wallet]
    "#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn parses_valid_config_with_defaults() {
        let settings = Settings::parse(VALID_CONFIG).unwrap();
        assert_eq!(settings.chain.chain_id, 11155111);
        assert_eq!(settings.minter.courtesy_delay_ms, 1000);
        assert_eq!(settings.token.default_decimals, 18);
        assert_eq!(settings.token.mint_signature, "mint(address,uint256)");
        assert_eq!(settings.wallet.private_key_env, "MINTER_PRIVATE_KEY");
    }

    #[test]
    fn mint_selector_is_the_canonical_erc20_mint() {
        let settings = Settings::parse(VALID_CONFIG).unwrap();
        // keccak256("mint(address,uint256)")[..4]
        assert_eq!(settings.token.selector().unwrap(), [0x40, 0xc1, 0x0f, 0x19]);
    }

    #[test]
    fn rejects_unencodable_mint_signature() {
        let config = VALID_CONFIG.replace(
            "[wallet]",
            "mint_signature = \"mint(address,uint256,bytes)\"\n[wallet]",
        );
        assert!(Settings::parse(&config).is_err());
    }

    #[test]
    fn rejects_bad_contract_address() {
        let config =
            VALID_CONFIG.replace("0x5FbDB2315678afecb367f032d93F642f64180aa3", "not-an-address");
        assert!(Settings::parse(&config).is_err());
    }

    #[test]
    fn rejects_empty_rpc_urls() {
        let config = VALID_CONFIG.replace("rpc_urls = [\"http://localhost:8545\"]", "rpc_urls = []");
        assert!(Settings::parse(&config).is_err());
    }
}
