use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::error::AmmError;

/// Uniswap V2 Router02 (canonical mainnet deployment)
pub const UNISWAP_V2_ROUTER: Address = address!("7a250d5630b4cf539739df2c5dacb4c659f2488d");

/// Uniswap V2 Factory (canonical mainnet deployment)
pub const UNISWAP_V2_FACTORY: Address = address!("5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f");

/// Integration name the Uniswap V2 adapter is registered under by default.
pub const DEFAULT_INTEGRATION_NAME: &str = "UniswapAmm";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AmmConfig {
    pub router: Address,
    pub factory: Address,
    pub integration_name: String,
}

impl Default for AmmConfig {
    fn default() -> Self {
        Self {
            router: UNISWAP_V2_ROUTER,
            factory: UNISWAP_V2_FACTORY,
            integration_name: DEFAULT_INTEGRATION_NAME.to_string(),
        }
    }
}

impl AmmConfig {
    /// Load from `AMM_UNISWAP_V2_ROUTER`, `AMM_UNISWAP_V2_FACTORY` and
    /// `AMM_INTEGRATION_NAME`, defaulting each unset value.
    pub fn from_env() -> Result<Self, AmmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AmmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let router = match lookup("AMM_UNISWAP_V2_ROUTER") {
            Some(raw) => parse_address("AMM_UNISWAP_V2_ROUTER", &raw)?,
            None => defaults.router,
        };
        let factory = match lookup("AMM_UNISWAP_V2_FACTORY") {
            Some(raw) => parse_address("AMM_UNISWAP_V2_FACTORY", &raw)?,
            None => defaults.factory,
        };
        let integration_name = lookup("AMM_INTEGRATION_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.integration_name);

        Ok(Self {
            router,
            factory,
            integration_name,
        })
    }
}

fn parse_address(key: &str, raw: &str) -> Result<Address, AmmError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| AmmError::ConfigError(format!("{key}: invalid address '{raw}': {e}")))
}
