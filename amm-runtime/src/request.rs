use alloy::primitives::{Address, U256, keccak256};
use alloy::sol_types::SolValue;

use crate::config::DEFAULT_INTEGRATION_NAME;
use crate::error::AmmError;
use crate::types::*;

pub struct LiquidityRequestBuilder {
    vault: Option<Address>,
    integration_name: Option<String>,
    pool: Option<Address>,
    liquidity: U256,
    assets: Vec<Address>,
    amounts: Vec<U256>,
}

impl LiquidityRequestBuilder {
    pub fn new() -> Self {
        Self {
            vault: None,
            integration_name: None,
            pool: None,
            liquidity: U256::ZERO,
            assets: Vec::new(),
            amounts: Vec::new(),
        }
    }

    pub fn vault(mut self, vault: Address) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn integration_name(mut self, name: impl Into<String>) -> Self {
        self.integration_name = Some(name.into());
        self
    }

    pub fn pool(mut self, pool: Address) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Minimum pool tokens to mint (add) or pool tokens to burn (remove).
    pub fn liquidity(mut self, liquidity: U256) -> Self {
        self.liquidity = liquidity;
        self
    }

    /// Append an asset with its max-in (add) or min-out (remove) amount.
    pub fn asset(mut self, asset: Address, amount: U256) -> Self {
        self.assets.push(asset);
        self.amounts.push(amount);
        self
    }

    pub fn build(self) -> Result<LiquidityRequest, AmmError> {
        if self.assets.is_empty() {
            return Err(AmmError::ConfigError("at least one asset required".into()));
        }
        Ok(LiquidityRequest {
            vault: self
                .vault
                .ok_or_else(|| AmmError::ConfigError("vault required".into()))?,
            integration_name: self
                .integration_name
                .unwrap_or_else(|| DEFAULT_INTEGRATION_NAME.to_string()),
            pool: self
                .pool
                .ok_or_else(|| AmmError::ConfigError("pool required".into()))?,
            liquidity: self.liquidity,
            assets: self.assets,
            amounts: self.amounts,
        })
    }
}

impl Default for LiquidityRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SingleAssetRequestBuilder {
    vault: Option<Address>,
    integration_name: Option<String>,
    pool: Option<Address>,
    liquidity: U256,
    asset: Option<(Address, U256)>,
}

impl SingleAssetRequestBuilder {
    pub fn new() -> Self {
        Self {
            vault: None,
            integration_name: None,
            pool: None,
            liquidity: U256::ZERO,
            asset: None,
        }
    }

    pub fn vault(mut self, vault: Address) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn integration_name(mut self, name: impl Into<String>) -> Self {
        self.integration_name = Some(name.into());
        self
    }

    pub fn pool(mut self, pool: Address) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn liquidity(mut self, liquidity: U256) -> Self {
        self.liquidity = liquidity;
        self
    }

    pub fn asset(mut self, asset: Address, amount: U256) -> Self {
        self.asset = Some((asset, amount));
        self
    }

    pub fn build(self) -> Result<SingleAssetRequest, AmmError> {
        let (asset, amount) = self
            .asset
            .ok_or_else(|| AmmError::ConfigError("asset required".into()))?;
        Ok(SingleAssetRequest {
            vault: self
                .vault
                .ok_or_else(|| AmmError::ConfigError("vault required".into()))?,
            integration_name: self
                .integration_name
                .unwrap_or_else(|| DEFAULT_INTEGRATION_NAME.to_string()),
            pool: self
                .pool
                .ok_or_else(|| AmmError::ConfigError("pool required".into()))?,
            liquidity: self.liquidity,
            asset,
            amount,
        })
    }
}

impl Default for SingleAssetRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a liquidity request for log correlation
pub fn hash_request(action: LiquidityAction, request: &LiquidityRequest) -> String {
    let encoded = (
        U256::from(action as u8),
        request.vault,
        request.integration_name.clone(),
        request.pool,
        request.liquidity,
        request.assets.clone(),
        request.amounts.clone(),
    )
        .abi_encode();
    format!("0x{}", hex::encode(keccak256(encoded)))
}
