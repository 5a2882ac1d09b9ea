use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use super::{AmmAdapter, EncodedCall, LiquidityParams, SingleAssetParams};
use crate::config::{AmmConfig, UNISWAP_V2_FACTORY, UNISWAP_V2_ROUTER};
use crate::contracts::{self, IUniswapV2Router02};
use crate::error::AmmError;
use crate::math::mul_div_floor;
use crate::vault::ChainView;

pub const SINGLE_ASSET_PROVIDE_UNSUPPORTED: &str =
    "Uniswap does not support to add single asset liquidity";
pub const SINGLE_ASSET_REMOVE_UNSUPPORTED: &str =
    "Uniswap does not support to remove single asset liquidity";

/// Adapter for Uniswap V2 style pair pools, routed through Router02.
///
/// Pairs hold exactly two assets, so every multi-asset request must carry
/// exactly two assets and two amounts; single-asset requests are rejected.
pub struct UniswapV2AmmAdapter {
    router_address: Address,
    factory_address: Address,
}

impl UniswapV2AmmAdapter {
    pub fn new() -> Self {
        Self {
            router_address: UNISWAP_V2_ROUTER,
            factory_address: UNISWAP_V2_FACTORY,
        }
    }

    pub fn with_router(router_address: Address, factory_address: Address) -> Self {
        Self {
            router_address,
            factory_address,
        }
    }

    pub fn from_config(config: &AmmConfig) -> Self {
        Self::with_router(config.router, config.factory)
    }

    pub fn router_address(&self) -> Address {
        self.router_address
    }

    /// Split a request into its two positional (asset, amount) pairs.
    fn pair_of(
        params: &LiquidityParams,
        operation: &str,
    ) -> Result<((Address, U256), (Address, U256)), AmmError> {
        if params.assets.len() != params.amounts.len() {
            return Err(AmmError::LengthMismatch {
                assets: params.assets.len(),
                amounts: params.amounts.len(),
            });
        }
        match (params.assets.as_slice(), params.amounts.as_slice()) {
            ([asset_a, asset_b], [amount_a, amount_b]) => {
                Ok(((*asset_a, *amount_a), (*asset_b, *amount_b)))
            }
            _ => Err(AmmError::UnsupportedOperation(format!(
                "Uniswap V2 can only {operation} liquidity for exactly 2 assets, got {}",
                params.assets.len()
            ))),
        }
    }

    /// Encode `addLiquidity(address,address,uint256,uint256,uint256,uint256,address,uint256)`.
    fn encode_add_liquidity(
        &self,
        (token_a, amount_a_desired, amount_a_min): (Address, U256, U256),
        (token_b, amount_b_desired, amount_b_min): (Address, U256, U256),
        to: Address,
        deadline: U256,
    ) -> Bytes {
        let call = IUniswapV2Router02::addLiquidityCall {
            tokenA: token_a,
            tokenB: token_b,
            amountADesired: amount_a_desired,
            amountBDesired: amount_b_desired,
            amountAMin: amount_a_min,
            amountBMin: amount_b_min,
            to,
            deadline,
        };
        Bytes::from(call.abi_encode())
    }

    /// Encode `removeLiquidity(address,address,uint256,uint256,uint256,address,uint256)`.
    fn encode_remove_liquidity(
        &self,
        (token_a, amount_a_min): (Address, U256),
        (token_b, amount_b_min): (Address, U256),
        liquidity: U256,
        to: Address,
        deadline: U256,
    ) -> Bytes {
        let call = IUniswapV2Router02::removeLiquidityCall {
            tokenA: token_a,
            tokenB: token_b,
            liquidity,
            amountAMin: amount_a_min,
            amountBMin: amount_b_min,
            to,
            deadline,
        };
        Bytes::from(call.abi_encode())
    }
}

impl Default for UniswapV2AmmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AmmAdapter for UniswapV2AmmAdapter {
    fn protocol_id(&self) -> &str {
        "uniswap_v2"
    }

    fn get_spender_address(&self, _pool: Address) -> Address {
        self.router_address
    }

    fn is_valid_pool(
        &self,
        view: &dyn ChainView,
        pool: Address,
        assets: &[Address],
    ) -> Result<bool, AmmError> {
        let [asset_a, asset_b] = assets else {
            return Ok(false);
        };
        if pool.is_zero() {
            return Ok(false);
        }
        let pair = contracts::get_pair(view, self.factory_address, *asset_a, *asset_b)?;
        Ok(pair == pool)
    }

    fn get_provide_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError> {
        let ((token_a, amount_a_desired), (token_b, amount_b_desired)) =
            Self::pair_of(params, "add")?;

        let total_supply = contracts::total_supply(view, params.pool)?;
        if total_supply.is_zero() {
            return Err(AmmError::EmptyPool { pool: params.pool });
        }

        // Pro-rata share of current reserves that `liquidity` pool tokens are worth.
        let reserve_a = contracts::balance_of(view, token_a, params.pool)?;
        let reserve_b = contracts::balance_of(view, token_b, params.pool)?;
        let amount_a_min = mul_div_floor(reserve_a, params.liquidity, total_supply)?;
        let amount_b_min = mul_div_floor(reserve_b, params.liquidity, total_supply)?;

        let calldata = self.encode_add_liquidity(
            (token_a, amount_a_desired, amount_a_min),
            (token_b, amount_b_desired, amount_b_min),
            params.recipient,
            U256::from(view.block_timestamp()),
        );
        Ok(EncodedCall {
            target: self.router_address,
            value: U256::ZERO,
            calldata,
        })
    }

    fn get_provide_liquidity_single_asset_calldata(
        &self,
        _view: &dyn ChainView,
        _params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError> {
        Err(AmmError::UnsupportedOperation(
            SINGLE_ASSET_PROVIDE_UNSUPPORTED.into(),
        ))
    }

    fn get_remove_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError> {
        let (asset_a, asset_b) = Self::pair_of(params, "remove")?;
        let calldata = self.encode_remove_liquidity(
            asset_a,
            asset_b,
            params.liquidity,
            params.recipient,
            U256::from(view.block_timestamp()),
        );
        Ok(EncodedCall {
            target: self.router_address,
            value: U256::ZERO,
            calldata,
        })
    }

    fn get_remove_liquidity_single_asset_calldata(
        &self,
        _view: &dyn ChainView,
        _params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError> {
        Err(AmmError::UnsupportedOperation(
            SINGLE_ASSET_REMOVE_UNSUPPORTED.into(),
        ))
    }
}
