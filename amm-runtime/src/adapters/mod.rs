pub mod uniswap_v2;

use alloy::primitives::{Address, Bytes, U256};

use crate::error::AmmError;
use crate::vault::ChainView;

/// Common trait for AMM protocol adapters.
///
/// Adapters translate a liquidity request into the call the vault must make
/// against the protocol. They never hold funds and never mutate state; the
/// only chain access they get is the read-only [`ChainView`].
pub trait AmmAdapter: Send + Sync {
    /// Protocol identifier
    fn protocol_id(&self) -> &str;

    /// Address that must be granted an allowance before providing liquidity.
    fn get_spender_address(&self, pool: Address) -> Address;

    /// Whether `pool` is the protocol's pool for exactly `assets`.
    fn is_valid_pool(
        &self,
        view: &dyn ChainView,
        pool: Address,
        assets: &[Address],
    ) -> Result<bool, AmmError>;

    fn get_provide_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError>;

    fn get_provide_liquidity_single_asset_calldata(
        &self,
        view: &dyn ChainView,
        params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError>;

    fn get_remove_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError>;

    fn get_remove_liquidity_single_asset_calldata(
        &self,
        view: &dyn ChainView,
        params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError>;
}

/// Parameters for encoding a multi-asset liquidity call.
///
/// `amounts` are maximums in for provide and minimums out for remove, in the
/// same order as `assets`. `liquidity` is the minimum pool tokens to mint for
/// provide and the pool tokens to burn for remove.
#[derive(Debug, Clone)]
pub struct LiquidityParams {
    pub pool: Address,
    pub assets: Vec<Address>,
    pub amounts: Vec<U256>,
    pub liquidity: U256,
    pub recipient: Address,
}

/// Parameters for encoding a single-asset liquidity call.
#[derive(Debug, Clone)]
pub struct SingleAssetParams {
    pub pool: Address,
    pub asset: Address,
    pub amount: U256,
    pub liquidity: U256,
    pub recipient: Address,
}

/// Encoded call ready for vault execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub target: Address,
    pub value: U256,
    pub calldata: Bytes,
}
