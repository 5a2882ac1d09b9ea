use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A two-or-more asset liquidity operation against one pool.
///
/// `liquidity` is the minimum pool-token amount to mint when adding and the
/// exact amount to burn when removing. `amounts` are the per-asset maximums
/// in when adding and the per-asset minimums out when removing; they are
/// positional with `assets`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiquidityRequest {
    pub vault: Address,
    pub integration_name: String,
    pub pool: Address,
    pub liquidity: U256,
    pub assets: Vec<Address>,
    pub amounts: Vec<U256>,
}

/// A single-asset liquidity operation against one pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SingleAssetRequest {
    pub vault: Address,
    pub integration_name: String,
    pub pool: Address,
    pub liquidity: U256,
    pub asset: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityAction {
    AddLiquidity,
    AddLiquiditySingleAsset,
    RemoveLiquidity,
    RemoveLiquiditySingleAsset,
}

/// Stages a liquidity operation walks through. Re-derived on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStage {
    Idle,
    Resolving,
    SnapshotBefore,
    Approving,
    Executing,
    SnapshotAfter,
    Validating,
    Committed,
    Reverted,
}

/// Lifecycle of a module on a vault.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Pending,
    Initialized,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetAmount {
    pub asset: Address,
    pub amount: U256,
}

/// Observed outcome of a committed liquidity operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityReceipt {
    pub operation_id: Uuid,
    pub action: LiquidityAction,
    pub vault: Address,
    pub pool: Address,
    pub integration_name: String,
    /// Pool tokens minted (add) or burned (remove).
    pub liquidity: U256,
    /// Assets spent (add) or received (remove), measured from balance deltas.
    pub asset_amounts: Vec<AssetAmount>,
    /// Tracked external position of the vault in `pool` after the operation.
    pub position_after: U256,
}
