use alloy::primitives::{Address, U256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmmError {
    #[error("Unknown integration: '{name}' for module {module}")]
    UnknownIntegration { module: Address, name: String },

    #[error("Duplicate integration: '{name}' already bound for module {module}")]
    DuplicateIntegration { module: Address, name: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Empty pool: {pool} has zero liquidity supply")]
    EmptyPool { pool: Address },

    #[error("Invalid pool {pool} for the requested assets")]
    InvalidPool { pool: Address },

    #[error("Array length mismatch: {assets} assets, {amounts} amounts")]
    LengthMismatch { assets: usize, amounts: usize },

    #[error("Insufficient liquidity minted: expected at least {expected}, got {actual}")]
    InsufficientLiquidityMinted { expected: U256, actual: U256 },

    #[error("Insufficient amount received of {asset}: expected at least {expected}, got {actual}")]
    InsufficientAmountReceived {
        asset: Address,
        expected: U256,
        actual: U256,
    },

    #[error("Insufficient position balance in {pool}: have {have}, need {need}")]
    InsufficientPositionBalance { pool: Address, have: U256, need: U256 },

    #[error("Insufficient asset balance of {asset}: have {have}, need {need}")]
    InsufficientAssetBalance { asset: Address, have: U256, need: U256 },

    #[error("External call to {target} failed: {reason}")]
    ExternalCallFailed { target: Address, reason: String },

    #[error("Unauthorized caller {caller}: {reason}")]
    Unauthorized { caller: Address, reason: String },

    #[error("Module {module} is not enabled for vault {vault}")]
    ModuleNotEnabled { module: Address, vault: Address },

    #[error("Module {module} is not pending initialization for vault {vault}")]
    ModuleNotPending { module: Address, vault: Address },

    #[error("Unknown vault: {0}")]
    UnknownVault(Address),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<alloy::sol_types::Error> for AmmError {
    fn from(e: alloy::sol_types::Error) -> Self {
        AmmError::Abi(e.to_string())
    }
}
