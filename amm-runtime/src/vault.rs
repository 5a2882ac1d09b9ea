//! Collaborator interfaces the liquidity module runs against.
//!
//! [`ChainView`] is the read-only surface adapters may use; [`VaultLedger`]
//! adds the vault-side operations only the module performs. The invoke
//! helpers encode ERC20 calls with the bindings from `crate::contracts`
//! and execute them as the vault.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use crate::contracts::{self, IERC20};
use crate::error::AmmError;

/// Read-only access to chain state.
pub trait ChainView {
    /// Timestamp of the block the current operation executes in.
    fn block_timestamp(&self) -> u64;

    /// Execute a call without committing any state change.
    fn static_call(&self, target: Address, data: &[u8]) -> Result<Bytes, AmmError>;
}

/// Journal position returned by [`VaultLedger::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

/// Vault holdings, permissions and position records.
///
/// Balances live in the token contracts and are read through [`ChainView`];
/// the ledger only tracks what the vault itself records.
pub trait VaultLedger: ChainView {
    fn is_manager(&self, vault: Address, caller: Address) -> Result<bool, AmmError>;

    fn is_initialized_module(&self, vault: Address, module: Address) -> Result<bool, AmmError>;

    /// Move `module` from pending to initialized on `vault`.
    fn initialize_module(&mut self, vault: Address, module: Address) -> Result<(), AmmError>;

    /// Execute `data` against `target` with the vault as the caller.
    ///
    /// Fails with `ModuleNotEnabled` unless `module` is initialized on the
    /// vault, and with `ExternalCallFailed` if the call reverts.
    fn invoke(
        &mut self,
        module: Address,
        vault: Address,
        target: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Bytes, AmmError>;

    fn external_position(
        &self,
        vault: Address,
        component: Address,
        module: Address,
    ) -> Result<U256, AmmError>;

    fn increase_external_position(
        &mut self,
        vault: Address,
        component: Address,
        module: Address,
        amount: U256,
    ) -> Result<U256, AmmError>;

    /// Fails with `InsufficientPositionBalance` if less than `amount` is tracked.
    fn decrease_external_position(
        &mut self,
        vault: Address,
        component: Address,
        module: Address,
        amount: U256,
    ) -> Result<U256, AmmError>;

    fn checkpoint(&mut self) -> Checkpoint;

    /// Discard every change made since `checkpoint`.
    fn revert_to(&mut self, checkpoint: Checkpoint);

    /// Keep every change made since `checkpoint`.
    fn commit(&mut self, checkpoint: Checkpoint);
}

/// Vault calls `token.approve(spender, amount)`.
pub fn invoke_approve<L: VaultLedger + ?Sized>(
    ledger: &mut L,
    module: Address,
    vault: Address,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), AmmError> {
    let data = IERC20::approveCall { spender, amount }.abi_encode();
    ledger.invoke(module, vault, token, U256::ZERO, &data)?;
    Ok(())
}

/// Grant `spender` exactly `amount`, zeroing any existing allowance first.
///
/// Tokens in the USDT family reject changing a nonzero allowance to another
/// nonzero value.
pub fn invoke_reset_and_approve<L: VaultLedger>(
    ledger: &mut L,
    module: Address,
    vault: Address,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), AmmError> {
    let current = contracts::allowance(&*ledger, token, vault, spender)?;
    if current == amount {
        return Ok(());
    }
    if !current.is_zero() && !amount.is_zero() {
        invoke_approve(ledger, module, vault, token, spender, U256::ZERO)?;
    }
    invoke_approve(ledger, module, vault, token, spender, amount)
}

/// Zero whatever allowance `spender` has left over after an operation.
pub fn invoke_clear_allowance<L: VaultLedger>(
    ledger: &mut L,
    module: Address,
    vault: Address,
    token: Address,
    spender: Address,
) -> Result<(), AmmError> {
    let remaining = contracts::allowance(&*ledger, token, vault, spender)?;
    if remaining.is_zero() {
        return Ok(());
    }
    invoke_approve(ledger, module, vault, token, spender, U256::ZERO)
}
