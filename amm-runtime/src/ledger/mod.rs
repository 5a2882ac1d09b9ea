//! In-process, EVM-style ledger.
//!
//! Hosts ERC20 tokens, a Uniswap V2 deployment and vault records behind the
//! [`ChainView`] and [`VaultLedger`] interfaces. Contracts receive raw
//! calldata and dispatch on the `sol!` bindings from `crate::contracts`, so
//! adapter output is executed exactly as encoded. Every call runs against a
//! snapshot of the world and is rolled back if it reverts.

mod erc20;
mod uniswap_v2;

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256, address, keccak256};

use crate::error::AmmError;
use crate::types::ModuleState;
use crate::vault::{ChainView, Checkpoint, VaultLedger};

use erc20::{Erc20Contract, TokenState};
use uniswap_v2::{FactoryContract, FactoryState, PairState, RouterContract};

/// Block timestamp a fresh chain starts at.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Account that deploys every contract created through the admin helpers.
const DEPLOYER: Address = address!("de91000000000000000000000000000000000001");

/// Revert reason raised by a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Revert(pub String);

impl Revert {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    fn into_call_error(self, target: Address) -> AmmError {
        AmmError::ExternalCallFailed {
            target,
            reason: self.0,
        }
    }
}

impl From<alloy::sol_types::Error> for Revert {
    fn from(e: alloy::sol_types::Error) -> Self {
        Revert(format!("invalid calldata: {e}"))
    }
}

impl From<AmmError> for Revert {
    fn from(e: AmmError) -> Self {
        Revert(e.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CallFrame {
    pub sender: Address,
    pub this: Address,
}

/// Contract code living at an address.
pub(crate) trait Contract: Send + Sync {
    fn call(&self, chain: &mut InMemoryChain, frame: CallFrame, data: &[u8])
        -> Result<Bytes, Revert>;

    /// Read-only entry points; state-changing selectors must revert.
    fn view(&self, chain: &InMemoryChain, this: Address, data: &[u8]) -> Result<Bytes, Revert>;
}

#[derive(Debug, Clone)]
struct VaultRecord {
    manager: Address,
    modules: HashMap<Address, ModuleState>,
    /// (component, module) → tracked amount
    external_positions: HashMap<(Address, Address), U256>,
}

#[derive(Clone, Default)]
struct World {
    contracts: HashMap<Address, Arc<dyn Contract>>,
    tokens: HashMap<Address, TokenState>,
    pairs: HashMap<Address, PairState>,
    factories: HashMap<Address, FactoryState>,
    vaults: HashMap<Address, VaultRecord>,
}

/// Addresses of a Uniswap V2 deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniswapV2Deployment {
    pub factory: Address,
    pub router: Address,
}

pub struct InMemoryChain {
    world: World,
    journal: Vec<World>,
    block_timestamp: u64,
    nonce: u64,
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self {
            world: World::default(),
            journal: Vec::new(),
            block_timestamp: GENESIS_TIMESTAMP,
            nonce: 0,
        }
    }

    pub fn set_block_timestamp(&mut self, timestamp: u64) {
        self.block_timestamp = timestamp;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.block_timestamp = self.block_timestamp.saturating_add(seconds);
    }

    fn next_address(&mut self) -> Address {
        self.nonce += 1;
        let hash = keccak256([DEPLOYER.as_slice(), &self.nonce.to_be_bytes()].concat());
        Address::from_slice(&hash[12..])
    }

    fn deploy(&mut self, contract: Arc<dyn Contract>) -> Address {
        let address = self.next_address();
        self.world.contracts.insert(address, contract);
        address
    }

    pub fn deploy_token(&mut self, name: &str, symbol: &str, decimals: u8) -> Address {
        let token = self.deploy(Arc::new(Erc20Contract));
        self.world
            .tokens
            .insert(token, TokenState::new(name, symbol, decimals, false));
        token
    }

    /// Token that refuses to move an allowance from one nonzero value to another.
    pub fn deploy_strict_token(&mut self, name: &str, symbol: &str, decimals: u8) -> Address {
        let token = self.deploy(Arc::new(Erc20Contract));
        self.world
            .tokens
            .insert(token, TokenState::new(name, symbol, decimals, true));
        token
    }

    pub fn deploy_uniswap_v2(&mut self) -> UniswapV2Deployment {
        let factory = self.deploy(Arc::new(FactoryContract));
        self.world.factories.insert(factory, FactoryState::default());
        let router = self.deploy(Arc::new(RouterContract::new(factory)));
        UniswapV2Deployment { factory, router }
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), AmmError> {
        self.token_mut(token)
            .and_then(|state| state.mint(to, amount))
            .map_err(|r| r.into_call_error(token))
    }

    /// Create a vault owned by `manager` with `modules` pending initialization.
    pub fn create_vault(&mut self, manager: Address, modules: &[Address]) -> Address {
        let vault = self.next_address();
        let record = VaultRecord {
            manager,
            modules: modules
                .iter()
                .map(|module| (*module, ModuleState::Pending))
                .collect(),
            external_positions: HashMap::new(),
        };
        self.world.vaults.insert(vault, record);
        vault
    }

    /// Top-level transaction from an externally owned account.
    pub fn execute(
        &mut self,
        sender: Address,
        target: Address,
        data: &[u8],
    ) -> Result<Bytes, AmmError> {
        self.call(sender, target, U256::ZERO, data)
            .map_err(|r| r.into_call_error(target))
    }

    pub(crate) fn call(
        &mut self,
        sender: Address,
        target: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Bytes, Revert> {
        if !value.is_zero() {
            return Err(Revert::new("native value transfers are not supported"));
        }
        let contract = self
            .world
            .contracts
            .get(&target)
            .cloned()
            .ok_or_else(|| Revert::new(format!("no contract code at {target}")))?;

        let snapshot = self.world.clone();
        let result = contract.call(self, CallFrame { sender, this: target }, data);
        if result.is_err() {
            self.world = snapshot;
        }
        result
    }

    pub(crate) fn token(&self, token: Address) -> Result<&TokenState, Revert> {
        self.world
            .tokens
            .get(&token)
            .ok_or_else(|| Revert::new(format!("{token} is not a token")))
    }

    pub(crate) fn token_mut(&mut self, token: Address) -> Result<&mut TokenState, Revert> {
        self.world
            .tokens
            .get_mut(&token)
            .ok_or_else(|| Revert::new(format!("{token} is not a token")))
    }

    fn vault(&self, vault: Address) -> Result<&VaultRecord, AmmError> {
        self.world
            .vaults
            .get(&vault)
            .ok_or(AmmError::UnknownVault(vault))
    }

    fn vault_mut(&mut self, vault: Address) -> Result<&mut VaultRecord, AmmError> {
        self.world
            .vaults
            .get_mut(&vault)
            .ok_or(AmmError::UnknownVault(vault))
    }
}

impl ChainView for InMemoryChain {
    fn block_timestamp(&self) -> u64 {
        self.block_timestamp
    }

    fn static_call(&self, target: Address, data: &[u8]) -> Result<Bytes, AmmError> {
        let contract = self
            .world
            .contracts
            .get(&target)
            .ok_or_else(|| AmmError::ExternalCallFailed {
                target,
                reason: "no contract code".into(),
            })?;
        contract
            .view(self, target, data)
            .map_err(|r| r.into_call_error(target))
    }
}

impl VaultLedger for InMemoryChain {
    fn is_manager(&self, vault: Address, caller: Address) -> Result<bool, AmmError> {
        Ok(self.vault(vault)?.manager == caller)
    }

    fn is_initialized_module(&self, vault: Address, module: Address) -> Result<bool, AmmError> {
        Ok(self.vault(vault)?.modules.get(&module) == Some(&ModuleState::Initialized))
    }

    fn initialize_module(&mut self, vault: Address, module: Address) -> Result<(), AmmError> {
        let record = self.vault_mut(vault)?;
        match record.modules.get_mut(&module) {
            Some(state @ ModuleState::Pending) => {
                *state = ModuleState::Initialized;
                Ok(())
            }
            _ => Err(AmmError::ModuleNotPending { module, vault }),
        }
    }

    fn invoke(
        &mut self,
        module: Address,
        vault: Address,
        target: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Bytes, AmmError> {
        if !self.is_initialized_module(vault, module)? {
            return Err(AmmError::ModuleNotEnabled { module, vault });
        }
        self.call(vault, target, value, data)
            .map_err(|r| r.into_call_error(target))
    }

    fn external_position(
        &self,
        vault: Address,
        component: Address,
        module: Address,
    ) -> Result<U256, AmmError> {
        Ok(self
            .vault(vault)?
            .external_positions
            .get(&(component, module))
            .copied()
            .unwrap_or_default())
    }

    fn increase_external_position(
        &mut self,
        vault: Address,
        component: Address,
        module: Address,
        amount: U256,
    ) -> Result<U256, AmmError> {
        let record = self.vault_mut(vault)?;
        let position = record
            .external_positions
            .entry((component, module))
            .or_default();
        *position = position
            .checked_add(amount)
            .ok_or_else(|| AmmError::Overflow(format!("position in {component}")))?;
        Ok(*position)
    }

    fn decrease_external_position(
        &mut self,
        vault: Address,
        component: Address,
        module: Address,
        amount: U256,
    ) -> Result<U256, AmmError> {
        let record = self.vault_mut(vault)?;
        let have = record
            .external_positions
            .get(&(component, module))
            .copied()
            .unwrap_or_default();
        let remaining = have
            .checked_sub(amount)
            .ok_or(AmmError::InsufficientPositionBalance {
                pool: component,
                have,
                need: amount,
            })?;
        if remaining.is_zero() {
            record.external_positions.remove(&(component, module));
        } else {
            record
                .external_positions
                .insert((component, module), remaining);
        }
        Ok(remaining)
    }

    fn checkpoint(&mut self) -> Checkpoint {
        let checkpoint = Checkpoint(self.journal.len());
        self.journal.push(self.world.clone());
        checkpoint
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        self.journal.truncate(checkpoint.0 + 1);
        if let Some(saved) = self.journal.pop() {
            self.world = saved;
        }
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.journal.truncate(checkpoint.0);
    }
}
