//! Shared fixture: a Uniswap V2 pool seeded with 100000 / 50000 tokens, a
//! vault managed by `MANAGER` holding both assets, and an initialized
//! `AmmModule` with the Uniswap V2 adapter registered as `UniswapAmm`.

#![allow(dead_code)]

use std::sync::Arc;

use alloy::primitives::{Address, U256, address};
use alloy::sol_types::SolCall;
use amm_runtime::adapters::uniswap_v2::UniswapV2AmmAdapter;
use amm_runtime::contracts::{self, IERC20, IUniswapV2Router02};
use amm_runtime::ledger::UniswapV2Deployment;
use amm_runtime::vault::{ChainView, VaultLedger};
use amm_runtime::{
    AmmModule, InMemoryChain, IntegrationRegistry, LiquidityRequest, LiquidityRequestBuilder,
};

pub const OWNER: Address = address!("0000000000000000000000000000000000000e01");
pub const MANAGER: Address = address!("0000000000000000000000000000000000000e02");
pub const STRANGER: Address = address!("0000000000000000000000000000000000000e03");
pub const LIQUIDITY_PROVIDER: Address = address!("0000000000000000000000000000000000000e04");
pub const MODULE_ID: Address = address!("00000000000000000000000000000000000a3301");
pub const ADAPTER_ID: Address = address!("00000000000000000000000000000000000a3302");

pub const INTEGRATION: &str = "UniswapAmm";

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u8))
}

pub fn approve_calldata(spender: Address, amount: U256) -> Vec<u8> {
    IERC20::approveCall { spender, amount }.abi_encode()
}

pub struct Fixture {
    pub chain: InMemoryChain,
    pub uni: UniswapV2Deployment,
    pub registry: Arc<IntegrationRegistry>,
    pub module: AmmModule,
    pub vault: Address,
    pub asset0: Address,
    pub asset1: Address,
    pub pool: Address,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// `asset1` rejects nonzero → nonzero approvals.
    pub fn with_strict_asset() -> Self {
        Self::build(true)
    }

    fn build(strict_asset1: bool) -> Self {
        let mut chain = InMemoryChain::new();
        let asset0 = chain.deploy_token("Wrapped Ether", "WETH", 18);
        let asset1 = if strict_asset1 {
            chain.deploy_strict_token("Tether", "USDT", 18)
        } else {
            chain.deploy_token("Dai", "DAI", 18)
        };
        let uni = chain.deploy_uniswap_v2();

        chain.mint(asset0, LIQUIDITY_PROVIDER, ether(100_000)).unwrap();
        chain.mint(asset1, LIQUIDITY_PROVIDER, ether(50_000)).unwrap();
        for token in [asset0, asset1] {
            chain
                .execute(LIQUIDITY_PROVIDER, token, &approve_calldata(uni.router, U256::MAX))
                .unwrap();
        }
        let seed = IUniswapV2Router02::addLiquidityCall {
            tokenA: asset0,
            tokenB: asset1,
            amountADesired: ether(100_000),
            amountBDesired: ether(50_000),
            amountAMin: U256::ZERO,
            amountBMin: U256::ZERO,
            to: LIQUIDITY_PROVIDER,
            deadline: U256::from(chain.block_timestamp()),
        }
        .abi_encode();
        chain.execute(LIQUIDITY_PROVIDER, uni.router, &seed).unwrap();
        let pool = contracts::get_pair(&chain, uni.factory, asset0, asset1).unwrap();

        let registry = Arc::new(IntegrationRegistry::new(OWNER));
        registry
            .add_integration(
                OWNER,
                MODULE_ID,
                INTEGRATION,
                ADAPTER_ID,
                Arc::new(UniswapV2AmmAdapter::with_router(uni.router, uni.factory)),
            )
            .unwrap();
        let module = AmmModule::new(MODULE_ID, registry.clone());

        let vault = chain.create_vault(MANAGER, &[MODULE_ID]);
        chain.mint(asset0, vault, ether(1_000)).unwrap();
        chain.mint(asset1, vault, ether(1_000)).unwrap();
        module.initialize(&mut chain, MANAGER, vault).unwrap();

        Self {
            chain,
            uni,
            registry,
            module,
            vault,
            asset0,
            asset1,
            pool,
        }
    }

    pub fn request(&self, liquidity: U256, amount0: U256, amount1: U256) -> LiquidityRequest {
        LiquidityRequestBuilder::new()
            .vault(self.vault)
            .integration_name(INTEGRATION)
            .pool(self.pool)
            .liquidity(liquidity)
            .asset(self.asset0, amount0)
            .asset(self.asset1, amount1)
            .build()
            .unwrap()
    }

    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        contracts::balance_of(&self.chain, token, holder).unwrap()
    }

    pub fn allowance(&self, token: Address, spender: Address) -> U256 {
        contracts::allowance(&self.chain, token, self.vault, spender).unwrap()
    }

    /// Tracked pool-token position of the vault for this module.
    pub fn position(&self) -> U256 {
        self.chain
            .external_position(self.vault, self.pool, MODULE_ID)
            .unwrap()
    }

    /// (asset0, asset1, pool token) balances of the vault.
    pub fn vault_balances(&self) -> (U256, U256, U256) {
        (
            self.balance(self.asset0, self.vault),
            self.balance(self.asset1, self.vault),
            self.balance(self.pool, self.vault),
        )
    }
}
