//! Uniswap V2 factory, pair and router running on the in-memory ledger.
//!
//! Pool math matches the deployed contracts: the first deposit mints
//! `sqrt(a * b) - MINIMUM_LIQUIDITY` and locks the minimum at the zero
//! address, later deposits mint pro rata, and burns pay out
//! `liquidity * balance / totalSupply` of each side.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256, keccak256};
use alloy::sol_types::{SolCall, SolInterface, SolValue};

use super::erc20::{TokenState, call_erc20, view_erc20};
use super::{CallFrame, Contract, InMemoryChain, Revert};
use crate::contracts::IERC20;
use crate::contracts::IUniswapV2Factory::IUniswapV2FactoryCalls;
use crate::contracts::IUniswapV2Pair::{self, IUniswapV2PairCalls};
use crate::contracts::IUniswapV2Router02::{self, IUniswapV2Router02Calls};
use crate::math;

pub(crate) const MINIMUM_LIQUIDITY: u64 = 1000;

#[derive(Debug, Clone)]
pub(crate) struct PairState {
    factory: Address,
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
    block_timestamp_last: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FactoryState {
    /// Keyed by both token orderings.
    pairs: HashMap<(Address, Address), Address>,
    all_pairs: Vec<Address>,
}

fn sort_tokens(token_a: Address, token_b: Address) -> Result<(Address, Address), Revert> {
    if token_a == token_b {
        return Err(Revert::new("UniswapV2: IDENTICAL_ADDRESSES"));
    }
    let (token0, token1) = if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    };
    if token0.is_zero() {
        return Err(Revert::new("UniswapV2: ZERO_ADDRESS"));
    }
    Ok((token0, token1))
}

fn lookup_pair(chain: &InMemoryChain, factory: Address, token_a: Address, token_b: Address) -> Option<Address> {
    chain
        .world
        .factories
        .get(&factory)
        .and_then(|state| state.pairs.get(&(token_a, token_b)))
        .copied()
}

fn pair_state(chain: &InMemoryChain, pair: Address) -> Result<PairState, Revert> {
    chain
        .world
        .pairs
        .get(&pair)
        .cloned()
        .ok_or_else(|| Revert::new(format!("{pair} is not a pair")))
}

fn create_pair(
    chain: &mut InMemoryChain,
    factory: Address,
    token_a: Address,
    token_b: Address,
) -> Result<Address, Revert> {
    let (token0, token1) = sort_tokens(token_a, token_b)?;
    if lookup_pair(chain, factory, token0, token1).is_some() {
        return Err(Revert::new("UniswapV2: PAIR_EXISTS"));
    }

    let salt = keccak256([factory.as_slice(), token0.as_slice(), token1.as_slice()].concat());
    let pair = Address::from_slice(&salt[12..]);

    let world = &mut chain.world;
    world.contracts.insert(pair, Arc::new(PairContract));
    world
        .tokens
        .insert(pair, TokenState::new("Uniswap V2", "UNI-V2", 18, false));
    world.pairs.insert(
        pair,
        PairState {
            factory,
            token0,
            token1,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            block_timestamp_last: 0,
        },
    );
    let state = world.factories.entry(factory).or_default();
    state.pairs.insert((token0, token1), pair);
    state.pairs.insert((token1, token0), pair);
    state.all_pairs.push(pair);
    Ok(pair)
}

pub(crate) struct FactoryContract;

impl Contract for FactoryContract {
    fn call(
        &self,
        chain: &mut InMemoryChain,
        frame: CallFrame,
        data: &[u8],
    ) -> Result<Bytes, Revert> {
        match IUniswapV2FactoryCalls::abi_decode(data)? {
            IUniswapV2FactoryCalls::createPair(call) => {
                let pair = create_pair(chain, frame.this, call.tokenA, call.tokenB)?;
                Ok(pair.abi_encode().into())
            }
            _ => self.view(chain, frame.this, data),
        }
    }

    fn view(&self, chain: &InMemoryChain, this: Address, data: &[u8]) -> Result<Bytes, Revert> {
        let encoded = match IUniswapV2FactoryCalls::abi_decode(data)? {
            IUniswapV2FactoryCalls::getPair(call) => lookup_pair(chain, this, call.tokenA, call.tokenB)
                .unwrap_or(Address::ZERO)
                .abi_encode(),
            IUniswapV2FactoryCalls::allPairsLength(_) => {
                let length = chain
                    .world
                    .factories
                    .get(&this)
                    .map_or(0, |state| state.all_pairs.len());
                U256::from(length).abi_encode()
            }
            IUniswapV2FactoryCalls::createPair(_) => {
                return Err(Revert::new("state change during static call"));
            }
        };
        Ok(encoded.into())
    }
}

pub(crate) struct PairContract;

impl PairContract {
    fn balances(chain: &InMemoryChain, state: &PairState, pair: Address) -> Result<(U256, U256), Revert> {
        Ok((
            chain.token(state.token0)?.balance_of(pair),
            chain.token(state.token1)?.balance_of(pair),
        ))
    }

    fn update(chain: &mut InMemoryChain, pair: Address, balance0: U256, balance1: U256) {
        let timestamp = (chain.block_timestamp % (1u64 << 32)) as u32;
        if let Some(state) = chain.world.pairs.get_mut(&pair) {
            state.reserve0 = balance0;
            state.reserve1 = balance1;
            state.block_timestamp_last = timestamp;
        }
    }

    fn mint(chain: &mut InMemoryChain, pair: Address, to: Address) -> Result<U256, Revert> {
        let state = pair_state(chain, pair)?;
        let (balance0, balance1) = Self::balances(chain, &state, pair)?;
        let amount0 = balance0
            .checked_sub(state.reserve0)
            .ok_or_else(|| Revert::new("UniswapV2: OVERFLOW"))?;
        let amount1 = balance1
            .checked_sub(state.reserve1)
            .ok_or_else(|| Revert::new("UniswapV2: OVERFLOW"))?;

        let total_supply = chain.token(pair)?.total_supply;
        let liquidity = if total_supply.is_zero() {
            let product = amount0
                .checked_mul(amount1)
                .ok_or_else(|| Revert::new("UniswapV2: OVERFLOW"))?;
            let minimum = U256::from(MINIMUM_LIQUIDITY);
            let root = math::sqrt(product);
            if root <= minimum {
                return Err(Revert::new("UniswapV2: INSUFFICIENT_LIQUIDITY_MINTED"));
            }
            chain.token_mut(pair)?.mint(Address::ZERO, minimum)?;
            root - minimum
        } else {
            let by0 = math::mul_div_floor(amount0, total_supply, state.reserve0)?;
            let by1 = math::mul_div_floor(amount1, total_supply, state.reserve1)?;
            by0.min(by1)
        };
        if liquidity.is_zero() {
            return Err(Revert::new("UniswapV2: INSUFFICIENT_LIQUIDITY_MINTED"));
        }

        chain.token_mut(pair)?.mint(to, liquidity)?;
        Self::update(chain, pair, balance0, balance1);
        Ok(liquidity)
    }

    fn burn(chain: &mut InMemoryChain, pair: Address, to: Address) -> Result<(U256, U256), Revert> {
        let state = pair_state(chain, pair)?;
        let (balance0, balance1) = Self::balances(chain, &state, pair)?;
        let lp = chain.token(pair)?;
        let liquidity = lp.balance_of(pair);
        let total_supply = lp.total_supply;

        let amount0 = math::mul_div_floor(liquidity, balance0, total_supply)?;
        let amount1 = math::mul_div_floor(liquidity, balance1, total_supply)?;
        if amount0.is_zero() || amount1.is_zero() {
            return Err(Revert::new("UniswapV2: INSUFFICIENT_LIQUIDITY_BURNED"));
        }

        chain.token_mut(pair)?.burn(pair, liquidity)?;
        for (token, amount) in [(state.token0, amount0), (state.token1, amount1)] {
            let transfer = IERC20::transferCall { to, amount }.abi_encode();
            chain.call(pair, token, U256::ZERO, &transfer)?;
        }

        let (balance0, balance1) = Self::balances(chain, &state, pair)?;
        Self::update(chain, pair, balance0, balance1);
        Ok((amount0, amount1))
    }
}

impl Contract for PairContract {
    fn call(
        &self,
        chain: &mut InMemoryChain,
        frame: CallFrame,
        data: &[u8],
    ) -> Result<Bytes, Revert> {
        match IUniswapV2PairCalls::abi_decode(data) {
            Ok(IUniswapV2PairCalls::mint(call)) => {
                let liquidity = Self::mint(chain, frame.this, call.to)?;
                Ok(liquidity.abi_encode().into())
            }
            Ok(IUniswapV2PairCalls::burn(call)) => {
                let amounts = Self::burn(chain, frame.this, call.to)?;
                Ok(amounts.abi_encode_params().into())
            }
            Ok(_) => self.view(chain, frame.this, data),
            Err(_) => call_erc20(chain, frame, data),
        }
    }

    fn view(&self, chain: &InMemoryChain, this: Address, data: &[u8]) -> Result<Bytes, Revert> {
        let Ok(call) = IUniswapV2PairCalls::abi_decode(data) else {
            return view_erc20(chain, this, data);
        };
        let state = pair_state(chain, this)?;
        let encoded = match call {
            IUniswapV2PairCalls::factory(_) => state.factory.abi_encode(),
            IUniswapV2PairCalls::token0(_) => state.token0.abi_encode(),
            IUniswapV2PairCalls::token1(_) => state.token1.abi_encode(),
            IUniswapV2PairCalls::getReserves(_) => {
                (state.reserve0, state.reserve1, state.block_timestamp_last).abi_encode_params()
            }
            IUniswapV2PairCalls::mint(_) | IUniswapV2PairCalls::burn(_) => {
                return Err(Revert::new("state change during static call"));
            }
        };
        Ok(encoded.into())
    }
}

pub(crate) struct RouterContract {
    factory: Address,
}

impl RouterContract {
    pub fn new(factory: Address) -> Self {
        Self { factory }
    }

    fn ensure(chain: &InMemoryChain, deadline: U256) -> Result<(), Revert> {
        if deadline < U256::from(chain.block_timestamp) {
            return Err(Revert::new("UniswapV2Router: EXPIRED"));
        }
        Ok(())
    }

    /// Reserves ordered as (token_a, token_b).
    fn reserves(chain: &InMemoryChain, pair: Address, token_a: Address) -> Result<(U256, U256), Revert> {
        let state = pair_state(chain, pair)?;
        if token_a == state.token0 {
            Ok((state.reserve0, state.reserve1))
        } else {
            Ok((state.reserve1, state.reserve0))
        }
    }

    fn transfer_from(
        chain: &mut InMemoryChain,
        router: Address,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), Revert> {
        let data = IERC20::transferFromCall { from, to, amount }.abi_encode();
        chain.call(router, token, U256::ZERO, &data)?;
        Ok(())
    }

    fn add_liquidity(
        &self,
        chain: &mut InMemoryChain,
        frame: CallFrame,
        call: IUniswapV2Router02::addLiquidityCall,
    ) -> Result<Bytes, Revert> {
        Self::ensure(chain, call.deadline)?;
        let pair = match lookup_pair(chain, self.factory, call.tokenA, call.tokenB) {
            Some(pair) => pair,
            None => create_pair(chain, self.factory, call.tokenA, call.tokenB)?,
        };

        let (reserve_a, reserve_b) = Self::reserves(chain, pair, call.tokenA)?;
        let (amount_a, amount_b) = if reserve_a.is_zero() && reserve_b.is_zero() {
            (call.amountADesired, call.amountBDesired)
        } else {
            let amount_b_optimal = math::quote(call.amountADesired, reserve_a, reserve_b)?;
            if amount_b_optimal <= call.amountBDesired {
                if amount_b_optimal < call.amountBMin {
                    return Err(Revert::new("UniswapV2Router: INSUFFICIENT_B_AMOUNT"));
                }
                (call.amountADesired, amount_b_optimal)
            } else {
                let amount_a_optimal = math::quote(call.amountBDesired, reserve_b, reserve_a)?;
                if amount_a_optimal > call.amountADesired || amount_a_optimal < call.amountAMin {
                    return Err(Revert::new("UniswapV2Router: INSUFFICIENT_A_AMOUNT"));
                }
                (amount_a_optimal, call.amountBDesired)
            }
        };

        Self::transfer_from(chain, frame.this, call.tokenA, frame.sender, pair, amount_a)?;
        Self::transfer_from(chain, frame.this, call.tokenB, frame.sender, pair, amount_b)?;
        let minted = IUniswapV2Pair::mintCall { to: call.to }.abi_encode();
        let out = chain.call(frame.this, pair, U256::ZERO, &minted)?;
        let liquidity = IUniswapV2Pair::mintCall::abi_decode_returns(&out)?;

        Ok((amount_a, amount_b, liquidity).abi_encode_params().into())
    }

    fn remove_liquidity(
        &self,
        chain: &mut InMemoryChain,
        frame: CallFrame,
        call: IUniswapV2Router02::removeLiquidityCall,
    ) -> Result<Bytes, Revert> {
        Self::ensure(chain, call.deadline)?;
        let pair = lookup_pair(chain, self.factory, call.tokenA, call.tokenB)
            .ok_or_else(|| Revert::new("UniswapV2Router: PAIR_NOT_FOUND"))?;

        Self::transfer_from(chain, frame.this, pair, frame.sender, pair, call.liquidity)?;
        let burn = IUniswapV2Pair::burnCall { to: call.to }.abi_encode();
        let out = chain.call(frame.this, pair, U256::ZERO, &burn)?;
        let burned = IUniswapV2Pair::burnCall::abi_decode_returns(&out)?;

        let (token0, _) = sort_tokens(call.tokenA, call.tokenB)?;
        let (amount_a, amount_b) = if call.tokenA == token0 {
            (burned.amount0, burned.amount1)
        } else {
            (burned.amount1, burned.amount0)
        };
        if amount_a < call.amountAMin {
            return Err(Revert::new("UniswapV2Router: INSUFFICIENT_A_AMOUNT"));
        }
        if amount_b < call.amountBMin {
            return Err(Revert::new("UniswapV2Router: INSUFFICIENT_B_AMOUNT"));
        }

        Ok((amount_a, amount_b).abi_encode_params().into())
    }
}

impl Contract for RouterContract {
    fn call(
        &self,
        chain: &mut InMemoryChain,
        frame: CallFrame,
        data: &[u8],
    ) -> Result<Bytes, Revert> {
        match IUniswapV2Router02Calls::abi_decode(data)? {
            IUniswapV2Router02Calls::addLiquidity(call) => self.add_liquidity(chain, frame, call),
            IUniswapV2Router02Calls::removeLiquidity(call) => {
                self.remove_liquidity(chain, frame, call)
            }
            _ => self.view(chain, frame.this, data),
        }
    }

    fn view(&self, _chain: &InMemoryChain, _this: Address, data: &[u8]) -> Result<Bytes, Revert> {
        let encoded = match IUniswapV2Router02Calls::abi_decode(data)? {
            IUniswapV2Router02Calls::factory(_) => self.factory.abi_encode(),
            IUniswapV2Router02Calls::quote(call) => {
                if call.amountA.is_zero() {
                    return Err(Revert::new("UniswapV2Library: INSUFFICIENT_AMOUNT"));
                }
                if call.reserveA.is_zero() || call.reserveB.is_zero() {
                    return Err(Revert::new("UniswapV2Library: INSUFFICIENT_LIQUIDITY"));
                }
                math::quote(call.amountA, call.reserveA, call.reserveB)?.abi_encode()
            }
            IUniswapV2Router02Calls::addLiquidity(_) | IUniswapV2Router02Calls::removeLiquidity(_) => {
                return Err(Revert::new("state change during static call"));
            }
        };
        Ok(encoded.into())
    }
}
