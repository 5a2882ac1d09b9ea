//! Solidity bindings for every contract the liquidity runtime talks to.
//!
//! Uses alloy's `sol!` macro to generate type-safe ABI encoders/decoders,
//! plus small read helpers that go through [`ChainView::static_call`].

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::error::AmmError;
use crate::vault::ChainView;

sol! {
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }

    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
        function allPairsLength() external view returns (uint256);
        function createPair(address tokenA, address tokenB) external returns (address pair);
    }

    interface IUniswapV2Pair {
        function factory() external view returns (address);
        function token0() external view returns (address);
        function token1() external view returns (address);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function mint(address to) external returns (uint256 liquidity);
        function burn(address to) external returns (uint256 amount0, uint256 amount1);
    }

    interface IUniswapV2Router02 {
        function factory() external view returns (address);
        function quote(uint256 amountA, uint256 reserveA, uint256 reserveB) external pure returns (uint256 amountB);
        function addLiquidity(
            address tokenA,
            address tokenB,
            uint256 amountADesired,
            uint256 amountBDesired,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);
        function removeLiquidity(
            address tokenA,
            address tokenB,
            uint256 liquidity,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB);
    }
}

/// `IERC20(token).balanceOf(holder)`
pub fn balance_of(view: &dyn ChainView, token: Address, holder: Address) -> Result<U256, AmmError> {
    let data = IERC20::balanceOfCall { account: holder }.abi_encode();
    let output = view.static_call(token, &data)?;
    Ok(IERC20::balanceOfCall::abi_decode_returns(&output)?)
}

/// `IERC20(token).totalSupply()`
pub fn total_supply(view: &dyn ChainView, token: Address) -> Result<U256, AmmError> {
    let data = IERC20::totalSupplyCall {}.abi_encode();
    let output = view.static_call(token, &data)?;
    Ok(IERC20::totalSupplyCall::abi_decode_returns(&output)?)
}

/// `IERC20(token).allowance(owner, spender)`
pub fn allowance(
    view: &dyn ChainView,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, AmmError> {
    let data = IERC20::allowanceCall { owner, spender }.abi_encode();
    let output = view.static_call(token, &data)?;
    Ok(IERC20::allowanceCall::abi_decode_returns(&output)?)
}

/// `IUniswapV2Factory(factory).getPair(token_a, token_b)`; zero when no pair exists.
pub fn get_pair(
    view: &dyn ChainView,
    factory: Address,
    token_a: Address,
    token_b: Address,
) -> Result<Address, AmmError> {
    let data = IUniswapV2Factory::getPairCall {
        tokenA: token_a,
        tokenB: token_b,
    }
    .abi_encode();
    let output = view.static_call(factory, &data)?;
    Ok(IUniswapV2Factory::getPairCall::abi_decode_returns(&output)?)
}
