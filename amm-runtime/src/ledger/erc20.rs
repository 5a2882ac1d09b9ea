use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolInterface, SolValue};

use super::{CallFrame, Contract, InMemoryChain, Revert};
use crate::contracts::IERC20::{self, IERC20Calls};

#[derive(Debug, Clone)]
pub(crate) struct TokenState {
    name: String,
    symbol: String,
    decimals: u8,
    pub total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    /// Reject nonzero → nonzero approvals (USDT-style)
    strict_approve: bool,
}

impl TokenState {
    pub fn new(name: &str, symbol: &str, decimals: u8, strict_approve: bool) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            total_supply: U256::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            strict_approve,
        }
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, to: Address, amount: U256) -> Result<(), Revert> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| Revert::new("ERC20: total supply overflow"))?;
        *self.balances.entry(to).or_default() += amount;
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: U256) -> Result<(), Revert> {
        let balance = self.balance_of(from);
        let remaining = balance
            .checked_sub(amount)
            .ok_or_else(|| Revert::new("ERC20: burn amount exceeds balance"))?;
        self.balances.insert(from, remaining);
        self.total_supply -= amount;
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), Revert> {
        if to.is_zero() {
            return Err(Revert::new("ERC20: transfer to the zero address"));
        }
        let balance = self.balance_of(from);
        let remaining = balance
            .checked_sub(amount)
            .ok_or_else(|| Revert::new("ERC20: transfer amount exceeds balance"))?;
        self.balances.insert(from, remaining);
        *self.balances.entry(to).or_default() += amount;
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<(), Revert> {
        if self.strict_approve && !amount.is_zero() && !self.allowance(owner, spender).is_zero() {
            return Err(Revert::new("approve from non-zero to non-zero allowance"));
        }
        self.allowances.insert((owner, spender), amount);
        Ok(())
    }

    /// `U256::MAX` allowances are never decremented.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), Revert> {
        let current = self.allowance(owner, spender);
        if current == U256::MAX {
            return Ok(());
        }
        let remaining = current
            .checked_sub(amount)
            .ok_or_else(|| Revert::new("ERC20: insufficient allowance"))?;
        self.allowances.insert((owner, spender), remaining);
        Ok(())
    }
}

/// Plain ERC20 token contract.
pub(crate) struct Erc20Contract;

impl Contract for Erc20Contract {
    fn call(
        &self,
        chain: &mut InMemoryChain,
        frame: CallFrame,
        data: &[u8],
    ) -> Result<Bytes, Revert> {
        call_erc20(chain, frame, data)
    }

    fn view(&self, chain: &InMemoryChain, this: Address, data: &[u8]) -> Result<Bytes, Revert> {
        view_erc20(chain, this, data)
    }
}

/// ERC20 dispatch shared by every token-like contract, LP tokens included.
pub(super) fn call_erc20(
    chain: &mut InMemoryChain,
    frame: CallFrame,
    data: &[u8],
) -> Result<Bytes, Revert> {
    match IERC20Calls::abi_decode(data)? {
        IERC20Calls::approve(IERC20::approveCall { spender, amount }) => {
            chain
                .token_mut(frame.this)?
                .approve(frame.sender, spender, amount)?;
        }
        IERC20Calls::transfer(IERC20::transferCall { to, amount }) => {
            chain
                .token_mut(frame.this)?
                .transfer(frame.sender, to, amount)?;
        }
        IERC20Calls::transferFrom(IERC20::transferFromCall { from, to, amount }) => {
            let token = chain.token_mut(frame.this)?;
            token.spend_allowance(from, frame.sender, amount)?;
            token.transfer(from, to, amount)?;
        }
        _ => return view_erc20(chain, frame.this, data),
    }
    Ok(true.abi_encode().into())
}

pub(super) fn view_erc20(chain: &InMemoryChain, this: Address, data: &[u8]) -> Result<Bytes, Revert> {
    let token = chain.token(this)?;
    let encoded = match IERC20Calls::abi_decode(data)? {
        IERC20Calls::name(_) => token.name.abi_encode(),
        IERC20Calls::symbol(_) => token.symbol.abi_encode(),
        IERC20Calls::totalSupply(_) => token.total_supply.abi_encode(),
        IERC20Calls::balanceOf(IERC20::balanceOfCall { account }) => {
            token.balance_of(account).abi_encode()
        }
        IERC20Calls::allowance(IERC20::allowanceCall { owner, spender }) => {
            token.allowance(owner, spender).abi_encode()
        }
        IERC20Calls::decimals(_) => U256::from(token.decimals).abi_encode(),
        IERC20Calls::approve(_) | IERC20Calls::transfer(_) | IERC20Calls::transferFrom(_) => {
            return Err(Revert::new("state change during static call"));
        }
    };
    Ok(encoded.into())
}
