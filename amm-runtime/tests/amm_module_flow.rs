//! End-to-end liquidity flows through the module, registry, Uniswap V2
//! adapter and the in-memory ledger.

mod common;

use std::sync::Arc;

use alloy::primitives::{Address, U256, address};
use amm_runtime::adapters::uniswap_v2::{
    SINGLE_ASSET_PROVIDE_UNSUPPORTED, SINGLE_ASSET_REMOVE_UNSUPPORTED, UniswapV2AmmAdapter,
};
use amm_runtime::adapters::{AmmAdapter, EncodedCall, LiquidityParams, SingleAssetParams};
use amm_runtime::vault::{ChainView, VaultLedger};
use amm_runtime::{AmmError, LiquidityAction, SingleAssetRequestBuilder};
use common::*;

const THIEF: Address = address!("00000000000000000000000000000000000bad01");

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Encodes honest Uniswap V2 calls but routes the proceeds to `THIEF`.
struct RedirectingAdapter {
    inner: UniswapV2AmmAdapter,
}

impl RedirectingAdapter {
    fn redirect(params: &LiquidityParams) -> LiquidityParams {
        LiquidityParams {
            recipient: THIEF,
            ..params.clone()
        }
    }
}

impl AmmAdapter for RedirectingAdapter {
    fn protocol_id(&self) -> &str {
        "redirecting"
    }

    fn get_spender_address(&self, pool: Address) -> Address {
        self.inner.get_spender_address(pool)
    }

    fn is_valid_pool(
        &self,
        view: &dyn ChainView,
        pool: Address,
        assets: &[Address],
    ) -> Result<bool, AmmError> {
        self.inner.is_valid_pool(view, pool, assets)
    }

    fn get_provide_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError> {
        self.inner
            .get_provide_liquidity_calldata(view, &Self::redirect(params))
    }

    fn get_provide_liquidity_single_asset_calldata(
        &self,
        view: &dyn ChainView,
        params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError> {
        self.inner
            .get_provide_liquidity_single_asset_calldata(view, params)
    }

    fn get_remove_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError> {
        self.inner
            .get_remove_liquidity_calldata(view, &Self::redirect(params))
    }

    fn get_remove_liquidity_single_asset_calldata(
        &self,
        view: &dyn ChainView,
        params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError> {
        self.inner
            .get_remove_liquidity_single_asset_calldata(view, params)
    }
}

fn swap_in_redirecting_adapter(fx: &Fixture) {
    fx.registry
        .edit_integration(
            OWNER,
            MODULE_ID,
            INTEGRATION,
            THIEF,
            Arc::new(RedirectingAdapter {
                inner: UniswapV2AmmAdapter::with_router(fx.uni.router, fx.uni.factory),
            }),
        )
        .unwrap();
}

/// Encodes Uniswap V2 removals with zero router minimums, leaving the
/// per-asset minimum checks to the module.
struct ZeroMinimumAdapter {
    inner: UniswapV2AmmAdapter,
}

impl AmmAdapter for ZeroMinimumAdapter {
    fn protocol_id(&self) -> &str {
        "zero_minimum"
    }

    fn get_spender_address(&self, pool: Address) -> Address {
        self.inner.get_spender_address(pool)
    }

    fn is_valid_pool(
        &self,
        view: &dyn ChainView,
        pool: Address,
        assets: &[Address],
    ) -> Result<bool, AmmError> {
        self.inner.is_valid_pool(view, pool, assets)
    }

    fn get_provide_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError> {
        self.inner.get_provide_liquidity_calldata(view, params)
    }

    fn get_provide_liquidity_single_asset_calldata(
        &self,
        view: &dyn ChainView,
        params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError> {
        self.inner
            .get_provide_liquidity_single_asset_calldata(view, params)
    }

    fn get_remove_liquidity_calldata(
        &self,
        view: &dyn ChainView,
        params: &LiquidityParams,
    ) -> Result<EncodedCall, AmmError> {
        let unchecked = LiquidityParams {
            amounts: vec![U256::ZERO; params.amounts.len()],
            ..params.clone()
        };
        self.inner.get_remove_liquidity_calldata(view, &unchecked)
    }

    fn get_remove_liquidity_single_asset_calldata(
        &self,
        view: &dyn ChainView,
        params: &SingleAssetParams,
    ) -> Result<EncodedCall, AmmError> {
        self.inner
            .get_remove_liquidity_single_asset_calldata(view, params)
    }
}

fn swap_in_adapter(fx: &Fixture, adapter: Arc<dyn AmmAdapter>) {
    fx.registry
        .edit_integration(OWNER, MODULE_ID, INTEGRATION, ADAPTER_ID, adapter)
        .unwrap();
}

fn add_default(fx: &mut Fixture) {
    let request = fx.request(U256::from(1_000_000u64), ether(10), ether(5));
    fx.module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();
}

// ── Add liquidity ────────────────────────────────────────────────────────────

#[test]
fn test_add_liquidity_mints_pro_rata() {
    let mut fx = Fixture::new();
    let (a0_before, a1_before, lp_before) = fx.vault_balances();
    assert_eq!(lp_before, U256::ZERO);

    let request = fx.request(U256::from(1_000_000u64), ether(10), ether(5));
    let receipt = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();

    let minted = U256::from(7_071_067_811_865_475_244u128);
    let (a0_after, a1_after, lp_after) = fx.vault_balances();
    assert_eq!(lp_after, minted);
    assert_eq!(a0_before - a0_after, ether(10));
    assert_eq!(a1_before - a1_after, ether(5));

    assert_eq!(receipt.action, LiquidityAction::AddLiquidity);
    assert_eq!(receipt.liquidity, minted);
    assert_eq!(receipt.position_after, minted);
    assert_eq!(receipt.asset_amounts[0].asset, fx.asset0);
    assert_eq!(receipt.asset_amounts[0].amount, ether(10));
    assert_eq!(receipt.asset_amounts[1].amount, ether(5));
    assert_eq!(fx.position(), minted);
}

#[test]
fn test_add_liquidity_leaves_no_allowance() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    assert_eq!(fx.allowance(fx.asset0, fx.uni.router), U256::ZERO);
    assert_eq!(fx.allowance(fx.asset1, fx.uni.router), U256::ZERO);
}

#[test]
fn test_add_liquidity_unused_allowance_cleared() {
    let mut fx = Fixture::new();
    // Router only pulls 5 of asset1 at the current ratio.
    let request = fx.request(U256::from(1_000_000u64), ether(10), ether(8));
    let receipt = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();
    assert_eq!(receipt.asset_amounts[1].amount, ether(5));
    assert_eq!(fx.allowance(fx.asset1, fx.uni.router), U256::ZERO);
}

#[test]
fn test_add_liquidity_router_min_check_reverts_everything() {
    let mut fx = Fixture::new();
    let before = fx.vault_balances();

    // Pro-rata minimum for 8e18 pool tokens needs more asset1 than offered.
    let request = fx.request(ether(8), ether(10), ether(5));
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();

    match err {
        AmmError::ExternalCallFailed { target, reason } => {
            assert_eq!(target, fx.uni.router);
            assert_eq!(reason, "UniswapV2Router: INSUFFICIENT_B_AMOUNT");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.vault_balances(), before);
    assert_eq!(fx.position(), U256::ZERO);
    assert_eq!(fx.allowance(fx.asset0, fx.uni.router), U256::ZERO);
}

#[test]
fn test_add_liquidity_detects_redirected_mint() {
    let mut fx = Fixture::new();
    swap_in_redirecting_adapter(&fx);
    let before = fx.vault_balances();

    let request = fx.request(U256::from(1_000_000u64), ether(10), ether(5));
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();

    assert_eq!(
        err,
        AmmError::InsufficientLiquidityMinted {
            expected: U256::from(1_000_000u64),
            actual: U256::ZERO,
        }
    );
    assert_eq!(fx.vault_balances(), before);
    assert_eq!(fx.balance(fx.pool, THIEF), U256::ZERO);
}

#[test]
fn test_add_liquidity_minted_exactly_minimum() {
    let mut fx = Fixture::new();
    let minted = U256::from(7_071_067_811_865_475_244u64);

    let request = fx.request(minted, ether(10), ether(5));
    let receipt = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();

    assert_eq!(receipt.liquidity, minted);
    assert_eq!(fx.position(), minted);
}

#[test]
fn test_add_liquidity_one_below_minimum_reverts() {
    let mut fx = Fixture::new();
    let minted = U256::from(7_071_067_811_865_475_244u64);
    let before = fx.vault_balances();

    let request = fx.request(minted + U256::from(1u8), ether(10), ether(5));
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();

    assert_eq!(
        err,
        AmmError::InsufficientLiquidityMinted {
            expected: minted + U256::from(1u8),
            actual: minted,
        }
    );
    assert_eq!(fx.vault_balances(), before);
    assert_eq!(fx.position(), U256::ZERO);
    assert_eq!(fx.allowance(fx.asset0, fx.uni.router), U256::ZERO);
    assert_eq!(fx.allowance(fx.asset1, fx.uni.router), U256::ZERO);
}

#[test]
fn test_add_liquidity_insufficient_vault_balance() {
    let mut fx = Fixture::new();
    let request = fx.request(U256::ZERO, ether(2_000), ether(5));
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(
        err,
        AmmError::InsufficientAssetBalance {
            asset: fx.asset0,
            have: ether(1_000),
            need: ether(2_000),
        }
    );
}

#[test]
fn test_add_liquidity_with_strict_token_and_stale_allowance() {
    let mut fx = Fixture::with_strict_asset();
    // Leave a nonzero allowance behind for the router.
    fx.chain
        .invoke(
            MODULE_ID,
            fx.vault,
            fx.asset1,
            U256::ZERO,
            &approve_calldata(fx.uni.router, U256::from(123u8)),
        )
        .unwrap();

    let request = fx.request(U256::from(1_000_000u64), ether(10), ether(5));
    let receipt = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();
    assert_eq!(receipt.liquidity, U256::from(7_071_067_811_865_475_244u128));
    assert_eq!(fx.allowance(fx.asset1, fx.uni.router), U256::ZERO);
}

#[test]
fn test_add_liquidity_invalid_pool() {
    let mut fx = Fixture::new();
    let mut request = fx.request(U256::ZERO, ether(10), ether(5));
    request.pool = fx.asset0;
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(err, AmmError::InvalidPool { pool: fx.asset0 });
}

#[test]
fn test_add_liquidity_length_mismatch() {
    let mut fx = Fixture::new();
    let mut request = fx.request(U256::ZERO, ether(10), ether(5));
    request.amounts.pop();
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(err, AmmError::LengthMismatch { assets: 2, amounts: 1 });
}

// ── Remove liquidity ─────────────────────────────────────────────────────────

#[test]
fn test_remove_liquidity_partial() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    let (a0_before, a1_before, _) = fx.vault_balances();

    let request = fx.request(ether(1), U256::from(1u8), U256::from(1u8));
    let receipt = fx
        .module
        .remove_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();

    let remaining = U256::from(6_071_067_811_865_475_244u128);
    let (a0_after, a1_after, lp_after) = fx.vault_balances();
    assert_eq!(lp_after, remaining);
    assert_eq!(fx.position(), remaining);
    assert_eq!(a0_after - a0_before, U256::from(1_414_213_562_373_095_048u128));
    assert_eq!(a1_after - a1_before, U256::from(707_106_781_186_547_524u128));

    assert_eq!(receipt.action, LiquidityAction::RemoveLiquidity);
    assert_eq!(receipt.liquidity, ether(1));
    assert_eq!(receipt.position_after, remaining);
    assert_eq!(
        receipt.asset_amounts[0].amount,
        U256::from(1_414_213_562_373_095_048u128)
    );
    assert_eq!(fx.allowance(fx.pool, fx.uni.router), U256::ZERO);
}

#[test]
fn test_round_trip_restores_position() {
    let mut fx = Fixture::new();
    let (a0_start, a1_start, _) = fx.vault_balances();

    add_default(&mut fx);
    let minted = fx.position();
    let request = fx.request(minted, U256::ZERO, U256::ZERO);
    let receipt = fx
        .module
        .remove_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();

    assert_eq!(fx.position(), U256::ZERO);
    assert_eq!(receipt.position_after, U256::ZERO);
    assert_eq!(fx.balance(fx.pool, fx.vault), U256::ZERO);

    // Pool ratio is 2:1 and rounding only ever favours the pool.
    let (a0_end, a1_end, _) = fx.vault_balances();
    let got0 = receipt.asset_amounts[0].amount;
    let got1 = receipt.asset_amounts[1].amount;
    assert!(a0_end <= a0_start && a1_end <= a1_start);
    assert!(a0_start - a0_end <= U256::from(1u8));
    assert!(a1_start - a1_end <= U256::from(1u8));
    assert_eq!(got0 / U256::from(2u8), got1);
}

#[test]
fn test_remove_liquidity_router_min_check_reverts_everything() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    let before = fx.vault_balances();
    let position = fx.position();

    // asset0 clears its minimum, asset1 does not.
    let request = fx.request(ether(1), ether(1), ether(1));
    let err = fx
        .module
        .remove_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();

    assert!(matches!(
        err,
        AmmError::ExternalCallFailed { ref reason, .. } if reason == "UniswapV2Router: INSUFFICIENT_B_AMOUNT"
    ));
    assert_eq!(fx.vault_balances(), before);
    assert_eq!(fx.position(), position);
    assert_eq!(fx.allowance(fx.pool, fx.uni.router), U256::ZERO);
}

#[test]
fn test_remove_liquidity_second_asset_below_minimum() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    swap_in_adapter(
        &fx,
        Arc::new(ZeroMinimumAdapter {
            inner: UniswapV2AmmAdapter::with_router(fx.uni.router, fx.uni.factory),
        }),
    );
    let before = fx.vault_balances();
    let position = fx.position();

    // 1e18 LP pays out ~1.414e18 of asset0 and ~0.707e18 of asset1.
    let request = fx.request(ether(1), ether(1), ether(1));
    let err = fx
        .module
        .remove_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();

    assert_eq!(
        err,
        AmmError::InsufficientAmountReceived {
            asset: fx.asset1,
            expected: ether(1),
            actual: U256::from(707_106_781_186_547_524u64),
        }
    );
    assert_eq!(fx.vault_balances(), before);
    assert_eq!(fx.position(), position);
    assert_eq!(fx.allowance(fx.pool, fx.uni.router), U256::ZERO);
}

#[test]
fn test_remove_liquidity_detects_redirected_proceeds() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    swap_in_redirecting_adapter(&fx);
    let before = fx.vault_balances();

    let request = fx.request(ether(1), U256::from(1u8), U256::from(1u8));
    let err = fx
        .module
        .remove_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();

    assert_eq!(
        err,
        AmmError::InsufficientAmountReceived {
            asset: fx.asset0,
            expected: U256::from(1u8),
            actual: U256::ZERO,
        }
    );
    assert_eq!(fx.vault_balances(), before);
    assert_eq!(fx.balance(fx.asset0, THIEF), U256::ZERO);
}

#[test]
fn test_remove_liquidity_more_than_position() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    let position = fx.position();

    let request = fx.request(position + U256::from(1u8), U256::ZERO, U256::ZERO);
    let err = fx
        .module
        .remove_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(
        err,
        AmmError::InsufficientPositionBalance {
            pool: fx.pool,
            have: position,
            need: position + U256::from(1u8),
        }
    );
}

#[test]
fn test_remove_liquidity_after_deadline_passes_uses_fresh_timestamp() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    fx.chain.advance_time(3_600);

    let request = fx.request(ether(1), U256::ZERO, U256::ZERO);
    let receipt = fx
        .module
        .remove_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();
    assert_eq!(receipt.liquidity, ether(1));
    assert!(fx.chain.block_timestamp() > amm_runtime::ledger::GENESIS_TIMESTAMP);
}

// ── Single asset ─────────────────────────────────────────────────────────────

#[test]
fn test_single_asset_operations_rejected_without_side_effects() {
    let mut fx = Fixture::new();
    add_default(&mut fx);
    let before = fx.vault_balances();
    let position = fx.position();

    let request = SingleAssetRequestBuilder::new()
        .vault(fx.vault)
        .integration_name(INTEGRATION)
        .pool(fx.pool)
        .liquidity(U256::from(1_000u64))
        .asset(fx.asset0, ether(1))
        .build()
        .unwrap();

    let err = fx
        .module
        .add_liquidity_single_asset(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(
        err,
        AmmError::UnsupportedOperation(SINGLE_ASSET_PROVIDE_UNSUPPORTED.into())
    );

    let err = fx
        .module
        .remove_liquidity_single_asset(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(
        err,
        AmmError::UnsupportedOperation(SINGLE_ASSET_REMOVE_UNSUPPORTED.into())
    );

    assert_eq!(fx.vault_balances(), before);
    assert_eq!(fx.position(), position);
}

// ── Authorization and resolution ─────────────────────────────────────────────

#[test]
fn test_non_manager_rejected() {
    let mut fx = Fixture::new();
    let request = fx.request(U256::ZERO, ether(10), ether(5));
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, STRANGER, &request)
        .unwrap_err();
    assert!(matches!(err, AmmError::Unauthorized { caller, .. } if caller == STRANGER));

    let err = fx
        .module
        .initialize(&mut fx.chain, STRANGER, fx.vault)
        .unwrap_err();
    assert!(matches!(err, AmmError::Unauthorized { .. }));
}

#[test]
fn test_module_must_be_initialized() {
    let mut fx = Fixture::new();
    let pending_vault = fx.chain.create_vault(MANAGER, &[MODULE_ID]);
    fx.chain.mint(fx.asset0, pending_vault, ether(10)).unwrap();
    fx.chain.mint(fx.asset1, pending_vault, ether(5)).unwrap();

    let mut request = fx.request(U256::ZERO, ether(10), ether(5));
    request.vault = pending_vault;
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(
        err,
        AmmError::ModuleNotEnabled {
            module: MODULE_ID,
            vault: pending_vault,
        }
    );

    fx.module
        .initialize(&mut fx.chain, MANAGER, pending_vault)
        .unwrap();
    fx.module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap();
}

#[test]
fn test_unknown_integration() {
    let mut fx = Fixture::new();
    let mut request = fx.request(U256::ZERO, ether(10), ether(5));
    request.integration_name = "uniswapamm".into();
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(
        err,
        AmmError::UnknownIntegration {
            module: MODULE_ID,
            name: "uniswapamm".into(),
        }
    );
}

#[test]
fn test_removed_integration_no_longer_resolves() {
    let mut fx = Fixture::new();
    fx.registry
        .remove_integration(OWNER, MODULE_ID, INTEGRATION)
        .unwrap();
    let request = fx.request(U256::ZERO, ether(10), ether(5));
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert!(matches!(err, AmmError::UnknownIntegration { .. }));
}

#[test]
fn test_unknown_vault() {
    let mut fx = Fixture::new();
    let mut request = fx.request(U256::ZERO, ether(10), ether(5));
    request.vault = THIEF;
    let err = fx
        .module
        .add_liquidity(&mut fx.chain, MANAGER, &request)
        .unwrap_err();
    assert_eq!(err, AmmError::UnknownVault(THIEF));
}
