//! Liquidity module: adds and removes vault liquidity through registered
//! AMM adapters.
//!
//! Each operation resolves the adapter, snapshots balances, grants
//! allowances, executes the adapter's call as the vault, snapshots again and
//! validates the observed deltas before recording the pool-token position.
//! Everything runs inside a ledger checkpoint and is rolled back on failure.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use uuid::Uuid;

use crate::adapters::{EncodedCall, LiquidityParams, SingleAssetParams};
use crate::contracts;
use crate::error::AmmError;
use crate::registry::{IntegrationRegistry, RegisteredAdapter};
use crate::request::hash_request;
use crate::types::*;
use crate::vault::{VaultLedger, invoke_clear_allowance, invoke_reset_and_approve};

pub struct AmmModule {
    address: Address,
    registry: Arc<IntegrationRegistry>,
}

impl AmmModule {
    pub fn new(address: Address, registry: Arc<IntegrationRegistry>) -> Self {
        Self { address, registry }
    }

    /// Identity the module is enabled under on vaults and keyed by in the registry.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.registry
    }

    /// Move the module from pending to initialized on `vault`. Manager only.
    pub fn initialize<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        vault: Address,
    ) -> Result<(), AmmError> {
        self.ensure_manager(ledger, caller, vault)?;
        ledger.initialize_module(vault, self.address)?;
        tracing::info!(%vault, module = %self.address, "AMM module initialized");
        Ok(())
    }

    /// Provide balanced liquidity from the vault's holdings.
    ///
    /// `request.amounts` are the maximum amounts in and `request.liquidity`
    /// the minimum pool tokens the vault must receive.
    pub fn add_liquidity<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &LiquidityRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let span = tracing::info_span!(
            "add_liquidity",
            vault = %request.vault,
            pool = %request.pool,
            integration = %request.integration_name,
            request_hash = tracing::field::Empty,
        );
        record_request_hash(&span, LiquidityAction::AddLiquidity, request);
        let _enter = span.enter();
        self.atomically(ledger, |ledger| self.run_add(ledger, caller, request))
    }

    /// Burn `request.liquidity` pool tokens for at least `request.amounts` of
    /// each underlying asset.
    pub fn remove_liquidity<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &LiquidityRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let span = tracing::info_span!(
            "remove_liquidity",
            vault = %request.vault,
            pool = %request.pool,
            integration = %request.integration_name,
            request_hash = tracing::field::Empty,
        );
        record_request_hash(&span, LiquidityAction::RemoveLiquidity, request);
        let _enter = span.enter();
        self.atomically(ledger, |ledger| self.run_remove(ledger, caller, request))
    }

    pub fn add_liquidity_single_asset<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &SingleAssetRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let span = tracing::info_span!(
            "add_liquidity_single_asset",
            vault = %request.vault,
            pool = %request.pool,
            integration = %request.integration_name,
            asset = %request.asset,
        );
        let _enter = span.enter();
        self.atomically(ledger, |ledger| self.run_add_single(ledger, caller, request))
    }

    pub fn remove_liquidity_single_asset<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &SingleAssetRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let span = tracing::info_span!(
            "remove_liquidity_single_asset",
            vault = %request.vault,
            pool = %request.pool,
            integration = %request.integration_name,
            asset = %request.asset,
        );
        let _enter = span.enter();
        self.atomically(ledger, |ledger| self.run_remove_single(ledger, caller, request))
    }

    fn atomically<L, F>(&self, ledger: &mut L, operation: F) -> Result<LiquidityReceipt, AmmError>
    where
        L: VaultLedger,
        F: FnOnce(&mut L) -> Result<LiquidityReceipt, AmmError>,
    {
        tracing::debug!(stage = ?OperationStage::Idle, "Starting liquidity operation");
        let checkpoint = ledger.checkpoint();
        match operation(ledger) {
            Ok(receipt) => {
                ledger.commit(checkpoint);
                tracing::info!(
                    stage = ?OperationStage::Committed,
                    operation_id = %receipt.operation_id,
                    liquidity = %receipt.liquidity,
                    position = %receipt.position_after,
                    "Liquidity operation committed"
                );
                Ok(receipt)
            }
            Err(e) => {
                ledger.revert_to(checkpoint);
                tracing::warn!(stage = ?OperationStage::Reverted, error = %e, "Liquidity operation reverted");
                Err(e)
            }
        }
    }

    fn run_add<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &LiquidityRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let vault = request.vault;
        let pool = request.pool;
        ensure_lengths(&request.assets, &request.amounts)?;
        let integration = self.authorize_and_resolve(ledger, caller, vault, &request.integration_name)?;
        let adapter = &integration.adapter;
        self.ensure_valid_pool(ledger, &integration, pool, &request.assets)?;
        for (asset, amount) in request.assets.iter().zip(&request.amounts) {
            ensure_asset_balance(ledger, vault, *asset, *amount)?;
        }

        let call = adapter.get_provide_liquidity_calldata(
            &*ledger,
            &LiquidityParams {
                pool,
                assets: request.assets.clone(),
                amounts: request.amounts.clone(),
                liquidity: request.liquidity,
                recipient: vault,
            },
        )?;
        let spender = adapter.get_spender_address(pool);

        tracing::debug!(stage = ?OperationStage::SnapshotBefore, "Snapshotting balances");
        let lp_before = contracts::balance_of(&*ledger, pool, vault)?;
        let assets_before = snapshot(ledger, vault, &request.assets)?;

        tracing::debug!(stage = ?OperationStage::Approving, %spender, "Approving assets");
        for (asset, amount) in request.assets.iter().zip(&request.amounts) {
            invoke_reset_and_approve(ledger, self.address, vault, *asset, spender, *amount)?;
        }

        self.execute(ledger, vault, &call)?;

        tracing::debug!(stage = ?OperationStage::SnapshotAfter, "Snapshotting balances");
        let lp_after = contracts::balance_of(&*ledger, pool, vault)?;
        let assets_after = snapshot(ledger, vault, &request.assets)?;
        for asset in &request.assets {
            invoke_clear_allowance(ledger, self.address, vault, *asset, spender)?;
        }

        tracing::debug!(stage = ?OperationStage::Validating, "Validating deltas");
        let minted = lp_after.saturating_sub(lp_before);
        if minted < request.liquidity {
            return Err(AmmError::InsufficientLiquidityMinted {
                expected: request.liquidity,
                actual: minted,
            });
        }
        let spent = request
            .assets
            .iter()
            .zip(assets_before.iter().zip(&assets_after))
            .map(|(asset, (before, after))| AssetAmount {
                asset: *asset,
                amount: before.saturating_sub(*after),
            })
            .collect();

        let position_after = ledger.increase_external_position(vault, pool, self.address, minted)?;
        Ok(LiquidityReceipt {
            operation_id: Uuid::new_v4(),
            action: LiquidityAction::AddLiquidity,
            vault,
            pool,
            integration_name: request.integration_name.clone(),
            liquidity: minted,
            asset_amounts: spent,
            position_after,
        })
    }

    fn run_remove<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &LiquidityRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let vault = request.vault;
        let pool = request.pool;
        ensure_lengths(&request.assets, &request.amounts)?;
        let integration = self.authorize_and_resolve(ledger, caller, vault, &request.integration_name)?;
        let adapter = &integration.adapter;
        self.ensure_valid_pool(ledger, &integration, pool, &request.assets)?;
        self.ensure_position(ledger, vault, pool, request.liquidity)?;

        let call = adapter.get_remove_liquidity_calldata(
            &*ledger,
            &LiquidityParams {
                pool,
                assets: request.assets.clone(),
                amounts: request.amounts.clone(),
                liquidity: request.liquidity,
                recipient: vault,
            },
        )?;
        let spender = adapter.get_spender_address(pool);

        tracing::debug!(stage = ?OperationStage::SnapshotBefore, "Snapshotting balances");
        let lp_before = contracts::balance_of(&*ledger, pool, vault)?;
        let assets_before = snapshot(ledger, vault, &request.assets)?;

        tracing::debug!(stage = ?OperationStage::Approving, %spender, "Approving pool token");
        invoke_reset_and_approve(ledger, self.address, vault, pool, spender, request.liquidity)?;

        self.execute(ledger, vault, &call)?;

        tracing::debug!(stage = ?OperationStage::SnapshotAfter, "Snapshotting balances");
        let lp_after = contracts::balance_of(&*ledger, pool, vault)?;
        let assets_after = snapshot(ledger, vault, &request.assets)?;
        invoke_clear_allowance(ledger, self.address, vault, pool, spender)?;

        tracing::debug!(stage = ?OperationStage::Validating, "Validating deltas");
        let mut received = Vec::with_capacity(request.assets.len());
        for (i, asset) in request.assets.iter().enumerate() {
            let amount = assets_after[i].saturating_sub(assets_before[i]);
            ensure_received(*asset, request.amounts[i], amount)?;
            received.push(AssetAmount { asset: *asset, amount });
        }

        let burned = lp_before.saturating_sub(lp_after);
        let position_after =
            ledger.decrease_external_position(vault, pool, self.address, request.liquidity)?;
        Ok(LiquidityReceipt {
            operation_id: Uuid::new_v4(),
            action: LiquidityAction::RemoveLiquidity,
            vault,
            pool,
            integration_name: request.integration_name.clone(),
            liquidity: burned,
            asset_amounts: received,
            position_after,
        })
    }

    fn run_add_single<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &SingleAssetRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let vault = request.vault;
        let pool = request.pool;
        let integration = self.authorize_and_resolve(ledger, caller, vault, &request.integration_name)?;
        let adapter = &integration.adapter;

        let call = adapter.get_provide_liquidity_single_asset_calldata(
            &*ledger,
            &SingleAssetParams {
                pool,
                asset: request.asset,
                amount: request.amount,
                liquidity: request.liquidity,
                recipient: vault,
            },
        )?;
        self.ensure_valid_pool(ledger, &integration, pool, &[request.asset])?;
        ensure_asset_balance(ledger, vault, request.asset, request.amount)?;
        let spender = adapter.get_spender_address(pool);

        tracing::debug!(stage = ?OperationStage::SnapshotBefore, "Snapshotting balances");
        let lp_before = contracts::balance_of(&*ledger, pool, vault)?;
        let asset_before = contracts::balance_of(&*ledger, request.asset, vault)?;

        tracing::debug!(stage = ?OperationStage::Approving, %spender, "Approving asset");
        invoke_reset_and_approve(ledger, self.address, vault, request.asset, spender, request.amount)?;

        self.execute(ledger, vault, &call)?;

        tracing::debug!(stage = ?OperationStage::SnapshotAfter, "Snapshotting balances");
        let lp_after = contracts::balance_of(&*ledger, pool, vault)?;
        let asset_after = contracts::balance_of(&*ledger, request.asset, vault)?;
        invoke_clear_allowance(ledger, self.address, vault, request.asset, spender)?;

        tracing::debug!(stage = ?OperationStage::Validating, "Validating deltas");
        let minted = lp_after.saturating_sub(lp_before);
        if minted < request.liquidity {
            return Err(AmmError::InsufficientLiquidityMinted {
                expected: request.liquidity,
                actual: minted,
            });
        }

        let position_after = ledger.increase_external_position(vault, pool, self.address, minted)?;
        Ok(LiquidityReceipt {
            operation_id: Uuid::new_v4(),
            action: LiquidityAction::AddLiquiditySingleAsset,
            vault,
            pool,
            integration_name: request.integration_name.clone(),
            liquidity: minted,
            asset_amounts: vec![AssetAmount {
                asset: request.asset,
                amount: asset_before.saturating_sub(asset_after),
            }],
            position_after,
        })
    }

    fn run_remove_single<L: VaultLedger>(
        &self,
        ledger: &mut L,
        caller: Address,
        request: &SingleAssetRequest,
    ) -> Result<LiquidityReceipt, AmmError> {
        let vault = request.vault;
        let pool = request.pool;
        let integration = self.authorize_and_resolve(ledger, caller, vault, &request.integration_name)?;
        let adapter = &integration.adapter;

        let call = adapter.get_remove_liquidity_single_asset_calldata(
            &*ledger,
            &SingleAssetParams {
                pool,
                asset: request.asset,
                amount: request.amount,
                liquidity: request.liquidity,
                recipient: vault,
            },
        )?;
        self.ensure_valid_pool(ledger, &integration, pool, &[request.asset])?;
        self.ensure_position(ledger, vault, pool, request.liquidity)?;
        let spender = adapter.get_spender_address(pool);

        tracing::debug!(stage = ?OperationStage::SnapshotBefore, "Snapshotting balances");
        let lp_before = contracts::balance_of(&*ledger, pool, vault)?;
        let asset_before = contracts::balance_of(&*ledger, request.asset, vault)?;

        tracing::debug!(stage = ?OperationStage::Approving, %spender, "Approving pool token");
        invoke_reset_and_approve(ledger, self.address, vault, pool, spender, request.liquidity)?;

        self.execute(ledger, vault, &call)?;

        tracing::debug!(stage = ?OperationStage::SnapshotAfter, "Snapshotting balances");
        let lp_after = contracts::balance_of(&*ledger, pool, vault)?;
        let asset_after = contracts::balance_of(&*ledger, request.asset, vault)?;
        invoke_clear_allowance(ledger, self.address, vault, pool, spender)?;

        tracing::debug!(stage = ?OperationStage::Validating, "Validating deltas");
        let received = asset_after.saturating_sub(asset_before);
        ensure_received(request.asset, request.amount, received)?;

        let position_after =
            ledger.decrease_external_position(vault, pool, self.address, request.liquidity)?;
        Ok(LiquidityReceipt {
            operation_id: Uuid::new_v4(),
            action: LiquidityAction::RemoveLiquiditySingleAsset,
            vault,
            pool,
            integration_name: request.integration_name.clone(),
            liquidity: lp_before.saturating_sub(lp_after),
            asset_amounts: vec![AssetAmount {
                asset: request.asset,
                amount: received,
            }],
            position_after,
        })
    }

    fn ensure_manager<L: VaultLedger>(
        &self,
        ledger: &L,
        caller: Address,
        vault: Address,
    ) -> Result<(), AmmError> {
        if !ledger.is_manager(vault, caller)? {
            return Err(AmmError::Unauthorized {
                caller,
                reason: format!("not the manager of vault {vault}"),
            });
        }
        Ok(())
    }

    /// Manager check, module enablement, then adapter lookup.
    fn authorize_and_resolve<L: VaultLedger>(
        &self,
        ledger: &L,
        caller: Address,
        vault: Address,
        integration_name: &str,
    ) -> Result<RegisteredAdapter, AmmError> {
        self.ensure_manager(ledger, caller, vault)?;
        if !ledger.is_initialized_module(vault, self.address)? {
            return Err(AmmError::ModuleNotEnabled {
                module: self.address,
                vault,
            });
        }
        tracing::debug!(stage = ?OperationStage::Resolving, "Resolving adapter");
        let integration = self.registry.resolve(self.address, integration_name)?;
        tracing::debug!(adapter = %integration.adapter_id, protocol = integration.adapter.protocol_id(), "Adapter resolved");
        Ok(integration)
    }

    fn ensure_valid_pool<L: VaultLedger>(
        &self,
        ledger: &L,
        integration: &RegisteredAdapter,
        pool: Address,
        assets: &[Address],
    ) -> Result<(), AmmError> {
        if !integration.adapter.is_valid_pool(ledger, pool, assets)? {
            return Err(AmmError::InvalidPool { pool });
        }
        Ok(())
    }

    fn ensure_position<L: VaultLedger>(
        &self,
        ledger: &L,
        vault: Address,
        pool: Address,
        liquidity: U256,
    ) -> Result<(), AmmError> {
        let have = ledger.external_position(vault, pool, self.address)?;
        if have < liquidity {
            return Err(AmmError::InsufficientPositionBalance {
                pool,
                have,
                need: liquidity,
            });
        }
        Ok(())
    }

    fn execute<L: VaultLedger>(
        &self,
        ledger: &mut L,
        vault: Address,
        call: &EncodedCall,
    ) -> Result<(), AmmError> {
        tracing::debug!(
            stage = ?OperationStage::Executing,
            target = %call.target,
            calldata = %hex::encode(&call.calldata),
            "Executing as vault"
        );
        ledger.invoke(self.address, vault, call.target, call.value, &call.calldata)?;
        Ok(())
    }
}

/// Hashing is skipped when no subscriber has the span enabled.
fn record_request_hash(
    span: &tracing::Span,
    action: LiquidityAction,
    request: &LiquidityRequest,
) -> Option<String> {
    if span.is_disabled() {
        return None;
    }
    let hash = hash_request(action, request);
    span.record("request_hash", hash.as_str());
    Some(hash)
}

fn ensure_lengths(assets: &[Address], amounts: &[U256]) -> Result<(), AmmError> {
    if assets.len() != amounts.len() {
        return Err(AmmError::LengthMismatch {
            assets: assets.len(),
            amounts: amounts.len(),
        });
    }
    Ok(())
}

fn ensure_asset_balance<L: VaultLedger>(
    ledger: &L,
    vault: Address,
    asset: Address,
    need: U256,
) -> Result<(), AmmError> {
    let have = contracts::balance_of(ledger, asset, vault)?;
    if have < need {
        return Err(AmmError::InsufficientAssetBalance { asset, have, need });
    }
    Ok(())
}

fn ensure_received(asset: Address, expected: U256, actual: U256) -> Result<(), AmmError> {
    if actual < expected {
        return Err(AmmError::InsufficientAmountReceived {
            asset,
            expected,
            actual,
        });
    }
    Ok(())
}

fn snapshot<L: VaultLedger>(
    ledger: &L,
    vault: Address,
    tokens: &[Address],
) -> Result<Vec<U256>, AmmError> {
    tokens
        .iter()
        .map(|token| contracts::balance_of(ledger, *token, vault))
        .collect()
}
