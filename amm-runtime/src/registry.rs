//! Integration registry: maps `(module, integration name)` to an adapter.
//!
//! Names are hashed with keccak256 so lookups by name and by precomputed
//! hash resolve the same entry. Mutations are gated on the registry owner
//! and serialized by a writer lock; resolution is a lock-free read and safe
//! to share across threads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, B256, keccak256};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::adapters::AmmAdapter;
use crate::error::AmmError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IntegrationKey {
    module: Address,
    name_hash: B256,
}

impl IntegrationKey {
    fn new(module: Address, name: &str) -> Self {
        Self {
            module,
            name_hash: keccak256(name.as_bytes()),
        }
    }
}

/// An adapter bound under an integration name.
#[derive(Clone)]
pub struct RegisteredAdapter {
    pub name: String,
    pub adapter_id: Address,
    pub adapter: Arc<dyn AmmAdapter>,
}

impl std::fmt::Debug for RegisteredAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAdapter")
            .field("name", &self.name)
            .field("adapter_id", &self.adapter_id)
            .field("protocol", &self.adapter.protocol_id())
            .finish()
    }
}

/// One entry of a batch registration.
#[derive(Clone)]
pub struct IntegrationBinding {
    pub module: Address,
    pub name: String,
    pub adapter_id: Address,
    pub adapter: Arc<dyn AmmAdapter>,
}

pub struct IntegrationRegistry {
    owner: Address,
    integrations: DashMap<IntegrationKey, RegisteredAdapter>,
    writes: Mutex<()>,
}

impl IntegrationRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            integrations: DashMap::new(),
            writes: Mutex::new(()),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), AmmError> {
        if caller != self.owner {
            return Err(AmmError::Unauthorized {
                caller,
                reason: "only the registry owner may change integrations".into(),
            });
        }
        Ok(())
    }

    /// Held across every mutation so multi-step writes see a stable map.
    /// The guarded value is `()`, so a poisoned lock carries no broken state.
    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `name` for `module`. With `overwrite` an existing binding is
    /// replaced; without it an existing binding fails with `DuplicateIntegration`.
    pub fn register(
        &self,
        caller: Address,
        module: Address,
        name: &str,
        adapter_id: Address,
        adapter: Arc<dyn AmmAdapter>,
        overwrite: bool,
    ) -> Result<(), AmmError> {
        self.ensure_owner(caller)?;
        let _writes = self.write_lock();
        self.insert(module, name, adapter_id, adapter, overwrite)
    }

    fn insert(
        &self,
        module: Address,
        name: &str,
        adapter_id: Address,
        adapter: Arc<dyn AmmAdapter>,
        overwrite: bool,
    ) -> Result<(), AmmError> {
        let entry = RegisteredAdapter {
            name: name.to_string(),
            adapter_id,
            adapter,
        };
        match self.integrations.entry(IntegrationKey::new(module, name)) {
            Entry::Occupied(mut occupied) => {
                if !overwrite {
                    return Err(AmmError::DuplicateIntegration {
                        module,
                        name: name.to_string(),
                    });
                }
                let previous = occupied.insert(entry);
                tracing::info!(
                    %module, name, previous = %previous.adapter_id, %adapter_id,
                    "Integration overwritten"
                );
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                tracing::info!(%module, name, %adapter_id, "Integration added");
            }
        }
        Ok(())
    }

    /// Bind a new integration; fails with `DuplicateIntegration` if `name` is taken.
    pub fn add_integration(
        &self,
        caller: Address,
        module: Address,
        name: &str,
        adapter_id: Address,
        adapter: Arc<dyn AmmAdapter>,
    ) -> Result<(), AmmError> {
        self.register(caller, module, name, adapter_id, adapter, false)
    }

    /// Replace an existing binding; fails with `UnknownIntegration` if absent.
    pub fn edit_integration(
        &self,
        caller: Address,
        module: Address,
        name: &str,
        adapter_id: Address,
        adapter: Arc<dyn AmmAdapter>,
    ) -> Result<(), AmmError> {
        self.ensure_owner(caller)?;
        let _writes = self.write_lock();
        if !self.is_valid_integration(module, name) {
            return Err(AmmError::UnknownIntegration {
                module,
                name: name.to_string(),
            });
        }
        self.insert(module, name, adapter_id, adapter, true)
    }

    /// Add every binding or none. All keys are checked before any insert,
    /// under the same writer lock as the inserts.
    pub fn batch_add_integration(
        &self,
        caller: Address,
        bindings: Vec<IntegrationBinding>,
    ) -> Result<(), AmmError> {
        self.ensure_owner(caller)?;
        let _writes = self.write_lock();
        let mut seen = std::collections::HashSet::new();
        for binding in &bindings {
            let key = IntegrationKey::new(binding.module, &binding.name);
            if self.integrations.contains_key(&key) || !seen.insert(key) {
                return Err(AmmError::DuplicateIntegration {
                    module: binding.module,
                    name: binding.name.clone(),
                });
            }
        }
        for binding in bindings {
            self.insert(
                binding.module,
                &binding.name,
                binding.adapter_id,
                binding.adapter,
                false,
            )?;
        }
        Ok(())
    }

    pub fn remove_integration(
        &self,
        caller: Address,
        module: Address,
        name: &str,
    ) -> Result<RegisteredAdapter, AmmError> {
        self.ensure_owner(caller)?;
        let _writes = self.write_lock();
        let (_, removed) = self
            .integrations
            .remove(&IntegrationKey::new(module, name))
            .ok_or_else(|| AmmError::UnknownIntegration {
                module,
                name: name.to_string(),
            })?;
        tracing::info!(%module, name, adapter_id = %removed.adapter_id, "Integration removed");
        Ok(removed)
    }

    /// Look up the adapter bound to `name` for `module`.
    pub fn resolve(&self, module: Address, name: &str) -> Result<RegisteredAdapter, AmmError> {
        self.integrations
            .get(&IntegrationKey::new(module, name))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AmmError::UnknownIntegration {
                module,
                name: name.to_string(),
            })
    }

    /// Look up by `keccak256(name)`.
    pub fn resolve_by_hash(
        &self,
        module: Address,
        name_hash: B256,
    ) -> Result<RegisteredAdapter, AmmError> {
        self.integrations
            .get(&IntegrationKey { module, name_hash })
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AmmError::UnknownIntegration {
                module,
                name: format!("{name_hash}"),
            })
    }

    pub fn is_valid_integration(&self, module: Address, name: &str) -> bool {
        self.integrations
            .contains_key(&IntegrationKey::new(module, name))
    }

    /// `(name, adapter id)` of every integration bound for `module`, sorted by name.
    pub fn integrations_for(&self, module: Address) -> Vec<(String, Address)> {
        let mut bound: Vec<(String, Address)> = self
            .integrations
            .iter()
            .filter(|entry| entry.key().module == module)
            .map(|entry| (entry.value().name.clone(), entry.value().adapter_id))
            .collect();
        bound.sort();
        bound
    }
}
