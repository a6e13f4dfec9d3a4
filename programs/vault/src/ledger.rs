//! In-process host for many vaults
//!
//! Each vault sits behind its own mutex, held for the whole
//! evaluate-then-mutate sequence of one operation, so two concurrent calls
//! against one vault are serialized and calls against different vaults run
//! in parallel. The registry lock is only held to look a vault up.

use crate::capability::{AdminCapability, AgentCapability, CapabilityId};
use crate::events::EventSink;
use crate::state::Vault;
use guardrail_common::{AgentId, TimestampMs, VaultError, VaultId};
use guardrail_model::Limits;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Serializable image of a ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub next_vault_id: u64,
    pub vaults: Vec<Vault>,
}

pub struct Ledger {
    vaults: RwLock<HashMap<VaultId, Arc<Mutex<Vault>>>>,
    next_vault_id: AtomicU64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            vaults: RwLock::new(HashMap::new()),
            next_vault_id: AtomicU64::new(1),
        }
    }

    /// Create a vault administered by `admin`
    pub fn create_vault(
        &self,
        admin: AgentId,
        limits: Limits,
        now_ms: TimestampMs,
        sink: &mut dyn EventSink,
    ) -> Result<(VaultId, AdminCapability), VaultError> {
        let id = VaultId(self.next_vault_id.fetch_add(1, Ordering::SeqCst));
        let (vault, admin_cap) = Vault::genesis(id, admin, limits, now_ms, sink)?;
        self.vaults.write().insert(id, Arc::new(Mutex::new(vault)));
        Ok((id, admin_cap))
    }

    fn handle(&self, id: VaultId) -> Result<Arc<Mutex<Vault>>, VaultError> {
        self.vaults
            .read()
            .get(&id)
            .cloned()
            .ok_or(VaultError::UnknownVault { vault: id })
    }

    /// Run `f` with exclusive access to one vault
    pub fn with_vault<R>(&self, id: VaultId, f: impl FnOnce(&mut Vault) -> R) -> Result<R, VaultError> {
        let handle = self.handle(id)?;
        let mut vault = handle.lock();
        debug!("{}: locked", id);
        Ok(f(&mut *vault))
    }

    /// `with_vault` for operations that can themselves fail
    pub fn transact<R>(
        &self,
        id: VaultId,
        f: impl FnOnce(&mut Vault) -> Result<R, VaultError>,
    ) -> Result<R, VaultError> {
        self.with_vault(id, f)?
    }

    /// Copy of one vault's current state
    pub fn vault(&self, id: VaultId) -> Result<Vault, VaultError> {
        self.with_vault(id, |v| v.clone())
    }

    pub fn vault_ids(&self) -> Vec<VaultId> {
        let mut ids: Vec<VaultId> = self.vaults.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Re-issue the admin token of `id` to `caller` if it is the admin
    pub fn admin_capability(&self, id: VaultId, caller: &AgentId) -> Result<AdminCapability, VaultError> {
        self.with_vault(id, |v| v.admin_capability_for(caller))?
    }

    /// Re-issue agent token `cap_id` of `id` to `caller` if it is the holder
    pub fn agent_capability(
        &self,
        id: VaultId,
        cap_id: CapabilityId,
        caller: &AgentId,
    ) -> Result<AgentCapability, VaultError> {
        self.with_vault(id, |v| v.agent_capability_for(cap_id, caller))?
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let handles: Vec<Arc<Mutex<Vault>>> = {
            let vaults = self.vaults.read();
            let mut ids: Vec<&VaultId> = vaults.keys().collect();
            ids.sort_unstable();
            ids.into_iter().filter_map(|id| vaults.get(id).cloned()).collect()
        };
        LedgerSnapshot {
            next_vault_id: self.next_vault_id.load(Ordering::SeqCst),
            vaults: handles.iter().map(|h| h.lock().clone()).collect(),
        }
    }

    pub fn restore(snapshot: LedgerSnapshot) -> Self {
        let highest = snapshot.vaults.iter().map(|v| v.id().0).max().unwrap_or(0);
        let next = snapshot.next_vault_id.max(highest.saturating_add(1));
        let vaults: HashMap<VaultId, Arc<Mutex<Vault>>> = snapshot
            .vaults
            .into_iter()
            .map(|v| (v.id(), Arc::new(Mutex::new(v))))
            .collect();
        info!("restored ledger with {} vaults", vaults.len());
        Self {
            vaults: RwLock::new(vaults),
            next_vault_id: AtomicU64::new(next),
        }
    }
}
