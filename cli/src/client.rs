//! Runs one operation against the persisted ledger

use anyhow::Result;
use guardrail_vault::{AdminCapability, AgentCapability, CapabilityId, Ledger, VaultError, VaultEvent, VaultId};
use log::debug;

use crate::config::CliConfig;

/// Load the ledger, apply `op`, then persist state and events
///
/// The state lock is held from load until the events are journaled. State is
/// saved even when `op` fails: a rejected agent call still leaves its audit
/// receipt and events behind.
pub async fn with_ledger<R>(
    ctx: &CliConfig,
    op: impl FnOnce(&Ledger, &mut Vec<VaultEvent>) -> Result<R, VaultError>,
) -> Result<R> {
    let _lock = ctx.store.lock().await?;
    let ledger = ctx.store.load().await?;
    let mut events: Vec<VaultEvent> = Vec::new();
    let outcome = op(&ledger, &mut events);

    ctx.store.save(&ledger).await?;
    ctx.store.append_events(&events).await?;
    for event in &events {
        debug!("{}", event);
    }
    Ok(outcome?)
}

/// Read-only access; nothing is saved
pub async fn read_ledger(ctx: &CliConfig) -> Result<Ledger> {
    ctx.store.load().await
}

pub fn admin_cap(ctx: &CliConfig, ledger: &Ledger, vault: VaultId) -> Result<AdminCapability, VaultError> {
    ledger.admin_capability(vault, &ctx.identity)
}

pub fn agent_cap(
    ctx: &CliConfig,
    ledger: &Ledger,
    vault: VaultId,
    cap_id: CapabilityId,
) -> Result<AgentCapability, VaultError> {
    ledger.agent_capability(vault, cap_id, &ctx.identity)
}
