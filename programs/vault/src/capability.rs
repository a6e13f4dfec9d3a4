//! Capability tokens
//!
//! Tokens are move-only and have no public constructor. The admin token is
//! issued once, at vault genesis; agent tokens are minted by the admin. The
//! vault keeps a record per live agent token so the host can re-issue a token
//! to its bound holder after a restart.

use crate::events::{EventKind, EventSink};
use crate::instructions::refuse;
use crate::state::Vault;
use guardrail_common::{AgentId, TimestampMs, VaultError, VaultId};
use log::info;
use serde::{Deserialize, Serialize};

/// Sequence number of an agent capability inside its vault
pub type CapabilityId = u64;

/// Proof that the holder administers one vault
#[derive(Debug, PartialEq, Eq)]
pub struct AdminCapability {
    vault_id: VaultId,
    holder: AgentId,
}

impl AdminCapability {
    pub(crate) fn issue(vault_id: VaultId, holder: AgentId) -> Self {
        Self { vault_id, holder }
    }

    pub fn vault_id(&self) -> VaultId {
        self.vault_id
    }

    pub fn holder(&self) -> &AgentId {
        &self.holder
    }

    /// Unauthorized unless bound to `vault`
    pub(crate) fn check(&self, vault: VaultId) -> Result<(), VaultError> {
        if self.vault_id != vault {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }
}

/// Proof that the holder may trade for one vault
#[derive(Debug, PartialEq, Eq)]
pub struct AgentCapability {
    id: CapabilityId,
    vault_id: VaultId,
    agent: AgentId,
}

impl AgentCapability {
    pub(crate) fn issue(id: CapabilityId, vault_id: VaultId, agent: AgentId) -> Self {
        Self { id, vault_id, agent }
    }

    pub fn id(&self) -> CapabilityId {
        self.id
    }

    pub fn vault_id(&self) -> VaultId {
        self.vault_id
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }
}

/// Persisted record of a live agent capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub id: CapabilityId,
    pub agent: AgentId,
    pub minted_at_ms: TimestampMs,
}

/// Mint an agent capability for `target` against the admin's vault
pub fn mint_agent_capability(
    vault: &mut Vault,
    admin: &AdminCapability,
    target: AgentId,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<AgentCapability, VaultError> {
    let id = vault.next_capability_id;
    let next = admin
        .check(vault.id())
        .and_then(|()| id.checked_add(1).ok_or(VaultError::Overflow))
        .map_err(|e| refuse(vault, sink, admin.holder(), e, 0, now_ms))?;
    vault.next_capability_id = next;
    vault.capabilities.insert(
        id,
        CapabilityRecord {
            id,
            agent: target.clone(),
            minted_at_ms: now_ms,
        },
    );

    info!("{}: minted capability #{} for {}", vault.id(), id, target);
    vault.emit(
        sink,
        now_ms,
        EventKind::CapabilityMinted {
            admin: admin.holder().clone(),
            cap_id: id,
            agent: target.clone(),
        },
    );
    Ok(AgentCapability::issue(id, vault.id(), target))
}

/// Self-service revocation; the token is consumed either way
///
/// A token bound to another vault is rejected with `InvalidAgent` and this
/// vault is left untouched.
pub fn revoke_agent_capability(
    vault: &mut Vault,
    cap: AgentCapability,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<(), VaultError> {
    if cap.vault_id != vault.id() {
        return Err(refuse(vault, sink, &cap.agent, VaultError::InvalidAgent, 0, now_ms));
    }

    if vault.capabilities.remove(&cap.id).is_some() {
        info!("{}: capability #{} revoked by {}", vault.id(), cap.id, cap.agent);
        vault.emit(
            sink,
            now_ms,
            EventKind::CapabilityRevoked {
                cap_id: cap.id,
                agent: cap.agent,
            },
        );
    }
    Ok(())
}
