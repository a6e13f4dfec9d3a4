//! Vault record
//!
//! One record per managed pool: guardrail counters and limits, freeze and
//! whitelist sets, oracle config, live capability records and the audit log.
//! Fields are crate-private; every mutation goes through an instruction.

use crate::audit::{AuditLog, ReceiptDraft, ReceiptId};
use crate::capability::{AdminCapability, AgentCapability, CapabilityId, CapabilityRecord};
use crate::events::{EventKind, EventSink, VaultEvent};
use guardrail_common::{AgentId, ProtocolId, TimestampMs, VaultError, VaultId};
use guardrail_model::{Caller, Counters, GuardrailState, Limits};
use guardrail_oracle::OracleConfig;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// How an empty protocol whitelist is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitelistMode {
    /// Only listed protocols settle; an empty list denies every venue
    #[default]
    Enforced,
    /// Demo mode: an empty list allows every venue
    Permissive,
}

impl fmt::Display for WhitelistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WhitelistMode::Enforced => "enforced",
            WhitelistMode::Permissive => "permissive",
        })
    }
}

impl FromStr for WhitelistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enforced" => Ok(WhitelistMode::Enforced),
            "permissive" => Ok(WhitelistMode::Permissive),
            other => Err(format!("unknown whitelist mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub(crate) id: VaultId,
    pub(crate) admin: AgentId,
    pub(crate) guardrail: GuardrailState,
    pub(crate) frozen_agents: BTreeSet<AgentId>,
    pub(crate) protocol_whitelist: BTreeSet<ProtocolId>,
    pub(crate) whitelist_mode: WhitelistMode,
    pub(crate) oracle: OracleConfig,
    pub(crate) capabilities: BTreeMap<CapabilityId, CapabilityRecord>,
    pub(crate) next_capability_id: CapabilityId,
    pub(crate) audit: AuditLog,
    pub(crate) created_at_ms: TimestampMs,
}

impl Vault {
    /// Create a vault and its one admin capability
    ///
    /// The volume window starts at `now_ms`.
    pub fn genesis(
        id: VaultId,
        admin: AgentId,
        limits: Limits,
        now_ms: TimestampMs,
        sink: &mut dyn EventSink,
    ) -> Result<(Vault, AdminCapability), VaultError> {
        if !limits.is_valid() {
            return Err(VaultError::InvalidLimits {
                max_drawdown_bps: limits.max_drawdown_bps,
                daily_volume_limit: limits.daily_volume_limit,
            });
        }

        let vault = Vault {
            id,
            admin: admin.clone(),
            guardrail: GuardrailState::new(limits, now_ms),
            frozen_agents: BTreeSet::new(),
            protocol_whitelist: BTreeSet::new(),
            whitelist_mode: WhitelistMode::default(),
            oracle: OracleConfig::default(),
            capabilities: BTreeMap::new(),
            next_capability_id: 0,
            audit: AuditLog::new(),
            created_at_ms: now_ms,
        };

        info!("{}: created, admin {}", id, admin);
        vault.emit(
            sink,
            now_ms,
            EventKind::VaultCreated {
                admin: admin.clone(),
                limits,
            },
        );
        Ok((vault, AdminCapability::issue(id, admin)))
    }

    pub fn id(&self) -> VaultId {
        self.id
    }

    pub fn admin(&self) -> &AgentId {
        &self.admin
    }

    pub fn guardrail_state(&self) -> &GuardrailState {
        &self.guardrail
    }

    pub fn limits(&self) -> &Limits {
        &self.guardrail.limits
    }

    pub fn counters(&self) -> &Counters {
        &self.guardrail.counters
    }

    pub fn balance(&self) -> u64 {
        self.guardrail.counters.balance
    }

    pub fn peak_balance(&self) -> u64 {
        self.guardrail.counters.peak_balance
    }

    pub fn trade_count(&self) -> u64 {
        self.guardrail.counters.trade_count
    }

    pub fn is_paused(&self) -> bool {
        self.guardrail.paused
    }

    pub fn is_frozen(&self, agent: &AgentId) -> bool {
        self.frozen_agents.contains(agent)
    }

    pub fn frozen_agents(&self) -> &BTreeSet<AgentId> {
        &self.frozen_agents
    }

    pub fn protocol_whitelist(&self) -> &BTreeSet<ProtocolId> {
        &self.protocol_whitelist
    }

    pub fn whitelist_mode(&self) -> WhitelistMode {
        self.whitelist_mode
    }

    pub fn oracle_config(&self) -> &OracleConfig {
        &self.oracle
    }

    pub fn capabilities(&self) -> &BTreeMap<CapabilityId, CapabilityRecord> {
        &self.capabilities
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn created_at_ms(&self) -> TimestampMs {
        self.created_at_ms
    }

    /// Volume still available in the window as of `now_ms`
    pub fn remaining_volume(&self, now_ms: TimestampMs) -> u64 {
        let counters = self.guardrail.counters.rolled(now_ms);
        self.guardrail
            .limits
            .daily_volume_limit
            .saturating_sub(counters.total_traded_today)
    }

    /// Re-issue the admin token to its holder
    pub(crate) fn admin_capability_for(&self, caller: &AgentId) -> Result<AdminCapability, VaultError> {
        if *caller != self.admin {
            return Err(VaultError::Unauthorized);
        }
        Ok(AdminCapability::issue(self.id, self.admin.clone()))
    }

    /// Re-issue a live agent token to its bound holder
    pub(crate) fn agent_capability_for(
        &self,
        cap_id: CapabilityId,
        caller: &AgentId,
    ) -> Result<AgentCapability, VaultError> {
        match self.capabilities.get(&cap_id) {
            Some(record) if record.agent == *caller => {
                Ok(AgentCapability::issue(cap_id, self.id, record.agent.clone()))
            }
            _ => Err(VaultError::UnknownCapability { cap_id }),
        }
    }

    /// Binding facts of a presented agent token
    ///
    /// A token is bound only if it names this vault and its record is still
    /// live (not revoked).
    pub(crate) fn caller(&self, cap: &AgentCapability) -> Caller {
        let bound_to_vault = cap.vault_id() == self.id
            && self
                .capabilities
                .get(&cap.id())
                .map_or(false, |record| record.agent == *cap.agent());
        Caller {
            bound_to_vault,
            frozen: self.frozen_agents.contains(cap.agent()),
        }
    }

    /// Whitelist gate for a settlement counter-party
    pub(crate) fn check_protocol(&self, protocol: Option<&ProtocolId>) -> Result<(), VaultError> {
        let Some(protocol) = protocol else {
            return Ok(());
        };
        if self.protocol_whitelist.contains(protocol) {
            return Ok(());
        }
        if self.protocol_whitelist.is_empty() && self.whitelist_mode == WhitelistMode::Permissive {
            warn!(
                "{}: permissive whitelist mode, allowing unlisted protocol {}",
                self.id, protocol
            );
            return Ok(());
        }
        Err(VaultError::ProtocolNotWhitelisted {
            protocol: protocol.clone(),
        })
    }

    pub(crate) fn emit(&self, sink: &mut dyn EventSink, now_ms: TimestampMs, kind: EventKind) {
        sink.emit(VaultEvent {
            vault_id: self.id,
            timestamp_ms: now_ms,
            kind,
        });
    }

    /// Append a receipt and announce it
    pub(crate) fn record(&mut self, sink: &mut dyn EventSink, draft: ReceiptDraft) -> ReceiptId {
        let agent = draft.agent.clone();
        let proof_hash = draft.proof_hash;
        let amount = draft.amount;
        let score = draft.score;
        let timestamp_ms = draft.timestamp_ms;
        let receipt_id = self.audit.append(self.id, draft);
        self.emit(
            sink,
            timestamp_ms,
            EventKind::AuditReceiptCreated {
                receipt_id,
                agent,
                proof_hash,
                amount,
                score,
            },
        );
        receipt_id
    }
}
