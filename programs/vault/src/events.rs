//! Structured notifications for every state transition
//!
//! Successful changes emit their own kind and name the identity that acted;
//! every rejected call, agent or admin, emits `GuardrailTriggered` so
//! consumers can tell a blocked call apart from one that never arrived.

use crate::audit::ReceiptId;
use crate::capability::CapabilityId;
use crate::state::WhitelistMode;
use guardrail_common::{AgentId, ProofHash, ProtocolId, TimestampMs, VaultError, VaultId};
use guardrail_model::Limits;
use guardrail_oracle::OracleConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEvent {
    pub vault_id: VaultId,
    pub timestamp_ms: TimestampMs,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    VaultCreated {
        admin: AgentId,
        limits: Limits,
    },
    Deposited {
        admin: AgentId,
        amount: u64,
        balance: u64,
        peak_balance: u64,
    },
    Withdrawn {
        admin: AgentId,
        amount: u64,
        recipient: Option<AgentId>,
        balance: u64,
    },
    LimitsUpdated {
        admin: AgentId,
        limits: Limits,
    },
    PausedChanged {
        admin: AgentId,
        paused: bool,
    },
    AgentFrozen {
        admin: AgentId,
        agent: AgentId,
    },
    AgentUnfrozen {
        admin: AgentId,
        agent: AgentId,
    },
    CapabilityMinted {
        admin: AgentId,
        cap_id: CapabilityId,
        agent: AgentId,
    },
    CapabilityRevoked {
        cap_id: CapabilityId,
        agent: AgentId,
    },
    ProtocolWhitelisted {
        admin: AgentId,
        protocol: ProtocolId,
    },
    ProtocolRemoved {
        admin: AgentId,
        protocol: ProtocolId,
    },
    WhitelistModeChanged {
        admin: AgentId,
        mode: WhitelistMode,
    },
    PeakReset {
        admin: AgentId,
        peak_balance: u64,
    },
    OracleConfigUpdated {
        admin: AgentId,
        config: OracleConfig,
    },
    TradeExecuted {
        agent: AgentId,
        trade_id: u64,
        amount: u64,
        output: u64,
        min_output: u64,
        score: u8,
        balance: u64,
        traded_today: u64,
    },
    AtomicRebalanceCompleted {
        agent: AgentId,
        first_trade_id: u64,
        legs: u32,
        total_input: u64,
        total_output: u64,
        max_slippage_bps: u64,
        final_balance: u64,
        score: u8,
    },
    OracleValidationPassed {
        agent: AgentId,
        attestations: u32,
        max_deviation_bps: u64,
    },
    OracleValidationFailed {
        agent: AgentId,
        error: VaultError,
    },
    GuardrailTriggered {
        agent: AgentId,
        violation: VaultError,
        requested_amount: u64,
        balance: u64,
    },
    AuditReceiptCreated {
        receipt_id: ReceiptId,
        agent: AgentId,
        proof_hash: ProofHash,
        amount: u64,
        score: u8,
    },
}

impl EventKind {
    /// Short stable label, e.g. `trade_executed`
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::VaultCreated { .. } => "vault_created",
            EventKind::Deposited { .. } => "deposited",
            EventKind::Withdrawn { .. } => "withdrawn",
            EventKind::LimitsUpdated { .. } => "limits_updated",
            EventKind::PausedChanged { .. } => "paused_changed",
            EventKind::AgentFrozen { .. } => "agent_frozen",
            EventKind::AgentUnfrozen { .. } => "agent_unfrozen",
            EventKind::CapabilityMinted { .. } => "capability_minted",
            EventKind::CapabilityRevoked { .. } => "capability_revoked",
            EventKind::ProtocolWhitelisted { .. } => "protocol_whitelisted",
            EventKind::ProtocolRemoved { .. } => "protocol_removed",
            EventKind::WhitelistModeChanged { .. } => "whitelist_mode_changed",
            EventKind::PeakReset { .. } => "peak_reset",
            EventKind::OracleConfigUpdated { .. } => "oracle_config_updated",
            EventKind::TradeExecuted { .. } => "trade_executed",
            EventKind::AtomicRebalanceCompleted { .. } => "atomic_rebalance_completed",
            EventKind::OracleValidationPassed { .. } => "oracle_validation_passed",
            EventKind::OracleValidationFailed { .. } => "oracle_validation_failed",
            EventKind::GuardrailTriggered { .. } => "guardrail_triggered",
            EventKind::AuditReceiptCreated { .. } => "audit_receipt_created",
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EventKind::GuardrailTriggered { .. } | EventKind::OracleValidationFailed { .. }
        )
    }
}

impl fmt::Display for VaultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.timestamp_ms, self.vault_id, self.kind.label())?;
        match &self.kind {
            EventKind::VaultCreated { admin, limits } => write!(
                f,
                " admin={} drawdown={}bps volume={} cooldown={}ms",
                admin, limits.max_drawdown_bps, limits.daily_volume_limit, limits.cooldown_ms
            ),
            EventKind::Deposited { admin, amount, balance, .. } => {
                write!(f, " by={} amount={} balance={}", admin, amount, balance)
            }
            EventKind::Withdrawn {
                admin,
                amount,
                recipient,
                balance,
            } => {
                write!(f, " by={} amount={} balance={}", admin, amount, balance)?;
                if let Some(r) = recipient {
                    write!(f, " to={}", r)?;
                }
                Ok(())
            }
            EventKind::LimitsUpdated { admin, limits } => write!(
                f,
                " by={} drawdown={}bps volume={} cooldown={}ms",
                admin, limits.max_drawdown_bps, limits.daily_volume_limit, limits.cooldown_ms
            ),
            EventKind::PausedChanged { admin, paused } => write!(f, " by={} paused={}", admin, paused),
            EventKind::AgentFrozen { admin, agent } | EventKind::AgentUnfrozen { admin, agent } => {
                write!(f, " by={} agent={}", admin, agent)
            }
            EventKind::CapabilityMinted { admin, cap_id, agent } => {
                write!(f, " by={} cap=#{} agent={}", admin, cap_id, agent)
            }
            EventKind::CapabilityRevoked { cap_id, agent } => {
                write!(f, " cap=#{} agent={}", cap_id, agent)
            }
            EventKind::ProtocolWhitelisted { admin, protocol }
            | EventKind::ProtocolRemoved { admin, protocol } => {
                write!(f, " by={} protocol={}", admin, protocol)
            }
            EventKind::WhitelistModeChanged { admin, mode } => write!(f, " by={} mode={}", admin, mode),
            EventKind::PeakReset { admin, peak_balance } => {
                write!(f, " by={} peak={}", admin, peak_balance)
            }
            EventKind::OracleConfigUpdated { admin, config } => write!(
                f,
                " by={} slippage={}bps staleness={}ms enabled={}",
                admin, config.max_slippage_bps, config.max_staleness_ms, config.enabled
            ),
            EventKind::TradeExecuted {
                agent,
                trade_id,
                amount,
                output,
                balance,
                ..
            } => write!(
                f,
                " #{} agent={} in={} out={} balance={}",
                trade_id, agent, amount, output, balance
            ),
            EventKind::AtomicRebalanceCompleted {
                agent,
                legs,
                total_input,
                total_output,
                max_slippage_bps,
                final_balance,
                ..
            } => write!(
                f,
                " agent={} legs={} in={} out={} max_slippage={}bps balance={}",
                agent, legs, total_input, total_output, max_slippage_bps, final_balance
            ),
            EventKind::OracleValidationPassed {
                agent,
                attestations,
                max_deviation_bps,
            } => write!(
                f,
                " agent={} prices={} max_deviation={}bps",
                agent, attestations, max_deviation_bps
            ),
            EventKind::OracleValidationFailed { agent, error } => {
                write!(f, " agent={} {}: {}", agent, error.name(), error)
            }
            EventKind::GuardrailTriggered {
                agent,
                violation,
                requested_amount,
                balance,
            } => write!(
                f,
                " agent={} {} (code {}) requested={} balance={}",
                agent,
                violation.name(),
                violation.code(),
                requested_amount,
                balance
            ),
            EventKind::AuditReceiptCreated {
                receipt_id,
                agent,
                amount,
                ..
            } => write!(f, " receipt=#{} agent={} amount={}", receipt_id, agent, amount),
        }
    }
}

/// Consumer of emitted events
pub trait EventSink {
    fn emit(&mut self, event: VaultEvent);
}

impl EventSink for Vec<VaultEvent> {
    fn emit(&mut self, event: VaultEvent) {
        self.push(event);
    }
}

/// Sink that only writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: VaultEvent) {
        info!("event: {}", event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_event_renders_code_and_numbers() {
        let event = VaultEvent {
            vault_id: VaultId(3),
            timestamp_ms: 1,
            kind: EventKind::GuardrailTriggered {
                agent: "bot".into(),
                violation: VaultError::CooldownActive { now_ms: 1, ready_after_ms: 60_000 },
                requested_amount: 500_000,
                balance: 10_000_000,
            },
        };
        let line = event.to_string();
        assert!(line.contains("vault-3"));
        assert!(line.contains("CooldownActive (code 2)"));
        assert!(line.contains("requested=500000"));
        assert!(event.kind.is_rejection());
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = VaultEvent {
            vault_id: VaultId(1),
            timestamp_ms: 7,
            kind: EventKind::PausedChanged {
                admin: "admin".into(),
                paused: true,
            },
        };
        assert!(event.to_string().contains("by=admin paused=true"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"paused_changed\""));
        let back: VaultEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
