//! Error taxonomy for every vault operation
//!
//! All variants are expected per-call outcomes. Codes follow the original
//! abort-code numbering: 0..=11 guardrails, 100..=103 oracle, 200+ engine.

use crate::ids::{ProtocolId, VaultId};
use guardrail_model::deposit_withdraw::FundsError;
use guardrail_model::Violation;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum VaultError {
    #[error("capability is not bound to this vault")]
    InvalidAgent,

    #[error("agent is frozen by the vault admin")]
    AgentFrozen,

    #[error("vault is paused")]
    Paused,

    #[error("cooldown active: now {now_ms} ms, next trade allowed after {ready_after_ms} ms")]
    CooldownActive { now_ms: u64, ready_after_ms: u64 },

    #[error("daily volume exceeded: requested {requested}, traded today {traded_today}, limit {limit}")]
    VolumeExceeded { requested: u64, traded_today: u64, limit: u64 },

    #[error("drawdown exceeded: requested {requested}, projected balance {projected_balance}, peak {peak_balance}, limit {max_drawdown_bps} bps")]
    DrawdownExceeded {
        requested: u64,
        projected_balance: u64,
        peak_balance: u64,
        max_drawdown_bps: u64,
    },

    #[error("insufficient balance: requested {requested}, balance {balance}")]
    InsufficientBalance { requested: u64, balance: u64 },

    #[error("slippage exceeded: output {output} below minimum {min_output}")]
    SlippageExceeded { output: u64, min_output: u64 },

    #[error("batch length mismatch: expected {expected} entries, got {actual}")]
    BatchLengthMismatch { expected: usize, actual: usize },

    #[error("post-rebalance drawdown exceeded: final balance {final_balance}, peak {peak_balance}, limit {max_drawdown_bps} bps")]
    PostRebalanceDrawdownExceeded {
        final_balance: u64,
        peak_balance: u64,
        max_drawdown_bps: u64,
    },

    #[error("protocol {protocol} is not whitelisted")]
    ProtocolNotWhitelisted { protocol: ProtocolId },

    #[error("oracle price deviation {deviation_bps} bps exceeds {max_slippage_bps} bps")]
    PriceDeviationExceeded { deviation_bps: u64, max_slippage_bps: u64 },

    #[error("oracle price stale: age {age_ms} ms exceeds {max_staleness_ms} ms")]
    PriceStale { age_ms: u64, max_staleness_ms: u64 },

    #[error("oracle price invalid: oracle {oracle_price}, expected {expected_price}")]
    PriceInvalid { oracle_price: i64, expected_price: i64 },

    #[error("invalid oracle config: max slippage {max_slippage_bps} bps, max staleness {max_staleness_ms} ms")]
    InvalidOracleConfig { max_slippage_bps: u64, max_staleness_ms: u64 },

    #[error("admin capability is not bound to this vault")]
    Unauthorized,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("batch must contain at least one swap")]
    EmptyBatch,

    #[error("optimizer score {score} is out of range 0..=100")]
    InvalidScore { score: u8 },

    #[error("invalid limits: drawdown {max_drawdown_bps} bps, daily volume {daily_volume_limit}")]
    InvalidLimits { max_drawdown_bps: u64, daily_volume_limit: u64 },

    #[error("sequence mismatch: expected trade #{expected}, vault is at #{actual}")]
    SequenceMismatch { expected: u64, actual: u64 },

    #[error("settlement failed: {reason}")]
    SettlementFailed { reason: String },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("unknown vault {vault}")]
    UnknownVault { vault: VaultId },

    #[error("unknown capability #{cap_id} for this caller")]
    UnknownCapability { cap_id: u64 },
}

/// Operator-facing severity of a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        })
    }
}

/// Static description of one error code
#[derive(Debug, Clone, Copy)]
pub struct ErrorInfo {
    pub code: u16,
    pub name: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    pub recovery: &'static str,
}

/// Every code the engine can return
pub const ERROR_TABLE: &[ErrorInfo] = &[
    ErrorInfo { code: 0, name: "InvalidAgent", severity: Severity::Critical,
        message: "Agent capability is bound to a different vault.",
        recovery: "Mint a capability for this vault with the admin capability." },
    ErrorInfo { code: 1, name: "AgentFrozen", severity: Severity::Critical,
        message: "Admin has frozen this agent.",
        recovery: "Ask the vault admin to unfreeze the agent." },
    ErrorInfo { code: 2, name: "CooldownActive", severity: Severity::Warning,
        message: "Last trade was less than the cooldown ago.",
        recovery: "Wait for the cooldown to expire, or ask the admin to lower it via update_limits." },
    ErrorInfo { code: 3, name: "VolumeExceeded", severity: Severity::Error,
        message: "Daily volume limit exhausted.",
        recovery: "Wait for the 24h window to reset, or ask the admin to raise the daily volume limit." },
    ErrorInfo { code: 4, name: "DrawdownExceeded", severity: Severity::Error,
        message: "Trade would exceed the maximum loss from peak.",
        recovery: "Reduce the trade amount, or ask the admin to review max_drawdown_bps." },
    ErrorInfo { code: 5, name: "InsufficientBalance", severity: Severity::Error,
        message: "Vault balance is below the requested amount.",
        recovery: "Ask the admin to deposit, or reduce the trade amount." },
    ErrorInfo { code: 6, name: "Paused", severity: Severity::Critical,
        message: "Vault is paused; all agent trades are blocked.",
        recovery: "Ask the admin to resume the vault." },
    ErrorInfo { code: 7, name: "SlippageExceeded", severity: Severity::Warning,
        message: "Realized output is below the minimum output.",
        recovery: "Lower min_output or wait for better market conditions." },
    ErrorInfo { code: 9, name: "BatchLengthMismatch", severity: Severity::Error,
        message: "Batch parameter lists have different lengths.",
        recovery: "Supply one min_output (and one attestation) per swap amount." },
    ErrorInfo { code: 10, name: "PostRebalanceDrawdownExceeded", severity: Severity::Critical,
        message: "Combined batch would leave the vault too far below peak.",
        recovery: "Reduce total swap amounts; the whole batch was rolled back." },
    ErrorInfo { code: 11, name: "ProtocolNotWhitelisted", severity: Severity::Critical,
        message: "Settlement venue is not in the protocol whitelist.",
        recovery: "Ask the admin to whitelist the protocol, or use a whitelisted venue." },
    ErrorInfo { code: 100, name: "PriceDeviationExceeded", severity: Severity::Error,
        message: "Oracle price deviates too far from the expected price.",
        recovery: "Wait for the price to stabilise or raise max_slippage_bps via update_oracle_config." },
    ErrorInfo { code: 101, name: "PriceStale", severity: Severity::Error,
        message: "Oracle price attestation is too old.",
        recovery: "Refresh the price feed before the swap, or raise max_staleness_ms." },
    ErrorInfo { code: 102, name: "PriceInvalid", severity: Severity::Critical,
        message: "Oracle or expected price is zero or negative.",
        recovery: "Check the health of the price feed." },
    ErrorInfo { code: 103, name: "InvalidOracleConfig", severity: Severity::Error,
        message: "Oracle config out of range.",
        recovery: "Use max_slippage_bps <= 1000 and max_staleness_ms >= 1000." },
    ErrorInfo { code: 200, name: "Unauthorized", severity: Severity::Critical,
        message: "Admin capability is bound to a different vault.",
        recovery: "Use the admin capability created with this vault." },
    ErrorInfo { code: 201, name: "ZeroAmount", severity: Severity::Warning,
        message: "Amount must be greater than zero.",
        recovery: "Pass a positive amount." },
    ErrorInfo { code: 202, name: "EmptyBatch", severity: Severity::Warning,
        message: "Batch contains no swaps.",
        recovery: "Supply at least one swap." },
    ErrorInfo { code: 203, name: "InvalidScore", severity: Severity::Warning,
        message: "Optimizer score out of range.",
        recovery: "Scores are 0..=100." },
    ErrorInfo { code: 204, name: "InvalidLimits", severity: Severity::Error,
        message: "Guardrail limits out of range.",
        recovery: "Use max_drawdown_bps <= 10000 and a positive daily volume limit." },
    ErrorInfo { code: 205, name: "SequenceMismatch", severity: Severity::Warning,
        message: "Request targets a different trade sequence number (replay or stale request).",
        recovery: "Re-read the vault trade count and resubmit." },
    ErrorInfo { code: 206, name: "SettlementFailed", severity: Severity::Error,
        message: "Settlement venue failed to execute.",
        recovery: "Check the venue and retry; no state was changed." },
    ErrorInfo { code: 207, name: "Overflow", severity: Severity::Critical,
        message: "Counter arithmetic would overflow.",
        recovery: "Reduce amounts; investigate the caller." },
    ErrorInfo { code: 208, name: "UnknownVault", severity: Severity::Error,
        message: "No vault with this id.",
        recovery: "Check the vault id." },
    ErrorInfo { code: 209, name: "UnknownCapability", severity: Severity::Error,
        message: "No capability with this id for the caller.",
        recovery: "Check the capability id and the caller identity." },
];

/// Look up the static description of a code
pub fn describe_code(code: u16) -> Option<&'static ErrorInfo> {
    ERROR_TABLE.iter().find(|info| info.code == code)
}

impl VaultError {
    pub fn code(&self) -> u16 {
        match self {
            VaultError::InvalidAgent => 0,
            VaultError::AgentFrozen => 1,
            VaultError::CooldownActive { .. } => 2,
            VaultError::VolumeExceeded { .. } => 3,
            VaultError::DrawdownExceeded { .. } => 4,
            VaultError::InsufficientBalance { .. } => 5,
            VaultError::Paused => 6,
            VaultError::SlippageExceeded { .. } => 7,
            VaultError::BatchLengthMismatch { .. } => 9,
            VaultError::PostRebalanceDrawdownExceeded { .. } => 10,
            VaultError::ProtocolNotWhitelisted { .. } => 11,
            VaultError::PriceDeviationExceeded { .. } => 100,
            VaultError::PriceStale { .. } => 101,
            VaultError::PriceInvalid { .. } => 102,
            VaultError::InvalidOracleConfig { .. } => 103,
            VaultError::Unauthorized => 200,
            VaultError::ZeroAmount => 201,
            VaultError::EmptyBatch => 202,
            VaultError::InvalidScore { .. } => 203,
            VaultError::InvalidLimits { .. } => 204,
            VaultError::SequenceMismatch { .. } => 205,
            VaultError::SettlementFailed { .. } => 206,
            VaultError::Overflow => 207,
            VaultError::UnknownVault { .. } => 208,
            VaultError::UnknownCapability { .. } => 209,
        }
    }

    pub fn info(&self) -> &'static ErrorInfo {
        let code = self.code();
        // every code returned by `code()` has a table row (checked in tests)
        describe_code(code).unwrap_or(&ERROR_TABLE[0])
    }

    /// Short stable name, e.g. `CooldownActive`
    pub fn name(&self) -> &'static str {
        self.info().name
    }

    pub fn severity(&self) -> Severity {
        self.info().severity
    }

    pub fn recovery(&self) -> &'static str {
        self.info().recovery
    }

    /// Guardrail rejections that point at an under-funded vault or limits
    /// needing review, as opposed to a misbehaving caller
    pub fn signals_replenishment(&self) -> bool {
        matches!(
            self,
            VaultError::InsufficientBalance { .. } | VaultError::DrawdownExceeded { .. }
        )
    }
}

impl From<Violation> for VaultError {
    fn from(v: Violation) -> Self {
        match v {
            Violation::Paused => VaultError::Paused,
            Violation::InvalidAgent => VaultError::InvalidAgent,
            Violation::AgentFrozen => VaultError::AgentFrozen,
            Violation::CooldownActive { now_ms, ready_after_ms } => {
                VaultError::CooldownActive { now_ms, ready_after_ms }
            }
            Violation::VolumeExceeded { requested, traded_today, limit } => {
                VaultError::VolumeExceeded { requested, traded_today, limit }
            }
            Violation::DrawdownExceeded {
                requested,
                projected_balance,
                peak_balance,
                max_drawdown_bps,
            } => VaultError::DrawdownExceeded {
                requested,
                projected_balance,
                peak_balance,
                max_drawdown_bps,
            },
            Violation::InsufficientBalance { requested, balance } => {
                VaultError::InsufficientBalance { requested, balance }
            }
            Violation::SlippageExceeded { output, min_output } => {
                VaultError::SlippageExceeded { output, min_output }
            }
            Violation::PostRebalanceDrawdownExceeded {
                final_balance,
                peak_balance,
                max_drawdown_bps,
            } => VaultError::PostRebalanceDrawdownExceeded {
                final_balance,
                peak_balance,
                max_drawdown_bps,
            },
            Violation::Overflow => VaultError::Overflow,
        }
    }
}

impl From<FundsError> for VaultError {
    fn from(e: FundsError) -> Self {
        match e {
            FundsError::ZeroAmount => VaultError::ZeroAmount,
            FundsError::Overflow => VaultError::Overflow,
            FundsError::InsufficientBalance { requested, balance } => {
                VaultError::InsufficientBalance { requested, balance }
            }
        }
    }
}
