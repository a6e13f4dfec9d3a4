//! Vault instruction handlers
//!
//! Agent paths stage their full effect against `&Vault` first and only take
//! `&mut Vault` to commit, so a rejected call cannot leave a partial change
//! in the guardrail counters. Rejections are still recorded: a
//! `GuardrailTriggered` event and a `Rejected` audit receipt.

pub mod admin;
pub mod atomic_rebalance;
pub mod log_execution;
pub mod oracle_swap;
pub mod preview;
pub mod swap;

pub use admin::*;
pub use atomic_rebalance::*;
pub use log_execution::*;
pub use oracle_swap::*;
pub use preview::*;
pub use swap::*;

use crate::audit::{trade_proof, ReceiptDraft, ReceiptStatus, SettledLeg};
use crate::capability::AgentCapability;
use crate::events::{EventKind, EventSink};
use crate::state::Vault;
use guardrail_common::{AgentId, TimestampMs, VaultError};
use guardrail_model::check_gate;
use log::warn;
use serde::{Deserialize, Serialize};

/// Highest optimizer confidence score
pub const MAX_SCORE: u8 = 100;

/// One movement: debit `amount`, require at least `min_output` back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLeg {
    pub amount: u64,
    pub min_output: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub amount: u64,
    pub min_output: u64,
    /// Optimizer confidence, 0..=100
    pub score: u8,
    /// When set, must equal the vault's trade count (replay protection)
    pub expected_sequence: Option<u64>,
}

impl SwapRequest {
    pub fn new(amount: u64, min_output: u64, score: u8) -> Self {
        Self {
            amount,
            min_output,
            score,
            expected_sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.expected_sequence = Some(sequence);
        self
    }

    pub fn leg(&self) -> SwapLeg {
        SwapLeg {
            amount: self.amount,
            min_output: self.min_output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceRequest {
    pub legs: Vec<SwapLeg>,
    pub score: u8,
    pub expected_sequence: Option<u64>,
}

impl RebalanceRequest {
    pub fn new(legs: Vec<SwapLeg>, score: u8) -> Self {
        Self {
            legs,
            score,
            expected_sequence: None,
        }
    }

    /// Build from parallel amount and min-output lists
    pub fn from_parts(amounts: &[u64], min_outputs: &[u64], score: u8) -> Result<Self, VaultError> {
        if amounts.len() != min_outputs.len() {
            return Err(VaultError::BatchLengthMismatch {
                expected: amounts.len(),
                actual: min_outputs.len(),
            });
        }
        if amounts.is_empty() {
            return Err(VaultError::EmptyBatch);
        }
        let legs = amounts
            .iter()
            .zip(min_outputs)
            .map(|(&amount, &min_output)| SwapLeg { amount, min_output })
            .collect();
        Ok(Self::new(legs, score))
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.expected_sequence = Some(sequence);
        self
    }

    pub fn total_input(&self) -> u64 {
        self.legs.iter().fold(0u64, |acc, leg| acc.saturating_add(leg.amount))
    }
}

/// Pause, then capability binding, then freeze
pub(crate) fn authorize(vault: &Vault, cap: &AgentCapability) -> Result<(), VaultError> {
    check_gate(vault.guardrail_state(), vault.caller(cap))?;
    Ok(())
}

pub(crate) fn validate_score(score: u8) -> Result<(), VaultError> {
    if score > MAX_SCORE {
        return Err(VaultError::InvalidScore { score });
    }
    Ok(())
}

pub(crate) fn check_sequence(vault: &Vault, expected: Option<u64>) -> Result<(), VaultError> {
    match expected {
        Some(expected) if expected != vault.trade_count() => Err(VaultError::SequenceMismatch {
            expected,
            actual: vault.trade_count(),
        }),
        _ => Ok(()),
    }
}

/// Announce a refused call and hand the error back
///
/// Emits `GuardrailTriggered` with the caller, the requested amount and the
/// current balance. Admin and capability handlers call it directly and keep
/// no receipt.
pub(crate) fn refuse(
    vault: &Vault,
    sink: &mut dyn EventSink,
    caller: &AgentId,
    error: VaultError,
    requested_amount: u64,
    now_ms: TimestampMs,
) -> VaultError {
    warn!(
        "{}: {} rejected for {}: {} (code {}, {})",
        vault.id(),
        caller,
        requested_amount,
        error,
        error.code(),
        error.severity()
    );
    vault.emit(
        sink,
        now_ms,
        EventKind::GuardrailTriggered {
            agent: caller.clone(),
            violation: error.clone(),
            requested_amount,
            balance: vault.balance(),
        },
    );
    error
}

/// Record a rejected agent call and hand the error back
pub(crate) fn reject(
    vault: &mut Vault,
    sink: &mut dyn EventSink,
    agent: &AgentId,
    error: VaultError,
    legs: &[SwapLeg],
    score: u8,
    now_ms: TimestampMs,
) -> VaultError {
    let requested_amount = legs.iter().fold(0u64, |acc, leg| acc.saturating_add(leg.amount));
    let error = refuse(vault, sink, agent, error, requested_amount, now_ms);

    // the proof of a rejected call commits to what was asked for
    let asked: Vec<SettledLeg> = legs
        .iter()
        .map(|leg| SettledLeg {
            amount: leg.amount,
            min_output: leg.min_output,
            output: 0,
        })
        .collect();
    let proof_hash = trade_proof(vault.id(), vault.trade_count(), now_ms, score, &asked);
    vault.record(
        sink,
        ReceiptDraft {
            agent: agent.clone(),
            proof_hash,
            amount: requested_amount,
            score,
            status: ReceiptStatus::Rejected { error: error.clone() },
            timestamp_ms: now_ms,
        },
    );
    error
}
