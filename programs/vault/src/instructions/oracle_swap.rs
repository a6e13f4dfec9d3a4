//! Oracle-validated swap and rebalance
//!
//! Price attestations are checked after the capability gate and before any
//! guardrail. Validation is skipped only when the vault's oracle config has
//! `enabled = false`.

use super::atomic_rebalance::{commit_rebalance, stage_rebalance, RebalanceSummary};
use super::swap::{commit_swap, stage_swap, Settle, TradeReceipt};
use super::{authorize, reject, RebalanceRequest, SwapLeg, SwapRequest};
use crate::capability::AgentCapability;
use crate::events::{EventKind, EventSink};
use crate::state::Vault;
use crate::venue::SettlementVenue;
use guardrail_common::{TimestampMs, VaultError};
use guardrail_oracle::{validate_attestation, validate_batch, PriceAttestation};

/// Gate, then prices; returns the largest deviation when validation ran
#[allow(clippy::too_many_arguments)]
fn check_prices<F>(
    vault: &mut Vault,
    cap: &AgentCapability,
    legs: &[SwapLeg],
    score: u8,
    attestations: u32,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
    validate: F,
) -> Result<Option<u64>, VaultError>
where
    F: FnOnce(&Vault) -> Result<u64, VaultError>,
{
    if let Err(e) = authorize(vault, cap) {
        return Err(reject(vault, sink, cap.agent(), e, legs, score, now_ms));
    }

    match validate(&*vault) {
        Ok(max_deviation_bps) if vault.oracle_config().enabled => {
            vault.emit(
                sink,
                now_ms,
                EventKind::OracleValidationPassed {
                    agent: cap.agent().clone(),
                    attestations,
                    max_deviation_bps,
                },
            );
            Ok(Some(max_deviation_bps))
        }
        Ok(_) => Ok(None),
        Err(e) => {
            vault.emit(
                sink,
                now_ms,
                EventKind::OracleValidationFailed {
                    agent: cap.agent().clone(),
                    error: e.clone(),
                },
            );
            Err(reject(vault, sink, cap.agent(), e, legs, score, now_ms))
        }
    }
}

/// Process oracle-validated swap instruction
///
/// # Security Checks
/// - Vault not paused, capability bound and live, agent not frozen
/// - Price positive, attestation no older than `max_staleness_ms`
/// - Oracle/expected deviation within `max_slippage_bps`
/// - Then every check of `process_swap`
pub fn process_oracle_swap(
    vault: &mut Vault,
    cap: &AgentCapability,
    request: &SwapRequest,
    attestation: &PriceAttestation,
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
    sink: &mut dyn EventSink,
) -> Result<TradeReceipt, VaultError> {
    let deviation = check_prices(vault, cap, &[request.leg()], request.score, 1, now_ms, sink, |v| {
        validate_attestation(v.oracle_config(), attestation, now_ms).map(|check| check.deviation_bps)
    })?;

    match stage_swap(vault, cap, request, now_ms, venue, Settle::Execute) {
        Ok(staged) => Ok(commit_swap(vault, cap.agent(), request, staged, now_ms, deviation, sink)),
        Err(e) => Err(reject(vault, sink, cap.agent(), e, &[request.leg()], request.score, now_ms)),
    }
}

/// Process oracle-validated atomic rebalance instruction
///
/// One attestation per leg, in leg order. A different number of
/// attestations is a `BatchLengthMismatch`. The largest observed deviation
/// is reported on the summary.
pub fn process_oracle_atomic_rebalance(
    vault: &mut Vault,
    cap: &AgentCapability,
    request: &RebalanceRequest,
    attestations: &[PriceAttestation],
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
    sink: &mut dyn EventSink,
) -> Result<RebalanceSummary, VaultError> {
    let count = attestations.len() as u32;
    let deviation = check_prices(vault, cap, &request.legs, request.score, count, now_ms, sink, |v| {
        validate_batch(v.oracle_config(), attestations, request.legs.len(), now_ms)
    })?;

    match stage_rebalance(vault, cap, request, now_ms, venue, Settle::Execute) {
        Ok(staged) => Ok(commit_rebalance(vault, cap.agent(), request, staged, now_ms, deviation, sink)),
        Err(e) => Err(reject(vault, sink, cap.agent(), e, &request.legs, request.score, now_ms)),
    }
}
