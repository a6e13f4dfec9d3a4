//! Atomic rebalance instruction - a batch of swaps applied all-or-nothing

use super::swap::Settle;
use super::{authorize, check_sequence, reject, validate_score, RebalanceRequest};
use crate::audit::{trade_proof, ReceiptDraft, ReceiptId, ReceiptStatus, SettledLeg};
use crate::capability::AgentCapability;
use crate::events::{EventKind, EventSink};
use crate::state::Vault;
use crate::venue::SettlementVenue;
use guardrail_common::{AgentId, TimestampMs, VaultError, VaultId};
use guardrail_model::math::realized_slippage_bps;
use guardrail_model::{
    apply_trade, check_aggregate_drawdown, check_cooldown, check_exposure, check_slippage, Counters,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Result of a committed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceSummary {
    pub vault_id: VaultId,
    pub agent: AgentId,
    /// Trade ids are consecutive, one per leg
    pub trade_ids: Vec<u64>,
    pub legs: Vec<SettledLeg>,
    pub total_input: u64,
    pub total_output: u64,
    /// Worst realized slippage of any leg
    pub max_slippage_bps: u64,
    pub balance_before: u64,
    pub final_balance: u64,
    pub score: u8,
    pub receipt_id: ReceiptId,
    pub timestamp_ms: TimestampMs,
    /// Largest attestation deviation on the oracle-validated path
    pub oracle_max_deviation_bps: Option<u64>,
}

/// One evaluated leg and the counters it leaves behind
#[derive(Debug, Clone, Copy)]
pub(crate) struct StagedLeg {
    pub settled: SettledLeg,
    pub balance: u64,
    pub traded_today: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct StagedRebalance {
    pub legs: Vec<StagedLeg>,
    pub counters: Counters,
}

impl StagedRebalance {
    pub(crate) fn settled(&self) -> Vec<SettledLeg> {
        self.legs.iter().map(|leg| leg.settled).collect()
    }
}

/// Evaluate every leg against a scratch copy of the counters
///
/// Cooldown is checked once against the pre-batch state; all legs share
/// `now_ms`. Volume, drawdown and funds are checked per leg against the
/// counters left by the previous legs. The aggregate drawdown from the peak
/// is re-checked at the end.
pub(crate) fn stage_rebalance(
    vault: &Vault,
    cap: &AgentCapability,
    request: &RebalanceRequest,
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
    settle: Settle,
) -> Result<StagedRebalance, VaultError> {
    authorize(vault, cap)?;
    validate_score(request.score)?;
    if request.legs.is_empty() {
        return Err(VaultError::EmptyBatch);
    }
    if request.legs.iter().any(|leg| leg.amount == 0) {
        return Err(VaultError::ZeroAmount);
    }
    check_sequence(vault, request.expected_sequence)?;
    vault.check_protocol(venue.protocol())?;

    let limits = vault.limits();
    check_cooldown(limits, vault.counters(), now_ms)?;

    let mut scratch = *vault.counters();
    let mut staged_legs = Vec::with_capacity(request.legs.len());
    for (i, leg) in request.legs.iter().enumerate() {
        check_exposure(limits, &scratch, now_ms, leg.amount)?;
        let output = settle.run(venue, leg)?;
        check_slippage(output, leg.min_output)?;
        scratch = apply_trade(scratch, now_ms, leg.amount, output)?;
        debug!(
            "{}: staged leg {} in={} out={} balance'={}",
            vault.id(),
            i,
            leg.amount,
            output,
            scratch.balance
        );
        staged_legs.push(StagedLeg {
            settled: SettledLeg {
                amount: leg.amount,
                min_output: leg.min_output,
                output,
            },
            balance: scratch.balance,
            traded_today: scratch.total_traded_today,
        });
    }

    check_aggregate_drawdown(limits, &scratch)?;

    Ok(StagedRebalance {
        legs: staged_legs,
        counters: scratch,
    })
}

pub(crate) fn commit_rebalance(
    vault: &mut Vault,
    agent: &AgentId,
    request: &RebalanceRequest,
    staged: StagedRebalance,
    now_ms: TimestampMs,
    oracle_max_deviation_bps: Option<u64>,
    sink: &mut dyn EventSink,
) -> RebalanceSummary {
    let first_trade_id = vault.trade_count();
    let balance_before = vault.balance();
    vault.guardrail.counters = staged.counters;

    let mut trade_ids = Vec::with_capacity(staged.legs.len());
    let mut total_input = 0u64;
    let mut total_output = 0u64;
    let mut max_slippage_bps = 0u64;
    for (trade_id, leg) in (first_trade_id..).zip(&staged.legs) {
        let SettledLeg { amount, min_output, output } = leg.settled;
        total_input = total_input.saturating_add(amount);
        total_output = total_output.saturating_add(output);
        max_slippage_bps = max_slippage_bps.max(realized_slippage_bps(amount, output));
        trade_ids.push(trade_id);
        vault.emit(
            sink,
            now_ms,
            EventKind::TradeExecuted {
                agent: agent.clone(),
                trade_id,
                amount,
                output,
                min_output,
                score: request.score,
                balance: leg.balance,
                traded_today: leg.traded_today,
            },
        );
    }

    let final_balance = staged.counters.balance;
    info!(
        "{}: atomic rebalance by {} legs={} in={} out={} balance {} -> {}",
        vault.id(),
        agent,
        staged.legs.len(),
        total_input,
        total_output,
        balance_before,
        final_balance
    );
    vault.emit(
        sink,
        now_ms,
        EventKind::AtomicRebalanceCompleted {
            agent: agent.clone(),
            first_trade_id,
            legs: staged.legs.len() as u32,
            total_input,
            total_output,
            max_slippage_bps,
            final_balance,
            score: request.score,
        },
    );

    let legs = staged.settled();
    let receipt_id = vault.record(
        sink,
        ReceiptDraft {
            agent: agent.clone(),
            proof_hash: trade_proof(vault.id(), first_trade_id, now_ms, request.score, &legs),
            amount: total_input,
            score: request.score,
            status: ReceiptStatus::Executed {
                first_trade_id,
                legs: staged.legs.len() as u32,
            },
            timestamp_ms: now_ms,
        },
    );

    RebalanceSummary {
        vault_id: vault.id(),
        agent: agent.clone(),
        trade_ids,
        legs,
        total_input,
        total_output,
        max_slippage_bps,
        balance_before,
        final_balance,
        score: request.score,
        receipt_id,
        timestamp_ms: now_ms,
        oracle_max_deviation_bps,
    }
}

/// Process atomic rebalance instruction
///
/// Equivalent to one swap per leg inside a single transaction: if any leg
/// fails, or the batch as a whole breaks the drawdown limit, no leg's effect
/// is observable.
///
/// # Security Checks
/// - Same gate, score, sequence and whitelist checks as a single swap
/// - Non-empty batch, every amount non-zero
/// - Cooldown once, against the pre-batch state
/// - Per leg: daily volume, drawdown, funds, slippage floor
/// - Aggregate drawdown of the final balance from the peak
pub fn process_atomic_rebalance(
    vault: &mut Vault,
    cap: &AgentCapability,
    request: &RebalanceRequest,
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
    sink: &mut dyn EventSink,
) -> Result<RebalanceSummary, VaultError> {
    let staged = stage_rebalance(vault, cap, request, now_ms, venue, Settle::Execute);

    match staged {
        Ok(staged) => Ok(commit_rebalance(vault, cap.agent(), request, staged, now_ms, None, sink)),
        Err(e) => Err(reject(vault, sink, cap.agent(), e, &request.legs, request.score, now_ms)),
    }
}
