//! Swap instruction - one guarded movement of vault funds

use super::{authorize, check_sequence, reject, validate_score, SwapLeg, SwapRequest};
use crate::audit::{trade_proof, ReceiptDraft, ReceiptId, ReceiptStatus, SettledLeg};
use crate::capability::AgentCapability;
use crate::events::{EventKind, EventSink};
use crate::state::Vault;
use crate::venue::SettlementVenue;
use guardrail_common::{AgentId, TimestampMs, VaultError, VaultId};
use guardrail_model::math::realized_slippage_bps;
use guardrail_model::{apply_trade, check_cooldown, check_exposure, check_slippage, Counters};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Result of a committed swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub trade_id: u64,
    pub vault_id: VaultId,
    pub agent: AgentId,
    pub amount: u64,
    pub output: u64,
    pub min_output: u64,
    pub score: u8,
    pub slippage_bps: u64,
    pub balance_after: u64,
    pub traded_today: u64,
    pub receipt_id: ReceiptId,
    pub timestamp_ms: TimestampMs,
    /// Set on the oracle-validated path when validation ran
    pub oracle_deviation_bps: Option<u64>,
}

/// Fully evaluated swap, not yet committed
#[derive(Debug, Clone, Copy)]
pub(crate) struct StagedSwap {
    pub output: u64,
    pub counters: Counters,
}

/// Whether staging executes the venue or only asks for a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settle {
    Execute,
    Quote,
}

impl Settle {
    pub(crate) fn run(self, venue: &dyn SettlementVenue, leg: &SwapLeg) -> Result<u64, VaultError> {
        match self {
            Settle::Execute => venue.settle(leg),
            Settle::Quote => venue.quote(leg),
        }
    }
}

/// Evaluate one swap against the current vault state without touching it
pub(crate) fn stage_swap(
    vault: &Vault,
    cap: &AgentCapability,
    request: &SwapRequest,
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
    settle: Settle,
) -> Result<StagedSwap, VaultError> {
    authorize(vault, cap)?;
    validate_score(request.score)?;
    if request.amount == 0 {
        return Err(VaultError::ZeroAmount);
    }
    check_sequence(vault, request.expected_sequence)?;
    vault.check_protocol(venue.protocol())?;

    let limits = vault.limits();
    let counters = vault.counters();
    check_cooldown(limits, counters, now_ms)?;
    check_exposure(limits, counters, now_ms, request.amount)?;

    let output = settle.run(venue, &request.leg())?;
    check_slippage(output, request.min_output)?;

    let counters = apply_trade(*counters, now_ms, request.amount, output)?;
    debug!(
        "{}: staged swap in={} out={} balance'={}",
        vault.id(),
        request.amount,
        output,
        counters.balance
    );
    Ok(StagedSwap { output, counters })
}

/// Commit a staged swap: counters, event, audit receipt
pub(crate) fn commit_swap(
    vault: &mut Vault,
    agent: &AgentId,
    request: &SwapRequest,
    staged: StagedSwap,
    now_ms: TimestampMs,
    oracle_deviation_bps: Option<u64>,
    sink: &mut dyn EventSink,
) -> TradeReceipt {
    let trade_id = vault.trade_count();
    vault.guardrail.counters = staged.counters;

    info!(
        "{}: trade #{} by {} in={} out={} balance={}",
        vault.id(),
        trade_id,
        agent,
        request.amount,
        staged.output,
        staged.counters.balance
    );
    vault.emit(
        sink,
        now_ms,
        EventKind::TradeExecuted {
            agent: agent.clone(),
            trade_id,
            amount: request.amount,
            output: staged.output,
            min_output: request.min_output,
            score: request.score,
            balance: staged.counters.balance,
            traded_today: staged.counters.total_traded_today,
        },
    );

    let leg = SettledLeg {
        amount: request.amount,
        min_output: request.min_output,
        output: staged.output,
    };
    let receipt_id = vault.record(
        sink,
        ReceiptDraft {
            agent: agent.clone(),
            proof_hash: trade_proof(vault.id(), trade_id, now_ms, request.score, &[leg]),
            amount: request.amount,
            score: request.score,
            status: ReceiptStatus::Executed {
                first_trade_id: trade_id,
                legs: 1,
            },
            timestamp_ms: now_ms,
        },
    );

    TradeReceipt {
        trade_id,
        vault_id: vault.id(),
        agent: agent.clone(),
        amount: request.amount,
        output: staged.output,
        min_output: request.min_output,
        score: request.score,
        slippage_bps: realized_slippage_bps(request.amount, staged.output),
        balance_after: staged.counters.balance,
        traded_today: staged.counters.total_traded_today,
        receipt_id,
        timestamp_ms: now_ms,
        oracle_deviation_bps,
    }
}

/// Process swap instruction
///
/// Runs the guardrail evaluator, settles through `venue`, enforces the
/// slippage floor and only then commits the new counters.
///
/// # Security Checks
/// - Vault is not paused
/// - Capability is bound to this vault, live, and its agent is not frozen
/// - Score in range, amount non-zero, optional sequence matches
/// - Venue protocol passes the whitelist
/// - Cooldown, daily volume, drawdown, funds
/// - Realized output >= min_output
///
/// On rejection nothing in the counters changes; the rejection is recorded
/// as an event and a `Rejected` receipt.
pub fn process_swap(
    vault: &mut Vault,
    cap: &AgentCapability,
    request: &SwapRequest,
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
    sink: &mut dyn EventSink,
) -> Result<TradeReceipt, VaultError> {
    let staged = stage_swap(vault, cap, request, now_ms, venue, Settle::Execute);

    match staged {
        Ok(staged) => Ok(commit_swap(vault, cap.agent(), request, staged, now_ms, None, sink)),
        Err(e) => Err(reject(vault, sink, cap.agent(), e, &[request.leg()], request.score, now_ms)),
    }
}
