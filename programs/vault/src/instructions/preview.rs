//! Dry-run of the swap paths against current state

use super::atomic_rebalance::stage_rebalance;
use super::swap::{stage_swap, Settle};
use super::{RebalanceRequest, SwapRequest};
use crate::capability::AgentCapability;
use crate::state::Vault;
use crate::venue::SettlementVenue;
use guardrail_common::{TimestampMs, VaultError};
use guardrail_model::math::{drawdown_bps, realized_slippage_bps};
use serde::{Deserialize, Serialize};

/// What a swap or batch would do if submitted now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPreview {
    pub next_trade_id: u64,
    pub total_input: u64,
    pub expected_output: u64,
    pub max_slippage_bps: u64,
    pub balance_after: u64,
    pub traded_today_after: u64,
    /// Drawdown from the peak the vault would sit at afterwards
    pub drawdown_bps_after: u64,
}

/// Evaluate a swap with every check of `process_swap`, quoting the venue
/// instead of settling; nothing is recorded
pub fn preview_swap(
    vault: &Vault,
    cap: &AgentCapability,
    request: &SwapRequest,
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
) -> Result<SwapPreview, VaultError> {
    let staged = stage_swap(vault, cap, request, now_ms, venue, Settle::Quote)?;
    Ok(SwapPreview {
        next_trade_id: vault.trade_count(),
        total_input: request.amount,
        expected_output: staged.output,
        max_slippage_bps: realized_slippage_bps(request.amount, staged.output),
        balance_after: staged.counters.balance,
        traded_today_after: staged.counters.total_traded_today,
        drawdown_bps_after: drawdown_bps(staged.counters.peak_balance, staged.counters.balance),
    })
}

/// Batch counterpart of `preview_swap`
pub fn preview_rebalance(
    vault: &Vault,
    cap: &AgentCapability,
    request: &RebalanceRequest,
    now_ms: TimestampMs,
    venue: &dyn SettlementVenue,
) -> Result<SwapPreview, VaultError> {
    let staged = stage_rebalance(vault, cap, request, now_ms, venue, Settle::Quote)?;
    let (total_input, expected_output, max_slippage_bps) =
        staged.legs.iter().fold((0u64, 0u64, 0u64), |(input, output, worst), leg| {
            (
                input.saturating_add(leg.settled.amount),
                output.saturating_add(leg.settled.output),
                worst.max(realized_slippage_bps(leg.settled.amount, leg.settled.output)),
            )
        });
    Ok(SwapPreview {
        next_trade_id: vault.trade_count(),
        total_input,
        expected_output,
        max_slippage_bps,
        balance_after: staged.counters.balance,
        traded_today_after: staged.counters.total_traded_today,
        drawdown_bps_after: drawdown_bps(staged.counters.peak_balance, staged.counters.balance),
    })
}
