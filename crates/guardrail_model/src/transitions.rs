//! Counter transitions for committed trades
//!
//! Transitions take counters by value and return new counters, so a caller
//! can stage any number of them on a scratch copy and commit only at the end.

use crate::state::Counters;
use crate::evaluate::Violation;

/// Apply one settled trade: debit `amount`, credit `output`
///
/// The volume window is rolled first, then:
/// - balance' = balance - amount + output
/// - total_traded_today' = total_traded_today + amount
/// - last_trade_ms' = now_ms
/// - trade_count' = trade_count + 1
/// - peak' = max(peak, balance')
///
/// Callers must have passed `check_exposure` for `amount` already; the
/// checked arithmetic here only guards against overflow.
pub fn apply_trade(
    counters: Counters,
    now_ms: u64,
    amount: u64,
    output: u64,
) -> Result<Counters, Violation> {
    let counters = counters.rolled(now_ms);

    let balance = counters
        .balance
        .checked_sub(amount)
        .ok_or(Violation::InsufficientBalance {
            requested: amount,
            balance: counters.balance,
        })?
        .checked_add(output)
        .ok_or(Violation::Overflow)?;

    let total_traded_today = counters
        .total_traded_today
        .checked_add(amount)
        .ok_or(Violation::Overflow)?;

    let trade_count = counters
        .trade_count
        .checked_add(1)
        .ok_or(Violation::Overflow)?;

    Ok(Counters {
        balance,
        peak_balance: counters.peak_balance.max(balance),
        total_traded_today,
        day_start_ms: counters.day_start_ms,
        last_trade_ms: Some(now_ms),
        trade_count,
    })
}

/// Admin reset of the high-water mark to the current balance
pub fn reset_peak(counters: Counters) -> Counters {
    Counters {
        peak_balance: counters.balance,
        ..counters
    }
}
