//! Basis-point arithmetic for drawdown and slippage
//!
//! All comparisons are done by cross-multiplication in u128 so that the
//! boundary cases are exact (no rounding of the bps value before comparing).

use crate::state::BPS_DENOMINATOR;

/// True if moving from `peak` to `projected` loses more than `max_bps`
///
/// A zero peak means nothing was ever deposited; the check trivially passes.
#[inline]
pub fn drawdown_exceeds(peak: u64, projected: u64, max_bps: u64) -> bool {
    if peak == 0 || projected >= peak {
        return false;
    }
    let loss = (peak - projected) as u128;
    loss * (BPS_DENOMINATOR as u128) > (max_bps as u128) * (peak as u128)
}

/// Loss from `peak` to `balance` in basis points, rounded down
#[inline]
pub fn drawdown_bps(peak: u64, balance: u64) -> u64 {
    if peak == 0 || balance >= peak {
        return 0;
    }
    let loss = (peak - balance) as u128;
    (loss * (BPS_DENOMINATOR as u128) / (peak as u128)) as u64
}

/// Realized slippage of a settlement in basis points of the input, rounded down
///
/// An output at or above the input is zero slippage.
#[inline]
pub fn realized_slippage_bps(input: u64, output: u64) -> u64 {
    if input == 0 || output >= input {
        return 0;
    }
    let shortfall = (input - output) as u128;
    (shortfall * (BPS_DENOMINATOR as u128) / (input as u128)) as u64
}

/// Apply a basis-point haircut: amount * (10_000 - bps) / 10_000
#[inline]
pub fn apply_bps_haircut(amount: u64, bps: u64) -> u64 {
    let keep = BPS_DENOMINATOR.saturating_sub(bps) as u128;
    ((amount as u128) * keep / (BPS_DENOMINATOR as u128)) as u64
}
