//! Deposit and withdraw transitions
//!
//! # Properties
//! - deposit: balance' = balance + amount, peak' = max(peak, balance')
//! - withdraw: balance' = balance - amount, peak unchanged
//! - balance never underflows; zero amounts are rejected

use crate::state::Counters;

/// Error types for deposit/withdraw operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsError {
    /// Amount is zero
    ZeroAmount,
    /// Arithmetic overflow
    Overflow,
    /// Withdrawal larger than the held balance
    InsufficientBalance { requested: u64, balance: u64 },
}

/// Apply an admin deposit
pub fn apply_deposit(counters: Counters, amount: u64) -> Result<Counters, FundsError> {
    if amount == 0 {
        return Err(FundsError::ZeroAmount);
    }

    let balance = counters
        .balance
        .checked_add(amount)
        .ok_or(FundsError::Overflow)?;

    Ok(Counters {
        balance,
        peak_balance: counters.peak_balance.max(balance),
        ..counters
    })
}

/// Apply an admin withdrawal
///
/// The peak is deliberately left alone: after a large withdrawal the admin is
/// expected to call `reset_peak` if agents should keep trading.
pub fn apply_withdraw(counters: Counters, amount: u64) -> Result<Counters, FundsError> {
    if amount == 0 {
        return Err(FundsError::ZeroAmount);
    }

    let balance = counters
        .balance
        .checked_sub(amount)
        .ok_or(FundsError::InsufficientBalance {
            requested: amount,
            balance: counters.balance,
        })?;

    Ok(Counters { balance, ..counters })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_raises_balance_and_peak() {
        let c = apply_deposit(Counters::genesis(0), 500).unwrap();
        assert_eq!(c.balance, 500);
        assert_eq!(c.peak_balance, 500);

        let c = apply_withdraw(c, 200).unwrap();
        let c = apply_deposit(c, 100).unwrap();
        assert_eq!(c.balance, 400);
        assert_eq!(c.peak_balance, 500);
    }

    #[test]
    fn zero_amounts_rejected() {
        assert_eq!(apply_deposit(Counters::genesis(0), 0), Err(FundsError::ZeroAmount));
        assert_eq!(apply_withdraw(Counters::genesis(0), 0), Err(FundsError::ZeroAmount));
    }

    #[test]
    fn withdraw_cannot_overdraw() {
        let c = apply_deposit(Counters::genesis(0), 10).unwrap();
        assert_eq!(
            apply_withdraw(c, 11),
            Err(FundsError::InsufficientBalance { requested: 11, balance: 10 })
        );
        assert_eq!(apply_withdraw(c, 10).unwrap().balance, 0);
    }

    #[test]
    fn deposit_overflow() {
        let c = apply_deposit(Counters::genesis(0), u64::MAX).unwrap();
        assert_eq!(apply_deposit(c, 1), Err(FundsError::Overflow));
    }
}
