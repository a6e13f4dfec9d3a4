//! Guardrail evaluator
//!
//! Checks run in a fixed order and the first violation wins:
//! 1. pause
//! 2. capability binding (vault match, then frozen)
//! 3. cooldown (strict `now > last + cooldown`)
//! 4. rolling daily volume (window rolled before the check)
//! 5. drawdown from peak (skipped while peak is zero)
//! 6. sufficient funds

use crate::math::drawdown_exceeds;
use crate::state::{Counters, GuardrailState, Limits};

/// A specific guardrail that rejected an action, with the values that tripped it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Violation {
    /// Kill-switch engaged
    Paused,
    /// Capability is bound to another vault
    InvalidAgent,
    /// Agent identity is in the frozen set
    AgentFrozen,
    /// Too soon after the last trade; allowed once `now > ready_after_ms`
    CooldownActive { now_ms: u64, ready_after_ms: u64 },
    /// Window volume would exceed the limit
    VolumeExceeded { requested: u64, traded_today: u64, limit: u64 },
    /// Balance after the debit would sit too far below the peak
    DrawdownExceeded {
        requested: u64,
        projected_balance: u64,
        peak_balance: u64,
        max_drawdown_bps: u64,
    },
    /// Not enough balance to cover the debit
    InsufficientBalance { requested: u64, balance: u64 },
    /// Realized output below the caller's floor
    SlippageExceeded { output: u64, min_output: u64 },
    /// Aggregate loss of a whole batch exceeds the drawdown limit
    PostRebalanceDrawdownExceeded {
        final_balance: u64,
        peak_balance: u64,
        max_drawdown_bps: u64,
    },
    /// Counter arithmetic would overflow
    Overflow,
}

/// Facts about the caller established outside the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Capability vault id equals the target vault id
    pub bound_to_vault: bool,
    /// Caller identity is in the vault's frozen set
    pub frozen: bool,
}

impl Caller {
    /// A correctly bound, unfrozen caller
    pub const AUTHORIZED: Caller = Caller {
        bound_to_vault: true,
        frozen: false,
    };
}

/// Full evaluation of one proposed debit of `amount` at `now_ms`
pub fn evaluate(
    state: &GuardrailState,
    caller: Caller,
    now_ms: u64,
    amount: u64,
) -> Result<(), Violation> {
    check_gate(state, caller)?;
    check_cooldown(&state.limits, &state.counters, now_ms)?;
    check_exposure(&state.limits, &state.counters, now_ms, amount)
}

/// Rules 1 and 2: pause overrides everything, then capability binding
pub fn check_gate(state: &GuardrailState, caller: Caller) -> Result<(), Violation> {
    if state.paused {
        return Err(Violation::Paused);
    }
    if !caller.bound_to_vault {
        return Err(Violation::InvalidAgent);
    }
    if caller.frozen {
        return Err(Violation::AgentFrozen);
    }
    Ok(())
}

/// Rule 3: a trade exactly at the boundary is still blocked
pub fn check_cooldown(limits: &Limits, counters: &Counters, now_ms: u64) -> Result<(), Violation> {
    let Some(last) = counters.last_trade_ms else {
        return Ok(());
    };
    let ready_after_ms = last.saturating_add(limits.cooldown_ms);
    if now_ms > ready_after_ms {
        Ok(())
    } else {
        Err(Violation::CooldownActive { now_ms, ready_after_ms })
    }
}

/// Rules 4 to 6: volume, drawdown, funds
///
/// The volume window is rolled before evaluating, so a trade that opens a new
/// window is measured against an empty counter.
pub fn check_exposure(
    limits: &Limits,
    counters: &Counters,
    now_ms: u64,
    amount: u64,
) -> Result<(), Violation> {
    let counters = counters.rolled(now_ms);

    let traded = counters
        .total_traded_today
        .checked_add(amount)
        .ok_or(Violation::Overflow)?;
    if traded > limits.daily_volume_limit {
        return Err(Violation::VolumeExceeded {
            requested: amount,
            traded_today: counters.total_traded_today,
            limit: limits.daily_volume_limit,
        });
    }

    let projected_balance = counters.balance.saturating_sub(amount);
    if drawdown_exceeds(counters.peak_balance, projected_balance, limits.max_drawdown_bps) {
        return Err(Violation::DrawdownExceeded {
            requested: amount,
            projected_balance,
            peak_balance: counters.peak_balance,
            max_drawdown_bps: limits.max_drawdown_bps,
        });
    }

    if amount > counters.balance {
        return Err(Violation::InsufficientBalance {
            requested: amount,
            balance: counters.balance,
        });
    }

    Ok(())
}

/// Slippage floor on a realized settlement
pub fn check_slippage(output: u64, min_output: u64) -> Result<(), Violation> {
    if output < min_output {
        return Err(Violation::SlippageExceeded { output, min_output });
    }
    Ok(())
}

/// Aggregate post-condition of a batch: final balance against the peak
pub fn check_aggregate_drawdown(limits: &Limits, counters: &Counters) -> Result<(), Violation> {
    if drawdown_exceeds(counters.peak_balance, counters.balance, limits.max_drawdown_bps) {
        return Err(Violation::PostRebalanceDrawdownExceeded {
            final_balance: counters.balance,
            peak_balance: counters.peak_balance,
            max_drawdown_bps: limits.max_drawdown_bps,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DAY_MS;

    fn funded(balance: u64) -> GuardrailState {
        let mut state = GuardrailState::new(Limits::default(), 0);
        state.counters.balance = balance;
        state.counters.peak_balance = balance;
        state
    }

    #[test]
    fn first_trade_is_not_cooled_down() {
        let state = funded(1_000);
        assert_eq!(evaluate(&state, Caller::AUTHORIZED, 0, 10), Ok(()));
    }

    #[test]
    fn cooldown_is_strict() {
        let mut state = funded(1_000);
        state.counters.last_trade_ms = Some(100);
        let c = state.limits.cooldown_ms;

        assert_eq!(
            evaluate(&state, Caller::AUTHORIZED, 100 + c, 10),
            Err(Violation::CooldownActive { now_ms: 100 + c, ready_after_ms: 100 + c })
        );
        assert_eq!(evaluate(&state, Caller::AUTHORIZED, 100 + c + 1, 10), Ok(()));
    }

    #[test]
    fn pause_wins_over_everything() {
        let mut state = funded(0);
        state.paused = true;
        state.counters.last_trade_ms = Some(0);
        let caller = Caller { bound_to_vault: false, frozen: true };
        assert_eq!(evaluate(&state, caller, 0, u64::MAX), Err(Violation::Paused));
    }

    #[test]
    fn binding_checked_before_frozen() {
        let state = funded(1_000);
        let caller = Caller { bound_to_vault: false, frozen: true };
        assert_eq!(evaluate(&state, caller, 0, 1), Err(Violation::InvalidAgent));
        let caller = Caller { bound_to_vault: true, frozen: true };
        assert_eq!(evaluate(&state, caller, 0, 1), Err(Violation::AgentFrozen));
    }

    #[test]
    fn volume_window_resets_before_check() {
        let mut state = funded(10_000_000);
        state.limits.daily_volume_limit = 1_000;
        state.counters.total_traded_today = 900;

        assert_eq!(
            evaluate(&state, Caller::AUTHORIZED, DAY_MS - 1, 101),
            Err(Violation::VolumeExceeded { requested: 101, traded_today: 900, limit: 1_000 })
        );
        assert_eq!(evaluate(&state, Caller::AUTHORIZED, DAY_MS - 1, 100), Ok(()));
        assert_eq!(evaluate(&state, Caller::AUTHORIZED, DAY_MS, 1_000), Ok(()));
    }

    #[test]
    fn drawdown_before_insufficient_balance() {
        let state = funded(1_000);
        match evaluate(&state, Caller::AUTHORIZED, 0, 5_000) {
            Err(Violation::DrawdownExceeded { projected_balance, .. }) => {
                assert_eq!(projected_balance, 0)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn insufficient_balance_when_drawdown_disabled() {
        let mut state = funded(1_000);
        state.limits.max_drawdown_bps = 10_000;
        assert_eq!(
            evaluate(&state, Caller::AUTHORIZED, 0, 1_001),
            Err(Violation::InsufficientBalance { requested: 1_001, balance: 1_000 })
        );
        assert_eq!(evaluate(&state, Caller::AUTHORIZED, 0, 1_000), Ok(()));
    }

    #[test]
    fn empty_vault_bootstrap_skips_drawdown() {
        let state = GuardrailState::new(Limits::default(), 0);
        assert_eq!(
            evaluate(&state, Caller::AUTHORIZED, 0, 1),
            Err(Violation::InsufficientBalance { requested: 1, balance: 0 })
        );
    }

    #[test]
    fn slippage_floor() {
        assert_eq!(check_slippage(100, 100), Ok(()));
        assert_eq!(
            check_slippage(99, 100),
            Err(Violation::SlippageExceeded { output: 99, min_output: 100 })
        );
    }

    #[test]
    fn volume_overflow_is_reported() {
        let mut state = funded(u64::MAX);
        state.limits.daily_volume_limit = u64::MAX;
        state.counters.total_traded_today = u64::MAX;
        assert_eq!(evaluate(&state, Caller::AUTHORIZED, 0, 1), Err(Violation::Overflow));
    }
}
