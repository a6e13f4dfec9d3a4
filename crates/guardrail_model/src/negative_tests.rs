//! Negative tests: rejected actions never change state
//!
//! These tests ensure that:
//! - Every rejection leaves counters byte-for-byte unchanged
//! - Hostile inputs (u64::MAX amounts, stale clocks) fail cleanly
//! - Staged transitions can be discarded without side effects

use crate::deposit_withdraw::*;
use crate::evaluate::*;
use crate::state::*;
use crate::transitions::*;

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Helper to create a funded, already-traded state
    // ========================================================================

    fn create_test_state() -> GuardrailState {
        let mut state = GuardrailState::new(
            Limits {
                max_drawdown_bps: 1_000,
                daily_volume_limit: 5_000_000,
                cooldown_ms: 60_000,
            },
            0,
        );
        state.counters = apply_deposit(state.counters, 10_000_000).unwrap();
        state.counters = apply_trade(state.counters, 0, 800_000, 800_000).unwrap();
        state
    }

    /// Evaluate then apply, the way the vault program does it
    fn try_trade(state: &mut GuardrailState, caller: Caller, now: u64, amount: u64) -> Result<(), Violation> {
        evaluate(state, caller, now, amount)?;
        state.counters = apply_trade(state.counters, now, amount, amount)?;
        Ok(())
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    #[test]
    fn unbound_caller_rejected_without_mutation() {
        let mut state = create_test_state();
        let before = state;
        let caller = Caller { bound_to_vault: false, frozen: false };

        assert_eq!(try_trade(&mut state, caller, 120_000, 1), Err(Violation::InvalidAgent));
        assert_eq!(state, before, "unbound caller must not change counters");
    }

    #[test]
    fn frozen_caller_rejected_without_mutation() {
        let mut state = create_test_state();
        let before = state;
        let caller = Caller { bound_to_vault: true, frozen: true };

        assert_eq!(try_trade(&mut state, caller, 120_000, 1), Err(Violation::AgentFrozen));
        assert_eq!(state, before);
    }

    #[test]
    fn paused_rejects_even_tiny_trades() {
        let mut state = create_test_state();
        state.paused = true;
        let before = state;

        for amount in [0, 1, 100, 1_000_000] {
            assert_eq!(
                try_trade(&mut state, Caller::AUTHORIZED, 10 * DAY_MS, amount),
                Err(Violation::Paused)
            );
        }
        assert_eq!(state, before);
    }

    // ========================================================================
    // Hostile amounts and clocks
    // ========================================================================

    #[test]
    fn max_amount_rejected_cleanly() {
        let mut state = create_test_state();
        let before = state;

        let err = try_trade(&mut state, Caller::AUTHORIZED, 120_000, u64::MAX).unwrap_err();
        assert_eq!(err, Violation::Overflow);
        assert_eq!(state, before);

        let err = try_trade(&mut state, Caller::AUTHORIZED, 120_000, 4_200_001).unwrap_err();
        assert!(matches!(err, Violation::VolumeExceeded { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn clock_before_last_trade_is_cooldown() {
        let mut state = create_test_state();
        state.counters.last_trade_ms = Some(1_000_000);
        let before = state;

        let err = try_trade(&mut state, Caller::AUTHORIZED, 0, 1).unwrap_err();
        assert!(matches!(err, Violation::CooldownActive { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn rolled_window_not_committed_on_rejection() {
        let mut state = create_test_state();
        state.limits.max_drawdown_bps = 0;
        let before = state;

        // window would roll at this time, but the trade fails drawdown
        let err = try_trade(&mut state, Caller::AUTHORIZED, 2 * DAY_MS, 1).unwrap_err();
        assert!(matches!(err, Violation::DrawdownExceeded { .. }));
        assert_eq!(state.counters.day_start_ms, before.counters.day_start_ms);
        assert_eq!(state.counters.total_traded_today, 800_000);
    }

    // ========================================================================
    // Staged batches
    // ========================================================================

    #[test]
    fn discarded_scratch_copy_leaves_original() {
        let state = create_test_state();
        let mut scratch = state.counters;

        for _ in 0..3 {
            scratch = apply_trade(scratch, 200_000, 1_000, 900).unwrap();
        }
        assert_eq!(scratch.trade_count, 4);
        assert_eq!(state.counters.trade_count, 1);
        assert_eq!(state.counters.balance, 10_000_000);
    }

    #[test]
    fn aggregate_drawdown_catches_compounding() {
        let mut state = create_test_state();
        state.limits.max_drawdown_bps = 500;
        let mut scratch = state.counters;

        // each leg loses 30% of a 100_000 input; stage them without per-leg gating
        for _ in 0..20 {
            scratch = apply_trade(scratch, 200_000, 100_000, 70_000).unwrap();
        }
        // 20 * 30_000 = 600_000 lost from a 10_000_000 peak = 6% > 5%
        let err = check_aggregate_drawdown(&state.limits, &scratch).unwrap_err();
        assert_eq!(
            err,
            Violation::PostRebalanceDrawdownExceeded {
                final_balance: 9_400_000,
                peak_balance: 10_000_000,
                max_drawdown_bps: 500,
            }
        );
    }

    #[test]
    fn withdraw_rejection_keeps_balance() {
        let state = create_test_state();
        let err = apply_withdraw(state.counters, 10_000_001).unwrap_err();
        assert!(matches!(err, FundsError::InsufficientBalance { .. }));
    }
}
