//! Guardrail engine behaviour through the public instruction API

use guardrail_vault::audit::{trade_proof, SettledLeg};
use guardrail_vault::*;

// ============================================================================
// Fixture
// ============================================================================

struct Fixture {
    vault: Vault,
    admin: AdminCapability,
    agent: AgentCapability,
    events: Vec<VaultEvent>,
}

fn fixture(balance: u64, limits: Limits) -> Fixture {
    let mut events: Vec<VaultEvent> = Vec::new();
    let (mut vault, admin) = Vault::genesis(VaultId(1), "admin".into(), limits, 0, &mut events).unwrap();
    if balance > 0 {
        process_deposit(&mut vault, &admin, balance, 0, &mut events).unwrap();
    }
    let agent = mint_agent_capability(&mut vault, &admin, "agent".into(), 0, &mut events).unwrap();
    events.clear();
    Fixture {
        vault,
        admin,
        agent,
        events,
    }
}

impl Fixture {
    fn swap(&mut self, amount: u64, min_output: u64, now_ms: u64) -> Result<TradeReceipt, VaultError> {
        process_swap(
            &mut self.vault,
            &self.agent,
            &SwapRequest::new(amount, min_output, 80),
            now_ms,
            &PassthroughVenue,
            &mut self.events,
        )
    }

    fn rebalance(
        &mut self,
        legs: &[(u64, u64)],
        now_ms: u64,
        venue: &dyn SettlementVenue,
    ) -> Result<RebalanceSummary, VaultError> {
        let amounts: Vec<u64> = legs.iter().map(|l| l.0).collect();
        let mins: Vec<u64> = legs.iter().map(|l| l.1).collect();
        let request = RebalanceRequest::from_parts(&amounts, &mins, 75).unwrap();
        process_atomic_rebalance(&mut self.vault, &self.agent, &request, now_ms, venue, &mut self.events)
    }

    fn whitelist(&mut self, protocol: &str) {
        process_add_to_whitelist(&mut self.vault, &self.admin, protocol.into(), 0, &mut self.events).unwrap();
    }

    fn counters(&self) -> (u64, u64, u64) {
        let c = self.vault.counters();
        (c.balance, c.total_traded_today, c.trade_count)
    }
}

fn scenario_limits() -> Limits {
    Limits {
        max_drawdown_bps: 1_000,
        daily_volume_limit: 5_000_000,
        cooldown_ms: 60_000,
    }
}

const PRICE: i64 = 100_000_000;

// ============================================================================
// Section: end-to-end scenario
// ============================================================================

#[test]
fn test_funded_vault_scenario() {
    let mut fx = fixture(10_000_000, scenario_limits());

    let first = fx.swap(800_000, 790_000, 0).unwrap();
    assert_eq!(first.trade_id, 0);
    assert_eq!(first.traded_today, 800_000);

    assert_eq!(
        fx.swap(500_000, 490_000, 1).unwrap_err(),
        VaultError::CooldownActive { now_ms: 1, ready_after_ms: 60_000 }
    );

    let second = fx.swap(500_000, 490_000, 60_001).unwrap();
    assert_eq!(second.trade_id, 1);
    assert_eq!(second.traded_today, 1_300_000);
    assert_eq!(fx.vault.counters().total_traded_today, 1_300_000);
    assert_eq!(fx.vault.balance(), 10_000_000);
    assert_eq!(fx.vault.trade_count(), 2);
}

// ============================================================================
// Section: individual guardrails
// ============================================================================

#[test]
fn test_drawdown_boundary() {
    let limits = Limits { max_drawdown_bps: 1_000, ..Limits::default() };

    let mut fx = fixture(1_000, limits);
    assert!(fx.swap(100, 100, 0).is_ok());

    let mut fx = fixture(1_000, limits);
    assert_eq!(
        fx.swap(101, 101, 0).unwrap_err(),
        VaultError::DrawdownExceeded {
            requested: 101,
            projected_balance: 899,
            peak_balance: 1_000,
            max_drawdown_bps: 1_000,
        }
    );
}

#[test]
fn test_cooldown_monotonicity() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let t = 1_000;
    let c = 60_000;

    fx.swap(1_000, 0, t).unwrap();
    assert!(matches!(fx.swap(1_000, 0, t + c - 1), Err(VaultError::CooldownActive { .. })));
    assert!(matches!(fx.swap(1_000, 0, t + c), Err(VaultError::CooldownActive { .. })));
    assert!(fx.swap(1_000, 0, t + c + 1).is_ok());
}

#[test]
fn test_volume_limit_and_window_reset() {
    let limits = Limits { daily_volume_limit: 1_000_000, cooldown_ms: 0, ..scenario_limits() };
    let mut fx = fixture(10_000_000, limits);

    fx.swap(600_000, 0, 1).unwrap();
    assert_eq!(
        fx.swap(400_001, 0, 2).unwrap_err(),
        VaultError::VolumeExceeded { requested: 400_001, traded_today: 600_000, limit: 1_000_000 }
    );
    fx.swap(400_000, 0, 3).unwrap();

    // a new window opens a full day after vault genesis
    let receipt = fx.swap(1_000_000, 0, 86_400_000).unwrap();
    assert_eq!(receipt.traded_today, 1_000_000);
    assert_eq!(fx.vault.counters().day_start_ms, 86_400_000);
}

#[test]
fn test_insufficient_balance_on_empty_vault() {
    let mut fx = fixture(0, Limits::default());
    assert_eq!(
        fx.swap(1, 0, 0).unwrap_err(),
        VaultError::InsufficientBalance { requested: 1, balance: 0 }
    );
}

#[test]
fn test_slippage_floor_discards_everything() {
    let mut fx = fixture(10_000_000, scenario_limits());
    fx.whitelist("cetus");
    let venue = FixedSlippageVenue::new("cetus", 50).unwrap();
    let before = fx.vault.clone();

    let err = process_swap(
        &mut fx.vault,
        &fx.agent,
        &SwapRequest::new(1_000_000, 996_000, 80),
        0,
        &venue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::SlippageExceeded { output: 995_000, min_output: 996_000 });
    assert_eq!(fx.vault.guardrail_state(), before.guardrail_state());

    let ok = process_swap(
        &mut fx.vault,
        &fx.agent,
        &SwapRequest::new(1_000_000, 995_000, 80),
        0,
        &venue,
        &mut fx.events,
    )
    .unwrap();
    assert_eq!(ok.slippage_bps, 50);
    assert_eq!(ok.balance_after, 9_995_000);
}

#[test]
fn test_zero_amount_and_bad_score() {
    let mut fx = fixture(10_000_000, scenario_limits());
    assert_eq!(fx.swap(0, 0, 0).unwrap_err(), VaultError::ZeroAmount);

    let err = process_swap(
        &mut fx.vault,
        &fx.agent,
        &SwapRequest::new(10, 0, 101),
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::InvalidScore { score: 101 });
    assert_eq!(fx.vault.trade_count(), 0);
}

// ============================================================================
// Section: pause, freeze, capabilities
// ============================================================================

#[test]
fn test_pause_overrides_all_agent_paths() {
    let mut fx = fixture(10_000_000, scenario_limits());
    process_set_paused(&mut fx.vault, &fx.admin, true, 0, &mut fx.events).unwrap();
    let before = fx.counters();

    assert_eq!(fx.swap(1, 0, 0).unwrap_err(), VaultError::Paused);
    assert_eq!(fx.rebalance(&[(1, 0), (1, 0)], 0, &PassthroughVenue).unwrap_err(), VaultError::Paused);

    let att = PriceAttestation::new("SUI", PRICE, PRICE, 0);
    let err = process_oracle_swap(
        &mut fx.vault,
        &fx.agent,
        &SwapRequest::new(1, 0, 80),
        &att,
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::Paused);

    let request = RebalanceRequest::from_parts(&[1], &[0], 80).unwrap();
    let err = process_oracle_atomic_rebalance(
        &mut fx.vault,
        &fx.agent,
        &request,
        &[att],
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::Paused);

    let proof = ProofHash::digest(b"optimizer output");
    let err = process_log_execution(&mut fx.vault, &fx.agent, proof, 1, 80, 0, &mut fx.events).unwrap_err();
    assert_eq!(err, VaultError::Paused);

    // even a frozen agent sees Paused first
    process_freeze_agent(&mut fx.vault, &fx.admin, "agent".into(), 0, &mut fx.events).unwrap();
    assert_eq!(fx.swap(1, 0, 0).unwrap_err(), VaultError::Paused);
    let err = process_log_execution(&mut fx.vault, &fx.agent, proof, 1, 80, 0, &mut fx.events).unwrap_err();
    assert_eq!(err, VaultError::Paused);
    assert!(fx.vault.audit().iter().all(|r| r.status != ReceiptStatus::Logged));

    assert_eq!(fx.counters(), before);

    process_set_paused(&mut fx.vault, &fx.admin, false, 0, &mut fx.events).unwrap();
    process_unfreeze_agent(&mut fx.vault, &fx.admin, "agent".into(), 0, &mut fx.events).unwrap();
    assert!(fx.swap(1, 0, 0).is_ok());
}

#[test]
fn test_frozen_agent_blocked_then_restored() {
    let mut fx = fixture(10_000_000, scenario_limits());
    process_freeze_agent(&mut fx.vault, &fx.admin, "agent".into(), 0, &mut fx.events).unwrap();
    process_freeze_agent(&mut fx.vault, &fx.admin, "agent".into(), 0, &mut fx.events).unwrap();

    assert_eq!(fx.swap(10, 0, 0).unwrap_err(), VaultError::AgentFrozen);
    let err = process_log_execution(&mut fx.vault, &fx.agent, ProofHash::ZERO, 10, 80, 0, &mut fx.events)
        .unwrap_err();
    assert_eq!(err, VaultError::AgentFrozen);
    // freezing keeps the capability record alive
    assert_eq!(fx.vault.capabilities().len(), 1);

    process_unfreeze_agent(&mut fx.vault, &fx.admin, "agent".into(), 0, &mut fx.events).unwrap();
    assert!(fx.swap(10, 0, 0).is_ok());
}

#[test]
fn test_capability_from_other_vault_is_invalid_agent() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let (mut other, other_admin) =
        Vault::genesis(VaultId(2), "admin".into(), scenario_limits(), 0, &mut LogSink).unwrap();
    let foreign = mint_agent_capability(&mut other, &other_admin, "agent".into(), 0, &mut LogSink).unwrap();

    let err = process_swap(
        &mut fx.vault,
        &foreign,
        &SwapRequest::new(10, 0, 80),
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::InvalidAgent);

    // the admin of vault 2 cannot touch vault 1 either
    assert_eq!(
        process_set_paused(&mut fx.vault, &other_admin, true, 0, &mut fx.events),
        Err(VaultError::Unauthorized)
    );
    assert_eq!(fx.vault.trade_count(), 0);
}

#[test]
fn test_revoked_capability_cannot_trade() {
    let ledger = Ledger::new();
    let (id, admin) = ledger.create_vault("admin".into(), scenario_limits(), 0, &mut LogSink).unwrap();
    ledger
        .transact(id, |v| process_deposit(v, &admin, 1_000_000, 0, &mut LogSink))
        .unwrap();
    let cap = ledger
        .transact(id, |v| mint_agent_capability(v, &admin, "agent".into(), 0, &mut LogSink))
        .unwrap();
    let twin = ledger.agent_capability(id, cap.id(), &"agent".into()).unwrap();

    ledger
        .transact(id, |v| revoke_agent_capability(v, cap, 1, &mut LogSink))
        .unwrap();

    let err = ledger
        .transact(id, |v| {
            process_swap(v, &twin, &SwapRequest::new(10, 0, 80), 2, &PassthroughVenue, &mut LogSink)
        })
        .unwrap_err();
    assert_eq!(err, VaultError::InvalidAgent);
    assert!(ledger.agent_capability(id, twin.id(), &"agent".into()).is_err());
}

#[test]
fn test_replayed_request_rejected() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let request = SwapRequest::new(1_000, 0, 80).with_sequence(0);

    process_swap(&mut fx.vault, &fx.agent, &request, 0, &PassthroughVenue, &mut fx.events).unwrap();
    let err = process_swap(&mut fx.vault, &fx.agent, &request, 120_000, &PassthroughVenue, &mut fx.events)
        .unwrap_err();
    assert_eq!(err, VaultError::SequenceMismatch { expected: 0, actual: 1 });
}

// ============================================================================
// Section: whitelist
// ============================================================================

#[test]
fn test_whitelist_enforced_and_permissive() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let venue = FixedSlippageVenue::new("dex", 0).unwrap();
    let request = SwapRequest::new(1_000, 0, 80);

    let err = process_swap(&mut fx.vault, &fx.agent, &request, 0, &venue, &mut fx.events).unwrap_err();
    assert_eq!(err, VaultError::ProtocolNotWhitelisted { protocol: "dex".into() });

    process_set_whitelist_mode(&mut fx.vault, &fx.admin, WhitelistMode::Permissive, 0, &mut fx.events)
        .unwrap();
    process_swap(&mut fx.vault, &fx.agent, &request, 0, &venue, &mut fx.events).unwrap();

    // once anything is listed, permissive mode no longer opens the gate
    fx.whitelist("cetus");
    let err = process_swap(&mut fx.vault, &fx.agent, &request, 120_000, &venue, &mut fx.events).unwrap_err();
    assert!(matches!(err, VaultError::ProtocolNotWhitelisted { .. }));
}

// ============================================================================
// Section: atomic rebalance
// ============================================================================

#[test]
fn test_rebalance_success_summary() {
    let mut fx = fixture(10_000_000, scenario_limits());
    fx.whitelist("cetus");
    let venue = FixedSlippageVenue::new("cetus", 100).unwrap();

    let summary = fx
        .rebalance(&[(500_000, 495_000), (500_000, 495_000), (500_000, 495_000)], 0, &venue)
        .unwrap();

    assert_eq!(summary.trade_ids, vec![0, 1, 2]);
    assert_eq!(summary.total_input, 1_500_000);
    assert_eq!(summary.total_output, 1_485_000);
    assert_eq!(summary.max_slippage_bps, 100);
    assert_eq!(summary.balance_before, 10_000_000);
    assert_eq!(summary.final_balance, 9_985_000);
    assert_eq!(fx.counters(), (9_985_000, 1_500_000, 3));

    let trades = fx
        .events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TradeExecuted { .. }))
        .count();
    let summaries = fx
        .events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::AtomicRebalanceCompleted { .. }))
        .count();
    assert_eq!((trades, summaries), (3, 1));
}

#[test]
fn test_rebalance_rolls_back_on_last_leg_slippage() {
    let mut fx = fixture(10_000_000, scenario_limits());
    fx.whitelist("cetus");
    let venue = FixedSlippageVenue::new("cetus", 100).unwrap();
    let before = fx.counters();

    let err = fx
        .rebalance(&[(500_000, 495_000), (500_000, 495_000), (500_000, 496_000)], 0, &venue)
        .unwrap_err();
    assert_eq!(err, VaultError::SlippageExceeded { output: 495_000, min_output: 496_000 });
    assert_eq!(fx.counters(), before);
}

#[test]
fn test_rebalance_rolls_back_on_cumulative_volume() {
    let limits = Limits { daily_volume_limit: 2_500_000, ..scenario_limits() };
    let mut fx = fixture(10_000_000, limits);
    let before = fx.counters();

    let err = fx
        .rebalance(&[(1_000_000, 0), (1_000_000, 0), (1_000_000, 0)], 0, &PassthroughVenue)
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::VolumeExceeded { requested: 1_000_000, traded_today: 2_000_000, limit: 2_500_000 }
    );
    assert_eq!(fx.counters(), before);
}

#[test]
fn test_rebalance_cooldown_checked_once_per_batch() {
    let mut fx = fixture(10_000_000, scenario_limits());
    fx.rebalance(&[(100, 0), (100, 0)], 0, &PassthroughVenue).unwrap();
    assert!(matches!(
        fx.rebalance(&[(100, 0)], 1, &PassthroughVenue),
        Err(VaultError::CooldownActive { .. })
    ));
    assert!(fx.rebalance(&[(100, 0)], 60_001, &PassthroughVenue).is_ok());
}

#[test]
fn test_rebalance_empty_and_mismatched() {
    assert_eq!(RebalanceRequest::from_parts(&[], &[], 50), Err(VaultError::EmptyBatch));
    assert_eq!(
        RebalanceRequest::from_parts(&[1, 2, 3], &[1, 2], 50),
        Err(VaultError::BatchLengthMismatch { expected: 3, actual: 2 })
    );

    let mut fx = fixture(10_000, scenario_limits());
    let err = process_atomic_rebalance(
        &mut fx.vault,
        &fx.agent,
        &RebalanceRequest::new(Vec::new(), 50),
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::EmptyBatch);
}

// ============================================================================
// Section: oracle paths
// ============================================================================

#[test]
fn test_stale_price_boundary() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let now = 100_000;
    let request = SwapRequest::new(1_000, 0, 80);

    let stale = PriceAttestation::new("SUI", PRICE, PRICE, now - 30_001);
    let err = process_oracle_swap(&mut fx.vault, &fx.agent, &request, &stale, now, &PassthroughVenue, &mut fx.events)
        .unwrap_err();
    assert_eq!(err, VaultError::PriceStale { age_ms: 30_001, max_staleness_ms: 30_000 });
    assert_eq!(fx.vault.trade_count(), 0);

    let at_limit = PriceAttestation::new("SUI", PRICE, PRICE, now - 30_000);
    let receipt =
        process_oracle_swap(&mut fx.vault, &fx.agent, &request, &at_limit, now, &PassthroughVenue, &mut fx.events)
            .unwrap();
    assert_eq!(receipt.oracle_deviation_bps, Some(0));
}

#[test]
fn test_oracle_failure_events() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let att = PriceAttestation::new("SUI", PRICE, 102_000_000, 0);

    let err = process_oracle_swap(
        &mut fx.vault,
        &fx.agent,
        &SwapRequest::new(1_000, 0, 80),
        &att,
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::PriceDeviationExceeded { deviation_bps: 200, max_slippage_bps: 100 });

    let labels: Vec<&str> = fx.events.iter().map(|e| e.kind.label()).collect();
    assert_eq!(
        labels,
        vec!["oracle_validation_failed", "guardrail_triggered", "audit_receipt_created"]
    );

    let invalid = PriceAttestation::new("SUI", 0, PRICE, 0);
    let err = process_oracle_swap(
        &mut fx.vault,
        &fx.agent,
        &SwapRequest::new(1_000, 0, 80),
        &invalid,
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert!(matches!(err, VaultError::PriceInvalid { .. }));
}

#[test]
fn test_oracle_rebalance_reports_max_deviation() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let request = RebalanceRequest::from_parts(&[1_000, 2_000], &[0, 0], 90).unwrap();
    let atts = vec![
        PriceAttestation::new("SUI", PRICE, 100_500_000, 0),
        PriceAttestation::new("USDC", PRICE, 99_200_000, 0),
    ];

    let err = process_oracle_atomic_rebalance(
        &mut fx.vault,
        &fx.agent,
        &request,
        &atts[..1],
        0,
        &PassthroughVenue,
        &mut fx.events,
    )
    .unwrap_err();
    assert_eq!(err, VaultError::BatchLengthMismatch { expected: 2, actual: 1 });

    let summary =
        process_oracle_atomic_rebalance(&mut fx.vault, &fx.agent, &request, &atts, 0, &PassthroughVenue, &mut fx.events)
            .unwrap();
    assert_eq!(summary.oracle_max_deviation_bps, Some(80));
    assert_eq!(summary.trade_ids, vec![0, 1]);
}

#[test]
fn test_oracle_disabled_only_by_flag() {
    let mut fx = fixture(10_000_000, scenario_limits());
    let junk = PriceAttestation::new("SUI", -1, PRICE, 0);
    let request = SwapRequest::new(1_000, 0, 80);

    assert!(process_oracle_swap(&mut fx.vault, &fx.agent, &request, &junk, 0, &PassthroughVenue, &mut fx.events)
        .is_err());

    let off = OracleConfig { enabled: false, ..OracleConfig::default() };
    process_update_oracle_config(&mut fx.vault, &fx.admin, off, 0, &mut fx.events).unwrap();
    let receipt = process_oracle_swap(&mut fx.vault, &fx.agent, &request, &junk, 0, &PassthroughVenue, &mut fx.events)
        .unwrap();
    assert_eq!(receipt.oracle_deviation_bps, None);
}

// ============================================================================
// Section: audit log and events
// ============================================================================

#[test]
fn test_audit_trail_records_every_decision() {
    let mut fx = fixture(10_000_000, scenario_limits());
    fx.swap(800_000, 790_000, 0).unwrap();
    fx.swap(500_000, 490_000, 1).unwrap_err();

    let proof = ProofHash::digest(b"optimizer output v1");
    let logged = process_log_execution(&mut fx.vault, &fx.agent, proof, 800_000, 80, 3, &mut fx.events).unwrap();

    let audit = fx.vault.audit();
    assert_eq!(audit.verify(), Ok(3));

    let executed = audit.get(0).unwrap();
    assert_eq!(executed.status, ReceiptStatus::Executed { first_trade_id: 0, legs: 1 });
    assert_eq!(
        executed.proof_hash,
        trade_proof(
            VaultId(1),
            0,
            0,
            80,
            &[SettledLeg { amount: 800_000, min_output: 790_000, output: 800_000 }]
        )
    );

    assert!(matches!(
        audit.get(1).unwrap().status,
        ReceiptStatus::Rejected { error: VaultError::CooldownActive { .. } }
    ));

    let receipt = audit.get(logged).unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Logged);
    assert_eq!(receipt.proof_hash, proof);
    assert_eq!(receipt.agent.as_str(), "agent");
}

#[test]
fn test_log_execution_refusals_are_recorded() {
    let mut fx = fixture(1_000, scenario_limits());
    let (mut other, other_admin) =
        Vault::genesis(VaultId(2), "admin".into(), scenario_limits(), 0, &mut LogSink).unwrap();
    let foreign = mint_agent_capability(&mut other, &other_admin, "agent".into(), 0, &mut LogSink).unwrap();
    let proof = ProofHash::digest(b"optimizer output v2");

    let err = process_log_execution(&mut fx.vault, &foreign, proof, 1, 50, 0, &mut fx.events).unwrap_err();
    assert_eq!(err, VaultError::InvalidAgent);

    fx.events.clear();
    let err = process_log_execution(&mut fx.vault, &fx.agent, proof, 7, 200, 1, &mut fx.events).unwrap_err();
    assert_eq!(err, VaultError::InvalidScore { score: 200 });
    assert_eq!(
        fx.events[0].kind,
        EventKind::GuardrailTriggered {
            agent: "agent".into(),
            violation: err.clone(),
            requested_amount: 7,
            balance: 1_000,
        }
    );

    // both refusals keep the supplied hash on the chain
    let audit = fx.vault.audit();
    assert_eq!(audit.verify(), Ok(2));
    assert!(audit.iter().all(|r| r.proof_hash == proof));
    assert_eq!(audit.get(1).unwrap().status, ReceiptStatus::Rejected { error: err });
}

#[test]
fn test_rejection_event_carries_violation_and_balance() {
    let mut fx = fixture(10_000_000, scenario_limits());
    fx.swap(800_000, 0, 0).unwrap();
    fx.events.clear();
    fx.swap(500_000, 0, 1).unwrap_err();

    let triggered = fx
        .events
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::GuardrailTriggered { violation, requested_amount, balance, .. } => {
                Some((violation.clone(), *requested_amount, *balance))
            }
            _ => None,
        })
        .unwrap();
    assert!(matches!(triggered.0, VaultError::CooldownActive { .. }));
    assert_eq!(triggered.1, 500_000);
    assert_eq!(triggered.2, 10_000_000);
}

// ============================================================================
// Section: preview
// ============================================================================

#[test]
fn test_preview_is_side_effect_free() {
    let mut fx = fixture(10_000_000, scenario_limits());
    fx.whitelist("cetus");
    let venue = FixedSlippageVenue::new("cetus", 30).unwrap();
    let request = SwapRequest::new(1_000_000, 990_000, 80);
    let before = fx.vault.clone();

    let preview = preview_swap(&fx.vault, &fx.agent, &request, 0, &venue).unwrap();
    assert_eq!(fx.vault, before);
    assert_eq!(preview.expected_output, 997_000);
    assert_eq!(preview.balance_after, 9_997_000);
    assert_eq!(preview.drawdown_bps_after, 3);

    let receipt = process_swap(&mut fx.vault, &fx.agent, &request, 0, &venue, &mut fx.events).unwrap();
    assert_eq!(receipt.balance_after, preview.balance_after);

    assert!(matches!(
        preview_swap(&fx.vault, &fx.agent, &request, 1, &venue),
        Err(VaultError::CooldownActive { .. })
    ));
    let batch = RebalanceRequest::from_parts(&[100, 100], &[0, 0], 80).unwrap();
    let batch_preview = preview_rebalance(&fx.vault, &fx.agent, &batch, 60_001, &venue).unwrap();
    assert_eq!(batch_preview.total_input, 200);
    assert_eq!(batch_preview.next_trade_id, 1);
}
