//! Admin instructions
//!
//! Every handler requires the vault's `AdminCapability`. Pause does not apply
//! here: the admin must be able to act on a paused vault. A refused call
//! emits `GuardrailTriggered` naming the admin and leaves the vault as it was.

use super::refuse;
use crate::capability::AdminCapability;
use crate::events::{EventKind, EventSink};
use crate::state::{Vault, WhitelistMode};
use guardrail_common::{AgentId, ProtocolId, TimestampMs, VaultError};
use guardrail_model::deposit_withdraw::{apply_deposit, apply_withdraw};
use guardrail_model::{reset_peak, Limits};
use guardrail_oracle::OracleConfig;
use log::{info, warn};

/// Bound check for calls that move no funds
fn authorize_admin(
    vault: &Vault,
    admin: &AdminCapability,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<(), VaultError> {
    admin
        .check(vault.id())
        .map_err(|e| refuse(vault, sink, admin.holder(), e, 0, now_ms))
}

/// Process deposit instruction
///
/// Credits the vault and raises the peak if the new balance is above it.
/// Returns the new balance.
pub fn process_deposit(
    vault: &mut Vault,
    admin: &AdminCapability,
    amount: u64,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<u64, VaultError> {
    let counters = admin
        .check(vault.id())
        .and_then(|()| apply_deposit(*vault.counters(), amount).map_err(VaultError::from))
        .map_err(|e| refuse(vault, sink, admin.holder(), e, amount, now_ms))?;
    vault.guardrail.counters = counters;

    info!("{}: deposit {} balance={}", vault.id(), amount, counters.balance);
    vault.emit(
        sink,
        now_ms,
        EventKind::Deposited {
            admin: admin.holder().clone(),
            amount,
            balance: counters.balance,
            peak_balance: counters.peak_balance,
        },
    );
    Ok(counters.balance)
}

/// Process withdraw instruction
///
/// The peak is left alone, so a large withdrawal tightens the drawdown room
/// for agents until the admin resets the peak. Returns the new balance.
pub fn process_withdraw(
    vault: &mut Vault,
    admin: &AdminCapability,
    amount: u64,
    recipient: Option<AgentId>,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<u64, VaultError> {
    let counters = admin
        .check(vault.id())
        .and_then(|()| apply_withdraw(*vault.counters(), amount).map_err(VaultError::from))
        .map_err(|e| refuse(vault, sink, admin.holder(), e, amount, now_ms))?;
    vault.guardrail.counters = counters;

    info!("{}: withdraw {} balance={}", vault.id(), amount, counters.balance);
    vault.emit(
        sink,
        now_ms,
        EventKind::Withdrawn {
            admin: admin.holder().clone(),
            amount,
            recipient,
            balance: counters.balance,
        },
    );
    Ok(counters.balance)
}

pub fn process_update_limits(
    vault: &mut Vault,
    admin: &AdminCapability,
    limits: Limits,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<(), VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    if !limits.is_valid() {
        let invalid = VaultError::InvalidLimits {
            max_drawdown_bps: limits.max_drawdown_bps,
            daily_volume_limit: limits.daily_volume_limit,
        };
        return Err(refuse(vault, sink, admin.holder(), invalid, 0, now_ms));
    }
    vault.guardrail.limits = limits;

    info!(
        "{}: limits drawdown={}bps volume={} cooldown={}ms",
        vault.id(),
        limits.max_drawdown_bps,
        limits.daily_volume_limit,
        limits.cooldown_ms
    );
    vault.emit(
        sink,
        now_ms,
        EventKind::LimitsUpdated {
            admin: admin.holder().clone(),
            limits,
        },
    );
    Ok(())
}

/// Freeze an agent identity; returns false if it was already frozen
pub fn process_freeze_agent(
    vault: &mut Vault,
    admin: &AdminCapability,
    agent: AgentId,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<bool, VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    if !vault.frozen_agents.insert(agent.clone()) {
        return Ok(false);
    }
    warn!("{}: agent {} frozen", vault.id(), agent);
    vault.emit(
        sink,
        now_ms,
        EventKind::AgentFrozen {
            admin: admin.holder().clone(),
            agent,
        },
    );
    Ok(true)
}

/// Unfreeze an agent identity; returns false if it was not frozen
pub fn process_unfreeze_agent(
    vault: &mut Vault,
    admin: &AdminCapability,
    agent: AgentId,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<bool, VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    if !vault.frozen_agents.remove(&agent) {
        return Ok(false);
    }
    info!("{}: agent {} unfrozen", vault.id(), agent);
    vault.emit(
        sink,
        now_ms,
        EventKind::AgentUnfrozen {
            admin: admin.holder().clone(),
            agent,
        },
    );
    Ok(true)
}

/// Engage or release the kill-switch; returns false if nothing changed
pub fn process_set_paused(
    vault: &mut Vault,
    admin: &AdminCapability,
    paused: bool,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<bool, VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    if vault.guardrail.paused == paused {
        return Ok(false);
    }
    vault.guardrail.paused = paused;

    if paused {
        warn!("{}: PAUSED, all agent calls blocked", vault.id());
    } else {
        info!("{}: resumed", vault.id());
    }
    vault.emit(
        sink,
        now_ms,
        EventKind::PausedChanged {
            admin: admin.holder().clone(),
            paused,
        },
    );
    Ok(true)
}

/// Reset the high-water mark to the current balance
pub fn process_reset_peak(
    vault: &mut Vault,
    admin: &AdminCapability,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<u64, VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    let counters = reset_peak(*vault.counters());
    vault.guardrail.counters = counters;

    info!("{}: peak reset to {}", vault.id(), counters.peak_balance);
    vault.emit(
        sink,
        now_ms,
        EventKind::PeakReset {
            admin: admin.holder().clone(),
            peak_balance: counters.peak_balance,
        },
    );
    Ok(counters.peak_balance)
}

/// Returns false if the protocol was already listed
pub fn process_add_to_whitelist(
    vault: &mut Vault,
    admin: &AdminCapability,
    protocol: ProtocolId,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<bool, VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    if !vault.protocol_whitelist.insert(protocol.clone()) {
        return Ok(false);
    }
    info!("{}: protocol {} whitelisted", vault.id(), protocol);
    vault.emit(
        sink,
        now_ms,
        EventKind::ProtocolWhitelisted {
            admin: admin.holder().clone(),
            protocol,
        },
    );
    Ok(true)
}

/// Returns false if the protocol was not listed
pub fn process_remove_from_whitelist(
    vault: &mut Vault,
    admin: &AdminCapability,
    protocol: ProtocolId,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<bool, VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    if !vault.protocol_whitelist.remove(&protocol) {
        return Ok(false);
    }
    info!("{}: protocol {} removed from whitelist", vault.id(), protocol);
    vault.emit(
        sink,
        now_ms,
        EventKind::ProtocolRemoved {
            admin: admin.holder().clone(),
            protocol,
        },
    );
    Ok(true)
}

pub fn process_set_whitelist_mode(
    vault: &mut Vault,
    admin: &AdminCapability,
    mode: WhitelistMode,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<(), VaultError> {
    authorize_admin(vault, admin, now_ms, sink)?;
    vault.whitelist_mode = mode;
    if mode == WhitelistMode::Permissive {
        warn!("{}: whitelist is PERMISSIVE (demo mode)", vault.id());
    }
    vault.emit(
        sink,
        now_ms,
        EventKind::WhitelistModeChanged {
            admin: admin.holder().clone(),
            mode,
        },
    );
    Ok(())
}

pub fn process_update_oracle_config(
    vault: &mut Vault,
    admin: &AdminCapability,
    config: OracleConfig,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<(), VaultError> {
    admin
        .check(vault.id())
        .and_then(|()| config.validate())
        .map_err(|e| refuse(vault, sink, admin.holder(), e, 0, now_ms))?;
    vault.oracle = config;

    if !config.enabled {
        warn!("{}: oracle validation DISABLED", vault.id());
    }
    info!(
        "{}: oracle slippage={}bps staleness={}ms",
        vault.id(),
        config.max_slippage_bps,
        config.max_staleness_ms
    );
    vault.emit(
        sink,
        now_ms,
        EventKind::OracleConfigUpdated {
            admin: admin.holder().clone(),
            config,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{LogSink, VaultEvent};
    use guardrail_common::VaultId;

    fn setup() -> (Vault, AdminCapability) {
        Vault::genesis(VaultId(1), "admin".into(), Limits::default(), 0, &mut LogSink).unwrap()
    }

    #[test]
    fn test_deposit_raises_peak_withdraw_does_not_lower() {
        let (mut v, admin) = setup();
        assert_eq!(process_deposit(&mut v, &admin, 1_000, 0, &mut LogSink), Ok(1_000));
        assert_eq!(process_withdraw(&mut v, &admin, 400, None, 0, &mut LogSink), Ok(600));
        assert_eq!(v.peak_balance(), 1_000);
        assert_eq!(process_reset_peak(&mut v, &admin, 0, &mut LogSink), Ok(600));
    }

    #[test]
    fn test_zero_and_overdrawn_amounts() {
        let (mut v, admin) = setup();
        assert_eq!(process_deposit(&mut v, &admin, 0, 0, &mut LogSink), Err(VaultError::ZeroAmount));
        assert_eq!(
            process_withdraw(&mut v, &admin, 1, None, 0, &mut LogSink),
            Err(VaultError::InsufficientBalance { requested: 1, balance: 0 })
        );
    }

    #[test]
    fn test_foreign_admin_rejected_everywhere() {
        let (mut v, _) = setup();
        let (_, other) =
            Vault::genesis(VaultId(2), "admin".into(), Limits::default(), 0, &mut LogSink).unwrap();
        let before = v.clone();

        assert_eq!(process_deposit(&mut v, &other, 5, 0, &mut LogSink), Err(VaultError::Unauthorized));
        assert_eq!(process_set_paused(&mut v, &other, true, 0, &mut LogSink), Err(VaultError::Unauthorized));
        assert_eq!(
            process_freeze_agent(&mut v, &other, "bot".into(), 0, &mut LogSink),
            Err(VaultError::Unauthorized)
        );
        assert_eq!(v, before);
    }

    #[test]
    fn test_freeze_is_idempotent() {
        let (mut v, admin) = setup();
        let mut events: Vec<VaultEvent> = Vec::new();

        assert_eq!(process_freeze_agent(&mut v, &admin, "bot".into(), 0, &mut events), Ok(true));
        let once = v.clone();
        assert_eq!(process_freeze_agent(&mut v, &admin, "bot".into(), 0, &mut events), Ok(false));
        assert_eq!(v, once);
        assert_eq!(events.len(), 1);

        assert_eq!(process_unfreeze_agent(&mut v, &admin, "bot".into(), 0, &mut events), Ok(true));
        assert_eq!(process_unfreeze_agent(&mut v, &admin, "bot".into(), 0, &mut events), Ok(false));
        assert!(!v.is_frozen(&"bot".into()));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_limits_validation() {
        let (mut v, admin) = setup();
        let bad = Limits { daily_volume_limit: 0, ..Limits::default() };
        assert!(matches!(
            process_update_limits(&mut v, &admin, bad, 0, &mut LogSink),
            Err(VaultError::InvalidLimits { .. })
        ));
        assert_eq!(v.limits(), &Limits::default());
    }

    #[test]
    fn test_oracle_config_validation() {
        let (mut v, admin) = setup();
        let bad = OracleConfig { max_slippage_bps: 1_001, ..OracleConfig::default() };
        assert!(process_update_oracle_config(&mut v, &admin, bad, 0, &mut LogSink).is_err());

        let off = OracleConfig { enabled: false, ..OracleConfig::default() };
        process_update_oracle_config(&mut v, &admin, off, 0, &mut LogSink).unwrap();
        assert!(!v.oracle_config().enabled);
    }

    #[test]
    fn test_whitelist_add_remove() {
        let (mut v, admin) = setup();
        assert_eq!(process_add_to_whitelist(&mut v, &admin, "cetus".into(), 0, &mut LogSink), Ok(true));
        assert_eq!(process_add_to_whitelist(&mut v, &admin, "cetus".into(), 0, &mut LogSink), Ok(false));
        assert_eq!(process_remove_from_whitelist(&mut v, &admin, "cetus".into(), 0, &mut LogSink), Ok(true));
        assert!(v.protocol_whitelist().is_empty());
    }

    #[test]
    fn test_pause_toggle_reports_change() {
        let (mut v, admin) = setup();
        assert_eq!(process_set_paused(&mut v, &admin, true, 0, &mut LogSink), Ok(true));
        assert_eq!(process_set_paused(&mut v, &admin, true, 0, &mut LogSink), Ok(false));
        assert!(v.is_paused());
        assert_eq!(process_set_paused(&mut v, &admin, false, 0, &mut LogSink), Ok(true));
    }

    #[test]
    fn test_refused_withdraw_emits_guardrail_event() {
        let (mut v, admin) = setup();
        process_deposit(&mut v, &admin, 1_000, 0, &mut LogSink).unwrap();
        let before = v.clone();
        let mut events: Vec<VaultEvent> = Vec::new();

        let err = process_withdraw(&mut v, &admin, 5_000, None, 9, &mut events).unwrap_err();
        assert_eq!(err, VaultError::InsufficientBalance { requested: 5_000, balance: 1_000 });
        assert_eq!(v, before);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp_ms, 9);
        assert_eq!(
            events[0].kind,
            EventKind::GuardrailTriggered {
                agent: "admin".into(),
                violation: err,
                requested_amount: 5_000,
                balance: 1_000,
            }
        );

        let err = process_deposit(&mut v, &admin, 0, 9, &mut events).unwrap_err();
        assert_eq!(err, VaultError::ZeroAmount);
        assert!(events[1].kind.is_rejection());
    }

    #[test]
    fn test_foreign_admin_and_bad_config_are_announced() {
        let (mut v, _) = setup();
        let (_, other) =
            Vault::genesis(VaultId(2), "mallory".into(), Limits::default(), 0, &mut LogSink).unwrap();
        let mut events: Vec<VaultEvent> = Vec::new();

        assert!(process_set_paused(&mut v, &other, true, 0, &mut events).is_err());
        assert!(matches!(
            &events[0].kind,
            EventKind::GuardrailTriggered { agent, violation: VaultError::Unauthorized, .. } if agent.as_str() == "mallory"
        ));
        assert_eq!(events[0].vault_id, VaultId(1));

        let (mut v, admin) = setup();
        let bad = OracleConfig { max_staleness_ms: 10, ..OracleConfig::default() };
        assert!(process_update_oracle_config(&mut v, &admin, bad, 0, &mut events).is_err());
        assert!(matches!(
            events[1].kind,
            EventKind::GuardrailTriggered { violation: VaultError::InvalidOracleConfig { .. }, .. }
        ));
        assert_eq!(v.oracle_config(), &OracleConfig::default());
    }

    #[test]
    fn test_admin_events_name_the_admin() {
        let (mut v, admin) = setup();
        let mut events: Vec<VaultEvent> = Vec::new();
        process_deposit(&mut v, &admin, 10, 0, &mut events).unwrap();
        process_set_paused(&mut v, &admin, true, 0, &mut events).unwrap();
        process_freeze_agent(&mut v, &admin, "bot".into(), 0, &mut events).unwrap();

        assert_eq!(
            events[0].kind,
            EventKind::Deposited {
                admin: "admin".into(),
                amount: 10,
                balance: 10,
                peak_balance: 10,
            }
        );
        assert_eq!(events[1].kind, EventKind::PausedChanged { admin: "admin".into(), paused: true });
        assert!(events[2].to_string().contains("by=admin agent=bot"));
    }
}
