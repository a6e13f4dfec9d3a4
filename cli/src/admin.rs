//! Vault administration: creation, funds, limits, freeze, pause, whitelist

use anyhow::Result;
use colored::Colorize;
use guardrail_oracle::OracleConfig;
use guardrail_vault::*;

use crate::client::{admin_cap, agent_cap, with_ledger};
use crate::config::CliConfig;

/// Optional overrides on top of a vault's current (or configured) limits
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitOverrides {
    pub max_drawdown_bps: Option<u64>,
    pub daily_volume_limit: Option<u64>,
    pub cooldown_ms: Option<u64>,
}

impl LimitOverrides {
    fn apply(&self, base: Limits) -> Limits {
        Limits {
            max_drawdown_bps: self.max_drawdown_bps.unwrap_or(base.max_drawdown_bps),
            daily_volume_limit: self.daily_volume_limit.unwrap_or(base.daily_volume_limit),
            cooldown_ms: self.cooldown_ms.unwrap_or(base.cooldown_ms),
        }
    }
}

pub async fn init_vault(ctx: &CliConfig, overrides: LimitOverrides) -> Result<VaultId> {
    let limits = overrides.apply(Limits::from(&ctx.settings.limits));
    let oracle = OracleConfig::from(&ctx.settings.oracle);
    let now = ctx.now_ms;

    let id = with_ledger(ctx, |ledger, events| {
        let (id, admin) = ledger.create_vault(ctx.identity.clone(), limits, now, &mut *events)?;
        if oracle != OracleConfig::default() {
            ledger.transact(id, |v| process_update_oracle_config(v, &admin, oracle, now, &mut *events))?;
        }
        Ok(id)
    })
    .await?;

    println!("{}", "=== Vault Created ===".bright_green().bold());
    println!("{} {}", "Vault:".bright_cyan(), id);
    println!("{} {}", "Admin:".bright_cyan(), ctx.identity);
    print_limits(&limits);
    Ok(id)
}

pub async fn deposit(ctx: &CliConfig, vault: VaultId, amount: u64) -> Result<u64> {
    let now = ctx.now_ms;
    let balance = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| process_deposit(v, &admin, amount, now, events))
    })
    .await?;
    println!("{} {} {} {}", "Deposited".bright_green(), amount, "balance:".bright_cyan(), balance);
    Ok(balance)
}

pub async fn withdraw(ctx: &CliConfig, vault: VaultId, amount: u64, recipient: Option<String>) -> Result<u64> {
    let now = ctx.now_ms;
    let recipient = recipient.map(AgentId::new);
    let balance = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| process_withdraw(v, &admin, amount, recipient, now, events))
    })
    .await?;
    println!("{} {} {} {}", "Withdrew".bright_green(), amount, "balance:".bright_cyan(), balance);
    Ok(balance)
}

pub async fn update_limits(ctx: &CliConfig, vault: VaultId, overrides: LimitOverrides) -> Result<Limits> {
    let now = ctx.now_ms;
    let limits = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| {
            let limits = overrides.apply(*v.limits());
            process_update_limits(v, &admin, limits, now, events)?;
            Ok(limits)
        })
    })
    .await?;
    println!("{}", "=== Limits Updated ===".bright_green().bold());
    print_limits(&limits);
    Ok(limits)
}

pub async fn set_frozen(ctx: &CliConfig, vault: VaultId, agent: String, frozen: bool) -> Result<bool> {
    let now = ctx.now_ms;
    let agent = AgentId::new(agent);
    let target = agent.clone();
    let changed = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| {
            if frozen {
                process_freeze_agent(v, &admin, target, now, events)
            } else {
                process_unfreeze_agent(v, &admin, target, now, events)
            }
        })
    })
    .await?;

    let state = if frozen { "frozen".bright_red() } else { "active".bright_green() };
    if changed {
        println!("{} {} {}", "Agent".bright_cyan(), agent, state);
    } else {
        println!("{} {} {} {}", "Agent".bright_cyan(), agent, "already".dimmed(), state);
    }
    Ok(changed)
}

pub async fn set_paused(ctx: &CliConfig, vault: VaultId, paused: bool) -> Result<bool> {
    let now = ctx.now_ms;
    let changed = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| process_set_paused(v, &admin, paused, now, events))
    })
    .await?;
    let state = if paused { "PAUSED".bright_red().bold() } else { "ACTIVE".bright_green().bold() };
    println!("{} {}", vault, state);
    Ok(changed)
}

pub async fn reset_peak(ctx: &CliConfig, vault: VaultId) -> Result<u64> {
    let now = ctx.now_ms;
    let peak = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| process_reset_peak(v, &admin, now, events))
    })
    .await?;
    println!("{} {}", "Peak balance reset to".bright_green(), peak);
    Ok(peak)
}

/// Whitelist edits
#[derive(Debug, Clone)]
pub enum WhitelistOp {
    Add(String),
    Remove(String),
    Mode(WhitelistMode),
}

pub async fn whitelist(ctx: &CliConfig, vault: VaultId, op: WhitelistOp) -> Result<()> {
    let now = ctx.now_ms;
    let (listed, mode) = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| {
            match &op {
                WhitelistOp::Add(p) => {
                    process_add_to_whitelist(v, &admin, ProtocolId::new(p.as_str()), now, events)?;
                }
                WhitelistOp::Remove(p) => {
                    process_remove_from_whitelist(v, &admin, ProtocolId::new(p.as_str()), now, events)?;
                }
                WhitelistOp::Mode(mode) => process_set_whitelist_mode(v, &admin, *mode, now, events)?,
            }
            let listed: Vec<String> = v.protocol_whitelist().iter().map(|p| p.to_string()).collect();
            Ok((listed, v.whitelist_mode()))
        })
    })
    .await?;

    println!("{}", "=== Protocol Whitelist ===".bright_green().bold());
    println!("{} {}", "Mode:".bright_cyan(), mode);
    if listed.is_empty() {
        println!("{}", "(empty)".dimmed());
    }
    for p in listed {
        println!("  {}", p);
    }
    Ok(())
}

pub async fn update_oracle_config(
    ctx: &CliConfig,
    vault: VaultId,
    max_slippage_bps: Option<u64>,
    max_staleness_ms: Option<u64>,
    enabled: Option<bool>,
) -> Result<OracleConfig> {
    let now = ctx.now_ms;
    let config = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        ledger.transact(vault, |v| {
            let current = *v.oracle_config();
            let config = OracleConfig {
                max_slippage_bps: max_slippage_bps.unwrap_or(current.max_slippage_bps),
                max_staleness_ms: max_staleness_ms.unwrap_or(current.max_staleness_ms),
                enabled: enabled.unwrap_or(current.enabled),
            };
            process_update_oracle_config(v, &admin, config, now, events)?;
            Ok(config)
        })
    })
    .await?;
    println!("{}", "=== Oracle Config ===".bright_green().bold());
    println!("{} {} bps", "Max slippage:".bright_cyan(), config.max_slippage_bps);
    println!("{} {} ms", "Max staleness:".bright_cyan(), config.max_staleness_ms);
    println!("{} {}", "Enabled:".bright_cyan(), config.enabled);
    Ok(config)
}

pub async fn mint_agent(ctx: &CliConfig, vault: VaultId, agent: String) -> Result<CapabilityId> {
    let now = ctx.now_ms;
    let target = AgentId::new(agent);
    let cap_id = with_ledger(ctx, |ledger, events| {
        let admin = admin_cap(ctx, ledger, vault)?;
        let cap = ledger.transact(vault, |v| mint_agent_capability(v, &admin, target.clone(), now, events))?;
        Ok(cap.id())
    })
    .await?;
    println!("{}", "=== Agent Capability Minted ===".bright_green().bold());
    println!("{} {}", "Vault:".bright_cyan(), vault);
    println!("{} {}", "Agent:".bright_cyan(), target);
    println!("{} #{}", "Capability:".bright_cyan(), cap_id);
    Ok(cap_id)
}

/// Revocation is done by the holder, who surrenders the token
pub async fn revoke_agent(ctx: &CliConfig, vault: VaultId, cap_id: CapabilityId) -> Result<()> {
    let now = ctx.now_ms;
    with_ledger(ctx, |ledger, events| {
        let cap = agent_cap(ctx, ledger, vault, cap_id)?;
        ledger.transact(vault, |v| revoke_agent_capability(v, cap, now, events))
    })
    .await?;
    println!("{} #{} {}", "Capability".bright_cyan(), cap_id, "revoked".bright_red());
    Ok(())
}

pub async fn list_agents(ctx: &CliConfig, vault: VaultId) -> Result<()> {
    let ledger = crate::client::read_ledger(ctx).await?;
    let v = ledger.vault(vault)?;

    println!("{}", "=== Agent Capabilities ===".bright_green().bold());
    if v.capabilities().is_empty() {
        println!("{}", "No live capabilities".dimmed());
    }
    for record in v.capabilities().values() {
        let state = if v.is_frozen(&record.agent) {
            "frozen".bright_red()
        } else {
            "active".bright_green()
        };
        println!(
            "  #{:<4} {:<24} minted@{:<14} {}",
            record.id, record.agent, record.minted_at_ms, state
        );
    }
    Ok(())
}

pub(crate) fn print_limits(limits: &Limits) {
    println!(
        "{} {} bps ({:.2}%)",
        "Max drawdown:".bright_cyan(),
        limits.max_drawdown_bps,
        limits.max_drawdown_bps as f64 / 100.0
    );
    println!("{} {}", "Daily volume limit:".bright_cyan(), limits.daily_volume_limit);
    println!("{} {} ms", "Cooldown:".bright_cyan(), limits.cooldown_ms);
}
