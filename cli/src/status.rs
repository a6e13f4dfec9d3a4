//! Read-only views: vault status, audit receipts, event journal, error codes

use anyhow::Result;
use colored::Colorize;
use guardrail_common::{describe_code, Severity, ERROR_TABLE};
use guardrail_vault::*;
use guardrail_model::math::drawdown_bps;

use crate::admin::print_limits;
use crate::client::read_ledger;
use crate::config::CliConfig;

pub async fn show_status(ctx: &CliConfig, vault: Option<VaultId>) -> Result<()> {
    let ledger = read_ledger(ctx).await?;
    let ids = match vault {
        Some(id) => vec![id],
        None => ledger.vault_ids(),
    };
    if ids.is_empty() {
        println!("{}", "No vaults. Create one with `guardrail init`.".dimmed());
        return Ok(());
    }

    for id in ids {
        let v = ledger.vault(id)?;
        let c = v.counters();
        println!("{}", format!("=== {} ===", id).bright_green().bold());
        println!("{} {}", "Admin:".bright_cyan(), v.admin());
        let state = if v.is_paused() { "PAUSED".bright_red().bold() } else { "ACTIVE".bright_green().bold() };
        println!("{} {}", "State:".bright_cyan(), state);
        println!("{} {}", "Balance:".bright_cyan(), c.balance);
        println!(
            "{} {} (drawdown {} bps)",
            "Peak:".bright_cyan(),
            c.peak_balance,
            drawdown_bps(c.peak_balance, c.balance)
        );
        println!(
            "{} {} (remaining {})",
            "Traded today:".bright_cyan(),
            c.total_traded_today,
            v.remaining_volume(ctx.now_ms)
        );
        println!("{} {}", "Trades:".bright_cyan(), c.trade_count);
        match c.last_trade_ms {
            Some(ms) => println!("{} {}", "Last trade:".bright_cyan(), ms),
            None => println!("{} {}", "Last trade:".bright_cyan(), "never".dimmed()),
        }
        print_limits(v.limits());

        let oracle = v.oracle_config();
        println!(
            "{} slippage {} bps, staleness {} ms, {}",
            "Oracle:".bright_cyan(),
            oracle.max_slippage_bps,
            oracle.max_staleness_ms,
            if oracle.enabled { "enabled" } else { "disabled" }
        );

        let mode = match v.whitelist_mode() {
            WhitelistMode::Permissive => v.whitelist_mode().to_string().bright_yellow(),
            WhitelistMode::Enforced => v.whitelist_mode().to_string().normal(),
        };
        let listed: Vec<String> = v.protocol_whitelist().iter().map(|p| p.to_string()).collect();
        println!("{} [{}] {}", "Whitelist:".bright_cyan(), mode, listed.join(", "));

        let frozen: Vec<String> = v.frozen_agents().iter().map(|a| a.to_string()).collect();
        if !frozen.is_empty() {
            println!("{} {}", "Frozen:".bright_red(), frozen.join(", "));
        }
        println!("{} {}", "Agents:".bright_cyan(), v.capabilities().len());
        println!("{} {}", "Receipts:".bright_cyan(), v.audit().len());
        println!();
    }
    Ok(())
}

/// List receipts and verify the hash chain; returns the number verified
pub async fn show_receipts(ctx: &CliConfig, vault: VaultId, limit: Option<usize>) -> Result<usize> {
    let ledger = read_ledger(ctx).await?;
    let v = ledger.vault(vault)?;
    let audit = v.audit();

    println!("{}", format!("=== Receipts for {} ===", vault).bright_green().bold());
    let skip = limit.map_or(0, |n| audit.len().saturating_sub(n));
    for r in audit.iter().skip(skip) {
        let status = match &r.status {
            ReceiptStatus::Logged => "logged".bright_blue(),
            ReceiptStatus::Executed { first_trade_id, legs } => {
                format!("executed #{} x{}", first_trade_id, legs).bright_green()
            }
            ReceiptStatus::Rejected { error } => format!("rejected {}", error.name()).bright_red(),
        };
        println!(
            "  #{:<5} [{}] {:<16} amount={:<12} score={:<3} {} {}",
            r.id,
            r.timestamp_ms,
            r.agent,
            r.amount,
            r.score,
            status,
            r.proof_hash.to_hex().dimmed()
        );
    }

    let verified = audit.verify()?;
    println!(
        "\n{} {} receipts, head {}",
        "Chain verified:".bright_green(),
        verified,
        audit.head()
    );
    Ok(verified)
}

pub async fn show_events(ctx: &CliConfig, vault: Option<VaultId>, limit: Option<usize>) -> Result<Vec<VaultEvent>> {
    let events: Vec<VaultEvent> = ctx
        .store
        .read_events()
        .await?
        .into_iter()
        .filter(|e| vault.map_or(true, |id| e.vault_id == id))
        .collect();
    let skip = limit.map_or(0, |n| events.len().saturating_sub(n));

    println!("{}", "=== Events ===".bright_green().bold());
    for event in events.iter().skip(skip) {
        let line = event.to_string();
        if event.kind.is_rejection() {
            println!("{}", line.bright_red());
        } else {
            println!("{}", line);
        }
    }
    Ok(events)
}

/// Print the error map entry for `code`, or the whole table
pub fn explain(code: Option<u16>) -> Result<()> {
    match code {
        Some(code) => {
            let info = describe_code(code).ok_or_else(|| anyhow::anyhow!("Unknown error code: {}", code))?;
            println!("{} {} ({})", format!("[{}]", info.code).bright_cyan(), info.name.bold(), paint(info.severity));
            println!("{}", info.message);
            println!("{} {}", "Recovery:".bright_cyan(), info.recovery);
        }
        None => {
            for info in ERROR_TABLE {
                println!("{:>4}  {:<32} {}", info.code, info.name, paint(info.severity));
            }
        }
    }
    Ok(())
}

/// Operator-facing rendering of an engine rejection
pub fn print_rejection(e: &VaultError) {
    println!(
        "{} {} (code {}, {})",
        "Rejected:".bright_red().bold(),
        e,
        e.code(),
        paint(e.severity())
    );
    println!("{} {}", "Recovery:".bright_cyan(), e.recovery());
    if e.signals_replenishment() {
        println!("{}", "Vault needs replenishment or a peak reset before agents can trade again.".yellow());
    }
}

fn paint(severity: Severity) -> colored::ColoredString {
    let label = severity.to_string();
    match severity {
        Severity::Warning => label.yellow(),
        Severity::Error => label.bright_red(),
        Severity::Critical => label.red().bold(),
    }
}
