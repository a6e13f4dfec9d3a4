//! Agent operations: swaps, atomic rebalances, oracle paths, previews, proofs

use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;
use guardrail_common::math::{format_price, PRICE_DECIMALS, PRICE_MULTIPLIER};
use guardrail_vault::*;
use std::path::PathBuf;

use crate::client::{agent_cap, read_ledger, with_ledger};
use crate::config::CliConfig;

/// Counter-party used for settlement
#[derive(Debug, Clone, Default)]
pub struct VenueSpec {
    /// Protocol identity; None settles 1:1 with no counter-party
    pub protocol: Option<String>,
    pub slippage_bps: u64,
}

impl VenueSpec {
    fn build(&self) -> Result<Box<dyn SettlementVenue>> {
        match &self.protocol {
            None => Ok(Box::new(PassthroughVenue)),
            Some(p) => Ok(Box::new(FixedSlippageVenue::new(p.as_str(), self.slippage_bps)?)),
        }
    }
}

/// Fields shared by every agent trade command
#[derive(Debug, Clone)]
pub struct TradeArgs {
    pub cap: CapabilityId,
    pub score: u8,
    pub sequence: Option<u64>,
    pub venue: VenueSpec,
}

/// An attestation as typed on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSpec {
    pub symbol: String,
    pub oracle_price: i64,
    pub expected_price: i64,
    /// Attestation time; None means "now"
    pub timestamp_ms: Option<u64>,
}

impl PriceSpec {
    fn attest(&self, now_ms: u64) -> PriceAttestation {
        PriceAttestation::new(
            self.symbol.clone(),
            self.oracle_price,
            self.expected_price,
            self.timestamp_ms.unwrap_or(now_ms),
        )
    }
}

/// Where the proof hash of `log-execution` comes from
#[derive(Debug, Clone)]
pub enum ProofSource {
    Hex(ProofHash),
    File(PathBuf),
}

/// `AMOUNT:MIN_OUTPUT`
pub fn parse_leg(s: &str) -> Result<SwapLeg, String> {
    let (amount, min_output) = s
        .split_once(':')
        .ok_or_else(|| format!("expected AMOUNT:MIN_OUTPUT, got '{}'", s))?;
    Ok(SwapLeg {
        amount: amount.trim().parse().map_err(|_| format!("invalid amount '{}'", amount))?,
        min_output: min_output
            .trim()
            .parse()
            .map_err(|_| format!("invalid min output '{}'", min_output))?,
    })
}

/// `SYMBOL:ORACLE:EXPECTED[:TIMESTAMP_MS]`, prices as decimals (e.g. `1.25`)
pub fn parse_price(s: &str) -> Result<PriceSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(format!("expected SYMBOL:ORACLE:EXPECTED[:TIMESTAMP_MS], got '{}'", s));
    }
    let timestamp_ms = match parts.get(3) {
        Some(ts) => Some(ts.parse().map_err(|_| format!("invalid timestamp '{}'", ts))?),
        None => None,
    };
    Ok(PriceSpec {
        symbol: parts[0].to_string(),
        oracle_price: parse_price_value(parts[1])?,
        expected_price: parse_price_value(parts[2])?,
        timestamp_ms,
    })
}

/// Decimal price to 1e8 fixed point
pub fn parse_price_value(s: &str) -> Result<i64, String> {
    let invalid = || format!("invalid price '{}'", s);
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty())
        || frac.len() > PRICE_DECIMALS as usize
        || !all_digits(whole)
        || !all_digits(frac)
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let frac: i64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = PRICE_DECIMALS as usize)
            .parse()
            .map_err(|_| invalid())?
    };
    let value = whole
        .checked_mul(PRICE_MULTIPLIER)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| format!("price '{}' out of range", s))?;
    Ok(if negative { -value } else { value })
}

fn single_request(trade: &TradeArgs, leg: SwapLeg) -> SwapRequest {
    let request = SwapRequest::new(leg.amount, leg.min_output, trade.score);
    match trade.sequence {
        Some(seq) => request.with_sequence(seq),
        None => request,
    }
}

fn batch_request(trade: &TradeArgs, legs: Vec<SwapLeg>) -> RebalanceRequest {
    let request = RebalanceRequest::new(legs, trade.score);
    match trade.sequence {
        Some(seq) => request.with_sequence(seq),
        None => request,
    }
}

pub async fn swap(ctx: &CliConfig, vault: VaultId, trade: &TradeArgs, leg: SwapLeg) -> Result<TradeReceipt> {
    let venue = trade.venue.build()?;
    let request = single_request(trade, leg);
    let now = ctx.now_ms;
    let receipt = with_ledger(ctx, |ledger, events| {
        let cap = agent_cap(ctx, ledger, vault, trade.cap)?;
        ledger.transact(vault, |v| process_swap(v, &cap, &request, now, venue.as_ref(), events))
    })
    .await?;
    print_trade("=== Swap Executed ===", &receipt);
    Ok(receipt)
}

pub async fn oracle_swap(
    ctx: &CliConfig,
    vault: VaultId,
    trade: &TradeArgs,
    leg: SwapLeg,
    price: &PriceSpec,
) -> Result<TradeReceipt> {
    let venue = trade.venue.build()?;
    let request = single_request(trade, leg);
    let now = ctx.now_ms;
    let attestation = price.attest(now);
    let receipt = with_ledger(ctx, |ledger, events| {
        let cap = agent_cap(ctx, ledger, vault, trade.cap)?;
        ledger.transact(vault, |v| {
            process_oracle_swap(v, &cap, &request, &attestation, now, venue.as_ref(), events)
        })
    })
    .await?;
    print_trade("=== Oracle Swap Executed ===", &receipt);
    Ok(receipt)
}

pub async fn rebalance(
    ctx: &CliConfig,
    vault: VaultId,
    trade: &TradeArgs,
    legs: Vec<SwapLeg>,
) -> Result<RebalanceSummary> {
    let venue = trade.venue.build()?;
    let request = batch_request(trade, legs);
    let now = ctx.now_ms;
    let summary = with_ledger(ctx, |ledger, events| {
        let cap = agent_cap(ctx, ledger, vault, trade.cap)?;
        ledger.transact(vault, |v| process_atomic_rebalance(v, &cap, &request, now, venue.as_ref(), events))
    })
    .await?;
    print_summary("=== Atomic Rebalance Executed ===", &summary);
    Ok(summary)
}

pub async fn oracle_rebalance(
    ctx: &CliConfig,
    vault: VaultId,
    trade: &TradeArgs,
    legs: Vec<SwapLeg>,
    prices: &[PriceSpec],
) -> Result<RebalanceSummary> {
    let venue = trade.venue.build()?;
    let request = batch_request(trade, legs);
    let now = ctx.now_ms;
    let attestations: Vec<PriceAttestation> = prices.iter().map(|p| p.attest(now)).collect();
    for a in &attestations {
        debug!(
            "attestation {} oracle={} expected={}",
            a.asset_symbol,
            format_price(a.oracle_price),
            format_price(a.expected_price)
        );
    }
    let summary = with_ledger(ctx, |ledger, events| {
        let cap = agent_cap(ctx, ledger, vault, trade.cap)?;
        ledger.transact(vault, |v| {
            process_oracle_atomic_rebalance(v, &cap, &request, &attestations, now, venue.as_ref(), events)
        })
    })
    .await?;
    print_summary("=== Oracle Rebalance Executed ===", &summary);
    Ok(summary)
}

/// Dry run of one leg (swap) or several (rebalance); nothing is saved
pub async fn preview(ctx: &CliConfig, vault: VaultId, trade: &TradeArgs, legs: Vec<SwapLeg>) -> Result<SwapPreview> {
    let venue = trade.venue.build()?;
    let ledger = read_ledger(ctx).await?;
    let cap = agent_cap(ctx, &ledger, vault, trade.cap)?;
    let now = ctx.now_ms;

    let preview = if legs.len() == 1 {
        let request = single_request(trade, legs[0]);
        ledger.transact(vault, |v| preview_swap(v, &cap, &request, now, venue.as_ref()))?
    } else {
        let request = batch_request(trade, legs);
        ledger.transact(vault, |v| preview_rebalance(v, &cap, &request, now, venue.as_ref()))?
    };

    println!("{}", "=== Preview (not executed) ===".bright_yellow().bold());
    println!("{} #{}", "Next trade:".bright_cyan(), preview.next_trade_id);
    println!("{} {}", "Total input:".bright_cyan(), preview.total_input);
    println!("{} {}", "Expected output:".bright_cyan(), preview.expected_output);
    println!("{} {} bps", "Max slippage:".bright_cyan(), preview.max_slippage_bps);
    println!("{} {}", "Balance after:".bright_cyan(), preview.balance_after);
    println!("{} {}", "Traded today after:".bright_cyan(), preview.traded_today_after);
    println!("{} {} bps", "Drawdown after:".bright_cyan(), preview.drawdown_bps_after);
    Ok(preview)
}

pub async fn log_execution(
    ctx: &CliConfig,
    vault: VaultId,
    cap_id: CapabilityId,
    proof: ProofSource,
    amount: u64,
    score: u8,
) -> Result<ReceiptId> {
    let proof_hash = match proof {
        ProofSource::Hex(hash) => hash,
        ProofSource::File(path) => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read proof file: {}", path.display()))?;
            ProofHash::digest(&data)
        }
    };
    let now = ctx.now_ms;
    let receipt_id = with_ledger(ctx, |ledger, events| {
        let cap = agent_cap(ctx, ledger, vault, cap_id)?;
        ledger.transact(vault, |v| process_log_execution(v, &cap, proof_hash, amount, score, now, events))
    })
    .await?;
    println!("{}", "=== Execution Logged ===".bright_green().bold());
    println!("{} #{}", "Receipt:".bright_cyan(), receipt_id);
    println!("{} {}", "Proof:".bright_cyan(), proof_hash);
    Ok(receipt_id)
}

fn print_trade(title: &str, r: &TradeReceipt) {
    println!("{}", title.bright_green().bold());
    println!("{} {}", "Vault:".bright_cyan(), r.vault_id);
    println!("{} #{}", "Trade:".bright_cyan(), r.trade_id);
    println!("{} {} -> {} (min {})", "Amount:".bright_cyan(), r.amount, r.output, r.min_output);
    println!("{} {} bps", "Slippage:".bright_cyan(), r.slippage_bps);
    if let Some(dev) = r.oracle_deviation_bps {
        println!("{} {} bps", "Oracle deviation:".bright_cyan(), dev);
    }
    println!("{} {}", "Balance:".bright_cyan(), r.balance_after);
    println!("{} {}", "Traded today:".bright_cyan(), r.traded_today);
    println!("{} #{}", "Receipt:".bright_cyan(), r.receipt_id);
}

fn print_summary(title: &str, s: &RebalanceSummary) {
    println!("{}", title.bright_green().bold());
    println!("{} {}", "Vault:".bright_cyan(), s.vault_id);
    for (id, leg) in s.trade_ids.iter().zip(&s.legs) {
        println!("  #{:<6} {} -> {} (min {})", id, leg.amount, leg.output, leg.min_output);
    }
    println!("{} {} -> {}", "Total:".bright_cyan(), s.total_input, s.total_output);
    println!("{} {} bps", "Max slippage:".bright_cyan(), s.max_slippage_bps);
    if let Some(dev) = s.oracle_max_deviation_bps {
        println!("{} {} bps", "Max oracle deviation:".bright_cyan(), dev);
    }
    println!("{} {} -> {}", "Balance:".bright_cyan(), s.balance_before, s.final_balance);
    println!("{} #{}", "Receipt:".bright_cyan(), s.receipt_id);
}
