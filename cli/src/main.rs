//! Guardrail CLI - operate guardrail-protected vaults from the command line
//!
//! Every command loads the ledger state file, applies one operation under
//! the vault lock, appends the emitted events to the journal and saves.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use guardrail_vault::{CapabilityId, ProofHash, SwapLeg, VaultError, VaultId, WhitelistMode};
use std::path::PathBuf;

mod admin;
mod client;
mod config;
mod status;
mod store;
mod trading;


use admin::{LimitOverrides, WhitelistOp};
use config::CliConfig;
use trading::{parse_leg, parse_price, PriceSpec, ProofSource, TradeArgs, VenueSpec};

#[derive(Parser)]
#[command(name = "guardrail")]
#[command(about = "Guardrail CLI - risk-gated vault operations for autonomous agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./guardrail.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ledger state file (overrides the config file)
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Identity to act as (overrides the config file)
    #[arg(long = "as", value_name = "IDENTITY")]
    identity: Option<String>,

    /// Clock override, milliseconds since the Unix epoch
    #[arg(long)]
    now: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct TradeOpts {
    /// Agent capability id
    #[arg(long)]
    cap: CapabilityId,

    /// Optimizer score (0-100)
    #[arg(long, default_value = "50")]
    score: u8,

    /// Expected trade sequence number (replay protection)
    #[arg(long)]
    sequence: Option<u64>,

    /// Settlement protocol; omitted means 1:1 settlement with no counter-party
    #[arg(long)]
    venue: Option<String>,

    /// Slippage the venue applies (basis points)
    #[arg(long, default_value = "0")]
    venue_slippage_bps: u64,
}

impl From<TradeOpts> for TradeArgs {
    fn from(o: TradeOpts) -> Self {
        TradeArgs {
            cap: o.cap,
            score: o.score,
            sequence: o.sequence,
            venue: VenueSpec {
                protocol: o.venue,
                slippage_bps: o.venue_slippage_bps,
            },
        }
    }
}

#[derive(Args, Debug, Clone, Copy)]
struct LimitOpts {
    /// Maximum drawdown from peak (basis points)
    #[arg(long)]
    drawdown_bps: Option<u64>,

    /// Maximum input volume per 24h window
    #[arg(long)]
    volume_limit: Option<u64>,

    /// Minimum gap between trades (milliseconds)
    #[arg(long)]
    cooldown_ms: Option<u64>,
}

impl From<LimitOpts> for LimitOverrides {
    fn from(o: LimitOpts) -> Self {
        LimitOverrides {
            max_drawdown_bps: o.drawdown_bps,
            daily_volume_limit: o.volume_limit,
            cooldown_ms: o.cooldown_ms,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a vault administered by the current identity
    Init {
        #[command(flatten)]
        limits: LimitOpts,
    },

    /// Deposit funds (admin)
    Deposit { vault: VaultId, amount: u64 },

    /// Withdraw funds (admin)
    Withdraw {
        vault: VaultId,
        amount: u64,

        /// Recipient recorded on the event
        #[arg(long)]
        to: Option<String>,
    },

    /// Update guardrail limits (admin); omitted values are kept
    Limits {
        vault: VaultId,

        #[command(flatten)]
        limits: LimitOpts,
    },

    /// Freeze an agent identity (admin)
    Freeze { vault: VaultId, agent: String },

    /// Unfreeze an agent identity (admin)
    Unfreeze { vault: VaultId, agent: String },

    /// Engage the kill-switch (admin)
    Pause { vault: VaultId },

    /// Release the kill-switch (admin)
    Resume { vault: VaultId },

    /// Reset the drawdown peak to the current balance (admin)
    ResetPeak { vault: VaultId },

    /// Protocol whitelist management (admin)
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommands,
    },

    /// Update the oracle configuration (admin); omitted values are kept
    OracleConfig {
        vault: VaultId,

        #[arg(long)]
        max_slippage_bps: Option<u64>,

        #[arg(long)]
        max_staleness_ms: Option<u64>,

        #[arg(long)]
        enabled: Option<bool>,
    },

    /// Agent capability management
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Execute one guarded swap
    Swap {
        vault: VaultId,
        amount: u64,
        min_output: u64,

        #[command(flatten)]
        trade: TradeOpts,
    },

    /// Evaluate a swap or batch without executing it
    Preview {
        vault: VaultId,

        /// Leg as AMOUNT:MIN_OUTPUT (repeat for a batch)
        #[arg(long = "leg", value_parser = parse_leg, required = true)]
        legs: Vec<SwapLeg>,

        #[command(flatten)]
        trade: TradeOpts,
    },

    /// Execute a batch of swaps all-or-nothing
    Rebalance {
        vault: VaultId,

        /// Leg as AMOUNT:MIN_OUTPUT (repeat per leg)
        #[arg(long = "leg", value_parser = parse_leg, required = true)]
        legs: Vec<SwapLeg>,

        #[command(flatten)]
        trade: TradeOpts,
    },

    /// Execute one swap after validating a price attestation
    OracleSwap {
        vault: VaultId,
        amount: u64,
        min_output: u64,

        /// Attestation as SYMBOL:ORACLE:EXPECTED[:TIMESTAMP_MS]
        #[arg(long, value_parser = parse_price)]
        price: PriceSpec,

        #[command(flatten)]
        trade: TradeOpts,
    },

    /// Execute a batch after validating one attestation per leg
    OracleRebalance {
        vault: VaultId,

        /// Leg as AMOUNT:MIN_OUTPUT (repeat per leg)
        #[arg(long = "leg", value_parser = parse_leg, required = true)]
        legs: Vec<SwapLeg>,

        /// Attestation as SYMBOL:ORACLE:EXPECTED[:TIMESTAMP_MS] (one per leg)
        #[arg(long = "price", value_parser = parse_price, required = true)]
        prices: Vec<PriceSpec>,

        #[command(flatten)]
        trade: TradeOpts,
    },

    /// Record the proof hash of an off-chain computation
    LogExecution {
        vault: VaultId,

        /// Agent capability id
        #[arg(long)]
        cap: CapabilityId,

        /// SHA-256 hash as hex
        #[arg(long, conflicts_with = "file")]
        hash: Option<ProofHash>,

        /// File whose SHA-256 is recorded
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        amount: u64,

        #[arg(long, default_value = "50")]
        score: u8,
    },

    /// Show vault state (all vaults when none given)
    Status { vault: Option<VaultId> },

    /// List audit receipts and verify the hash chain
    Receipts {
        vault: VaultId,

        /// Only the most recent N receipts
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the event journal
    Events {
        #[arg(long)]
        vault: Option<VaultId>,

        /// Only the most recent N events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Explain an error code (all codes when none given)
    Explain { code: Option<u16> },
}

#[derive(Subcommand)]
enum WhitelistCommands {
    /// Allow settlement through a protocol
    Add { vault: VaultId, protocol: String },

    /// Remove a protocol
    Remove { vault: VaultId, protocol: String },

    /// How an empty whitelist is treated (enforced | permissive)
    Mode { vault: VaultId, mode: WhitelistMode },
}

#[derive(Subcommand)]
enum AgentCommands {
    /// Mint a capability for an agent identity (admin)
    Mint { vault: VaultId, agent: String },

    /// Surrender a capability (holder)
    Revoke { vault: VaultId, cap: CapabilityId },

    /// List live capabilities
    List { vault: VaultId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = CliConfig::new(cli.config.clone(), cli.state.clone(), cli.identity.clone(), cli.now)?;

    if cli.verbose {
        println!("{} {}", "State:".bright_cyan(), config.store.state_path().display());
        println!("{} {}", "Journal:".bright_cyan(), config.store.journal_path().display());
        println!("{} {}", "Identity:".bright_cyan(), config.identity);
        println!("{} {}", "Now:".bright_cyan(), config.now_ms);
    }

    if let Err(e) = run(&config, cli.command).await {
        if let Some(rejection) = e.downcast_ref::<VaultError>() {
            status::print_rejection(rejection);
        }
        return Err(e);
    }
    Ok(())
}

async fn run(config: &CliConfig, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { limits } => {
            admin::init_vault(config, limits.into()).await?;
        }
        Commands::Deposit { vault, amount } => {
            admin::deposit(config, vault, amount).await?;
        }
        Commands::Withdraw { vault, amount, to } => {
            admin::withdraw(config, vault, amount, to).await?;
        }
        Commands::Limits { vault, limits } => {
            admin::update_limits(config, vault, limits.into()).await?;
        }
        Commands::Freeze { vault, agent } => {
            admin::set_frozen(config, vault, agent, true).await?;
        }
        Commands::Unfreeze { vault, agent } => {
            admin::set_frozen(config, vault, agent, false).await?;
        }
        Commands::Pause { vault } => {
            admin::set_paused(config, vault, true).await?;
        }
        Commands::Resume { vault } => {
            admin::set_paused(config, vault, false).await?;
        }
        Commands::ResetPeak { vault } => {
            admin::reset_peak(config, vault).await?;
        }
        Commands::Whitelist { command } => match command {
            WhitelistCommands::Add { vault, protocol } => {
                admin::whitelist(config, vault, WhitelistOp::Add(protocol)).await?;
            }
            WhitelistCommands::Remove { vault, protocol } => {
                admin::whitelist(config, vault, WhitelistOp::Remove(protocol)).await?;
            }
            WhitelistCommands::Mode { vault, mode } => {
                admin::whitelist(config, vault, WhitelistOp::Mode(mode)).await?;
            }
        },
        Commands::OracleConfig { vault, max_slippage_bps, max_staleness_ms, enabled } => {
            admin::update_oracle_config(config, vault, max_slippage_bps, max_staleness_ms, enabled).await?;
        }
        Commands::Agent { command } => match command {
            AgentCommands::Mint { vault, agent } => {
                admin::mint_agent(config, vault, agent).await?;
            }
            AgentCommands::Revoke { vault, cap } => {
                admin::revoke_agent(config, vault, cap).await?;
            }
            AgentCommands::List { vault } => {
                admin::list_agents(config, vault).await?;
            }
        },
        Commands::Swap { vault, amount, min_output, trade } => {
            let leg = SwapLeg { amount, min_output };
            trading::swap(config, vault, &trade.into(), leg).await?;
        }
        Commands::Preview { vault, legs, trade } => {
            trading::preview(config, vault, &trade.into(), legs).await?;
        }
        Commands::Rebalance { vault, legs, trade } => {
            trading::rebalance(config, vault, &trade.into(), legs).await?;
        }
        Commands::OracleSwap { vault, amount, min_output, price, trade } => {
            let leg = SwapLeg { amount, min_output };
            trading::oracle_swap(config, vault, &trade.into(), leg, &price).await?;
        }
        Commands::OracleRebalance { vault, legs, prices, trade } => {
            trading::oracle_rebalance(config, vault, &trade.into(), legs, &prices).await?;
        }
        Commands::LogExecution { vault, cap, hash, file, amount, score } => {
            let proof = match (hash, file) {
                (Some(hash), _) => ProofSource::Hex(hash),
                (None, Some(file)) => ProofSource::File(file),
                (None, None) => anyhow::bail!("Provide the proof with --hash or --file"),
            };
            trading::log_execution(config, vault, cap, proof, amount, score).await?;
        }
        Commands::Status { vault } => {
            status::show_status(config, vault).await?;
        }
        Commands::Receipts { vault, limit } => {
            status::show_receipts(config, vault, limit).await?;
        }
        Commands::Events { vault, limit } => {
            status::show_events(config, vault, limit).await?;
        }
        Commands::Explain { code } => {
            status::explain(code)?;
        }
    }

    Ok(())
}
