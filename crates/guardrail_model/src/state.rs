//! Guardrail counters and tunable limits

/// Length of the rolling volume window (24h in milliseconds)
pub const DAY_MS: u64 = 86_400_000;

/// Basis point denominator (10_000 bps = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Admin-tunable risk parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum loss from peak balance (basis points, 1000 = 10%)
    pub max_drawdown_bps: u64,
    /// Maximum traded input per rolling 24h window (raw units)
    pub daily_volume_limit: u64,
    /// Minimum gap between two trades (milliseconds)
    pub cooldown_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_drawdown_bps: 1_000,            // 10%
            daily_volume_limit: 50_000_000_000, // 50 units at 1e9 precision
            cooldown_ms: 60_000,                // 60 seconds
        }
    }
}

impl Limits {
    /// A drawdown above 100% is meaningless and a zero volume limit bricks the vault
    pub fn is_valid(&self) -> bool {
        self.max_drawdown_bps <= BPS_DENOMINATOR && self.daily_volume_limit > 0
    }
}

/// Running risk counters of one vault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Counters {
    /// Held balance in the smallest indivisible unit
    pub balance: u64,
    /// High-water mark used as the drawdown reference
    pub peak_balance: u64,
    /// Input volume traded inside the current window
    pub total_traded_today: u64,
    /// Start of the current volume window
    pub day_start_ms: u64,
    /// Time of the last committed trade (None before the first trade)
    pub last_trade_ms: Option<u64>,
    /// Committed trades so far; the next trade gets this value as its id
    pub trade_count: u64,
}

impl Counters {
    /// Fresh counters for a vault created at `genesis_ms`
    pub fn genesis(genesis_ms: u64) -> Self {
        Self {
            balance: 0,
            peak_balance: 0,
            total_traded_today: 0,
            day_start_ms: genesis_ms,
            last_trade_ms: None,
            trade_count: 0,
        }
    }

    /// Counters as seen at `now_ms`: if a full window has elapsed the volume
    /// counter restarts at zero and the window begins at `now_ms`
    pub fn rolled(self, now_ms: u64) -> Self {
        if now_ms.saturating_sub(self.day_start_ms) >= DAY_MS {
            Self {
                total_traded_today: 0,
                day_start_ms: now_ms,
                ..self
            }
        } else {
            self
        }
    }
}

/// Complete guardrail state evaluated for every agent action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GuardrailState {
    pub limits: Limits,
    pub counters: Counters,
    /// Emergency kill-switch
    pub paused: bool,
}

impl GuardrailState {
    pub fn new(limits: Limits, genesis_ms: u64) -> Self {
        Self {
            limits,
            counters: Counters::genesis(genesis_ms),
            paused: false,
        }
    }
}
