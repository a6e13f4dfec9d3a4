//! Price attestation validation
//!
//! Attestations are supplied by the caller for each oracle-validated swap and
//! discarded after validation. Checks run in order: price sign, staleness,
//! deviation between the oracle price and the price the agent expected.

use guardrail_common::math::{deviation_exceeds, price_deviation_bps};
use guardrail_common::{TimestampMs, VaultError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Upper bound for `max_slippage_bps` (10%)
pub const MAX_SLIPPAGE_BPS_CEILING: u64 = 1_000;

/// Lower bound for `max_staleness_ms` (1 second)
pub const MIN_STALENESS_MS: u64 = 1_000;

/// Oracle parameters, shared by both oracle paths of a vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Maximum allowed deviation between oracle and expected price
    pub max_slippage_bps: u64,
    /// Maximum attestation age
    pub max_staleness_ms: u64,
    /// When false, attestations are not checked at all
    pub enabled: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_slippage_bps: 100,   // 1%
            max_staleness_ms: 30_000, // 30 seconds
            enabled: true,
        }
    }
}

impl OracleConfig {
    /// Build a config, rejecting out-of-range parameters
    pub fn new(max_slippage_bps: u64, max_staleness_ms: u64, enabled: bool) -> Result<Self, VaultError> {
        let config = Self {
            max_slippage_bps,
            max_staleness_ms,
            enabled,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if self.max_slippage_bps > MAX_SLIPPAGE_BPS_CEILING || self.max_staleness_ms < MIN_STALENESS_MS {
            return Err(VaultError::InvalidOracleConfig {
                max_slippage_bps: self.max_slippage_bps,
                max_staleness_ms: self.max_staleness_ms,
            });
        }
        Ok(())
    }
}

/// One externally supplied price, in 1e8 fixed point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAttestation {
    pub asset_symbol: String,
    pub oracle_price: i64,
    pub expected_price: i64,
    pub oracle_timestamp_ms: TimestampMs,
}

impl PriceAttestation {
    pub fn new(
        asset_symbol: impl Into<String>,
        oracle_price: i64,
        expected_price: i64,
        oracle_timestamp_ms: TimestampMs,
    ) -> Self {
        Self {
            asset_symbol: asset_symbol.into(),
            oracle_price,
            expected_price,
            oracle_timestamp_ms,
        }
    }

    /// Age at `now_ms`; attestations from the future have age zero
    pub fn age_ms(&self, now_ms: TimestampMs) -> u64 {
        now_ms.saturating_sub(self.oracle_timestamp_ms)
    }
}

/// Outcome of a passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCheck {
    /// Observed deviation, 0 when validation is disabled
    pub deviation_bps: u64,
    /// False when the config disabled validation
    pub validated: bool,
}

/// Validate a single attestation at `now_ms`
pub fn validate_attestation(
    config: &OracleConfig,
    attestation: &PriceAttestation,
    now_ms: TimestampMs,
) -> Result<PriceCheck, VaultError> {
    if !config.enabled {
        debug!("oracle validation disabled, skipping {}", attestation.asset_symbol);
        return Ok(PriceCheck {
            deviation_bps: 0,
            validated: false,
        });
    }

    if attestation.oracle_price <= 0 || attestation.expected_price <= 0 {
        warn!(
            "invalid price for {}: oracle={} expected={}",
            attestation.asset_symbol, attestation.oracle_price, attestation.expected_price
        );
        return Err(VaultError::PriceInvalid {
            oracle_price: attestation.oracle_price,
            expected_price: attestation.expected_price,
        });
    }

    let age_ms = attestation.age_ms(now_ms);
    if age_ms > config.max_staleness_ms {
        warn!(
            "stale price for {}: age {}ms > {}ms",
            attestation.asset_symbol, age_ms, config.max_staleness_ms
        );
        return Err(VaultError::PriceStale {
            age_ms,
            max_staleness_ms: config.max_staleness_ms,
        });
    }

    // oracle_price > 0 here, so the deviation is always defined
    let deviation_bps = price_deviation_bps(attestation.oracle_price, attestation.expected_price)
        .unwrap_or(u64::MAX);
    if deviation_exceeds(attestation.oracle_price, attestation.expected_price, config.max_slippage_bps) {
        warn!(
            "price deviation for {}: {}bps > {}bps",
            attestation.asset_symbol, deviation_bps, config.max_slippage_bps
        );
        return Err(VaultError::PriceDeviationExceeded {
            deviation_bps,
            max_slippage_bps: config.max_slippage_bps,
        });
    }

    debug!(
        "price ok for {}: deviation {}bps, age {}ms",
        attestation.asset_symbol, deviation_bps, age_ms
    );
    Ok(PriceCheck {
        deviation_bps,
        validated: true,
    })
}

/// Validate one attestation per batch entry, returning the largest deviation
///
/// `expected_len` is the number of swap entries; a different number of
/// attestations is a `BatchLengthMismatch`.
pub fn validate_batch(
    config: &OracleConfig,
    attestations: &[PriceAttestation],
    expected_len: usize,
    now_ms: TimestampMs,
) -> Result<u64, VaultError> {
    if attestations.len() != expected_len {
        return Err(VaultError::BatchLengthMismatch {
            expected: expected_len,
            actual: attestations.len(),
        });
    }

    let mut max_deviation_bps = 0;
    for attestation in attestations {
        let check = validate_attestation(config, attestation, now_ms)?;
        max_deviation_bps = max_deviation_bps.max(check.deviation_bps);
    }
    Ok(max_deviation_bps)
}
