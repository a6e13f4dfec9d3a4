//! Settlement venues
//!
//! A venue converts the debited input of one swap leg into an output amount.
//! Venues run synchronously under the vault lock and are treated as black
//! boxes: the engine only sees the realized output. Venues are `Send + Sync`
//! so one can be shared across host tasks.

use crate::instructions::SwapLeg;
use guardrail_common::math::BPS;
use guardrail_common::{ProtocolId, VaultError};

pub trait SettlementVenue: Send + Sync {
    /// Counter-party identity checked against the whitelist; None for
    /// in-process settlement with no external counter-party
    fn protocol(&self) -> Option<&ProtocolId>;

    /// Execute one leg and return the realized output
    fn settle(&self, leg: &SwapLeg) -> Result<u64, VaultError>;

    /// Output the venue would return now, without executing
    fn quote(&self, leg: &SwapLeg) -> Result<u64, VaultError> {
        self.settle(leg)
    }
}

/// Output equals input; used when no real venue is wired in
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughVenue;

impl SettlementVenue for PassthroughVenue {
    fn protocol(&self) -> Option<&ProtocolId> {
        None
    }

    fn settle(&self, leg: &SwapLeg) -> Result<u64, VaultError> {
        Ok(leg.amount)
    }
}

/// Named venue that loses a fixed number of basis points per leg
#[derive(Debug, Clone)]
pub struct FixedSlippageVenue {
    protocol: ProtocolId,
    slippage_bps: u64,
}

impl FixedSlippageVenue {
    pub fn new(protocol: impl Into<ProtocolId>, slippage_bps: u64) -> Result<Self, VaultError> {
        if slippage_bps > BPS as u64 {
            return Err(VaultError::SettlementFailed {
                reason: format!("slippage {}bps above 100%", slippage_bps),
            });
        }
        Ok(Self {
            protocol: protocol.into(),
            slippage_bps,
        })
    }

    pub fn slippage_bps(&self) -> u64 {
        self.slippage_bps
    }
}

impl SettlementVenue for FixedSlippageVenue {
    fn protocol(&self) -> Option<&ProtocolId> {
        Some(&self.protocol)
    }

    fn settle(&self, leg: &SwapLeg) -> Result<u64, VaultError> {
        Ok(guardrail_model::math::apply_bps_haircut(leg.amount, self.slippage_bps))
    }
}

impl<V: SettlementVenue + ?Sized> SettlementVenue for &V {
    fn protocol(&self) -> Option<&ProtocolId> {
        (**self).protocol()
    }

    fn settle(&self, leg: &SwapLeg) -> Result<u64, VaultError> {
        (**self).settle(leg)
    }

    fn quote(&self, leg: &SwapLeg) -> Result<u64, VaultError> {
        (**self).quote(leg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(amount: u64) -> SwapLeg {
        SwapLeg { amount, min_output: 0 }
    }

    #[test]
    fn passthrough_returns_input() {
        assert_eq!(PassthroughVenue.settle(&leg(1_234)), Ok(1_234));
        assert!(PassthroughVenue.protocol().is_none());
    }

    #[test]
    fn fixed_slippage_haircut() {
        let venue = FixedSlippageVenue::new("cetus", 50).unwrap();
        assert_eq!(venue.settle(&leg(1_000_000)), Ok(995_000));
        assert_eq!(venue.quote(&leg(1_000_000)), Ok(995_000));
        assert_eq!(venue.protocol().map(|p| p.as_str()), Some("cetus"));
    }

    #[test]
    fn fixed_slippage_rejects_over_100_percent() {
        assert!(FixedSlippageVenue::new("cetus", 10_001).is_err());
    }
}
