//! Shared types for the guardrail programs: identities, errors, bps math

pub mod error;
pub mod ids;
pub mod math;

pub use error::*;
pub use ids::*;

/// Milliseconds since the Unix epoch, always supplied by the caller
pub type TimestampMs = u64;
