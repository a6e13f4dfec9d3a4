//! Pure Rust guardrail model for vault risk control
//! No I/O, no logging, no unwrap/panic, all functions total
//!
//! Everything here is a function of explicit inputs (state, caller facts and a
//! caller-supplied `now`). The vault program wraps these functions with
//! capabilities, events and the audit log.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod state;
pub mod math;
pub mod evaluate;
pub mod transitions;
pub mod deposit_withdraw;

#[cfg(test)]
pub mod negative_tests;

// Re-export commonly used types
pub use state::*;
pub use evaluate::*;
pub use transitions::*;
