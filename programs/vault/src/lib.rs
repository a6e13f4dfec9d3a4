//! Vault guardrail engine
//!
//! Capability-gated vault state with guardrail-checked single and atomic
//! multi-swap paths, oracle validation, a hash-chained audit log and
//! structured events. `Ledger` hosts many vaults with one lock per vault.

pub mod audit;
pub mod capability;
pub mod events;
pub mod instructions;
pub mod ledger;
pub mod state;
pub mod venue;

pub use audit::{AuditLog, AuditReceipt, ReceiptId, ReceiptStatus};
pub use capability::{
    mint_agent_capability, revoke_agent_capability, AdminCapability, AgentCapability, CapabilityId,
};
pub use events::{EventKind, EventSink, LogSink, VaultEvent};
pub use instructions::*;
pub use ledger::{Ledger, LedgerSnapshot};
pub use state::{Vault, WhitelistMode};
pub use venue::{FixedSlippageVenue, PassthroughVenue, SettlementVenue};

pub use guardrail_common::{AgentId, ProofHash, ProtocolId, TimestampMs, VaultError, VaultId};
pub use guardrail_model::{Counters, GuardrailState, Limits};
pub use guardrail_oracle::{OracleConfig, PriceAttestation};
