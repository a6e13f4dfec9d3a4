//! Log execution instruction - record the proof of an off-chain computation

use super::{authorize, refuse, validate_score};
use crate::audit::{ReceiptDraft, ReceiptId, ReceiptStatus};
use crate::capability::AgentCapability;
use crate::events::EventSink;
use crate::state::Vault;
use guardrail_common::{ProofHash, TimestampMs, VaultError};
use log::info;

/// Process log execution instruction
///
/// Stores `proof_hash` (e.g. the SHA-256 of the full optimizer output) with
/// the trade metadata as a `Logged` receipt.
///
/// # Security Checks
/// - Vault is not paused
/// - Capability is bound to this vault, live, and its agent is not frozen
/// - Score in range
///
/// A refused call keeps the supplied hash in a `Rejected` receipt.
pub fn process_log_execution(
    vault: &mut Vault,
    cap: &AgentCapability,
    proof_hash: ProofHash,
    amount: u64,
    score: u8,
    now_ms: TimestampMs,
    sink: &mut dyn EventSink,
) -> Result<ReceiptId, VaultError> {
    let status = match authorize(vault, cap).and_then(|()| validate_score(score)) {
        Ok(()) => ReceiptStatus::Logged,
        Err(e) => ReceiptStatus::Rejected {
            error: refuse(vault, sink, cap.agent(), e, amount, now_ms),
        },
    };

    let receipt_id = vault.record(
        sink,
        ReceiptDraft {
            agent: cap.agent().clone(),
            proof_hash,
            amount,
            score,
            status: status.clone(),
            timestamp_ms: now_ms,
        },
    );
    if let ReceiptStatus::Rejected { error } = status {
        return Err(error);
    }

    info!(
        "{}: receipt #{} logged by {} proof={}",
        vault.id(),
        receipt_id,
        cap.agent(),
        proof_hash
    );
    Ok(receipt_id)
}
