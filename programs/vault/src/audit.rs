//! Append-only, hash-chained audit receipts
//!
//! Each receipt stores the digest of its predecessor and a SHA-256 digest of
//! its own fields. Receipts are never edited or removed; `verify` recomputes
//! the chain so tampering with a persisted log is detectable.

use guardrail_common::{AgentId, ProofHash, TimestampMs, VaultError, VaultId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Position of a receipt in its vault's log
pub type ReceiptId = u64;

const RECEIPT_DOMAIN: &[u8] = b"guardrail-receipt-v1";
const TRADE_DOMAIN: &[u8] = b"guardrail-trade-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Caller-supplied proof of an off-chain computation
    Logged,
    /// Committed trade (`legs` > 1 for an atomic rebalance)
    Executed { first_trade_id: u64, legs: u32 },
    /// Agent call blocked by a guardrail or validation
    Rejected { error: VaultError },
}

impl ReceiptStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReceiptStatus::Logged => "logged",
            ReceiptStatus::Executed { .. } => "executed",
            ReceiptStatus::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReceipt {
    pub id: ReceiptId,
    pub vault_id: VaultId,
    pub agent: AgentId,
    pub proof_hash: ProofHash,
    pub amount: u64,
    pub score: u8,
    pub status: ReceiptStatus,
    pub timestamp_ms: TimestampMs,
    pub prev_digest: ProofHash,
    pub digest: ProofHash,
}

impl AuditReceipt {
    fn compute_digest(&self) -> ProofHash {
        let mut hasher = Sha256::new();
        hasher.update(RECEIPT_DOMAIN);
        hasher.update(self.id.to_le_bytes());
        hasher.update(self.vault_id.0.to_le_bytes());
        hasher.update((self.agent.as_str().len() as u64).to_le_bytes());
        hasher.update(self.agent.as_str().as_bytes());
        hasher.update(self.proof_hash.as_bytes());
        hasher.update(self.amount.to_le_bytes());
        hasher.update([self.score]);
        match &self.status {
            ReceiptStatus::Logged => hasher.update([0u8]),
            ReceiptStatus::Executed { first_trade_id, legs } => {
                hasher.update([1u8]);
                hasher.update(first_trade_id.to_le_bytes());
                hasher.update(legs.to_le_bytes());
            }
            ReceiptStatus::Rejected { error } => {
                hasher.update([2u8]);
                hasher.update(error.code().to_le_bytes());
            }
        }
        hasher.update(self.timestamp_ms.to_le_bytes());
        hasher.update(self.prev_digest.as_bytes());
        ProofHash(hasher.finalize().into())
    }
}

/// Fields supplied by the caller of `AuditLog::append`
#[derive(Debug, Clone)]
pub struct ReceiptDraft {
    pub agent: AgentId,
    pub proof_hash: ProofHash,
    pub amount: u64,
    pub score: u8,
    pub status: ReceiptStatus,
    pub timestamp_ms: TimestampMs,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("receipt #{index} has id {found}")]
    OutOfSequence { index: u64, found: ReceiptId },
    #[error("receipt #{id} does not link to its predecessor")]
    BrokenLink { id: ReceiptId },
    #[error("receipt #{id} digest does not match its contents")]
    DigestMismatch { id: ReceiptId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    receipts: Vec<AuditReceipt>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, vault_id: VaultId, draft: ReceiptDraft) -> ReceiptId {
        let id = self.receipts.len() as ReceiptId;
        let mut receipt = AuditReceipt {
            id,
            vault_id,
            agent: draft.agent,
            proof_hash: draft.proof_hash,
            amount: draft.amount,
            score: draft.score,
            status: draft.status,
            timestamp_ms: draft.timestamp_ms,
            prev_digest: self.head(),
            digest: ProofHash::ZERO,
        };
        receipt.digest = receipt.compute_digest();
        self.receipts.push(receipt);
        id
    }

    /// Digest of the newest receipt, zero for an empty log
    pub fn head(&self) -> ProofHash {
        self.receipts.last().map(|r| r.digest).unwrap_or(ProofHash::ZERO)
    }

    pub fn get(&self, id: ReceiptId) -> Option<&AuditReceipt> {
        usize::try_from(id).ok().and_then(|i| self.receipts.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditReceipt> {
        self.receipts.iter()
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// Recompute every digest and link; returns the number of receipts checked
    pub fn verify(&self) -> Result<usize, ChainError> {
        let mut prev = ProofHash::ZERO;
        for (index, receipt) in self.receipts.iter().enumerate() {
            let index = index as u64;
            if receipt.id != index {
                return Err(ChainError::OutOfSequence { index, found: receipt.id });
            }
            if receipt.prev_digest != prev {
                return Err(ChainError::BrokenLink { id: receipt.id });
            }
            if receipt.compute_digest() != receipt.digest {
                return Err(ChainError::DigestMismatch { id: receipt.id });
            }
            prev = receipt.digest;
        }
        Ok(self.receipts.len())
    }
}

/// One settled leg as committed, the input to `trade_proof`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledLeg {
    pub amount: u64,
    pub min_output: u64,
    pub output: u64,
}

/// Content hash of a committed trade, recorded on its `Executed` receipt
///
/// An auditor holding the trade parameters can recompute it.
pub fn trade_proof(
    vault_id: VaultId,
    first_trade_id: u64,
    timestamp_ms: TimestampMs,
    score: u8,
    legs: &[SettledLeg],
) -> ProofHash {
    let mut hasher = Sha256::new();
    hasher.update(TRADE_DOMAIN);
    hasher.update(vault_id.0.to_le_bytes());
    hasher.update(first_trade_id.to_le_bytes());
    hasher.update(timestamp_ms.to_le_bytes());
    hasher.update([score]);
    hasher.update((legs.len() as u64).to_le_bytes());
    for leg in legs {
        hasher.update(leg.amount.to_le_bytes());
        hasher.update(leg.min_output.to_le_bytes());
        hasher.update(leg.output.to_le_bytes());
    }
    ProofHash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(amount: u64, status: ReceiptStatus) -> ReceiptDraft {
        ReceiptDraft {
            agent: "bot".into(),
            proof_hash: ProofHash::digest(b"qubo solution"),
            amount,
            score: 87,
            status,
            timestamp_ms: 1_000,
        }
    }

    fn sample_log() -> AuditLog {
        let mut log = AuditLog::new();
        log.append(VaultId(1), draft(100, ReceiptStatus::Logged));
        log.append(VaultId(1), draft(200, ReceiptStatus::Executed { first_trade_id: 0, legs: 1 }));
        log.append(
            VaultId(1),
            draft(300, ReceiptStatus::Rejected { error: VaultError::Paused }),
        );
        log
    }

    #[test]
    fn chain_links_and_verifies() {
        let log = sample_log();
        assert_eq!(log.verify(), Ok(3));
        assert_eq!(log.get(0).unwrap().prev_digest, ProofHash::ZERO);
        assert_eq!(log.get(1).unwrap().prev_digest, log.get(0).unwrap().digest);
        assert_eq!(log.head(), log.get(2).unwrap().digest);
        assert!(log.get(3).is_none());
    }

    #[test]
    fn tampered_amount_detected() {
        let mut log = sample_log();
        log.receipts[1].amount = 1;
        assert_eq!(log.verify(), Err(ChainError::DigestMismatch { id: 1 }));
    }

    #[test]
    fn rewritten_receipt_breaks_next_link() {
        let mut log = sample_log();
        log.receipts[0].amount = 5;
        log.receipts[0].digest = log.receipts[0].compute_digest();
        assert_eq!(log.verify(), Err(ChainError::BrokenLink { id: 1 }));
    }

    #[test]
    fn deleted_receipt_detected() {
        let mut log = sample_log();
        log.receipts.remove(1);
        assert_eq!(log.verify(), Err(ChainError::OutOfSequence { index: 1, found: 2 }));
    }

    #[test]
    fn trade_proof_commits_to_every_leg() {
        let legs = [SettledLeg { amount: 10, min_output: 9, output: 10 }];
        let a = trade_proof(VaultId(1), 0, 5, 90, &legs);
        let b = trade_proof(
            VaultId(1),
            0,
            5,
            90,
            &[SettledLeg { amount: 10, min_output: 9, output: 9 }],
        );
        assert_ne!(a, b);
        assert_eq!(a, trade_proof(VaultId(1), 0, 5, 90, &legs));
    }

    #[test]
    fn log_survives_json() {
        let log = sample_log();
        let json = serde_json::to_string(&log).unwrap();
        let back: AuditLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verify(), Ok(3));
    }
}
