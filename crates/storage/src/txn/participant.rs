#![forbid(unsafe_code)]

use super::Transaction;
use crate::IndexError;

/// A service that keeps per-transaction state and must follow the
/// transaction's outcome: the containment index, sibling indexes
/// (membership, reference, search) and the storage-session manager.
pub trait TransactionParticipant: Send + Sync {
    fn name(&self) -> &str;

    fn commit_transaction(&self, tx: &Transaction) -> Result<(), IndexError>;

    fn rollback_transaction(&self, tx: &Transaction) -> Result<(), IndexError>;

    /// Drops leftover state for every transaction. Runs before traffic is accepted.
    fn clear_all_transactions(&self) -> Result<(), IndexError>;

    /// Frees external resources held for `tx` once it is finished.
    fn release(&self, _tx: &Transaction) -> Result<(), IndexError> {
        Ok(())
    }
}
