#![forbid(unsafe_code)]

use super::sweeper::Sweeper;
use super::{Transaction, TransactionParticipant};
use crate::IndexError;
use crate::config::IndexConfig;
use crate::containment::ContainmentIndex;
use crate::error::ClosedReason;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Creates, tracks and retires transactions.
///
/// The containment index is always the first participant; sibling services
/// follow in the order they were supplied.
pub struct TransactionManager {
    registry: Arc<Registry>,
    sweeper: Mutex<Option<Sweeper>>,
}

struct Registry {
    transactions: DashMap<String, Arc<Transaction>>,
    create_lock: Mutex<()>,
    participants: Arc<[Arc<dyn TransactionParticipant>]>,
    session_timeout: Duration,
}

impl TransactionManager {
    pub fn new(
        containment: Arc<ContainmentIndex>,
        siblings: Vec<Arc<dyn TransactionParticipant>>,
        config: &IndexConfig,
    ) -> Self {
        let mut participants: Vec<Arc<dyn TransactionParticipant>> =
            Vec::with_capacity(siblings.len() + 1);
        participants.push(containment);
        participants.extend(siblings);
        Self {
            registry: Arc::new(Registry {
                transactions: DashMap::new(),
                create_lock: Mutex::new(()),
                participants: Arc::from(participants),
                session_timeout: config.session_timeout(),
            }),
            sweeper: Mutex::new(None),
        }
    }

    pub fn session_timeout(&self) -> Duration {
        self.registry.session_timeout
    }

    /// New long-running transaction.
    pub fn create(&self) -> Arc<Transaction> {
        self.registry.create(false)
    }

    pub fn create_short_lived(&self) -> Arc<Transaction> {
        self.registry.create(true)
    }

    /// Looks up an open transaction.
    ///
    /// An expired transaction that was still open is rolled back here before
    /// the closed error is returned.
    pub fn get(&self, tx_id: &str) -> Result<Arc<Transaction>, IndexError> {
        let tx = self
            .registry
            .transactions
            .get(tx_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| IndexError::TransactionNotFound {
                tx_id: tx_id.to_string(),
            })?;

        if tx.is_committed() {
            return Err(IndexError::closed(tx_id, ClosedReason::Committed));
        }
        if tx.is_rolled_back() {
            return Err(IndexError::closed(tx_id, ClosedReason::RolledBack));
        }
        if tx.has_expired() {
            if let Err(err) = tx.rollback() {
                tracing::warn!(tx_id, error = %err, "unable to roll back expired transaction");
            }
            return Err(IndexError::closed(tx_id, ClosedReason::Expired));
        }
        Ok(tx)
    }

    pub fn len(&self) -> usize {
        self.registry.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.transactions.is_empty()
    }

    pub fn cleanup_closed_transactions(&self) {
        self.registry.sweep();
    }

    /// Rolls back everything still open. Commits that win the race are logged
    /// and skipped.
    pub fn cleanup_all_transactions(&self) {
        for tx in self.registry.snapshot() {
            if tx.is_committed() || tx.is_rolled_back() {
                continue;
            }
            match tx.rollback() {
                Ok(()) => {}
                Err(err) if err.closed_reason() == Some(ClosedReason::Committed) => {
                    tracing::debug!(tx_id = tx.id(), "transaction committed during shutdown");
                }
                Err(err) => {
                    tracing::warn!(tx_id = tx.id(), error = %err, "unable to roll back transaction");
                }
            }
            tx.release();
        }
    }

    /// Clears staged state left behind by a previous process in every participant.
    pub fn pre_clean_transactions(&self) -> Result<(), IndexError> {
        for participant in self.registry.participants.iter() {
            tracing::info!(participant = participant.name(), "clearing leftover transaction state");
            participant.clear_all_transactions()?;
        }
        Ok(())
    }

    /// Starts the background sweep with a fixed delay of one session timeout.
    pub fn start_sweeper(&self) -> Result<(), IndexError> {
        self.start_sweeper_with_delay(self.registry.session_timeout)
    }

    pub fn start_sweeper_with_delay(&self, delay: Duration) -> Result<(), IndexError> {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return Ok(());
        }
        let registry = Arc::clone(&self.registry);
        *sweeper = Some(Sweeper::start(delay, move || registry.sweep())?);
        Ok(())
    }

    /// Stops the sweep and rolls back every open transaction.
    pub fn shutdown(&self) {
        if let Some(mut sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        self.cleanup_all_transactions();
        tracing::info!("transaction manager shut down");
    }
}

impl Registry {
    fn create(&self, short_lived: bool) -> Arc<Transaction> {
        let _guard = self.create_lock.lock();
        let mut tx_id = uuid::Uuid::new_v4().to_string();
        while self.transactions.contains_key(&tx_id) {
            tx_id = uuid::Uuid::new_v4().to_string();
        }
        let tx = Arc::new(Transaction::new(
            tx_id.clone(),
            short_lived,
            self.session_timeout,
            Arc::clone(&self.participants),
        ));
        self.transactions.insert(tx_id, Arc::clone(&tx));
        tracing::debug!(tx_id = tx.id(), short_lived, "transaction created");
        tx
    }

    fn snapshot(&self) -> Vec<Arc<Transaction>> {
        self.transactions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    // Finished and expired: evict. Open but expired: roll back now, evict on
    // the next pass so status lookups can still see the rollback.
    fn sweep(&self) {
        for tx in self.snapshot() {
            if !tx.has_expired() {
                continue;
            }
            if tx.is_committed() || tx.is_rolled_back() {
                self.transactions.remove(tx.id());
                tx.release();
                tracing::trace!(tx_id = tx.id(), "evicted finished transaction");
                continue;
            }
            tracing::info!(tx_id = tx.id(), "rolling back expired transaction");
            if let Err(err) = tx.rollback() {
                tracing::warn!(tx_id = tx.id(), error = %err, "unable to roll back expired transaction");
            }
            tx.release();
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("transactions", &self.registry.transactions.len())
            .field("session_timeout", &self.registry.session_timeout)
            .field("sweeping", &self.sweeper.lock().is_some())
            .finish()
    }
}
