#![forbid(unsafe_code)]

//! Application-level transactions.
//!
//! A transaction is not a backing-store transaction: long-running ones stage
//! their writes in `containment_transactions` and only touch the committed
//! table at commit. Short-lived ones write straight through.

pub mod manager;
mod participant;
mod sweeper;

pub use manager::TransactionManager;
pub use participant::TransactionParticipant;

use crate::config::DEFAULT_SESSION_TIMEOUT_MS;
use crate::error::ClosedReason;
use crate::IndexError;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    New,
    /// Open, with work recorded since creation.
    Dirty,
    Committed,
    RolledBack,
}

#[derive(Debug)]
enum Outcome {
    Open { dirty: bool },
    Committed,
    RolledBack,
}

#[derive(Debug)]
struct Lifecycle {
    outcome: Outcome,
    expires_at: OffsetDateTime,
}

pub struct Transaction {
    id: String,
    short_lived: AtomicBool,
    session_timeout: Duration,
    lifecycle: Mutex<Lifecycle>,
    // Shared by in-flight work, exclusive for commit and rollback.
    completion: RwLock<()>,
    participants: Arc<[Arc<dyn TransactionParticipant>]>,
}

impl Transaction {
    pub(crate) fn new(
        id: String,
        short_lived: bool,
        session_timeout: Duration,
        participants: Arc<[Arc<dyn TransactionParticipant>]>,
    ) -> Self {
        Self {
            id,
            short_lived: AtomicBool::new(short_lived),
            session_timeout,
            lifecycle: Mutex::new(Lifecycle {
                outcome: Outcome::Open { dirty: false },
                expires_at: OffsetDateTime::now_utc() + session_timeout,
            }),
            completion: RwLock::new(()),
            participants,
        }
    }

    /// Unregistered short-lived transaction for reads and direct writes
    /// outside any client transaction.
    pub fn implicit() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            true,
            Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MS),
            Arc::from(Vec::new()),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_short_lived(&self) -> bool {
        self.short_lived.load(Ordering::Acquire)
    }

    pub fn set_short_lived(&self, short_lived: bool) {
        self.short_lived.store(short_lived, Ordering::Release);
    }

    /// True when reads and writes must go through this transaction's staged rows.
    pub fn is_open_long_running(&self) -> bool {
        !self.is_short_lived() && self.is_open()
    }

    pub fn state(&self) -> TransactionState {
        match self.lifecycle.lock().outcome {
            Outcome::Open { dirty: false } => TransactionState::New,
            Outcome::Open { dirty: true } => TransactionState::Dirty,
            Outcome::Committed => TransactionState::Committed,
            Outcome::RolledBack => TransactionState::RolledBack,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.lifecycle.lock().outcome, Outcome::Committed)
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self.lifecycle.lock().outcome, Outcome::RolledBack)
    }

    /// Neither terminal nor expired.
    pub fn is_open(&self) -> bool {
        let lifecycle = self.lifecycle.lock();
        matches!(lifecycle.outcome, Outcome::Open { .. })
            && lifecycle.expires_at > OffsetDateTime::now_utc()
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.lifecycle.lock().expires_at
    }

    pub fn has_expired(&self) -> bool {
        self.lifecycle.lock().expires_at <= OffsetDateTime::now_utc()
    }

    pub fn expire(&self) {
        self.lifecycle.lock().expires_at = OffsetDateTime::now_utc();
    }

    /// Moves the expiry to `now + duration`.
    pub fn update_expiry(&self, duration: Duration) -> Result<(), IndexError> {
        let mut lifecycle = self.lifecycle.lock();
        self.check_open(&lifecycle)?;
        lifecycle.expires_at = OffsetDateTime::now_utc() + duration;
        Ok(())
    }

    pub fn refresh(&self) -> Result<(), IndexError> {
        self.update_expiry(self.session_timeout)
    }

    /// Runs `work` as part of this transaction.
    ///
    /// Fails without running `work` once the transaction is committed, rolled
    /// back or expired. Long-running transactions get their expiry pushed out.
    /// Commit and rollback wait for `work` to finish, so `work` must not
    /// complete this same transaction.
    pub fn run_in<T>(
        &self,
        work: impl FnOnce(&Transaction) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let _work = self.completion.read_recursive();
        {
            let mut lifecycle = self.lifecycle.lock();
            self.check_open(&lifecycle)?;
            lifecycle.outcome = Outcome::Open { dirty: true };
            if !self.is_short_lived() {
                lifecycle.expires_at = OffsetDateTime::now_utc() + self.session_timeout;
            }
        }
        work(self)
    }

    pub fn ensure_open(&self) -> Result<(), IndexError> {
        let lifecycle = self.lifecycle.lock();
        self.check_open(&lifecycle)
    }

    /// Guard for a staged write, or `None` when writes go straight through.
    /// While it is held the transaction cannot commit or roll back.
    pub(crate) fn begin_staged_write(
        &self,
    ) -> Result<Option<RwLockReadGuard<'_, ()>>, IndexError> {
        if self.is_short_lived() {
            return Ok(None);
        }
        let guard = self.completion.read_recursive();
        self.ensure_open()?;
        Ok(Some(guard))
    }

    /// Whether reads see this transaction's staged rows.
    ///
    /// An expired transaction that has not been rolled back yet still owns
    /// staged rows it can no longer see, so reading through it fails.
    /// Finished transactions read the committed view.
    pub(crate) fn staged_view(&self) -> Result<bool, IndexError> {
        if self.is_short_lived() {
            return Ok(false);
        }
        let lifecycle = self.lifecycle.lock();
        match self.check_open(&lifecycle) {
            Ok(()) => Ok(true),
            Err(err) if err.closed_reason() == Some(ClosedReason::Expired) => Err(err),
            Err(_) => Ok(false),
        }
    }

    pub(crate) fn mark_dirty(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if let Outcome::Open { dirty } = &mut lifecycle.outcome {
            *dirty = true;
        }
    }

    /// Commits every participant in registration order.
    ///
    /// Committing twice is a no-op. If any participant fails, all of them are
    /// rolled back and the failure is returned as a runtime error.
    pub fn commit(&self) -> Result<(), IndexError> {
        let _completion = self.completion.write();
        {
            let lifecycle = self.lifecycle.lock();
            if matches!(lifecycle.outcome, Outcome::Committed) {
                return Ok(());
            }
            self.check_open(&lifecycle)?;
        }

        tracing::debug!(tx_id = %self.id, "committing transaction");
        for participant in self.participants.iter() {
            if let Err(err) = participant.commit_transaction(self) {
                tracing::error!(
                    tx_id = %self.id,
                    participant = participant.name(),
                    error = %err,
                    "commit failed, rolling back"
                );
                self.rollback_participants();
                self.lifecycle.lock().outcome = Outcome::RolledBack;
                return Err(IndexError::runtime("failed to commit transaction", err));
            }
        }
        self.lifecycle.lock().outcome = Outcome::Committed;
        Ok(())
    }

    pub fn commit_if_short_lived(&self) -> Result<(), IndexError> {
        if self.is_short_lived() {
            return self.commit();
        }
        Ok(())
    }

    /// Rolls back every participant, continuing past individual failures.
    ///
    /// Rolling back twice is a no-op; rolling back a committed transaction fails.
    /// Expired transactions can still be rolled back.
    pub fn rollback(&self) -> Result<(), IndexError> {
        let _completion = self.completion.write();
        match self.lifecycle.lock().outcome {
            Outcome::Committed => {
                return Err(IndexError::closed(&self.id, ClosedReason::Committed));
            }
            Outcome::RolledBack => return Ok(()),
            Outcome::Open { .. } => {}
        }

        tracing::debug!(tx_id = %self.id, "rolling back transaction");
        self.rollback_participants();
        self.lifecycle.lock().outcome = Outcome::RolledBack;
        Ok(())
    }

    pub(crate) fn release(&self) {
        for participant in self.participants.iter() {
            if let Err(err) = participant.release(self) {
                tracing::warn!(
                    tx_id = %self.id,
                    participant = participant.name(),
                    error = %err,
                    "unable to release transaction resources"
                );
            }
        }
    }

    fn rollback_participants(&self) {
        for participant in self.participants.iter() {
            if let Err(err) = participant.rollback_transaction(self) {
                tracing::warn!(
                    tx_id = %self.id,
                    participant = participant.name(),
                    error = %err,
                    "rollback failed, continuing"
                );
            }
        }
    }

    fn check_open(&self, lifecycle: &Lifecycle) -> Result<(), IndexError> {
        match lifecycle.outcome {
            Outcome::Committed => Err(IndexError::closed(&self.id, ClosedReason::Committed)),
            Outcome::RolledBack => Err(IndexError::closed(&self.id, ClosedReason::RolledBack)),
            Outcome::Open { .. } if lifecycle.expires_at <= OffsetDateTime::now_utc() => {
                Err(IndexError::closed(&self.id, ClosedReason::Expired))
            }
            Outcome::Open { .. } => Ok(()),
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("short_lived", &self.is_short_lived())
            .field("state", &self.state())
            .field("participants", &self.participants.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
