#![forbid(unsafe_code)]

use super::{ContainmentIndex, sql};
use crate::IndexError;
use crate::txn::Transaction;
use rusqlite::params;

const COMMIT_FAILED: &str = "unable to commit containment index transaction";
const ROLLBACK_FAILED: &str = "unable to roll back containment index transaction";
const RESET_FAILED: &str = "unable to reset containment index";
const CLEAR_FAILED: &str = "unable to clear staged containment operations";

/// Ids touched by one commit; their cache entries are dropped before the
/// connection lock is released.
struct Applied {
    staged_ids: Vec<String>,
    parents: usize,
}

impl ContainmentIndex {
    /// Applies the staged rows of a long-running transaction.
    ///
    /// Runs in one store transaction: purges, then deletes, then adds, then
    /// moves each touched parent's `updated` forward, then drops the staged
    /// rows. Short-lived transactions already wrote through; nothing to do.
    pub fn commit_transaction(&self, tx: &Transaction) -> Result<(), IndexError> {
        if tx.is_short_lived() {
            return Ok(());
        }
        let applied = match self.apply_staged(tx.id()) {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!(tx_id = tx.id(), error = %err, "containment commit failed");
                return Err(IndexError::runtime(COMMIT_FAILED, err));
            }
        };
        tracing::debug!(
            tx_id = tx.id(),
            operations = applied.staged_ids.len(),
            parents = applied.parents,
            "containment transaction committed"
        );
        Ok(())
    }

    fn apply_staged(&self, tx_id: &str) -> Result<Applied, rusqlite::Error> {
        let queries = self.db.queries();
        let mut conn = self.db.lock();
        let store_tx = conn.transaction()?;

        let parents = collect_strings(&store_tx, sql::TOUCHED_PARENTS, tx_id)?;
        let staged_ids = collect_strings(&store_tx, sql::STAGED_IDS, tx_id)?;

        store_tx.execute(sql::COMMIT_PURGE, params![tx_id])?;
        store_tx.execute(queries.commit_delete, params![tx_id])?;
        store_tx.execute(queries.commit_add, params![tx_id])?;

        for parent in &parents {
            let updated: Option<i64> =
                store_tx.query_row(sql::LAST_UPDATED_IN_TX, params![parent, tx_id], |row| {
                    row.get(0)
                })?;
            if let Some(updated) = updated {
                store_tx.execute(sql::BUMP_UPDATED, params![parent, updated])?;
            }
        }

        store_tx.execute(sql::DELETE_STAGED, params![tx_id])?;
        store_tx.commit()?;
        for child in &staged_ids {
            self.invalidate(child);
        }
        drop(conn);
        Ok(Applied {
            staged_ids,
            parents: parents.len(),
        })
    }

    /// Drops the staged rows of a long-running transaction.
    pub fn rollback_transaction(&self, tx: &Transaction) -> Result<(), IndexError> {
        if tx.is_short_lived() {
            return Ok(());
        }
        let removed = {
            let conn = self.db.lock();
            conn.execute(sql::DELETE_STAGED, params![tx.id()])
                .map_err(|err| IndexError::runtime(ROLLBACK_FAILED, err))?
        };
        tracing::debug!(tx_id = tx.id(), removed, "containment transaction rolled back");
        Ok(())
    }

    /// Empties both tables.
    pub fn reset(&self) -> Result<(), IndexError> {
        let queries = self.db.queries();
        let result = (|| -> Result<(), rusqlite::Error> {
            let mut conn = self.db.lock();
            let store_tx = conn.transaction()?;
            store_tx.execute(queries.truncate_staged, [])?;
            store_tx.execute(queries.truncate_records, [])?;
            let committed = store_tx.commit();
            self.invalidate_all();
            committed
        })();
        result.map_err(|err| IndexError::runtime(RESET_FAILED, err))?;
        tracing::info!("containment index reset");
        Ok(())
    }

    /// Empties the staging table for every transaction.
    pub fn clear_all_transactions(&self) -> Result<(), IndexError> {
        let queries = self.db.queries();
        let result = {
            let conn = self.db.lock();
            let removed = conn.execute(queries.truncate_staged, []);
            self.invalidate_all();
            removed
        };
        let removed = result.map_err(|err| IndexError::runtime(CLEAR_FAILED, err))?;
        tracing::info!(removed, "cleared staged containment operations");
        Ok(())
    }
}

fn collect_strings(
    conn: &rusqlite::Connection,
    sql: &str,
    tx_id: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![tx_id], |row| row.get::<_, String>(0))?;
    rows.collect()
}
