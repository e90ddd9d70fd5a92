#![forbid(unsafe_code)]

//! Parent/child containment with soft delete, purge, as-of queries and a
//! per-transaction staged view.

mod commit;
mod cursor;
mod sql;

pub use cursor::ContainmentCursor;

use crate::IndexError;
use crate::cache::{CacheStats, TtlCache};
use crate::config::IndexConfig;
use crate::database::Database;
use crate::txn::{Transaction, TransactionParticipant};
use cursor::ChildQuery;
use repo_core::ResourceId;
use repo_core::instant;
use rusqlite::{OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;

/// Decides which children are never recorded as contained.
pub type Exclusion = Arc<dyn Fn(&ResourceId) -> bool + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContainmentCacheStats {
    pub exists: CacheStats,
    pub parent: CacheStats,
}

pub struct ContainmentIndex {
    db: Database,
    contains_limit: usize,
    exclusion: Exclusion,
    exists_cache: TtlCache<String, bool>,
    parent_cache: TtlCache<String, String>,
}

impl ContainmentIndex {
    pub fn new(db: Database, config: &IndexConfig) -> Self {
        Self {
            db,
            contains_limit: config.contains_limit.max(1),
            exclusion: Arc::new(ResourceId::is_acl),
            exists_cache: TtlCache::new(config.cache_size, config.cache_ttl()),
            parent_cache: TtlCache::new(config.cache_size, config.cache_ttl()),
        }
    }

    pub fn open(storage_dir: impl AsRef<Path>, config: &IndexConfig) -> Result<Self, IndexError> {
        let db = Database::open(storage_dir, config.dialect)?;
        Ok(Self::new(db, config))
    }

    pub fn open_in_memory(config: &IndexConfig) -> Result<Self, IndexError> {
        Ok(Self::new(Database::open_in_memory()?, config))
    }

    /// Replaces the default rule (ACL resources are never contained).
    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusion = exclusion;
        self
    }

    pub fn with_contains_limit(mut self, limit: usize) -> Self {
        self.contains_limit = limit.max(1);
        self
    }

    pub fn contains_limit(&self) -> usize {
        self.contains_limit
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Staged rows across all transactions.
    pub fn staged_operation_count(&self) -> Result<u64, IndexError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(sql::COUNT_STAGED, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub fn cache_stats(&self) -> ContainmentCacheStats {
        ContainmentCacheStats {
            exists: self.exists_cache.stats(),
            parent: self.parent_cache.stats(),
        }
    }

    /// Children of `id`.
    ///
    /// A memento id answers as of its instant from committed rows only. An open
    /// long-running transaction also sees its own staged adds and removals; an
    /// expired one that is still awaiting rollback yields a closed error.
    pub fn get_contains(&self, tx: &Transaction, id: &ResourceId) -> ContainmentCursor<'_> {
        let parent = id.base_id().to_string();
        if let Some(at) = id.memento_instant().filter(|_| id.is_memento()) {
            let query = ChildQuery::AsOf {
                parent,
                at: seconds(at),
            };
            return ContainmentCursor::new(&self.db, query, self.contains_limit);
        }
        let query = match tx.staged_view() {
            Ok(true) => ChildQuery::ActiveInTx {
                parent,
                tx_id: tx.id().to_string(),
            },
            Ok(false) => ChildQuery::Active { parent },
            Err(err) => {
                return ContainmentCursor::failed(&self.db, ChildQuery::Active { parent }, err);
            }
        };
        ContainmentCursor::new(&self.db, query, self.contains_limit)
    }

    /// Tombstoned children of `id`.
    pub fn get_contains_deleted(&self, tx: &Transaction, id: &ResourceId) -> ContainmentCursor<'_> {
        let parent = id.base_id().to_string();
        let query = match tx.staged_view() {
            Ok(true) => ChildQuery::DeletedInTx {
                parent,
                tx_id: tx.id().to_string(),
            },
            Ok(false) => ChildQuery::Deleted { parent },
            Err(err) => {
                return ContainmentCursor::failed(&self.db, ChildQuery::Deleted { parent }, err);
            }
        };
        ContainmentCursor::new(&self.db, query, self.contains_limit)
    }

    pub fn get_contained_by(
        &self,
        tx: &Transaction,
        id: &ResourceId,
    ) -> Result<Option<String>, IndexError> {
        let child = id.base_id();
        if let Some(at) = id.memento_instant() {
            let conn = self.db.lock();
            let parent = conn
                .query_row(sql::PARENT_AS_OF, params![child, seconds(at)], |row| {
                    row.get(0)
                })
                .optional()?;
            return Ok(parent);
        }
        if tx.staged_view()? {
            let conn = self.db.lock();
            let parent = conn
                .query_row(sql::PARENT_IN_TX, params![child, tx.id()], |row| row.get(0))
                .optional()?;
            return Ok(parent);
        }

        let key = child.to_string();
        if let Some(parent) = self.parent_cache.get(&key) {
            return Ok(Some(parent));
        }
        // Filled under the connection lock so a concurrent write's
        // invalidation cannot land between the read and the fill.
        let conn = self.db.lock();
        let parent: Option<String> = conn
            .query_row(sql::PARENT, params![child], |row| row.get(0))
            .optional()?;
        if let Some(parent) = &parent {
            self.parent_cache.insert(key, parent.clone());
        }
        drop(conn);
        Ok(parent)
    }

    pub fn add_contained_by(
        &self,
        tx: &Transaction,
        parent: &ResourceId,
        child: &ResourceId,
    ) -> Result<(), IndexError> {
        self.add_contained_by_at(tx, parent, child, None, None)
    }

    /// Records `child` under `parent` over `[start, end)`.
    ///
    /// `start` defaults to the start of the child's live committed edge, so
    /// re-adding a live child keeps its creation instant. A new, tombstoned or
    /// removed-in-this-transaction child starts now.
    pub fn add_contained_by_at(
        &self,
        tx: &Transaction,
        parent: &ResourceId,
        child: &ResourceId,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
    ) -> Result<(), IndexError> {
        if (self.exclusion)(child) {
            tracing::trace!(child = child.full_id(), "child excluded from containment");
            return Ok(());
        }
        let write_guard = tx.begin_staged_write()?;
        let staged = write_guard.is_some();
        let parent_id = parent.base_id();
        let child_id = child.base_id();
        let end = end.map(seconds);
        let queries = self.db.queries();

        let conn = self.db.lock();
        let start = match start {
            Some(start) => seconds(start),
            None => conn
                .query_row(sql::LIVE_START_TIME, params![child_id, tx.id()], |row| {
                    row.get(0)
                })
                .optional()?
                .unwrap_or_else(now_seconds),
        };

        if staged {
            conn.execute(
                queries.upsert_staged,
                params![child_id, parent_id, start, end, tx.id(), "add"],
            )?;
            tx.mark_dirty();
        } else {
            conn.execute(queries.upsert_record, params![child_id, parent_id, start, end])?;
            conn.execute(sql::BUMP_UPDATED, params![parent_id, end.unwrap_or(start)])?;
            self.invalidate(child_id);
        }
        tracing::debug!(tx_id = tx.id(), parent = parent_id, child = child_id, staged, "added containment");
        Ok(())
    }

    /// Ends the `parent` -> `child` edge now.
    ///
    /// A child that only exists as a staged add of this transaction is simply
    /// unstaged.
    pub fn remove_contained_by(
        &self,
        tx: &Transaction,
        parent: &ResourceId,
        child: &ResourceId,
    ) -> Result<(), IndexError> {
        let write_guard = tx.begin_staged_write()?;
        let staged = write_guard.is_some();
        let parent_id = parent.base_id();
        let child_id = child.base_id();
        let now = now_seconds();

        let conn = self.db.lock();
        if staged {
            let staged_add: bool = conn.query_row(
                sql::STAGED_ADD,
                params![child_id, parent_id, tx.id()],
                |row| row.get(0),
            )?;
            let committed: bool =
                conn.query_row(sql::ACTIVE_EDGE, params![child_id, parent_id], |row| row.get(0))?;
            if staged_add && !committed {
                conn.execute(sql::DISCARD_STAGED, params![child_id, tx.id()])?;
                tracing::debug!(tx_id = tx.id(), child = child_id, "discarded staged add");
                return Ok(());
            }
            let start: Option<i64> = conn
                .query_row(sql::START_TIME, params![child_id], |row| row.get(0))
                .optional()?;
            conn.execute(
                self.db.queries().upsert_staged,
                params![child_id, parent_id, start, now, tx.id(), "delete"],
            )?;
            tx.mark_dirty();
        } else {
            conn.execute(sql::END_RECORD, params![child_id, parent_id, now])?;
            conn.execute(sql::BUMP_UPDATED, params![parent_id, now])?;
            self.invalidate(child_id);
        }
        tracing::debug!(tx_id = tx.id(), parent = parent_id, child = child_id, staged, "removed containment");
        Ok(())
    }

    /// Removes `id` from whatever currently contains it; no parent is a no-op.
    pub fn remove_resource(&self, tx: &Transaction, id: &ResourceId) -> Result<(), IndexError> {
        match self.get_contained_by(tx, &id.as_base())? {
            Some(parent) => self.remove_contained_by(tx, &ResourceId::parse(&parent)?, id),
            None => Ok(()),
        }
    }

    /// Deletes a tombstoned resource's edge for good. Active resources are
    /// not purgeable and are left alone.
    pub fn purge_resource(&self, tx: &Transaction, id: &ResourceId) -> Result<(), IndexError> {
        let write_guard = tx.begin_staged_write()?;
        let staged = write_guard.is_some();
        let child_id = id.base_id();
        let Some(parent) = self.deleted_parent(tx, child_id)? else {
            return Ok(());
        };
        let now = now_seconds();

        let conn = self.db.lock();
        if staged {
            let start: Option<i64> = conn
                .query_row(sql::START_TIME, params![child_id], |row| row.get(0))
                .optional()?;
            conn.execute(
                self.db.queries().upsert_staged,
                params![child_id, parent, start, now, tx.id(), "purge"],
            )?;
            tx.mark_dirty();
        } else {
            conn.execute(sql::PURGE_RECORD, params![child_id, parent])?;
            conn.execute(sql::BUMP_UPDATED, params![parent, now])?;
            self.invalidate(child_id);
        }
        tracing::debug!(tx_id = tx.id(), parent = %parent, child = child_id, staged, "purged containment");
        Ok(())
    }

    pub fn resource_exists(
        &self,
        tx: &Transaction,
        id: &ResourceId,
        include_deleted: bool,
    ) -> Result<bool, IndexError> {
        if id.is_repository_root() {
            return Ok(true);
        }
        let child = id.base_id();
        if tx.staged_view()? {
            let query = if include_deleted {
                sql::EXISTS_IN_TX_WITH_DELETED
            } else {
                sql::EXISTS_IN_TX
            };
            let conn = self.db.lock();
            return Ok(conn.query_row(query, params![child, tx.id()], |row| row.get(0))?);
        }
        if include_deleted {
            let conn = self.db.lock();
            return Ok(conn.query_row(sql::EXISTS_WITH_DELETED, params![child], |row| row.get(0))?);
        }

        let key = child.to_string();
        if self.exists_cache.get(&key).is_some() {
            return Ok(true);
        }
        let conn = self.db.lock();
        let exists: bool = conn.query_row(sql::EXISTS, params![child], |row| row.get(0))?;
        // A miss may turn into a hit at any time; only hits are remembered.
        if exists {
            self.exists_cache.insert(key, true);
        }
        drop(conn);
        Ok(exists)
    }

    /// True if any live or tombstoned record sits below `id`.
    pub fn has_resources_starting_with(
        &self,
        tx: &Transaction,
        id: &ResourceId,
    ) -> Result<bool, IndexError> {
        let prefix = format!("{}/", id.base_id());
        let len = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
        let staged = tx.staged_view()?;
        let conn = self.db.lock();
        let found = if staged {
            conn.query_row(sql::HAS_PREFIX_IN_TX, params![prefix, len, tx.id()], |row| {
                row.get(0)
            })?
        } else {
            conn.query_row(sql::HAS_PREFIX, params![prefix, len], |row| row.get(0))?
        };
        Ok(found)
    }

    /// Nearest known container of `id`: its recorded parent if there is one,
    /// else the first existing ancestor path, else the repository root.
    pub fn get_container_id_by_path(
        &self,
        tx: &Transaction,
        id: &ResourceId,
        check_deleted: bool,
    ) -> Result<ResourceId, IndexError> {
        if id.is_repository_root() {
            return Ok(ResourceId::root());
        }
        let base = id.as_base();
        if let Some(parent) = self.get_contained_by(tx, &base)? {
            return Ok(ResourceId::parse(&parent)?);
        }
        if check_deleted {
            if let Some(parent) = self.deleted_parent(tx, base.base_id())? {
                return Ok(ResourceId::parse(&parent)?);
            }
        }

        let mut current = base;
        while let Some(ancestor) = current.parent_path() {
            if ancestor.is_repository_root()
                || self.resource_exists(tx, &ancestor, check_deleted)?
            {
                return Ok(ancestor);
            }
            current = ancestor;
        }
        Ok(ResourceId::root())
    }

    pub fn containment_last_updated(
        &self,
        tx: &Transaction,
        id: &ResourceId,
    ) -> Result<Option<OffsetDateTime>, IndexError> {
        let resource = id.base_id();
        let staged = tx.staged_view()?;
        let conn = self.db.lock();
        let updated: Option<i64> = if staged {
            conn.query_row(sql::LAST_UPDATED_IN_TX, params![resource, tx.id()], |row| {
                row.get(0)
            })?
        } else {
            conn.query_row(sql::LAST_UPDATED, params![resource], |row| row.get(0))
                .optional()?
                .flatten()
        };
        Ok(updated.and_then(instant::from_epoch_seconds))
    }

    fn deleted_parent(&self, tx: &Transaction, child: &str) -> Result<Option<String>, IndexError> {
        let staged = tx.staged_view()?;
        let conn = self.db.lock();
        let parent = if staged {
            conn.query_row(sql::DELETED_PARENT_IN_TX, params![child, tx.id()], |row| {
                row.get(0)
            })
            .optional()?
        } else {
            conn.query_row(sql::DELETED_PARENT, params![child], |row| row.get(0))
                .optional()?
        };
        Ok(parent)
    }

    /// Callers hold the connection lock, which orders invalidations against
    /// read-through fills.
    fn invalidate(&self, child: &str) {
        let key = child.to_string();
        self.exists_cache.invalidate(&key);
        self.parent_cache.invalidate(&key);
    }

    fn invalidate_all(&self) {
        self.exists_cache.invalidate_all();
        self.parent_cache.invalidate_all();
    }
}

impl TransactionParticipant for ContainmentIndex {
    fn name(&self) -> &str {
        "containment"
    }

    fn commit_transaction(&self, tx: &Transaction) -> Result<(), IndexError> {
        ContainmentIndex::commit_transaction(self, tx)
    }

    fn rollback_transaction(&self, tx: &Transaction) -> Result<(), IndexError> {
        ContainmentIndex::rollback_transaction(self, tx)
    }

    fn clear_all_transactions(&self) -> Result<(), IndexError> {
        ContainmentIndex::clear_all_transactions(self)
    }
}

impl std::fmt::Debug for ContainmentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainmentIndex")
            .field("db", &self.db)
            .field("contains_limit", &self.contains_limit)
            .finish_non_exhaustive()
    }
}

fn seconds(at: OffsetDateTime) -> i64 {
    instant::to_epoch_seconds(instant::truncate_to_seconds(at))
}

fn now_seconds() -> i64 {
    instant::to_epoch_seconds(instant::now())
}

#[cfg(test)]
mod tests;
