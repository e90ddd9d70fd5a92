#![forbid(unsafe_code)]

// Read and bookkeeping statements. They only use syntax shared by every
// dialect; the statements that differ live in `crate::dialect`.

pub(super) const CHILDREN: &str = "SELECT fedora_id FROM containment \
     WHERE parent=?1 AND end_time IS NULL \
     ORDER BY fedora_id LIMIT ?2 OFFSET ?3";

pub(super) const CHILDREN_IN_TX: &str = "SELECT c.fedora_id FROM ( \
       SELECT fedora_id FROM containment WHERE parent=?1 AND end_time IS NULL \
       UNION \
       SELECT fedora_id FROM containment_transactions \
       WHERE parent=?1 AND transaction_id=?2 AND operation='add' \
     ) AS c \
     WHERE NOT EXISTS ( \
       SELECT 1 FROM containment_transactions t \
       WHERE t.fedora_id=c.fedora_id AND t.parent=?1 AND t.transaction_id=?2 \
         AND t.operation IN ('delete', 'purge')) \
     ORDER BY c.fedora_id LIMIT ?3 OFFSET ?4";

pub(super) const CHILDREN_AS_OF: &str = "SELECT fedora_id FROM containment \
     WHERE parent=?1 AND start_time <= ?2 AND (end_time IS NULL OR end_time > ?2) \
     ORDER BY fedora_id LIMIT ?3 OFFSET ?4";

pub(super) const DELETED_CHILDREN: &str = "SELECT fedora_id FROM containment \
     WHERE parent=?1 AND end_time IS NOT NULL \
     ORDER BY fedora_id LIMIT ?2 OFFSET ?3";

pub(super) const DELETED_CHILDREN_IN_TX: &str = "SELECT c.fedora_id FROM ( \
       SELECT fedora_id FROM containment WHERE parent=?1 AND end_time IS NOT NULL \
       UNION \
       SELECT fedora_id FROM containment_transactions \
       WHERE parent=?1 AND transaction_id=?2 AND operation='delete' \
     ) AS c \
     WHERE NOT EXISTS ( \
       SELECT 1 FROM containment_transactions t \
       WHERE t.fedora_id=c.fedora_id AND t.transaction_id=?2 \
         AND t.operation IN ('add', 'purge')) \
     ORDER BY c.fedora_id LIMIT ?3 OFFSET ?4";

pub(super) const PARENT: &str =
    "SELECT parent FROM containment WHERE fedora_id=?1 AND end_time IS NULL";

// Staged rows come first so a staged re-parent wins over the committed edge.
pub(super) const PARENT_IN_TX: &str = "SELECT parent FROM containment_transactions \
       WHERE fedora_id=?1 AND transaction_id=?2 AND operation='add' \
     UNION ALL \
     SELECT c.parent FROM containment c \
       WHERE c.fedora_id=?1 AND c.end_time IS NULL AND NOT EXISTS ( \
         SELECT 1 FROM containment_transactions t \
         WHERE t.fedora_id=c.fedora_id AND t.transaction_id=?2 \
           AND t.operation IN ('delete', 'purge')) \
     LIMIT 1";

pub(super) const PARENT_AS_OF: &str = "SELECT parent FROM containment \
     WHERE fedora_id=?1 AND start_time <= ?2 AND (end_time IS NULL OR end_time > ?2)";

pub(super) const DELETED_PARENT: &str =
    "SELECT parent FROM containment WHERE fedora_id=?1 AND end_time IS NOT NULL";

pub(super) const DELETED_PARENT_IN_TX: &str = "SELECT parent FROM containment_transactions \
       WHERE fedora_id=?1 AND transaction_id=?2 AND operation='delete' \
     UNION ALL \
     SELECT c.parent FROM containment c \
       WHERE c.fedora_id=?1 AND c.end_time IS NOT NULL AND NOT EXISTS ( \
         SELECT 1 FROM containment_transactions t \
         WHERE t.fedora_id=c.fedora_id AND t.transaction_id=?2 \
           AND t.operation IN ('add', 'purge')) \
     LIMIT 1";

pub(super) const EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM containment WHERE fedora_id=?1 AND end_time IS NULL)";

pub(super) const EXISTS_WITH_DELETED: &str =
    "SELECT EXISTS(SELECT 1 FROM containment WHERE fedora_id=?1)";

pub(super) const EXISTS_IN_TX: &str = "SELECT EXISTS( \
       SELECT 1 FROM containment_transactions \
         WHERE fedora_id=?1 AND transaction_id=?2 AND operation='add' \
       UNION ALL \
       SELECT 1 FROM containment c \
         WHERE c.fedora_id=?1 AND c.end_time IS NULL AND NOT EXISTS ( \
           SELECT 1 FROM containment_transactions t \
           WHERE t.fedora_id=c.fedora_id AND t.transaction_id=?2 \
             AND t.operation IN ('delete', 'purge')))";

pub(super) const EXISTS_IN_TX_WITH_DELETED: &str = "SELECT EXISTS( \
       SELECT 1 FROM containment_transactions \
         WHERE fedora_id=?1 AND transaction_id=?2 AND operation IN ('add', 'delete') \
       UNION ALL \
       SELECT 1 FROM containment c \
         WHERE c.fedora_id=?1 AND NOT EXISTS ( \
           SELECT 1 FROM containment_transactions t \
           WHERE t.fedora_id=c.fedora_id AND t.transaction_id=?2 AND t.operation='purge'))";

pub(super) const HAS_PREFIX: &str =
    "SELECT EXISTS(SELECT 1 FROM containment WHERE substr(fedora_id, 1, ?2)=?1)";

pub(super) const HAS_PREFIX_IN_TX: &str = "SELECT EXISTS( \
       SELECT 1 FROM containment_transactions \
         WHERE substr(fedora_id, 1, ?2)=?1 AND transaction_id=?3 AND operation='add' \
       UNION ALL \
       SELECT 1 FROM containment c \
         WHERE substr(c.fedora_id, 1, ?2)=?1 AND NOT EXISTS ( \
           SELECT 1 FROM containment_transactions t \
           WHERE t.fedora_id=c.fedora_id AND t.transaction_id=?3 AND t.operation='purge'))";

pub(super) const LAST_UPDATED: &str = "SELECT updated FROM containment WHERE fedora_id=?1";

pub(super) const LAST_UPDATED_IN_TX: &str = "SELECT MAX(ts) FROM ( \
       SELECT updated AS ts FROM containment WHERE fedora_id=?1 \
       UNION ALL \
       SELECT start_time AS ts FROM containment_transactions \
         WHERE parent=?1 AND transaction_id=?2 AND operation='add' \
       UNION ALL \
       SELECT end_time AS ts FROM containment_transactions \
         WHERE parent=?1 AND transaction_id=?2 AND operation IN ('delete', 'purge') \
     ) AS stamps";

pub(super) const START_TIME: &str = "SELECT start_time FROM containment WHERE fedora_id=?1";

// Start of a committed edge that is still live from `?2`'s point of view.
pub(super) const LIVE_START_TIME: &str = "SELECT c.start_time FROM containment c \
     WHERE c.fedora_id=?1 AND c.end_time IS NULL AND NOT EXISTS ( \
       SELECT 1 FROM containment_transactions t \
       WHERE t.fedora_id=c.fedora_id AND t.transaction_id=?2 \
         AND t.operation IN ('delete', 'purge'))";

pub(super) const BUMP_UPDATED: &str = "UPDATE containment SET updated=?2 \
     WHERE fedora_id=?1 AND (updated IS NULL OR updated < ?2)";

pub(super) const END_RECORD: &str = "UPDATE containment SET end_time=?3 \
     WHERE fedora_id=?1 AND parent=?2 AND end_time IS NULL";

pub(super) const PURGE_RECORD: &str = "DELETE FROM containment WHERE fedora_id=?1 AND parent=?2";

pub(super) const ACTIVE_EDGE: &str = "SELECT EXISTS(SELECT 1 FROM containment \
     WHERE fedora_id=?1 AND parent=?2 AND end_time IS NULL)";

pub(super) const STAGED_ADD: &str = "SELECT EXISTS(SELECT 1 FROM containment_transactions \
     WHERE fedora_id=?1 AND parent=?2 AND transaction_id=?3 AND operation='add')";

pub(super) const DISCARD_STAGED: &str =
    "DELETE FROM containment_transactions WHERE fedora_id=?1 AND transaction_id=?2";

pub(super) const TOUCHED_PARENTS: &str =
    "SELECT DISTINCT parent FROM containment_transactions WHERE transaction_id=?1";

pub(super) const STAGED_IDS: &str = "SELECT fedora_id FROM containment_transactions \
     WHERE transaction_id=?1 ORDER BY fedora_id";

pub(super) const COMMIT_PURGE: &str = "DELETE FROM containment WHERE EXISTS ( \
       SELECT 1 FROM containment_transactions t \
       WHERE t.fedora_id=containment.fedora_id AND t.transaction_id=?1 \
         AND t.operation='purge')";

pub(super) const DELETE_STAGED: &str =
    "DELETE FROM containment_transactions WHERE transaction_id=?1";

pub(super) const COUNT_STAGED: &str = "SELECT COUNT(*) FROM containment_transactions";
