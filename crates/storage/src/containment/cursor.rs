#![forbid(unsafe_code)]

use super::sql;
use crate::IndexError;
use crate::database::Database;
use rusqlite::{Connection, Params, params};
use std::collections::VecDeque;

/// Which children a cursor pages over.
#[derive(Clone, Debug)]
pub(super) enum ChildQuery {
    Active { parent: String },
    ActiveInTx { parent: String, tx_id: String },
    AsOf { parent: String, at: i64 },
    Deleted { parent: String },
    DeletedInTx { parent: String, tx_id: String },
}

impl ChildQuery {
    fn fetch(
        &self,
        conn: &Connection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<String>, rusqlite::Error> {
        match self {
            Self::Active { parent } => ids(conn, sql::CHILDREN, params![parent, limit, offset]),
            Self::ActiveInTx { parent, tx_id } => ids(
                conn,
                sql::CHILDREN_IN_TX,
                params![parent, tx_id, limit, offset],
            ),
            Self::AsOf { parent, at } => ids(
                conn,
                sql::CHILDREN_AS_OF,
                params![parent, at, limit, offset],
            ),
            Self::Deleted { parent } => {
                ids(conn, sql::DELETED_CHILDREN, params![parent, limit, offset])
            }
            Self::DeletedInTx { parent, tx_id } => ids(
                conn,
                sql::DELETED_CHILDREN_IN_TX,
                params![parent, tx_id, limit, offset],
            ),
        }
    }
}

fn ids(conn: &Connection, sql: &str, args: impl Params) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(args, |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Lazy, forward-only sequence of child ids, one page of `limit` rows at a time.
///
/// The connection lock is only held while a page is fetched. A cursor ends at
/// the first empty page, or right after yielding an error.
pub struct ContainmentCursor<'a> {
    db: &'a Database,
    query: ChildQuery,
    limit: usize,
    page: usize,
    pages_loaded: usize,
    buffer: VecDeque<String>,
    pending_error: Option<IndexError>,
    finished: bool,
}

impl<'a> ContainmentCursor<'a> {
    pub(super) fn new(db: &'a Database, query: ChildQuery, limit: usize) -> Self {
        Self {
            db,
            query,
            limit: limit.max(1),
            page: 0,
            pages_loaded: 0,
            buffer: VecDeque::new(),
            pending_error: None,
            finished: false,
        }
    }

    /// Cursor that yields `err` and nothing else.
    pub(super) fn failed(db: &'a Database, query: ChildQuery, err: IndexError) -> Self {
        let mut cursor = Self::new(db, query, 1);
        cursor.pending_error = Some(err);
        cursor
    }

    /// Non-empty pages fetched so far.
    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    fn load_page(&mut self) -> Result<(), IndexError> {
        let limit = i64::try_from(self.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(self.page.saturating_mul(self.limit)).unwrap_or(i64::MAX);
        let rows = {
            let conn = self.db.lock();
            self.query.fetch(&conn, limit, offset)?
        };
        self.page += 1;
        if rows.is_empty() {
            self.finished = true;
        } else {
            self.pages_loaded += 1;
            self.buffer.extend(rows);
        }
        Ok(())
    }
}

impl Iterator for ContainmentCursor<'_> {
    type Item = Result<String, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            self.finished = true;
            return Some(Err(err));
        }
        if let Some(id) = self.buffer.pop_front() {
            return Some(Ok(id));
        }
        if self.finished {
            return None;
        }
        if let Err(err) = self.load_page() {
            self.finished = true;
            return Some(Err(err));
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl std::fmt::Debug for ContainmentCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainmentCursor")
            .field("query", &self.query)
            .field("limit", &self.limit)
            .field("page", &self.page)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
