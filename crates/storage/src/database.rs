#![forbid(unsafe_code)]

use crate::IndexError;
use crate::dialect::{Dialect, DialectQueries};
use crate::schema;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "containment.db";

/// Single connection to the backing store.
///
/// Callers take the lock for one statement (or one store transaction) at a
/// time; nothing holds it across a call boundary.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    dialect: Dialect,
    storage_dir: Option<PathBuf>,
}

impl Database {
    pub fn open(storage_dir: impl AsRef<Path>, dialect: Dialect) -> Result<Self, IndexError> {
        ensure_embedded(dialect)?;
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::install_sqlite_schema(&conn)?;
        tracing::debug!(dir = %storage_dir.display(), %dialect, "containment store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            dialect,
            storage_dir: Some(storage_dir),
        })
    }

    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        schema::install_sqlite_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dialect: Dialect::Sqlite,
            storage_dir: None,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn queries(&self) -> &'static DialectQueries {
        self.dialect.queries()
    }

    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

fn ensure_embedded(dialect: Dialect) -> Result<(), IndexError> {
    if dialect.is_embedded() {
        return Ok(());
    }
    Err(IndexError::Config(format!(
        "dialect {dialect} is not executed in-process; route schema::ddl({dialect}) and its queries to that engine"
    )))
}
