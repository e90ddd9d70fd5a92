#![forbid(unsafe_code)]

mod sql;

use crate::IndexError;
use crate::dialect::Dialect;
use rusqlite::{Connection, params};

const SCHEMA_VERSION: i64 = 1;

/// DDL text for `dialect`; for client-server engines this is what an operator applies.
pub fn ddl(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite => sql::sqlite::SQL,
        Dialect::Postgres => sql::postgres::SQL,
        Dialect::MySql | Dialect::MariaDb => sql::mysql::SQL,
    }
}

pub(crate) fn install_sqlite_schema(conn: &Connection) -> Result<(), IndexError> {
    conn.execute_batch(&sql::full_sqlite_sql())?;
    conn.execute(
        "INSERT INTO containment_meta(key, value) VALUES ('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_dialect_declares_both_tables() {
        for dialect in [Dialect::Sqlite, Dialect::Postgres, Dialect::MySql, Dialect::MariaDb] {
            let ddl = ddl(dialect);
            assert!(ddl.contains("CREATE TABLE IF NOT EXISTS containment ("), "{dialect}");
            assert!(ddl.contains("containment_transactions"), "{dialect}");
            assert!(ddl.contains("PRIMARY KEY"), "{dialect}");
        }
        assert!(ddl(Dialect::MariaDb).contains("ENUM('add', 'delete', 'purge')"));
    }

    #[test]
    fn installing_twice_is_harmless() {
        let conn = Connection::open_in_memory().expect("open");
        install_sqlite_schema(&conn).expect("first install");
        install_sqlite_schema(&conn).expect("second install");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'containment%'",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 3);
    }
}
