#![forbid(unsafe_code)]

//! Per-dialect SQL for the statements whose syntax differs between backing
//! stores. Every variant supplies the same statements with the same positional
//! parameter order; only the text differs.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Embedded engine, executed in-process.
    #[default]
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
    MySql,
    MariaDb,
}

/// Statement text for one dialect.
///
/// Parameters:
/// * `upsert_record`: fedora_id, parent, start_time, end_time
/// * `upsert_staged`: fedora_id, parent, start_time, end_time, transaction_id, operation
/// * `commit_add`, `commit_delete`: transaction_id
#[derive(Debug)]
pub struct DialectQueries {
    pub upsert_record: &'static str,
    pub upsert_staged: &'static str,
    pub commit_add: &'static str,
    pub commit_delete: &'static str,
    pub truncate_records: &'static str,
    pub truncate_staged: &'static str,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
        }
    }

    /// Only the embedded engine runs inside this process.
    pub fn is_embedded(self) -> bool {
        matches!(self, Self::Sqlite)
    }

    pub fn queries(self) -> &'static DialectQueries {
        match self {
            Self::Sqlite => &SQLITE,
            Self::Postgres => &POSTGRES,
            Self::MySql | Self::MariaDb => &MYSQL,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "embedded" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}

static SQLITE: DialectQueries = DialectQueries {
    upsert_record: "INSERT INTO containment(fedora_id, parent, start_time, end_time) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(fedora_id) DO UPDATE SET parent=excluded.parent, \
         start_time=excluded.start_time, end_time=excluded.end_time",
    upsert_staged: "INSERT INTO containment_transactions(fedora_id, parent, start_time, end_time, transaction_id, operation) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(fedora_id, transaction_id) DO UPDATE SET parent=excluded.parent, \
         start_time=excluded.start_time, end_time=excluded.end_time, operation=excluded.operation",
    commit_add: "INSERT INTO containment(fedora_id, parent, start_time, end_time) \
         SELECT fedora_id, parent, start_time, end_time FROM containment_transactions \
         WHERE transaction_id=?1 AND operation='add' \
         ON CONFLICT(fedora_id) DO UPDATE SET parent=excluded.parent, \
         start_time=excluded.start_time, end_time=excluded.end_time",
    commit_delete: "UPDATE containment SET end_time=( \
           SELECT t.end_time FROM containment_transactions t \
           WHERE t.fedora_id=containment.fedora_id AND t.parent=containment.parent \
             AND t.transaction_id=?1 AND t.operation='delete') \
         WHERE end_time IS NULL AND EXISTS ( \
           SELECT 1 FROM containment_transactions t \
           WHERE t.fedora_id=containment.fedora_id AND t.parent=containment.parent \
             AND t.transaction_id=?1 AND t.operation='delete')",
    truncate_records: "DELETE FROM containment",
    truncate_staged: "DELETE FROM containment_transactions",
};

static POSTGRES: DialectQueries = DialectQueries {
    upsert_record: "INSERT INTO containment(fedora_id, parent, start_time, end_time) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT(fedora_id) DO UPDATE SET parent=EXCLUDED.parent, \
         start_time=EXCLUDED.start_time, end_time=EXCLUDED.end_time",
    upsert_staged: "INSERT INTO containment_transactions(fedora_id, parent, start_time, end_time, transaction_id, operation) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT(fedora_id, transaction_id) DO UPDATE SET parent=EXCLUDED.parent, \
         start_time=EXCLUDED.start_time, end_time=EXCLUDED.end_time, operation=EXCLUDED.operation",
    commit_add: "INSERT INTO containment(fedora_id, parent, start_time, end_time) \
         SELECT fedora_id, parent, start_time, end_time FROM containment_transactions \
         WHERE transaction_id=$1 AND operation='add' \
         ON CONFLICT(fedora_id) DO UPDATE SET parent=EXCLUDED.parent, \
         start_time=EXCLUDED.start_time, end_time=EXCLUDED.end_time",
    commit_delete: "UPDATE containment SET end_time=t.end_time \
         FROM containment_transactions t \
         WHERE t.fedora_id=containment.fedora_id AND t.parent=containment.parent \
           AND t.transaction_id=$1 AND t.operation='delete' AND containment.end_time IS NULL",
    truncate_records: "TRUNCATE TABLE containment",
    truncate_staged: "TRUNCATE TABLE containment_transactions",
};

static MYSQL: DialectQueries = DialectQueries {
    upsert_record: "INSERT INTO containment(fedora_id, parent, start_time, end_time) \
         VALUES (?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE parent=VALUES(parent), \
         start_time=VALUES(start_time), end_time=VALUES(end_time)",
    upsert_staged: "INSERT INTO containment_transactions(fedora_id, parent, start_time, end_time, transaction_id, operation) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE parent=VALUES(parent), \
         start_time=VALUES(start_time), end_time=VALUES(end_time), operation=VALUES(operation)",
    commit_add: "INSERT INTO containment(fedora_id, parent, start_time, end_time) \
         SELECT t.fedora_id, t.parent, t.start_time, t.end_time FROM containment_transactions t \
         WHERE t.transaction_id=? AND t.operation='add' \
         ON DUPLICATE KEY UPDATE parent=t.parent, start_time=t.start_time, end_time=t.end_time",
    commit_delete: "UPDATE containment r INNER JOIN containment_transactions t \
           ON t.fedora_id=r.fedora_id \
         SET r.end_time=t.end_time \
         WHERE t.parent=r.parent AND t.transaction_id=? AND t.operation='delete' \
           AND r.end_time IS NULL",
    truncate_records: "TRUNCATE TABLE containment",
    truncate_staged: "TRUNCATE TABLE containment_transactions",
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Dialect; 4] = [
        Dialect::Sqlite,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::MariaDb,
    ];

    #[test]
    fn every_dialect_upserts_instead_of_inserting_blindly() {
        for dialect in ALL {
            let queries = dialect.queries();
            for sql in [
                queries.upsert_record,
                queries.upsert_staged,
                queries.commit_add,
            ] {
                assert!(
                    sql.contains("ON CONFLICT") || sql.contains("ON DUPLICATE KEY"),
                    "{dialect}: {sql}"
                );
            }
        }
    }

    #[test]
    fn mysql_family_shares_statements() {
        assert!(std::ptr::eq(
            Dialect::MySql.queries(),
            Dialect::MariaDb.queries()
        ));
        assert!(Dialect::MySql.queries().commit_delete.contains("INNER JOIN"));
        assert!(Dialect::Postgres.queries().commit_delete.contains("FROM containment_transactions t"));
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("PostgreSQL".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("mariadb".parse::<Dialect>(), Ok(Dialect::MariaDb));
        assert_eq!("embedded".parse::<Dialect>(), Ok(Dialect::Sqlite));
        assert!("oracle".parse::<Dialect>().is_err());
        assert!(Dialect::Sqlite.is_embedded());
        assert!(!Dialect::Postgres.is_embedded());
    }
}
