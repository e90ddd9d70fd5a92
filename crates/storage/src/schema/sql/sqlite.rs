#![forbid(unsafe_code)]

pub(in crate::schema) const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS containment_meta (
          key TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS containment (
          fedora_id TEXT PRIMARY KEY,
          parent TEXT NOT NULL,
          start_time INTEGER NOT NULL,
          end_time INTEGER,
          updated INTEGER
        );

        CREATE TABLE IF NOT EXISTS containment_transactions (
          fedora_id TEXT NOT NULL,
          parent TEXT NOT NULL,
          start_time INTEGER,
          end_time INTEGER,
          transaction_id TEXT NOT NULL,
          operation TEXT NOT NULL CHECK(operation IN ('add', 'delete', 'purge')),
          PRIMARY KEY(fedora_id, transaction_id)
        );
"#;
