#![forbid(unsafe_code)]

pub(in crate::schema) const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS containment (
          fedora_id VARCHAR(503) PRIMARY KEY,
          parent VARCHAR(503) NOT NULL,
          start_time BIGINT NOT NULL,
          end_time BIGINT,
          updated BIGINT
        );

        CREATE INDEX IF NOT EXISTS idx_containment_parent ON containment(parent, end_time, fedora_id);

        CREATE TABLE IF NOT EXISTS containment_transactions (
          fedora_id VARCHAR(503) NOT NULL,
          parent VARCHAR(503) NOT NULL,
          start_time BIGINT,
          end_time BIGINT,
          transaction_id VARCHAR(255) NOT NULL,
          operation VARCHAR(10) NOT NULL CHECK(operation IN ('add', 'delete', 'purge')),
          PRIMARY KEY(fedora_id, transaction_id)
        );

        CREATE INDEX IF NOT EXISTS idx_containment_tx_parent
          ON containment_transactions(transaction_id, parent, operation);
"#;
