#![forbid(unsafe_code)]

pub(in crate::schema) const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS containment (
          fedora_id VARCHAR(503) NOT NULL PRIMARY KEY,
          parent VARCHAR(503) NOT NULL,
          start_time BIGINT NOT NULL,
          end_time BIGINT NULL,
          updated BIGINT NULL,
          INDEX idx_containment_parent (parent, end_time, fedora_id)
        );

        CREATE TABLE IF NOT EXISTS containment_transactions (
          fedora_id VARCHAR(503) NOT NULL,
          parent VARCHAR(503) NOT NULL,
          start_time BIGINT NULL,
          end_time BIGINT NULL,
          transaction_id VARCHAR(255) NOT NULL,
          operation ENUM('add', 'delete', 'purge') NOT NULL,
          PRIMARY KEY (fedora_id, transaction_id),
          INDEX idx_containment_tx_parent (transaction_id, parent, operation)
        );
"#;
