#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"
        CREATE INDEX IF NOT EXISTS idx_containment_parent ON containment(parent, end_time, fedora_id);
        CREATE INDEX IF NOT EXISTS idx_containment_tx_parent ON containment_transactions(transaction_id, parent, operation);
        CREATE INDEX IF NOT EXISTS idx_containment_tx_operation ON containment_transactions(transaction_id, operation);
"#;
