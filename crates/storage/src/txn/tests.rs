use super::*;
use parking_lot::Mutex;

#[derive(Default)]
struct Recorder {
    name: &'static str,
    fail_commit: bool,
    fail_rollback: bool,
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl TransactionParticipant for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn commit_transaction(&self, _tx: &Transaction) -> Result<(), IndexError> {
        self.calls.lock().push(format!("{}:commit", self.name));
        if self.fail_commit {
            return Err(IndexError::InvalidInput("commit refused"));
        }
        Ok(())
    }

    fn rollback_transaction(&self, _tx: &Transaction) -> Result<(), IndexError> {
        self.calls.lock().push(format!("{}:rollback", self.name));
        if self.fail_rollback {
            return Err(IndexError::InvalidInput("rollback refused"));
        }
        Ok(())
    }

    fn clear_all_transactions(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

fn tx_with(participants: Vec<Arc<Recorder>>) -> Transaction {
    let participants: Vec<Arc<dyn TransactionParticipant>> = participants
        .into_iter()
        .map(|p| p as Arc<dyn TransactionParticipant>)
        .collect();
    Transaction::new(
        "tx-1".to_string(),
        false,
        Duration::from_secs(60),
        Arc::from(participants),
    )
}

#[test]
fn new_transaction_is_open_and_clean() {
    let tx = tx_with(Vec::new());
    assert_eq!(tx.state(), TransactionState::New);
    assert!(tx.is_open());
    assert!(tx.is_open_long_running());
    assert!(tx.expires_at() > OffsetDateTime::now_utc());

    tx.set_short_lived(true);
    assert!(!tx.is_open_long_running());
}

#[test]
fn run_in_marks_dirty_and_returns_the_work_result() {
    let tx = tx_with(Vec::new());
    let value = tx.run_in(|tx| Ok(tx.id().len())).unwrap();
    assert_eq!(value, 4);
    assert_eq!(tx.state(), TransactionState::Dirty);
}

#[test]
fn commit_is_idempotent_and_blocks_further_work() {
    let recorder = Arc::new(Recorder::named("a"));
    let tx = tx_with(vec![recorder.clone()]);
    tx.commit().unwrap();
    tx.commit().unwrap();
    assert!(tx.is_committed());
    assert_eq!(recorder.calls(), vec!["a:commit"]);

    let err = tx.run_in(|_| Ok(())).unwrap_err();
    assert_eq!(err.closed_reason(), Some(ClosedReason::Committed));
    assert_eq!(err.code(), "TX_CLOSED");
    let err = tx.rollback().unwrap_err();
    assert_eq!(err.closed_reason(), Some(ClosedReason::Committed));
}

#[test]
fn rollback_is_idempotent_and_blocks_commit() {
    let recorder = Arc::new(Recorder::named("a"));
    let tx = tx_with(vec![recorder.clone()]);
    tx.rollback().unwrap();
    tx.rollback().unwrap();
    assert_eq!(tx.state(), TransactionState::RolledBack);
    assert_eq!(recorder.calls(), vec!["a:rollback"]);

    let err = tx.commit().unwrap_err();
    assert_eq!(err.closed_reason(), Some(ClosedReason::RolledBack));
    assert!(err.to_string().contains("rolled back"));
}

#[test]
fn failed_commit_rolls_back_every_participant() {
    let first = Arc::new(Recorder::named("first"));
    let failing = Arc::new(Recorder {
        name: "failing",
        fail_commit: true,
        ..Recorder::default()
    });
    let last = Arc::new(Recorder::named("last"));
    let tx = tx_with(vec![first.clone(), failing.clone(), last.clone()]);

    let err = tx.commit().unwrap_err();
    assert_eq!(err.code(), "REPOSITORY_RUNTIME");
    assert!(tx.is_rolled_back());
    assert_eq!(first.calls(), vec!["first:commit", "first:rollback"]);
    assert_eq!(failing.calls(), vec!["failing:commit", "failing:rollback"]);
    assert_eq!(last.calls(), vec!["last:rollback"]);
}

#[test]
fn rollback_continues_past_participant_failures() {
    let failing = Arc::new(Recorder {
        name: "failing",
        fail_rollback: true,
        ..Recorder::default()
    });
    let after = Arc::new(Recorder::named("after"));
    let tx = tx_with(vec![failing.clone(), after.clone()]);
    tx.rollback().unwrap();
    assert_eq!(after.calls(), vec!["after:rollback"]);
    assert!(tx.is_rolled_back());
}

#[test]
fn expired_transactions_refuse_work_but_can_roll_back() {
    let tx = tx_with(Vec::new());
    tx.expire();
    assert!(tx.has_expired());
    assert!(!tx.is_open());
    assert!(!tx.is_open_long_running());

    for err in [
        tx.run_in(|_| Ok(())).unwrap_err(),
        tx.refresh().unwrap_err(),
        tx.commit().unwrap_err(),
    ] {
        assert_eq!(err.closed_reason(), Some(ClosedReason::Expired));
    }
    tx.rollback().unwrap();
    assert!(tx.is_rolled_back());
}

#[test]
fn update_expiry_moves_the_deadline() {
    let tx = tx_with(Vec::new());
    tx.update_expiry(Duration::from_secs(3600)).unwrap();
    assert!(tx.expires_at() > OffsetDateTime::now_utc() + Duration::from_secs(3000));
    tx.refresh().unwrap();
    assert!(tx.expires_at() < OffsetDateTime::now_utc() + Duration::from_secs(120));
}

#[test]
fn commit_if_short_lived_only_commits_short_lived() {
    let recorder = Arc::new(Recorder::named("a"));
    let tx = tx_with(vec![recorder.clone()]);
    tx.commit_if_short_lived().unwrap();
    assert!(!tx.is_committed());

    tx.set_short_lived(true);
    tx.commit_if_short_lived().unwrap();
    assert!(tx.is_committed());
}

#[test]
fn commit_waits_for_work_already_running_in_the_transaction() {
    let recorder = Arc::new(Recorder::named("index"));
    let tx = Arc::new(tx_with(vec![recorder.clone()]));
    let (started, wait_started) = std::sync::mpsc::channel();

    let worker = {
        let tx = Arc::clone(&tx);
        let recorder = Arc::clone(&recorder);
        std::thread::spawn(move || {
            tx.run_in(|_| {
                started.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
                recorder.calls.lock().push("work".to_string());
                Ok(())
            })
        })
    };
    wait_started.recv().unwrap();
    tx.commit().unwrap();
    worker.join().unwrap().unwrap();

    assert_eq!(recorder.calls(), vec!["work", "index:commit"]);
    assert!(tx.run_in(|_| Ok(())).is_err());
}
