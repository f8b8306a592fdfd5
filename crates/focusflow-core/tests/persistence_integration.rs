//! Store behaviour across restarts and under backend failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use focusflow_core::error::StorageError;
use focusflow_core::{
    Collection, ControllerOptions, Database, Event, Phase, RecordStore, SessionDraft,
    SessionStore, SettingsPatch, SettingsStore, StatsEngine, TimerController, TimerStatus,
};
use serde_json::Value;

/// Delegates to an in-memory database but can refuse session writes.
struct FlakyStore {
    inner: Database,
    fail_sessions: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: Database::open_memory().unwrap(),
            fail_sessions: AtomicBool::new(false),
        }
    }
}

impl RecordStore for FlakyStore {
    fn read_record(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError> {
        self.inner.read_record(collection, id)
    }

    fn read_records(&self, collection: Collection) -> Result<Vec<Value>, StorageError> {
        self.inner.read_records(collection)
    }

    fn write_record(&self, collection: Collection, record: Value) -> Result<Value, StorageError> {
        if collection == Collection::Sessions && self.fail_sessions.load(Ordering::SeqCst) {
            return Err(StorageError::Locked);
        }
        self.inner.write_record(collection, record)
    }

    fn delete_record(&self, collection: Collection, id: &str) -> Result<bool, StorageError> {
        self.inner.delete_record(collection, id)
    }
}

#[tokio::test(start_paused = true)]
async fn failed_session_write_keeps_timer_completed() {
    let store = Arc::new(FlakyStore::new());
    let timer = TimerController::new(store.clone(), ControllerOptions::default());
    timer
        .update_settings(&SettingsPatch {
            work_duration: Some(1),
            ..Default::default()
        })
        .unwrap();
    let mut rx = timer.subscribe();

    store.fail_sessions.store(true, Ordering::SeqCst);
    timer.start();
    tokio::time::sleep(Duration::from_millis(60_500)).await;

    assert_eq!(timer.status(), TimerStatus::Completed);
    assert!(timer.sessions().list().unwrap().is_empty());

    let mut failures = Vec::new();
    let mut completed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::PersistenceFailed { operation, .. } => failures.push(operation),
            Event::PhaseCompleted { .. } => completed = true,
            _ => {}
        }
    }
    assert_eq!(failures, vec!["sessions.create".to_string()]);
    assert!(completed);

    // The next phase still works once storage recovers.
    store.fail_sessions.store(false, Ordering::SeqCst);
    assert!(timer.advance_phase().is_some());
    assert_eq!(timer.phase(), Phase::Break);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusflow.db");

    {
        let db: Arc<dyn RecordStore> = Arc::new(Database::open_at(&path).unwrap());
        let sessions = SessionStore::new(db.clone());
        let start = Utc::now() - ChronoDuration::minutes(25);
        sessions
            .create(SessionDraft::finished(Phase::Work, 25, start, Utc::now(), None))
            .unwrap();
        SettingsStore::new(db.clone())
            .update(&SettingsPatch {
                work_duration: Some(40),
                ..Default::default()
            })
            .unwrap();
        StatsEngine::new(db, sessions).update_daily_goal(5).unwrap();
    }

    let db: Arc<dyn RecordStore> = Arc::new(Database::open_at(&path).unwrap());
    let sessions = SessionStore::new(db.clone());
    assert_eq!(sessions.list().unwrap().len(), 1);
    assert_eq!(SettingsStore::new(db.clone()).get().work_duration, 40);

    let stats = StatsEngine::new(db, sessions).get().unwrap();
    assert_eq!(stats.daily_goal, 5);
    assert_eq!(stats.total_sessions, 1);
}

#[test]
fn stats_follow_session_deletion() {
    let db: Arc<dyn RecordStore> = Arc::new(Database::open_memory().unwrap());
    let sessions = SessionStore::new(db.clone());
    let stats = StatsEngine::new(db, sessions.clone());

    let start = Utc::now() - ChronoDuration::minutes(25);
    let saved = sessions
        .create(SessionDraft::finished(Phase::Work, 25, start, Utc::now(), None))
        .unwrap();
    assert_eq!(stats.increment_completed().unwrap().total_sessions, 1);

    assert!(sessions.delete(&saved.id).unwrap());
    let s = stats.get().unwrap();
    assert_eq!(s.total_sessions, 0);
    assert_eq!(s.completed_today, 0);
    assert_eq!(s.current_streak, 0);
}
