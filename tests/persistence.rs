// tests/persistence.rs
//
// The store against an on-disk SQLite database.

use chrono::{Duration, TimeZone, Utc};
use leitner_progress::ledger;
use leitner_progress::models::QuizAttempt;
use leitner_progress::repository;
use leitner_progress::{Clock, EngineConfig, FlushOutcome, ManualClock, SqliteStorage, Store};
use serde_json::json;
use std::path::Path;

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 2, 9, 30, 0).unwrap())
}

fn open(path: &Path, clock: &ManualClock) -> Store {
    let config = EngineConfig::default();
    let storage = SqliteStorage::open(path, config.quota_bytes).expect("open sqlite");
    Store::open(storage, clock.clone(), config)
}

fn attempt(n: usize, clock: &ManualClock) -> QuizAttempt {
    QuizAttempt {
        task_id: format!("attempt-{n}"),
        score: 7,
        total: 10,
        percentage: 70,
        passed: false,
        timestamp: clock.now(),
        time_spent_secs: 30,
        difficulty: "mixed".into(),
    }
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("progress.db");
    let clock = clock();

    {
        let mut store = open(&db, &clock);
        store.set("settings.dailyGoalXp", json!(250));
        ledger::add_xp(&mut store, 40);
        assert!(store.has_pending_flush());
        // Dropping the store flushes the pending write.
    }

    let store = open(&db, &clock);
    assert_eq!(store.get_as::<u64>("settings.dailyGoalXp"), Some(250));
    assert_eq!(store.get_as::<u64>("progress.xp"), Some(40));
    // Keys the snapshot never had still come from the defaults.
    assert_eq!(store.get_as::<bool>("settings.soundEnabled"), Some(true));
}

#[test]
fn debounced_write_lands_after_window() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("progress.db");
    let clock = clock();

    let mut store = open(&db, &clock);
    store.set("progress.xp", json!(5));
    clock.advance(Duration::milliseconds(100));
    store.set("progress.xp", json!(6));
    clock.advance(Duration::milliseconds(200));
    assert_eq!(store.tick(), None, "second write re-armed the window");

    clock.advance(Duration::milliseconds(50));
    assert!(matches!(store.tick(), Some(FlushOutcome::Written { .. })));
    assert!(!store.has_pending_flush());

    // A second handle on the same file sees the flushed value.
    let other = open(&db, &clock);
    assert_eq!(other.get_as::<u64>("progress.xp"), Some(6));
}

#[test]
fn quiz_history_is_capped_at_500_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("progress.db");
    let clock = clock();

    {
        let mut store = open(&db, &clock);
        for n in 1..=501 {
            repository::log_quiz_attempt(&mut store, &attempt(n, &clock));
        }
        store.flush_now();
        assert_eq!(repository::quiz_history(&store).len(), 500);
    }

    let store = open(&db, &clock);
    let history = repository::quiz_history(&store);
    assert_eq!(history.len(), 500);
    assert_eq!(history.first().map(|a| a.task_id.as_str()), Some("attempt-2"));
    assert_eq!(history.last().map(|a| a.task_id.as_str()), Some("attempt-501"));
}

#[test]
fn write_over_quota_is_dropped_and_memory_survives() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("progress.db");
    let clock = clock();

    let mut config = EngineConfig::default();
    config.quota_bytes = Some(16);
    let storage = SqliteStorage::open(&db, config.quota_bytes).expect("open sqlite");
    let mut store = Store::open(storage, clock.clone(), config);

    store.set("progress.xp", json!(99));
    assert_eq!(store.flush_now(), FlushOutcome::Dropped);
    assert_eq!(store.get_as::<u64>("progress.xp"), Some(99));
    drop(store);

    let reopened = open(&db, &clock);
    assert_eq!(reopened.get_as::<u64>("progress.xp"), Some(0));
}

#[test]
fn export_then_import_into_fresh_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = clock();

    let exported = {
        let mut store = open(&dir.path().join("a.db"), &clock);
        ledger::add_xp(&mut store, 480);
        ledger::add_xp(&mut store, 40);
        ledger::complete_mission(&mut store, "warmup");
        store.export().expect("export")
    };

    let mut fresh = open(&dir.path().join("b.db"), &clock);
    fresh.import(&exported).expect("import");
    assert_eq!(fresh.get_as::<u64>("progress.xp"), Some(520));
    assert_eq!(fresh.get_as::<u32>("progress.level"), Some(2));
    assert_eq!(
        repository::get_id_set(&fresh, "progress.completedMissions"),
        vec!["warmup"]
    );
    drop(fresh);

    // Import flushes immediately, so the new file already holds the state.
    let reopened = open(&dir.path().join("b.db"), &clock);
    assert_eq!(reopened.get_as::<u32>("progress.level"), Some(2));
}

#[test]
fn corrupt_snapshot_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("progress.db");
    let clock = clock();

    {
        let conn = rusqlite::Connection::open(&db).expect("open raw");
        leitner_progress::database::init_db(&conn).expect("schema");
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, 0)",
            rusqlite::params!["learning-progress", "{not json"],
        )
        .expect("insert");
    }

    let store = open(&db, &clock);
    assert_eq!(store.get_as::<u32>("progress.level"), Some(1));
}
