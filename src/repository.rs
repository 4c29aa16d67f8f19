// src/repository.rs

use crate::models::{
    ActivityEntry, CardRecord, DailyStat, ProgressState, QuizAttempt, SessionSummary, Streak,
};
use crate::store::Store;
use chrono::NaiveDate;
use log::debug;
use serde_json::Value;

const CARDS: [&str; 2] = ["flashcards", "cards"];
const ACHIEVEMENT_GRANTS: [&str; 2] = ["progress", "achievementGrants"];

/// Fetches the review record for a card, if it has ever been created.
pub fn get_card_record(store: &Store, card_id: &str) -> Option<CardRecord> {
    store.get_at_as(&[CARDS[0], CARDS[1], card_id])
}

/// Same as [`get_card_record`], falling back to a fresh box-1 record.
pub fn card_record_or_new(store: &Store, card_id: &str) -> CardRecord {
    get_card_record(store, card_id).unwrap_or_default()
}

/// Saves the review record. Card ids are used as single path segments, so
/// ids containing dots are safe.
pub fn save_card_record(store: &mut Store, card_id: &str, record: &CardRecord) {
    store.set_at_as(&[CARDS[0], CARDS[1], card_id], record);
}

pub fn card_count(store: &Store) -> usize {
    store
        .get_at(&CARDS)
        .and_then(Value::as_object)
        .map_or(0, |m| m.len())
}

/// Lifetime review count, summed over every card record.
pub fn total_reviews(store: &Store) -> u64 {
    let Some(cards) = store.get_at(&CARDS).and_then(Value::as_object) else {
        return 0;
    };
    cards
        .values()
        .filter_map(|card| card.get("timesReviewed").and_then(Value::as_u64))
        .sum()
}

pub fn achievement_granted(store: &Store, id: &str) -> bool {
    store
        .get_at(&[ACHIEVEMENT_GRANTS[0], ACHIEVEMENT_GRANTS[1], id])
        .is_some()
}

pub fn record_achievement_grant(store: &mut Store, id: &str) {
    let now = store.now();
    store.set_at_as(&[ACHIEVEMENT_GRANTS[0], ACHIEVEMENT_GRANTS[1], id], &now);
}

/// Records a finished quiz. History is append-only.
pub fn log_quiz_attempt(store: &mut Store, attempt: &QuizAttempt) {
    match serde_json::to_value(attempt) {
        Ok(v) => store.push("progress.quizHistory", v),
        Err(e) => log::error!("[DB] Failed to serialize quiz attempt: {}", e),
    }
}

pub fn quiz_history(store: &Store) -> Vec<QuizAttempt> {
    store.get_as("progress.quizHistory").unwrap_or_default()
}

pub fn log_session_summary(store: &mut Store, summary: &SessionSummary) {
    match serde_json::to_value(summary) {
        Ok(v) => store.push("flashcards.sessionHistory", v),
        Err(e) => log::error!("[DB] Failed to serialize session summary: {}", e),
    }
}

pub fn log_activity(store: &mut Store, kind: &str, detail: &str) {
    let entry = ActivityEntry {
        kind: kind.to_string(),
        detail: detail.to_string(),
        at: store.now(),
    };
    match serde_json::to_value(&entry) {
        Ok(v) => store.push("session.activityLog", v),
        Err(e) => log::error!("[DB] Failed to serialize activity: {}", e),
    }
}

pub fn get_progress(store: &Store) -> ProgressState {
    store.get_as("progress").unwrap_or_default()
}

pub fn get_streak(store: &Store) -> Streak {
    store.get_as("progress.streak").unwrap_or_default()
}

pub fn save_streak(store: &mut Store, streak: &Streak) {
    store.set_as("progress.streak", streak);
}

/// Read-modify-write of one day's stats.
pub fn update_daily_stat(store: &mut Store, day: NaiveDate, f: impl FnOnce(&mut DailyStat)) {
    let key = day.format("%Y-%m-%d").to_string();
    let segments = ["progress", "dailyStats", key.as_str()];
    let mut stat: DailyStat = store.get_at_as(&segments).unwrap_or_default();
    f(&mut stat);
    debug!("[DB] Daily stat {} -> {:?}", key, stat);
    store.set_at_as(&segments, &stat);
}

pub fn get_daily_stat(store: &Store, day: NaiveDate) -> DailyStat {
    let key = day.format("%Y-%m-%d").to_string();
    store
        .get_at_as(&["progress", "dailyStats", key.as_str()])
        .unwrap_or_default()
}

/// Reads a string set such as `progress.achievements`.
pub fn get_id_set(store: &Store, path: &str) -> Vec<String> {
    store.get_as(path).unwrap_or_default()
}

/// Appends `id` to a unique set. Returns `false` when it was already there.
pub fn insert_unique(store: &mut Store, path: &str, id: &str) -> bool {
    let mut ids = get_id_set(store, path);
    if ids.iter().any(|existing| existing == id) {
        return false;
    }
    ids.push(id.to_string());
    store.set_as(path, &ids);
    true
}

/// Moves `id` to the most-recent end of a unique set, inserting it if absent.
/// Returns `true` when it was newly inserted.
pub fn touch_unique(store: &mut Store, path: &str, id: &str) -> bool {
    let mut ids = get_id_set(store, path);
    let before = ids.len();
    ids.retain(|existing| existing != id);
    let is_new = ids.len() == before;
    ids.push(id.to_string());
    store.set_as(path, &ids);
    is_new
}
