// src/ledger.rs
//
// XP, levels, achievements, missions and streaks. Everything here is a thin
// layer over the store's `progress` subtree.

use crate::constants::*;
use crate::models::Streak;
use crate::repository;
use chrono::NaiveDate;
use log::{debug, info};

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub xp: u64,
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement { id: "first-quiz", title: "First Steps", xp: 25 },
    Achievement { id: "perfect-quiz", title: "Flawless", xp: 100 },
    Achievement { id: "streak-3", title: "On a Roll", xp: 50 },
    Achievement { id: "streak-7", title: "Week Warrior", xp: 150 },
    Achievement { id: "level-5", title: "Rising Star", xp: 200 },
    Achievement { id: "cards-100", title: "Card Shark", xp: 100 },
    Achievement { id: "topics-10", title: "Explorer", xp: 150 },
];

pub fn find_achievement(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGrant {
    pub total: u64,
    pub level: u32,
    pub leveled_up: bool,
}

/// Cumulative XP needed to advance past `level`.
pub fn next_level_threshold(level: u32) -> u64 {
    XP_PER_LEVEL * u64::from(level.max(1))
}

/// Adds XP and advances the level at most once per call, even when a large
/// grant crosses several thresholds.
pub fn add_xp(store: &mut Store, amount: u64) -> XpGrant {
    let old_total: u64 = store.get_as("progress.xp").unwrap_or(0);
    let level: u32 = store.get_as::<u32>("progress.level").unwrap_or(1).max(1);

    let total = old_total.saturating_add(amount);
    let leveled_up = total >= next_level_threshold(level);
    let new_level = if leveled_up { level + 1 } else { level };

    store.set_as("progress.xp", &total);
    store.set_as("progress.level", &new_level);
    if amount > 0 {
        let today = store.today();
        repository::update_daily_stat(store, today, |s| s.xp += amount);
    }

    if leveled_up {
        info!("[XP] Level up! {} -> {} ({} XP)", level, new_level, total);
        repository::log_activity(store, "level", &format!("Reached level {new_level}"));
    } else {
        debug!("[XP] +{} -> {} (level {})", amount, total, level);
    }

    XpGrant {
        total,
        level: new_level,
        leveled_up,
    }
}

/// Unlocks an achievement once. Returns `true` only on the call that
/// unlocked it; the catalog XP is granted on that call alone.
///
/// The displayed set is bounded and may forget old ids, so catalog grants
/// are also kept in `progress.achievementGrants`, which is never trimmed.
pub fn unlock_achievement(store: &mut Store, id: &str) -> bool {
    let catalog = find_achievement(id);
    if catalog.is_some() && repository::achievement_granted(store, id) {
        debug!("[Achievement] '{}' already granted", id);
        return false;
    }
    if !repository::insert_unique(store, "progress.achievements", id) {
        return false;
    }

    let xp = catalog.map_or(0, |a| a.xp);
    info!("[Achievement] Unlocked '{}' (+{} XP)", id, xp);
    repository::log_activity(store, "achievement", id);
    if catalog.is_some() {
        repository::record_achievement_grant(store, id);
    }
    if xp > 0 {
        add_xp(store, xp);
    }
    true
}

pub fn complete_mission(store: &mut Store, mission_id: &str) -> bool {
    let added = repository::insert_unique(store, "progress.completedMissions", mission_id);
    if added {
        info!("[Mission] Completed '{}'", mission_id);
        repository::log_activity(store, "mission", mission_id);
    }
    added
}

/// Marks a topic completed. Re-completing refreshes its recency without
/// creating a duplicate. Returns `true` the first time.
pub fn mark_topic_completed(store: &mut Store, topic_id: &str) -> bool {
    let first_time = repository::touch_unique(store, "progress.completedTopics", topic_id);
    if first_time {
        info!("[Progress] Topic '{}' completed", topic_id);
    }
    first_time
}

/// Same day: no change. Next day: extend. Longer gap: reset to zero.
/// The very first active day starts the streak at one.
pub fn update_streak(store: &mut Store, today: NaiveDate) -> Streak {
    let mut streak = repository::get_streak(store);

    match streak.last_active_day {
        Some(last) if last == today => return streak,
        Some(last) if last.succ_opt() == Some(today) => {
            streak.current += 1;
        }
        Some(last) if last > today => {
            debug!("[Streak] Clock moved backwards ({} -> {}), ignoring", last, today);
            return streak;
        }
        Some(_) => {
            info!("[Streak] Broken after {} days", streak.current);
            streak.current = 0;
        }
        None => streak.current = 1,
    }

    streak.longest = streak.longest.max(streak.current);
    streak.last_active_day = Some(today);
    repository::save_streak(store, &streak);
    streak
}

/// Unlocks every catalog achievement whose condition now holds. Returns
/// the ids unlocked by this call.
pub fn check_achievements(store: &mut Store) -> Vec<&'static str> {
    let progress = repository::get_progress(store);
    let cards_reviewed = repository::total_reviews(store);

    let candidates = [
        ("first-quiz", !progress.quiz_history.is_empty()),
        (
            "perfect-quiz",
            progress.quiz_history.iter().any(|q| q.total > 0 && q.score == q.total),
        ),
        ("streak-3", progress.streak.longest >= 3),
        ("streak-7", progress.streak.longest >= 7),
        ("level-5", progress.level >= 5),
        ("cards-100", cards_reviewed >= 100),
        ("topics-10", progress.completed_topics.len() >= 10),
    ];

    candidates
        .into_iter()
        .filter(|(_, earned)| *earned)
        .filter(|(id, _)| unlock_achievement(store, id))
        .map(|(id, _)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::database::MemoryStorage;
    use crate::models::CardRecord;
    use chrono::{TimeZone, Utc};

    fn store() -> Store {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap());
        Store::open(MemoryStorage::new(), clock, EngineConfig::default())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn test_crossing_threshold_levels_up_once() {
        let mut store = store();
        add_xp(&mut store, 480);
        let grant = add_xp(&mut store, 40);
        assert_eq!(grant, XpGrant { total: 520, level: 2, leveled_up: true });
        assert_eq!(store.get_as::<u32>("progress.level"), Some(2));
    }

    #[test]
    fn test_large_grant_is_single_increment() {
        let mut store = store();
        let grant = add_xp(&mut store, 5000);
        assert_eq!(grant.level, 2);
        // The next grant continues from level 2 (threshold 1000).
        assert_eq!(add_xp(&mut store, 0).level, 3);
    }

    #[test]
    fn test_below_threshold_keeps_level() {
        let mut store = store();
        let grant = add_xp(&mut store, 499);
        assert!(!grant.leveled_up);
        assert_eq!(grant.level, 1);
    }

    #[test]
    fn test_xp_is_credited_to_today() {
        let mut store = store();
        add_xp(&mut store, 30);
        add_xp(&mut store, 12);
        assert_eq!(repository::get_daily_stat(&store, store.today()).xp, 42);
    }

    #[test]
    fn test_duplicate_unlock_grants_xp_once() {
        let mut store = store();
        assert!(unlock_achievement(&mut store, "perfect-quiz"));
        assert!(!unlock_achievement(&mut store, "perfect-quiz"));
        assert_eq!(repository::get_id_set(&store, "progress.achievements").len(), 1);
        assert_eq!(store.get_as::<u64>("progress.xp"), Some(100));
    }

    #[test]
    fn test_evicted_achievement_is_not_granted_again() {
        let mut store = store();
        assert!(unlock_achievement(&mut store, "perfect-quiz"));
        for n in 0..MAX_ACHIEVEMENTS {
            unlock_achievement(&mut store, &format!("badge-{n}"));
        }
        store.flush_now();
        let shown = repository::get_id_set(&store, "progress.achievements");
        assert_eq!(shown.len(), MAX_ACHIEVEMENTS);
        assert!(!shown.contains(&"perfect-quiz".to_string()));

        assert!(!unlock_achievement(&mut store, "perfect-quiz"));
        assert_eq!(store.get_as::<u64>("progress.xp"), Some(100));
    }

    #[test]
    fn test_cards_milestone_counts_reviews_beyond_daily_window() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        let mut store = Store::open(MemoryStorage::new(), clock.clone(), EngineConfig::default());
        for n in 0..150 {
            let record = CardRecord {
                last_seen: Some(store.now()),
                times_reviewed: 1,
                ..CardRecord::default()
            };
            repository::save_card_record(&mut store, &format!("card-{n}"), &record);
            let today = store.today();
            repository::update_daily_stat(&mut store, today, |s| s.cards_reviewed += 1);
            store.flush_now();
            clock.advance(chrono::Duration::days(1));
        }

        assert_eq!(repository::get_progress(&store).daily_stats.len(), MAX_DAILY_STATS);
        assert!(check_achievements(&mut store).contains(&"cards-100"));
    }

    #[test]
    fn test_unknown_achievement_unlocks_without_xp() {
        let mut store = store();
        assert!(unlock_achievement(&mut store, "custom-badge"));
        assert_eq!(store.get_as::<u64>("progress.xp"), Some(0));
    }

    #[test]
    fn test_missions_are_unique() {
        let mut store = store();
        assert!(complete_mission(&mut store, "m1"));
        assert!(!complete_mission(&mut store, "m1"));
        assert_eq!(repository::get_id_set(&store, "progress.completedMissions"), vec!["m1"]);
    }

    #[test]
    fn test_streak_transitions() {
        let mut store = store();
        assert_eq!(update_streak(&mut store, day(1)).current, 1);
        assert_eq!(update_streak(&mut store, day(1)).current, 1);
        assert_eq!(update_streak(&mut store, day(2)).current, 2);
        let s = update_streak(&mut store, day(3));
        assert_eq!((s.current, s.longest), (3, 3));

        let broken = update_streak(&mut store, day(6));
        assert_eq!(broken.current, 0);
        assert_eq!(broken.longest, 3);
        assert_eq!(broken.last_active_day, Some(day(6)));

        assert_eq!(update_streak(&mut store, day(7)).current, 1);
    }

    #[test]
    fn test_check_achievements_from_streak() {
        let mut store = store();
        for d in 1..=3 {
            update_streak(&mut store, day(d));
        }
        assert_eq!(check_achievements(&mut store), vec!["streak-3"]);
        assert!(check_achievements(&mut store).is_empty());
    }

    #[test]
    fn test_topic_completion_refreshes_recency() {
        let mut store = store();
        assert!(mark_topic_completed(&mut store, "d1t1"));
        assert!(mark_topic_completed(&mut store, "d1t2"));
        assert!(!mark_topic_completed(&mut store, "d1t1"));
        assert_eq!(
            repository::get_id_set(&store, "progress.completedTopics"),
            vec!["d1t2", "d1t1"]
        );
    }
}
