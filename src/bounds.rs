// src/bounds.rs
//
// Every array (and the daily-stat map) in the state tree has a maximum
// retained size. The store runs `apply_bounds` before each flush and after
// each load, and `evict_oldest` when the storage medium rejects a write for
// lack of space.

use crate::constants::*;
use crate::state_tree::{get_at_mut, split_path};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrimPolicy {
    /// Ordered log: keep the most recent `max` entries.
    LastN,
    /// Identifier set: drop duplicates (keeping the most recent reference),
    /// then keep the `max` most recent unique entries.
    DedupLastN,
    /// Map keyed by sortable stamps (ISO dates): keep the `max` greatest keys.
    NewestKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundRule {
    pub path: String,
    pub max: usize,
    pub policy: TrimPolicy,
}

impl BoundRule {
    pub fn new(path: &str, max: usize, policy: TrimPolicy) -> Self {
        Self {
            path: path.to_string(),
            max,
            policy,
        }
    }
}

pub fn default_bounds() -> Vec<BoundRule> {
    use TrimPolicy::*;
    vec![
        BoundRule::new("progress.quizHistory", MAX_QUIZ_HISTORY, LastN),
        BoundRule::new("progress.completedTopics", MAX_COMPLETED_TOPICS, DedupLastN),
        BoundRule::new(
            "progress.completedMissions",
            MAX_COMPLETED_MISSIONS,
            DedupLastN,
        ),
        BoundRule::new("progress.achievements", MAX_ACHIEVEMENTS, DedupLastN),
        BoundRule::new("progress.dailyStats", MAX_DAILY_STATS, NewestKeys),
        BoundRule::new("session.activityLog", MAX_ACTIVITY_LOG, LastN),
        BoundRule::new("flashcards.sessionHistory", MAX_SESSION_HISTORY, LastN),
    ]
}

/// Trims every bounded collection to its rule's maximum. Returns how many
/// entries were removed in total.
pub fn apply_bounds(tree: &mut Value, rules: &[BoundRule]) -> usize {
    rules
        .iter()
        .map(|rule| trim_rule(tree, rule, rule.max))
        .sum()
}

/// Drops the oldest half of every bounded collection. Used after a quota
/// failure to make room before the single retry.
pub fn evict_oldest(tree: &mut Value, rules: &[BoundRule]) -> usize {
    let mut removed = 0;
    for rule in rules {
        let Some(len) = collection_len(tree, &rule.path) else {
            continue;
        };
        removed += trim_rule(tree, rule, len / 2);
    }
    debug!("[Bounds] Eviction removed {} entries", removed);
    removed
}

fn collection_len(tree: &mut Value, path: &str) -> Option<usize> {
    match get_at_mut(tree, &split_path(path))? {
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn trim_rule(tree: &mut Value, rule: &BoundRule, max: usize) -> usize {
    let Some(node) = get_at_mut(tree, &split_path(&rule.path)) else {
        return 0;
    };

    let removed = match (rule.policy, node) {
        (TrimPolicy::LastN, Value::Array(items)) => trim_last_n(items, max),
        (TrimPolicy::DedupLastN, Value::Array(items)) => trim_dedup_last_n(items, max),
        (TrimPolicy::NewestKeys, Value::Object(map)) => trim_newest_keys(map, max),
        _ => 0,
    };

    if removed > 0 {
        debug!(
            "[Bounds] {} trimmed by {} (max {}, {:?})",
            rule.path, removed, max, rule.policy
        );
    }
    removed
}

fn trim_last_n(items: &mut Vec<Value>, max: usize) -> usize {
    let excess = items.len().saturating_sub(max);
    items.drain(..excess);
    excess
}

fn trim_dedup_last_n(items: &mut Vec<Value>, max: usize) -> usize {
    let before = items.len();

    // Walk newest to oldest so the most recent reference of each value wins.
    let mut seen = HashSet::new();
    let mut kept: Vec<Value> = Vec::with_capacity(max.min(before));
    for item in items.drain(..).rev() {
        if kept.len() == max {
            break;
        }
        if seen.insert(item.to_string()) {
            kept.push(item);
        }
    }
    kept.reverse();

    *items = kept;
    before - items.len()
}

fn trim_newest_keys(map: &mut serde_json::Map<String, Value>, max: usize) -> usize {
    let excess = map.len().saturating_sub(max);
    if excess == 0 {
        return 0;
    }
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    for key in keys.into_iter().take(excess) {
        map.remove(&key);
    }
    excess
}
