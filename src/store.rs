// src/store.rs
//
// Single source of truth for learner state. Reads and writes go to an
// in-memory JSON tree; durability is a debounced flush of the whole tree to
// a `SnapshotStorage` under one key. Before every flush the bounded
// collections are trimmed so the durable snapshot stays within budget.
//
// The flush timer is an explicit two-state machine (`FlushState`). The
// host drives it with `Store::tick`; `Store::flush_now` cancels the
// pending deadline and writes synchronously.

use crate::bounds::{apply_bounds, evict_oldest};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::constants::*;
use crate::database::SnapshotStorage;
use crate::error::StoreError;
use crate::models::LearnerState;
use crate::state_tree::{deep_merge, get_at, set_at, split_path};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type SubscriptionId = u64;

static NULL: Value = Value::Null;

/// What subscribers receive: the topic (first path segment), the full path
/// that was written and the topic's new subtree.
#[derive(Debug, Clone, Copy)]
pub struct StateChange<'a> {
    pub topic: &'a str,
    pub path: &'a str,
    pub value: &'a Value,
}

type Callback = Box<dyn FnMut(&StateChange<'_>)>;

struct Subscriber {
    id: SubscriptionId,
    topic: String,
    callback: Callback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    Pending { due_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Written { bytes: usize },
    WrittenAfterEviction { bytes: usize, evicted: usize },
    /// The write failed and was dropped; state lives on in memory only.
    Dropped,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument {
    format_version: u32,
    exported_at: DateTime<Utc>,
    state: Value,
}

pub struct Store {
    tree: Value,
    defaults: Value,
    storage: Box<dyn SnapshotStorage>,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    flush_state: FlushState,
    /// Set by every change, cleared only by a successful write.
    dirty: bool,
    subscribers: Vec<Subscriber>,
    next_subscription: SubscriptionId,
}

impl Store {
    /// Loads the saved snapshot (if any) onto a fresh default tree.
    pub fn open(
        storage: impl SnapshotStorage + 'static,
        clock: impl Clock + 'static,
        config: EngineConfig,
    ) -> Self {
        let defaults = default_tree();
        let mut tree = defaults.clone();

        match storage.read(&config.storage_key) {
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(saved @ Value::Object(_)) => {
                    info!("Loaded saved progress ({} bytes)", text.len());
                    deep_merge(&mut tree, saved);
                }
                Ok(_) => warn!("Saved progress is not an object, starting from defaults"),
                Err(e) => warn!("Saved progress is corrupt ({}), starting from defaults", e),
            },
            Ok(None) => info!("No saved progress under '{}'", config.storage_key),
            Err(e) => warn!("Failed to read saved progress ({}), starting from defaults", e),
        }
        apply_bounds(&mut tree, &config.bounds);

        Self {
            tree,
            defaults,
            storage: Box::new(storage),
            clock: Box::new(clock),
            config,
            flush_state: FlushState::Idle,
            dirty: false,
            subscribers: Vec::new(),
            next_subscription: 1,
        }
    }

    // ==================== Reads ====================

    pub fn get(&self, path: &str) -> Option<&Value> {
        get_at(&self.tree, &split_path(path))
    }

    /// Like [`Store::get`] with pre-split segments, for keys that contain dots.
    pub fn get_at(&self, segments: &[&str]) -> Option<&Value> {
        get_at(&self.tree, segments)
    }

    /// Typed read. A value of the wrong shape reads as `None`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get_at_as(&split_path(path))
    }

    pub fn get_at_as<T: DeserializeOwned>(&self, segments: &[&str]) -> Option<T> {
        let value = self.get_at(segments)?;
        match T::deserialize(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("[Store] {} has unexpected shape: {}", segments.join("."), e);
                None
            }
        }
    }

    pub fn snapshot(&self) -> &Value {
        &self.tree
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Calendar day in the configured offset.
    pub fn today(&self) -> NaiveDate {
        self.now()
            .with_timezone(&self.config.utc_offset())
            .date_naive()
    }

    // ==================== Writes ====================

    pub fn set(&mut self, path: &str, value: Value) {
        self.set_at(&split_path(path), value);
    }

    pub fn set_at(&mut self, segments: &[&str], value: Value) {
        let Some(topic) = segments.first() else {
            warn!("[Store] Ignoring write to an empty path");
            return;
        };
        if get_at(&self.tree, segments) == Some(&value) {
            return;
        }

        set_at(&mut self.tree, segments, value);
        self.dirty = true;
        self.notify(topic, &segments.join("."));
        self.schedule_flush();
    }

    pub fn set_as<T: Serialize>(&mut self, path: &str, value: &T) {
        self.set_at_as(&split_path(path), value);
    }

    pub fn set_at_as<T: Serialize>(&mut self, segments: &[&str], value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => self.set_at(segments, v),
            Err(e) => error!("[Store] Failed to serialize {}: {}", segments.join("."), e),
        }
    }

    /// Read-modify-write of one node. A missing node starts as `Null`.
    pub fn update_at(&mut self, segments: &[&str], f: impl FnOnce(&mut Value)) {
        let mut value = self.get_at(segments).cloned().unwrap_or(Value::Null);
        f(&mut value);
        self.set_at(segments, value);
    }

    /// Appends to the array at `path`, creating it if needed. Growth past the
    /// configured bound is trimmed at the next flush.
    pub fn push(&mut self, path: &str, item: Value) {
        self.update_at(&split_path(path), |node| match node {
            Value::Array(items) => items.push(item),
            other => *other = Value::Array(vec![item]),
        });
    }

    /// Replaces all state with defaults and persists immediately.
    pub fn reset(&mut self) {
        info!("[Store] Resetting learner state");
        self.tree = self.defaults.clone();
        self.dirty = true;
        self.notify_all("");
        self.flush_now();
    }

    // ==================== Subscriptions ====================

    /// Registers `callback` for changes under `topic`, or every change when
    /// `topic` is `"*"`.
    pub fn subscribe(
        &mut self,
        topic: &str,
        callback: impl FnMut(&StateChange<'_>) + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            topic: topic.to_string(),
            callback: Box::new(callback),
        });
        debug!("[Store] Subscription {} on '{}'", id, topic);
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        before != self.subscribers.len()
    }

    fn notify(&mut self, topic: &str, path: &str) {
        let value = self.tree.get(topic).unwrap_or(&NULL);
        let change = StateChange { topic, path, value };
        for sub in self
            .subscribers
            .iter_mut()
            .filter(|s| s.topic == topic || s.topic == WILDCARD_TOPIC)
        {
            (sub.callback)(&change);
        }
    }

    fn notify_all(&mut self, path: &str) {
        let topics: Vec<String> = self
            .tree
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        for topic in topics {
            let path = if path.is_empty() { topic.as_str() } else { path };
            self.notify(&topic, path);
        }
    }

    fn notify_bounded_topics(&mut self) {
        let mut topics: Vec<String> = self
            .config
            .bounds
            .iter()
            .filter_map(|rule| split_path(&rule.path).first().map(|s| s.to_string()))
            .collect();
        topics.sort();
        topics.dedup();
        for topic in topics {
            self.notify(&topic, &topic);
        }
    }

    // ==================== Persistence ====================

    pub fn flush_state(&self) -> FlushState {
        self.flush_state
    }

    pub fn has_pending_flush(&self) -> bool {
        matches!(self.flush_state, FlushState::Pending { .. })
    }

    /// Whether memory holds changes the storage has not accepted yet. A
    /// dropped write leaves the store dirty.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Arms (or re-arms) the debounce deadline.
    fn schedule_flush(&mut self) {
        let window =
            Duration::from_std(self.config.debounce()).unwrap_or_else(|_| Duration::days(1));
        self.flush_state = FlushState::Pending {
            due_at: self.clock.now() + window,
        };
    }

    /// Flushes if the debounce window has elapsed. Hosts call this from their
    /// event loop.
    pub fn tick(&mut self) -> Option<FlushOutcome> {
        match self.flush_state {
            FlushState::Pending { due_at } if self.clock.now() >= due_at => Some(self.flush_now()),
            _ => None,
        }
    }

    /// Cancels any pending flush and writes the snapshot immediately.
    pub fn flush_now(&mut self) -> FlushOutcome {
        self.flush_state = FlushState::Idle;

        if apply_bounds(&mut self.tree, &self.config.bounds) > 0 {
            self.notify_bounded_topics();
        }

        let outcome = match self.write_snapshot() {
            Ok(bytes) => {
                self.dirty = false;
                FlushOutcome::Written { bytes }
            }
            Err(e) if e.is_quota() => {
                warn!("[Store] {}; evicting oldest entries and retrying", e);
                let evicted = evict_oldest(&mut self.tree, &self.config.bounds);
                if evicted > 0 {
                    self.notify_bounded_topics();
                }
                match self.write_snapshot() {
                    Ok(bytes) => {
                        self.dirty = false;
                        FlushOutcome::WrittenAfterEviction { bytes, evicted }
                    }
                    Err(e) => {
                        error!("[Store] Retry after eviction failed ({}); write dropped", e);
                        FlushOutcome::Dropped
                    }
                }
            }
            Err(e) => {
                error!("[Store] Snapshot write failed ({}); write dropped", e);
                FlushOutcome::Dropped
            }
        };
        debug!("[Store] Flush -> {:?}", outcome);
        outcome
    }

    fn write_snapshot(&mut self) -> Result<usize, crate::error::StorageError> {
        let text = serde_json::to_string(&self.tree)
            .map_err(|e| crate::error::StorageError::Unavailable(e.to_string()))?;
        self.storage.write(&self.config.storage_key, &text)?;
        Ok(text.len())
    }

    /// Final flush for process exit, attempted whenever unsaved changes
    /// remain (including ones an earlier write dropped). Dropping the store
    /// does the same.
    pub fn shutdown(mut self) -> Option<FlushOutcome> {
        if !self.dirty {
            return None;
        }
        info!("[Store] Flushing before shutdown");
        let outcome = self.flush_now();
        // One final attempt; `Drop` must not retry it.
        self.dirty = false;
        Some(outcome)
    }

    // ==================== Export / Import ====================

    pub fn export(&self) -> Result<String, StoreError> {
        let doc = ExportDocument {
            format_version: EXPORT_FORMAT_VERSION,
            exported_at: self.now(),
            state: self.tree.clone(),
        };
        serde_json::to_string_pretty(&doc).map_err(StoreError::Export)
    }

    /// Accepts an export document or a bare state tree. Nothing changes
    /// unless the whole document parses.
    pub fn import(&mut self, text: &str) -> Result<(), StoreError> {
        let parsed: Value = serde_json::from_str(text).map_err(StoreError::InvalidImport)?;
        let state = if parsed.get("formatVersion").is_some() {
            let doc: ExportDocument =
                serde_json::from_value(parsed).map_err(StoreError::InvalidImport)?;
            info!(
                "[Store] Importing export v{} from {}",
                doc.format_version, doc.exported_at
            );
            doc.state
        } else {
            parsed
        };
        if !state.is_object() {
            return Err(StoreError::NotAnObject);
        }

        let mut tree = self.defaults.clone();
        deep_merge(&mut tree, state);
        apply_bounds(&mut tree, &self.config.bounds);
        self.tree = tree;
        self.dirty = true;

        self.notify_all("");
        self.flush_now();
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.dirty {
            self.flush_now();
        }
    }
}

fn default_tree() -> Value {
    serde_json::to_value(LearnerState::default()).unwrap_or_else(|e| {
        error!("[Store] Failed to build default state: {}", e);
        Value::Object(Map::new())
    })
}
