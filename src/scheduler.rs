// src/scheduler.rs
//
// Leitner-box spaced repetition: due checks, session assembly and review
// application. Card review records live in the store under
// `flashcards.cards.<id>`.

use crate::constants::*;
use crate::error::SessionError;
use crate::ledger;
use crate::models::{CardRecord, Flashcard, ReviewOutcome, SessionSummary};
use crate::repository;
use crate::store::Store;
use crate::topic_match::TopicMatcher;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

// --- Public Interface ---

/// Review interval for a box. Out-of-range boxes are clamped first.
pub fn interval_days(leitner_box: u8) -> i64 {
    let b = leitner_box.clamp(BOX_MIN, BOX_MAX);
    BOX_INTERVAL_DAYS[(b - BOX_MIN) as usize]
}

/// A card is due when it was never seen, or when at least its box interval
/// has elapsed since it was last seen.
pub fn is_due(record: &CardRecord, now: DateTime<Utc>) -> bool {
    match record.last_seen {
        None => true,
        Some(last_seen) => now - last_seen >= Duration::days(interval_days(record.leitner_box)),
    }
}

/// When a card will next be due, or `None` for new cards (due immediately).
pub fn next_due(record: &CardRecord) -> Option<DateTime<Utc>> {
    record
        .last_seen
        .map(|seen| seen + Duration::days(interval_days(record.leitner_box)))
}

/// Applies one review outcome to a record.
pub fn apply_review(
    record: &CardRecord,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) -> CardRecord {
    let mut next = record.clone();
    let current_box = record.leitner_box.clamp(BOX_MIN, BOX_MAX);

    match outcome {
        ReviewOutcome::Hard => {
            next.leitner_box = BOX_MIN;
            next.ease_factor = record.ease_factor - EASE_FACTOR_DECREMENT_HARD;
        }
        ReviewOutcome::Medium => {
            next.leitner_box = current_box;
        }
        ReviewOutcome::Easy => {
            next.leitner_box = (current_box + 1).min(BOX_MAX);
            next.ease_factor = record.ease_factor + EASE_FACTOR_INCREMENT_EASY;
        }
    }

    // Clamping
    next.ease_factor = next.ease_factor.clamp(EASE_FACTOR_MIN, EASE_FACTOR_MAX);
    next.last_seen = Some(now);
    next.times_reviewed = record.times_reviewed.saturating_add(1);
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub max_cards: usize,
    pub include_new: bool,
    pub include_due: bool,
    pub randomize: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_cards: DEFAULT_SESSION_MAX_CARDS,
            include_new: true,
            include_due: true,
            randomize: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
    pub topic_id: String,
    pub cards: Vec<Flashcard>,
    pub reviewed: usize,
    pub correct: usize,
    pub started_at: DateTime<Utc>,
    reviewed_ids: Vec<String>,
}

impl ReviewSession {
    /// First card in presentation order that has not been reviewed yet.
    pub fn next_card(&self) -> Option<&Flashcard> {
        self.cards
            .iter()
            .find(|c| !self.reviewed_ids.contains(&c.id))
    }

    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.reviewed_ids.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckStats {
    pub total: usize,
    pub new_cards: usize,
    pub due_cards: usize,
    /// Card count per box, index 0 = box 1.
    pub by_box: [usize; 5],
    /// Earliest moment a reviewed, not-yet-due card becomes due.
    pub next_due: Option<DateTime<Utc>>,
}

pub struct Scheduler {
    bank: Vec<Flashcard>,
    matcher: TopicMatcher,
    rng: StdRng,
    active: Option<ReviewSession>,
}

impl Scheduler {
    pub fn new(bank: Vec<Flashcard>) -> Self {
        Self::with_rng(bank, StdRng::from_entropy())
    }

    /// Deterministic shuffling for tests and replays.
    pub fn with_seed(bank: Vec<Flashcard>, seed: u64) -> Self {
        Self::with_rng(bank, StdRng::seed_from_u64(seed))
    }

    fn with_rng(bank: Vec<Flashcard>, rng: StdRng) -> Self {
        Self {
            bank,
            matcher: TopicMatcher::default(),
            rng,
            active: None,
        }
    }

    pub fn active_session(&self) -> Option<&ReviewSession> {
        self.active.as_ref()
    }

    /// Assembles a review session for `topic_id`.
    ///
    /// New cards come first, then due cards by ascending box. When neither
    /// exists, cards in the low boxes stay eligible. The list is truncated to
    /// `max_cards` before the optional shuffle, so priority decides which
    /// cards are included and shuffling only changes their order.
    ///
    /// Returns an empty list (and starts no session) when the topic has no
    /// eligible cards.
    pub fn start_session(
        &mut self,
        store: &Store,
        topic_id: &str,
        options: SessionOptions,
    ) -> Vec<Flashcard> {
        let now = store.now();
        debug!("Requesting session for '{}' with {:?}", topic_id, options);
        if self.active.is_some() {
            warn!("Starting a new session replaces the unfinished one");
        }
        self.active = None;

        let topic_cards = self.matcher.select(&self.bank, topic_id);

        let mut new_cards = Vec::new();
        let mut due_cards = Vec::new();
        for card in &topic_cards {
            let record = repository::card_record_or_new(store, &card.id);
            if record.is_new() {
                if options.include_new {
                    new_cards.push(*card);
                }
            } else if options.include_due && is_due(&record, now) {
                due_cards.push((record.leitner_box, *card));
            }
        }
        // Stable sort keeps bank order within a box.
        due_cards.sort_by_key(|(b, _)| *b);

        let mut selected: Vec<Flashcard> = new_cards
            .into_iter()
            .chain(due_cards.into_iter().map(|(_, c)| c))
            .cloned()
            .collect();

        if selected.is_empty() {
            // Cram: low-box cards are always eligible
            selected = topic_cards
                .iter()
                .filter(|c| {
                    repository::card_record_or_new(store, &c.id).leitner_box <= LOW_BOX_FALLBACK_MAX
                })
                .map(|c| (*c).clone())
                .collect();
            if !selected.is_empty() {
                info!(
                    "Nothing due for '{}'. Falling back to {} low-box cards",
                    topic_id,
                    selected.len()
                );
            }
        }

        selected.truncate(options.max_cards);
        if options.randomize {
            selected.shuffle(&mut self.rng);
        }

        if selected.is_empty() {
            info!("No cards available for '{}'", topic_id);
            return selected;
        }

        info!("Session for '{}': {} cards", topic_id, selected.len());
        self.active = Some(ReviewSession {
            topic_id: topic_id.to_string(),
            cards: selected.clone(),
            reviewed: 0,
            correct: 0,
            started_at: now,
            reviewed_ids: Vec::new(),
        });
        selected
    }

    /// Records a review of a card in the active session and persists the
    /// updated record.
    pub fn review_card(
        &mut self,
        store: &mut Store,
        card_id: &str,
        outcome: ReviewOutcome,
    ) -> Result<CardRecord, SessionError> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;
        if !session.cards.iter().any(|c| c.id == card_id) {
            return Err(SessionError::CardNotInSession(card_id.to_string()));
        }

        let now = store.now();
        let old = repository::card_record_or_new(store, card_id);
        let updated = apply_review(&old, outcome, now);

        info!(
            "[Leitner] Card {}: {:?} -> box {} -> {}, ease {:.2} -> {:.2}",
            card_id,
            outcome,
            old.leitner_box,
            updated.leitner_box,
            old.ease_factor,
            updated.ease_factor
        );
        repository::save_card_record(store, card_id, &updated);

        session.reviewed += 1;
        if outcome.is_correct() {
            session.correct += 1;
        }
        if !session.reviewed_ids.iter().any(|id| id == card_id) {
            session.reviewed_ids.push(card_id.to_string());
        }

        let today = store.today();
        repository::update_daily_stat(store, today, |s| s.cards_reviewed += 1);
        repository::log_activity(
            store,
            "review",
            &format!("{}: box {}", card_id, updated.leitner_box),
        );
        ledger::update_streak(store, today);
        Ok(updated)
    }

    /// Ends the active session and records its tally. The tally is for
    /// reporting only; box changes already happened in `review_card`.
    pub fn finish_session(&mut self, store: &mut Store) -> Result<SessionSummary, SessionError> {
        let session = self.active.take().ok_or(SessionError::NoActiveSession)?;
        let summary = SessionSummary {
            topic_id: session.topic_id.clone(),
            reviewed: session.reviewed,
            correct: session.correct,
            remaining: session.remaining(),
            started_at: session.started_at,
            finished_at: store.now(),
        };

        info!(
            "Session for '{}' finished: {}/{} correct, {} left",
            summary.topic_id, summary.correct, summary.reviewed, summary.remaining
        );
        repository::log_session_summary(store, &summary);
        repository::log_activity(
            store,
            "flashcards",
            &format!("{}: {}/{}", summary.topic_id, summary.correct, summary.reviewed),
        );
        ledger::check_achievements(store);
        Ok(summary)
    }

    /// Counts for a topic: total, new, due now, the box histogram and when
    /// the next waiting card comes due.
    pub fn deck_stats(&self, store: &Store, topic_id: &str) -> DeckStats {
        let now = store.now();
        let mut stats = DeckStats::default();
        for card in self.matcher.select(&self.bank, topic_id) {
            let record = repository::card_record_or_new(store, &card.id);
            stats.total += 1;
            if record.is_new() {
                stats.new_cards += 1;
            } else if is_due(&record, now) {
                stats.due_cards += 1;
            } else if let Some(due) = next_due(&record) {
                stats.next_due = Some(stats.next_due.map_or(due, |d| d.min(due)));
            }
            let b = record.leitner_box.clamp(BOX_MIN, BOX_MAX);
            stats.by_box[(b - BOX_MIN) as usize] += 1;
        }
        stats
    }
}
