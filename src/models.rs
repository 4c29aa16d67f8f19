// src/models.rs

use crate::constants::*;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// --- Content Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy = 1,
    Medium = 2,
    Hard = 3,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flashcard from the read-only content bank.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    pub question: String,
    pub answer: String,
}

/// Either a single option or a set of options (multiple-response questions).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AnswerValue {
    pub fn is_multiple(&self) -> bool {
        matches!(self, AnswerValue::Multiple(_))
    }

    fn sorted(&self) -> Vec<&str> {
        let mut v: Vec<&str> = match self {
            AnswerValue::Single(s) => vec![s.as_str()],
            AnswerValue::Multiple(items) => items.iter().map(String::as_str).collect(),
        };
        v.sort_unstable();
        v
    }

    /// Checks `given` against `self` as the expected answer. Multiple-response
    /// answers compare as sorted sets; single answers compare strictly.
    pub fn accepts(&self, given: &AnswerValue) -> bool {
        match (self, given) {
            (AnswerValue::Single(expected), AnswerValue::Single(actual)) => expected == actual,
            (AnswerValue::Multiple(_), _) => self.sorted() == given.sorted(),
            (AnswerValue::Single(_), AnswerValue::Multiple(_)) => false,
        }
    }
}

/// A quiz question from the read-only content bank.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: AnswerValue,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub explanation: String,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

// --- Review Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Hard,
    Medium,
    Easy,
}

impl ReviewOutcome {
    /// Anything but `Hard` counts as recalled for session tallies.
    pub fn is_correct(&self) -> bool {
        !matches!(self, ReviewOutcome::Hard)
    }
}

impl FromStr for ReviewOutcome {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hard" | "h" => Ok(ReviewOutcome::Hard),
            "medium" | "m" => Ok(ReviewOutcome::Medium),
            "easy" | "e" => Ok(ReviewOutcome::Easy),
            other => Err(format!("unknown review outcome: {other}")),
        }
    }
}

/// Per-card spaced repetition state, keyed by card id under `flashcards.cards`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    #[serde(rename = "box", default = "default_box")]
    pub leitner_box: u8,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub times_reviewed: u32,
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
}

fn default_box() -> u8 {
    BOX_MIN
}

fn default_ease_factor() -> f64 {
    EASE_FACTOR_DEFAULT
}

impl Default for CardRecord {
    fn default() -> Self {
        Self {
            leitner_box: BOX_MIN,
            last_seen: None,
            times_reviewed: 0,
            ease_factor: EASE_FACTOR_DEFAULT,
        }
    }
}

impl CardRecord {
    pub fn is_new(&self) -> bool {
        self.last_seen.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub topic_id: String,
    pub reviewed: usize,
    pub correct: usize,
    pub remaining: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// --- Quiz Models ---

/// Append-only record of one finished quiz.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub task_id: String,
    pub score: usize,
    pub total: usize,
    #[serde(default)]
    pub percentage: u32,
    #[serde(default)]
    pub passed: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub time_spent_secs: u64,
    pub difficulty: String,
}

/// A learner's response to one question.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_id: String,
    pub selected: AnswerValue,
    #[serde(default)]
    pub time_spent_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    pub given: AnswerValue,
    pub expected: AnswerValue,
    pub correct: bool,
    pub time_spent_secs: u64,
}

// --- Progress Models ---

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
    pub last_active_day: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStat {
    pub xp: u64,
    pub cards_reviewed: u32,
    pub quizzes_taken: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub kind: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressState {
    pub xp: u64,
    pub level: u32,
    pub completed_topics: Vec<String>,
    pub completed_missions: Vec<String>,
    pub achievements: Vec<String>,
    /// Catalog achievement id -> when its XP was granted. Never trimmed.
    pub achievement_grants: BTreeMap<String, DateTime<Utc>>,
    pub streak: Streak,
    pub quiz_history: Vec<QuizAttempt>,
    pub daily_stats: BTreeMap<String, DailyStat>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            completed_topics: Vec::new(),
            completed_missions: Vec::new(),
            achievements: Vec::new(),
            achievement_grants: BTreeMap::new(),
            streak: Streak::default(),
            quiz_history: Vec::new(),
            daily_stats: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FlashcardState {
    pub cards: BTreeMap<String, CardRecord>,
    pub session_history: Vec<SessionSummary>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub activity_log: Vec<ActivityEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub daily_goal_xp: u64,
    pub sound_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daily_goal_xp: 100,
            sound_enabled: true,
        }
    }
}

/// Shape of the whole learner state tree. Only used to build the defaults;
/// the store itself works on the untyped JSON tree.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerState {
    pub progress: ProgressState,
    pub flashcards: FlashcardState,
    pub session: SessionState,
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_answer_is_order_independent() {
        let expected = AnswerValue::Multiple(vec!["b".into(), "a".into()]);
        assert!(expected.accepts(&AnswerValue::Multiple(vec!["a".into(), "b".into()])));
        assert!(!expected.accepts(&AnswerValue::Multiple(vec!["a".into()])));
    }

    #[test]
    fn test_single_answer_is_strict() {
        let expected = AnswerValue::Single("Paris".into());
        assert!(expected.accepts(&AnswerValue::Single("Paris".into())));
        assert!(!expected.accepts(&AnswerValue::Single("paris".into())));
        assert!(!expected.accepts(&AnswerValue::Multiple(vec!["Paris".into()])));
    }

    #[test]
    fn test_card_record_defaults_from_partial_json() {
        let rec: CardRecord = serde_json::from_str(r#"{"box": 3}"#).unwrap();
        assert_eq!(rec.leitner_box, 3);
        assert!(rec.is_new());
        assert_eq!(rec.ease_factor, EASE_FACTOR_DEFAULT);
    }

    #[test]
    fn test_question_accepts_string_or_array_answer() {
        let q: Question = serde_json::from_str(
            r#"{"id":"q1","question":"?","options":["a","b"],"correctAnswer":["a","b"],"difficulty":"hard"}"#,
        )
        .unwrap();
        assert!(q.correct_answer.is_multiple());
        assert_eq!(q.difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_default_tree_shape() {
        let tree = serde_json::to_value(LearnerState::default()).unwrap();
        assert_eq!(tree["progress"]["level"], 1);
        assert!(tree["progress"]["quizHistory"].is_array());
        assert!(tree["flashcards"]["cards"].is_object());
        assert!(tree["progress"]["streak"]["lastActiveDay"].is_null());
    }
}
