// src/constants.rs

// --- Time Constants ---
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

// --- Storage ---
pub const DEFAULT_STORAGE_KEY: &str = "learning-progress";
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024; // Browser-style localStorage budget
pub const EXPORT_FORMAT_VERSION: u32 = 1;
pub const WILDCARD_TOPIC: &str = "*";
pub const DEFAULT_DATABASE_FILE: &str = "learning_progress.db";

// --- Leitner Boxes ---
pub const BOX_MIN: u8 = 1;
pub const BOX_MAX: u8 = 5;
pub const LOW_BOX_FALLBACK_MAX: u8 = 2; // Boxes always eligible when nothing is due

/// Review interval in days, indexed by `box - 1`.
pub const BOX_INTERVAL_DAYS: [i64; 5] = [1, 3, 7, 14, 30];

// --- Ease Factor (quality signal only) ---
pub const EASE_FACTOR_MIN: f64 = 1.3;
pub const EASE_FACTOR_MAX: f64 = 3.0;
pub const EASE_FACTOR_DEFAULT: f64 = 2.5;
pub const EASE_FACTOR_DECREMENT_HARD: f64 = 0.2;
pub const EASE_FACTOR_INCREMENT_EASY: f64 = 0.1;

// --- Session Defaults ---
pub const DEFAULT_SESSION_MAX_CARDS: usize = 20;
pub const DEFAULT_QUIZ_QUESTION_COUNT: usize = 10;

// --- Quiz Scoring ---
pub const QUIZ_PASS_PERCENT: u32 = 75;
pub const QUIZ_XP_BASE: u64 = 50;
pub const QUIZ_XP_PER_DECILE: u64 = 5;
pub const QUIZ_XP_PERFECT_BONUS: u64 = 25;

// --- Levels ---
pub const XP_PER_LEVEL: u64 = 500; // Level n -> n+1 needs 500 * n cumulative XP

// --- Bounded Collections ---
pub const MAX_QUIZ_HISTORY: usize = 500;
pub const MAX_COMPLETED_TOPICS: usize = 500;
pub const MAX_COMPLETED_MISSIONS: usize = 200;
pub const MAX_ACHIEVEMENTS: usize = 200;
pub const MAX_DAILY_STATS: usize = 90;
pub const MAX_ACTIVITY_LOG: usize = 200;
pub const MAX_SESSION_HISTORY: usize = 100;
