// src/quiz.rs
//
// Builds a fixed-size quiz from a topic's question pool, records answers in
// memory and scores the attempt. Scoring is persisted once per quiz: the
// first `calculate_results` writes the attempt record and awards XP, later
// calls only recompute.

use crate::constants::*;
use crate::error::QuizError;
use crate::ledger;
use crate::models::{AnswerRecord, Difficulty, QuizAttempt, Question, UserAnswer};
use crate::repository;
use crate::store::Store;
use crate::topic_match::TopicMatcher;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOptions {
    pub question_count: usize,
    pub difficulty: Option<Difficulty>,
    pub randomize: bool,
}

impl Default for QuizOptions {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUIZ_QUESTION_COUNT,
            difficulty: None,
            randomize: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveQuiz {
    pub topic_id: String,
    pub questions: Vec<Question>,
    pub answers: Vec<AnswerRecord>,
    pub started_at: DateTime<Utc>,
    /// Difficulty actually applied, `None` when unfiltered or the filter
    /// fell back to the full pool.
    pub difficulty: Option<Difficulty>,
    recorded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Breakdown {
    pub correct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResults {
    pub topic_id: String,
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
    pub passed: bool,
    pub xp_earned: u64,
    pub by_difficulty: BTreeMap<Difficulty, Breakdown>,
    pub time_spent_secs: u64,
}

/// Percentage score rounded to the nearest integer. An empty quiz scores 0.
pub fn score_percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

pub fn is_passing(percentage: u32) -> bool {
    percentage >= QUIZ_PASS_PERCENT
}

/// 50 base, +5 per full ten percent, +25 for a perfect score.
pub fn quiz_xp(percentage: u32) -> u64 {
    let bonus = if percentage == 100 { QUIZ_XP_PERFECT_BONUS } else { 0 };
    QUIZ_XP_BASE + QUIZ_XP_PER_DECILE * u64::from(percentage / 10) + bonus
}

pub struct QuizManager {
    bank: Vec<Question>,
    matcher: TopicMatcher,
    rng: StdRng,
    active: Option<ActiveQuiz>,
}

impl QuizManager {
    pub fn new(bank: Vec<Question>) -> Self {
        Self::with_rng(bank, StdRng::from_entropy())
    }

    pub fn with_seed(bank: Vec<Question>, seed: u64) -> Self {
        Self::with_rng(bank, StdRng::seed_from_u64(seed))
    }

    fn with_rng(bank: Vec<Question>, rng: StdRng) -> Self {
        Self {
            bank,
            matcher: TopicMatcher::default(),
            rng,
            active: None,
        }
    }

    pub fn active_quiz(&self) -> Option<&ActiveQuiz> {
        self.active.as_ref()
    }

    /// Builds a quiz for `topic_id`. Returns `None` when the topic has no
    /// questions at all; the caller must handle that.
    pub fn generate_quiz(
        &mut self,
        store: &Store,
        topic_id: &str,
        options: QuizOptions,
    ) -> Option<&ActiveQuiz> {
        let pool = self.matcher.select(&self.bank, topic_id);
        if pool.is_empty() {
            info!("No questions available for '{}'", topic_id);
            self.active = None;
            return None;
        }

        let (mut questions, applied) = match options.difficulty {
            Some(level) => {
                let filtered: Vec<&Question> =
                    pool.iter().copied().filter(|q| q.difficulty == level).collect();
                if filtered.is_empty() {
                    debug!("No '{}' questions for '{}', using the full pool", level, topic_id);
                    (pool, None)
                } else {
                    (filtered, Some(level))
                }
            }
            None => (pool, None),
        };

        if options.randomize {
            questions.shuffle(&mut self.rng);
        }
        questions.truncate(options.question_count);

        // Option order is shuffled per question regardless of `randomize`,
        // so the correct position never follows the bank layout.
        let questions: Vec<Question> = questions
            .into_iter()
            .map(|q| {
                let mut q = q.clone();
                q.options.shuffle(&mut self.rng);
                q
            })
            .collect();

        info!("Quiz for '{}': {} questions", topic_id, questions.len());
        self.active = Some(ActiveQuiz {
            topic_id: topic_id.to_string(),
            questions,
            answers: Vec::new(),
            started_at: store.now(),
            difficulty: applied,
            recorded: false,
        });
        self.active.as_ref()
    }

    /// Scores one answer against its question. Answering the same question
    /// again replaces the earlier answer.
    pub fn submit_answer(&mut self, answer: UserAnswer) -> Result<AnswerRecord, QuizError> {
        let quiz = self.active.as_mut().ok_or(QuizError::NoActiveQuiz)?;
        let question = quiz
            .questions
            .iter()
            .find(|q| q.id == answer.question_id)
            .ok_or_else(|| QuizError::UnknownQuestion(answer.question_id.clone()))?;

        let record = AnswerRecord {
            question_id: answer.question_id.clone(),
            correct: question.correct_answer.accepts(&answer.selected),
            expected: question.correct_answer.clone(),
            given: answer.selected,
            time_spent_secs: answer.time_spent_secs,
        };
        debug!(
            "[Quiz] {} answered {}",
            record.question_id,
            if record.correct { "correctly" } else { "incorrectly" }
        );

        quiz.answers.retain(|a| a.question_id != record.question_id);
        quiz.answers.push(record.clone());
        Ok(record)
    }

    /// Scores the active quiz. The first call persists the attempt, awards
    /// XP and marks the topic completed on a pass.
    pub fn calculate_results(&mut self, store: &mut Store) -> Result<QuizResults, QuizError> {
        let quiz = self.active.as_mut().ok_or(QuizError::NoActiveQuiz)?;
        let results = score(quiz);

        if quiz.recorded {
            return Ok(results);
        }
        quiz.recorded = true;

        let attempt = QuizAttempt {
            task_id: quiz.topic_id.clone(),
            score: results.correct,
            total: results.total,
            percentage: results.percentage,
            passed: results.passed,
            timestamp: store.now(),
            time_spent_secs: results.time_spent_secs,
            difficulty: quiz
                .difficulty
                .map_or_else(|| "mixed".to_string(), |d| d.to_string()),
        };
        info!(
            "[Quiz] '{}' scored {}% ({}/{}), {}",
            attempt.task_id,
            results.percentage,
            results.correct,
            results.total,
            if results.passed { "passed" } else { "failed" }
        );

        repository::log_quiz_attempt(store, &attempt);
        let today = store.today();
        repository::update_daily_stat(store, today, |s| s.quizzes_taken += 1);
        repository::log_activity(
            store,
            "quiz",
            &format!("{}: {}%", attempt.task_id, results.percentage),
        );
        ledger::add_xp(store, results.xp_earned);
        ledger::update_streak(store, today);
        if results.passed {
            ledger::mark_topic_completed(store, &attempt.task_id);
        }
        ledger::check_achievements(store);

        Ok(results)
    }

    /// Drops the active quiz without recording anything.
    pub fn abandon(&mut self) -> Option<ActiveQuiz> {
        self.active.take()
    }
}

fn score(quiz: &ActiveQuiz) -> QuizResults {
    let mut by_difficulty: BTreeMap<Difficulty, Breakdown> = BTreeMap::new();
    for q in &quiz.questions {
        by_difficulty.entry(q.difficulty).or_default().total += 1;
    }

    let mut correct = 0;
    let mut time_spent_secs = 0;
    for answer in &quiz.answers {
        time_spent_secs += answer.time_spent_secs;
        if !answer.correct {
            continue;
        }
        correct += 1;
        if let Some(q) = quiz.questions.iter().find(|q| q.id == answer.question_id) {
            by_difficulty.entry(q.difficulty).or_default().correct += 1;
        }
    }

    let total = quiz.questions.len();
    let percentage = score_percentage(correct, total);
    QuizResults {
        topic_id: quiz.topic_id.clone(),
        correct,
        total,
        percentage,
        passed: is_passing(percentage),
        xp_earned: quiz_xp(percentage),
        by_difficulty,
        time_spent_secs,
    }
}
