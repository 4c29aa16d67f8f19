// tests/learning_flow.rs
//
// Review sessions, quizzes and the ledger over the built-in content bank.

use chrono::{Duration, TimeZone, Utc};
use leitner_progress::ledger;
use leitner_progress::models::{ReviewOutcome, UserAnswer};
use leitner_progress::repository;
use leitner_progress::{
    ContentBank, EngineConfig, ManualClock, QuizManager, QuizOptions, Scheduler, SessionOptions,
    SqliteStorage, Store,
};
use std::collections::HashSet;

fn setup() -> (Store, ManualClock, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 10, 7, 18, 0, 0).unwrap());
    let config = EngineConfig::default();
    let storage =
        SqliteStorage::open(&dir.path().join("progress.db"), config.quota_bytes).expect("sqlite");
    (Store::open(storage, clock.clone(), config), clock, dir)
}

#[test]
fn easy_review_of_new_card_moves_it_to_box_two() {
    let (mut store, clock, _dir) = setup();
    let bank = ContentBank::sample().expect("sample bank");
    let mut scheduler = Scheduler::with_seed(bank.flashcards, 11);

    let cards = scheduler.start_session(&store, "d1t1", SessionOptions::default());
    assert!(!cards.is_empty());
    let first = cards[0].id.clone();

    let record = scheduler
        .review_card(&mut store, &first, ReviewOutcome::Easy)
        .expect("review");
    assert_eq!(record.leitner_box, 2);
    assert_eq!(record.times_reviewed, 1);
    assert!((record.ease_factor - 2.6).abs() < 1e-9);

    let summary = scheduler.finish_session(&mut store).expect("finish");
    assert_eq!((summary.reviewed, summary.correct), (1, 1));

    // Box 2 waits three days; the card is not due tomorrow.
    clock.advance(Duration::days(1));
    let stats = scheduler.deck_stats(&store, "d1t1");
    assert_eq!(stats.by_box[1], 1);
    assert_eq!(stats.due_cards, 0);

    clock.advance(Duration::days(2));
    assert_eq!(scheduler.deck_stats(&store, "d1t1").due_cards, 1);
}

#[test]
fn category_topic_draws_only_category_cards() {
    let (store, _clock, _dir) = setup();
    let bank = ContentBank::sample().expect("sample bank");
    let mut scheduler = Scheduler::with_seed(bank.flashcards, 3);

    let cards = scheduler.start_session(&store, "d1t2", SessionOptions::default());
    assert!(!cards.is_empty());
    assert!(cards
        .iter()
        .all(|c| c.category.as_deref() == Some("d1t2")));
}

#[test]
fn unknown_topic_has_no_session_and_no_quiz() {
    let (store, _clock, _dir) = setup();
    let bank = ContentBank::sample().expect("sample bank");

    let mut scheduler = Scheduler::with_seed(bank.flashcards, 1);
    assert!(scheduler
        .start_session(&store, "d9t9", SessionOptions::default())
        .is_empty());
    assert!(scheduler.active_session().is_none());

    let mut quizzes = QuizManager::with_seed(bank.questions, 1);
    assert!(quizzes
        .generate_quiz(&store, "d9t9", QuizOptions::default())
        .is_none());
}

#[test]
fn perfect_quiz_from_twelve_question_bank() {
    let (mut store, _clock, _dir) = setup();
    let bank = ContentBank::sample().expect("sample bank");
    let pool = bank
        .questions
        .iter()
        .filter(|q| q.topic.as_deref() == Some("d1t1"))
        .count();
    assert_eq!(pool, 12);

    let mut quizzes = QuizManager::with_seed(bank.questions, 42);
    let questions = quizzes
        .generate_quiz(&store, "d1t1", QuizOptions::default())
        .expect("quiz")
        .questions
        .clone();
    assert_eq!(questions.len(), 10);
    let distinct: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(distinct.len(), 10);

    for q in &questions {
        let record = quizzes
            .submit_answer(UserAnswer {
                question_id: q.id.clone(),
                selected: q.correct_answer.clone(),
                time_spent_secs: 4,
            })
            .expect("answer");
        assert!(record.correct);
    }

    let results = quizzes.calculate_results(&mut store).expect("results");
    assert_eq!(results.percentage, 100);
    assert!(results.passed);
    assert_eq!(results.xp_earned, 125);
    assert_eq!(results.time_spent_secs, 40);

    // Quiz XP plus the first-quiz and perfect-quiz achievements.
    assert_eq!(store.get_as::<u64>("progress.xp"), Some(125 + 25 + 100));
    let achievements = repository::get_id_set(&store, "progress.achievements");
    assert!(achievements.contains(&"first-quiz".to_string()));
    assert!(achievements.contains(&"perfect-quiz".to_string()));
    assert_eq!(
        repository::get_id_set(&store, "progress.completedTopics"),
        vec!["d1t1"]
    );

    // Scoring again reports the same result without a second record.
    let again = quizzes.calculate_results(&mut store).expect("results");
    assert_eq!(again, results);
    assert_eq!(repository::quiz_history(&store).len(), 1);
}

#[test]
fn failed_quiz_records_attempt_but_not_completion() {
    let (mut store, _clock, _dir) = setup();
    let bank = ContentBank::sample().expect("sample bank");
    let mut quizzes = QuizManager::with_seed(bank.questions, 5);
    let options = QuizOptions {
        question_count: 4,
        ..QuizOptions::default()
    };
    let questions = quizzes
        .generate_quiz(&store, "d1t1", options)
        .expect("quiz")
        .questions
        .clone();

    // Answer only the first question correctly.
    quizzes
        .submit_answer(UserAnswer {
            question_id: questions[0].id.clone(),
            selected: questions[0].correct_answer.clone(),
            time_spent_secs: 0,
        })
        .expect("answer");

    let results = quizzes.calculate_results(&mut store).expect("results");
    assert_eq!(results.percentage, 25);
    assert!(!results.passed);
    assert_eq!(results.xp_earned, 60);

    let history = repository::quiz_history(&store);
    assert_eq!(history.len(), 1);
    assert!(!history[0].passed);
    assert!(repository::get_id_set(&store, "progress.completedTopics").is_empty());
}

#[test]
fn study_and_quiz_on_consecutive_days_build_a_streak() {
    let (mut store, clock, _dir) = setup();
    let bank = ContentBank::sample().expect("sample bank");
    let mut scheduler = Scheduler::with_seed(bank.flashcards, 9);

    for _ in 0..3 {
        let cards = scheduler.start_session(&store, "d2", SessionOptions::default());
        let id = cards[0].id.clone();
        scheduler
            .review_card(&mut store, &id, ReviewOutcome::Medium)
            .expect("review");
        scheduler.finish_session(&mut store).expect("finish");
        clock.advance(Duration::days(1));
    }

    let streak = repository::get_streak(&store);
    assert_eq!((streak.current, streak.longest), (3, 3));
    let achievements = repository::get_id_set(&store, "progress.achievements");
    assert_eq!(achievements, vec!["streak-3"]);
    assert_eq!(store.get_as::<u64>("progress.xp"), Some(50));
}

#[test]
fn xp_from_480_to_520_reaches_level_two() {
    let (mut store, _clock, _dir) = setup();
    ledger::add_xp(&mut store, 480);
    let grant = ledger::add_xp(&mut store, 40);
    assert!(grant.leveled_up);
    assert_eq!(grant.level, 2);
    assert_eq!(store.get_as::<u32>("progress.level"), Some(2));
}
