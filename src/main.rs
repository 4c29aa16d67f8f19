// src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use leitner_progress::constants::*;
use leitner_progress::ledger;
use leitner_progress::models::{AnswerValue, Difficulty, Question, ReviewOutcome, UserAnswer};
use leitner_progress::repository;
use leitner_progress::{
    ContentBank, EngineConfig, QuizManager, QuizOptions, Scheduler, SessionOptions, SqliteStorage,
    Store, SystemClock,
};
use log::{debug, info};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "leitner-progress",
    about = "Flashcard reviews, quizzes and XP tracking from the terminal",
    version
)]
struct Cli {
    /// SQLite file holding saved progress
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON engine config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Flashcard bank (default: built-in sample)
    #[arg(long, global = true)]
    cards: Option<PathBuf>,

    /// Question bank (default: built-in sample)
    #[arg(long, global = true)]
    questions: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review the flashcards of a topic
    Study {
        /// Topic id, e.g. d1t1
        topic: String,
        /// Maximum cards in the session
        #[arg(long, default_value_t = DEFAULT_SESSION_MAX_CARDS)]
        max_cards: usize,
        /// Shuffle the selected cards
        #[arg(long)]
        shuffle: bool,
    },

    /// Take a quiz on a topic
    Quiz {
        /// Topic id, e.g. d1t1
        topic: String,
        /// Number of questions
        #[arg(long, default_value_t = DEFAULT_QUIZ_QUESTION_COUNT)]
        count: usize,
        /// easy, medium or hard
        #[arg(long)]
        difficulty: Option<Difficulty>,
    },

    /// Show progress, or deck stats for one topic
    Stats {
        topic: Option<String>,
    },

    /// Print the value at a dot path (empty for the whole state)
    Get {
        #[arg(default_value = "")]
        path: String,
    },

    /// Write all progress to a file
    Export {
        file: PathBuf,
    },

    /// Replace progress with the contents of an export file
    Import {
        file: PathBuf,
    },

    /// Erase all progress
    Reset,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE));
    info!("Database path: {:?}", db_path);

    let storage = SqliteStorage::open(&db_path, config.quota_bytes)
        .with_context(|| format!("failed to open progress database {}", db_path.display()))?;
    let mut store = Store::open(storage, SystemClock, config);

    let result = run(cli, &mut store);
    if let Some(outcome) = store.shutdown() {
        debug!("Final flush: {:?}", outcome);
    }
    result
}

fn run(cli: Cli, store: &mut Store) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    match cli.command {
        Command::Study {
            topic,
            max_cards,
            shuffle,
        } => {
            let bank = ContentBank::load(cli.cards.as_deref(), None)
                .context("failed to load flashcards")?;
            let options = SessionOptions {
                max_cards,
                randomize: shuffle,
                ..SessionOptions::default()
            };
            study(store, Scheduler::new(bank.flashcards), &topic, options, &mut input)
        }
        Command::Quiz {
            topic,
            count,
            difficulty,
        } => {
            let bank = ContentBank::load(None, cli.questions.as_deref())
                .context("failed to load questions")?;
            let options = QuizOptions {
                question_count: count,
                difficulty,
                ..QuizOptions::default()
            };
            quiz(store, QuizManager::new(bank.questions), &topic, options, &mut input)
        }
        Command::Stats { topic } => match topic {
            Some(topic) => {
                let bank = ContentBank::load(cli.cards.as_deref(), cli.questions.as_deref())
                    .context("failed to load content")?;
                print_topic_stats(store, &Scheduler::new(bank.flashcards), &topic);
                Ok(())
            }
            None => {
                print_progress(store);
                Ok(())
            }
        },
        Command::Get { path } => {
            let value = store.get(&path).cloned().unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Command::Export { file } => {
            let text = store.export()?;
            fs::write(&file, text)
                .with_context(|| format!("failed to write {}", file.display()))?;
            println!("Exported progress to {}", file.display());
            Ok(())
        }
        Command::Import { file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            store.import(&text)?;
            println!("Imported progress from {}", file.display());
            Ok(())
        }
        Command::Reset => {
            store.reset();
            println!("Progress erased");
            Ok(())
        }
    }
}

/// Reads one trimmed line. `None` on end of input.
fn prompt(input: &mut impl BufRead, message: &str) -> Result<Option<String>> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn study(
    store: &mut Store,
    mut scheduler: Scheduler,
    topic: &str,
    options: SessionOptions,
    input: &mut impl BufRead,
) -> Result<()> {
    let cards = scheduler.start_session(store, topic, options);
    if cards.is_empty() {
        println!("No cards to review for '{topic}'");
        return Ok(());
    }
    println!(
        "{} cards for '{}'. Rate each one h(ard), m(edium) or e(asy); q quits.",
        cards.len(),
        topic
    );

    while let Some(card) = scheduler.active_session().and_then(|s| s.next_card()).cloned() {
        println!();
        println!("Q: {}", card.question);
        if prompt(input, "(press enter to reveal) ")?.is_none() {
            break;
        }
        println!("A: {}", card.answer);

        let outcome = loop {
            match prompt(input, "[h/m/e/q] ")? {
                None => break None,
                Some(s) if s.eq_ignore_ascii_case("q") => break None,
                Some(s) => match s.parse::<ReviewOutcome>() {
                    Ok(outcome) => break Some(outcome),
                    Err(e) => println!("{e}"),
                },
            }
        };
        let Some(outcome) = outcome else { break };

        let record = scheduler.review_card(store, &card.id, outcome)?;
        println!("-> box {}", record.leitner_box);
        store.tick();
    }

    let summary = scheduler.finish_session(store)?;
    println!();
    println!(
        "Reviewed {} cards, {} recalled, {} left",
        summary.reviewed, summary.correct, summary.remaining
    );
    Ok(())
}

fn quiz(
    store: &mut Store,
    mut manager: QuizManager,
    topic: &str,
    options: QuizOptions,
    input: &mut impl BufRead,
) -> Result<()> {
    let Some(active) = manager.generate_quiz(store, topic, options) else {
        println!("No questions available for '{topic}'");
        return Ok(());
    };
    let questions = active.questions.clone();
    println!("{} questions for '{}'", questions.len(), topic);

    for (n, question) in questions.iter().enumerate() {
        println!();
        println!("{}. {}", n + 1, question.question);
        for (i, option) in question.options.iter().enumerate() {
            println!("   {}) {}", i + 1, option);
        }

        let started = Instant::now();
        let selected = loop {
            let hint = if question.correct_answer.is_multiple() {
                "answer (e.g. 1,3): "
            } else {
                "answer: "
            };
            let Some(line) = prompt(input, hint)? else {
                manager.abandon();
                println!("Quiz abandoned");
                return Ok(());
            };
            match parse_selection(question, &line) {
                Ok(value) => break value,
                Err(e) => println!("{e}"),
            }
        };

        let record = manager.submit_answer(UserAnswer {
            question_id: question.id.clone(),
            selected,
            time_spent_secs: started.elapsed().as_secs(),
        })?;
        if record.correct {
            println!("Correct");
        } else {
            println!("Incorrect");
        }
        if !question.explanation.is_empty() {
            println!("   {}", question.explanation);
        }
        store.tick();
    }

    let results = manager.calculate_results(store)?;
    println!();
    println!(
        "Score: {}/{} ({}%) {}",
        results.correct,
        results.total,
        results.percentage,
        if results.passed { "PASSED" } else { "not passed" }
    );
    for (difficulty, b) in &results.by_difficulty {
        println!("  {:<6} {}/{}", difficulty, b.correct, b.total);
    }
    println!("+{} XP", results.xp_earned);
    Ok(())
}

/// Turns `2` or `1,3` into the chosen option text(s).
fn parse_selection(question: &Question, line: &str) -> Result<AnswerValue> {
    let mut chosen = Vec::new();
    for part in line.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: usize = part
            .parse()
            .with_context(|| format!("'{part}' is not an option number"))?;
        match question.options.get(n.wrapping_sub(1)) {
            Some(option) => chosen.push(option.clone()),
            None => bail!("pick a number between 1 and {}", question.options.len()),
        }
    }

    if question.correct_answer.is_multiple() {
        if chosen.is_empty() {
            bail!("pick at least one option");
        }
        return Ok(AnswerValue::Multiple(chosen));
    }
    match chosen.as_slice() {
        [single] => Ok(AnswerValue::Single(single.clone())),
        _ => bail!("pick exactly one option"),
    }
}

fn print_progress(store: &Store) {
    let progress = repository::get_progress(store);
    let today = repository::get_daily_stat(store, store.today());

    println!(
        "Level {} ({} XP, next level at {})",
        progress.level,
        progress.xp,
        ledger::next_level_threshold(progress.level)
    );
    println!(
        "Streak: {} days (longest {})",
        progress.streak.current, progress.streak.longest
    );
    println!(
        "Today: {} XP, {} cards reviewed, {} quizzes",
        today.xp, today.cards_reviewed, today.quizzes_taken
    );
    println!("Flashcards tracked: {}", repository::card_count(store));
    println!("Quizzes taken: {}", progress.quiz_history.len());
    println!("Topics completed: {}", progress.completed_topics.len());

    if !progress.achievements.is_empty() {
        println!("Achievements:");
        for id in &progress.achievements {
            match ledger::find_achievement(id) {
                Some(a) => println!("  {} ({})", a.title, a.id),
                None => println!("  {id}"),
            }
        }
    }
}

fn print_topic_stats(store: &Store, scheduler: &Scheduler, topic: &str) {
    let deck = scheduler.deck_stats(store, topic);
    println!(
        "'{}': {} cards, {} new, {} due",
        topic, deck.total, deck.new_cards, deck.due_cards
    );
    for (i, count) in deck.by_box.iter().enumerate() {
        println!("  box {}: {}", i + 1, count);
    }
    if let Some(due) = deck.next_due {
        println!("Next card due {}", due.format("%Y-%m-%d %H:%M UTC"));
    }

    let attempts: Vec<_> = repository::quiz_history(store)
        .into_iter()
        .filter(|a| a.task_id == topic)
        .collect();
    match attempts.iter().map(|a| a.percentage).max() {
        Some(best) => println!("Quizzes: {} taken, best {}%", attempts.len(), best),
        None => println!("Quizzes: none taken"),
    }
}
