// src/lib.rs

pub mod bounds;
pub mod clock;
pub mod config;
pub mod constants;
pub mod content;
pub mod database;
pub mod error;
pub mod ledger;
pub mod models;
pub mod quiz;
pub mod repository;
pub mod scheduler;
pub mod state_tree;
pub mod store;
pub mod topic_match;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use content::ContentBank;
pub use database::{MemoryStorage, SnapshotStorage, SqliteStorage};
pub use quiz::{QuizManager, QuizOptions, QuizResults};
pub use scheduler::{Scheduler, SessionOptions};
pub use store::{FlushOutcome, FlushState, StateChange, Store};
