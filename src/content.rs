// src/content.rs

use crate::error::ContentError;
use crate::models::{Flashcard, Question};
use log::info;
use std::fs;
use std::path::Path;

const SAMPLE_FLASHCARDS: &str = include_str!("data/flashcards.json");
const SAMPLE_QUESTIONS: &str = include_str!("data/questions.json");

/// Read-only content loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ContentBank {
    pub flashcards: Vec<Flashcard>,
    pub questions: Vec<Question>,
}

impl ContentBank {
    pub fn from_json(flashcards: &str, questions: &str) -> Result<Self, ContentError> {
        Ok(Self {
            flashcards: serde_json::from_str(flashcards)?,
            questions: serde_json::from_str(questions)?,
        })
    }

    pub fn sample() -> Result<Self, ContentError> {
        Self::from_json(SAMPLE_FLASHCARDS, SAMPLE_QUESTIONS)
    }

    /// Loads each bank from its file, or the built-in sample when no path is
    /// given.
    pub fn load(
        flashcards_path: Option<&Path>,
        questions_path: Option<&Path>,
    ) -> Result<Self, ContentError> {
        let flashcards = match flashcards_path {
            Some(p) => fs::read_to_string(p)?,
            None => SAMPLE_FLASHCARDS.to_string(),
        };
        let questions = match questions_path {
            Some(p) => fs::read_to_string(p)?,
            None => SAMPLE_QUESTIONS.to_string(),
        };
        let bank = Self::from_json(&flashcards, &questions)?;
        info!(
            "Content bank: {} flashcards, {} questions",
            bank.flashcards.len(),
            bank.questions.len()
        );
        Ok(bank)
    }
}
