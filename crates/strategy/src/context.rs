//! The context module contains the inputs handed to a [Strategy](crate::Strategy) and the
//! results it hands back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The number of questions the referee expects in a questions batch.
pub const EXPECTED_QUESTION_COUNT: usize = 20;

/// The minimum number of words the referee expects in each guess justification.
pub const MIN_JUSTIFICATION_WORDS: usize = 35;

/// The [StrategyContext] struct is the single argument of every strategy capability. It pairs
/// the static identifiers of the match with the data specific to the current phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyContext<D> {
    /// Identifiers that stay fixed for the whole match.
    pub service: ServiceInfo,
    /// Per-phase data.
    pub dynamic: D,
}

impl<D> StrategyContext<D> {
    /// Creates a new [StrategyContext].
    pub fn new(service: ServiceInfo, dynamic: D) -> Self {
        Self { service, dynamic }
    }
}

/// Static identifiers of the match a capability is invoked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// The match identifier.
    pub match_id: String,
    /// The 7-digit `SSRRGGG` game identifier.
    pub game_id: String,
    /// The season the match belongs to.
    pub season_id: String,
    /// The round the match belongs to.
    pub round_number: u32,
}

/// Phase data for the warmup capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupInput {
    /// The warmup question asked by the referee, usually simple arithmetic.
    pub warmup_question: String,
}

/// Phase data for the question generation capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionsInput {
    /// Name of the book or lecture.
    pub book_name: String,
    /// Short description of the book.
    pub book_hint: String,
    /// The association domain the guessed word must come from.
    pub association_word: String,
}

/// Phase data for the guess capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuessInput {
    /// Name of the book or lecture.
    pub book_name: String,
    /// Short description of the book.
    pub book_hint: String,
    /// The association domain the guessed word must come from.
    pub association_word: String,
    /// The referee's answers to the questions batch.
    pub answers: Vec<Answer>,
    /// The questions this player sent, in order.
    pub questions_sent: Vec<Question>,
}

/// Phase data for the score notification capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    /// League points awarded for the match.
    pub league_points: u32,
    /// The referee's private score.
    pub private_score: f64,
    /// Free-form score breakdown.
    pub breakdown: Map<String, Value>,
}

/// A single multiple choice question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based position of the question in the batch.
    #[serde(default)]
    pub question_number: u32,
    /// The question text.
    #[serde(default)]
    pub question_text: String,
    /// Choice letter to choice text.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// The referee's answer to a single [Question].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// The question this answer belongs to.
    #[serde(default)]
    pub question_number: u32,
    /// The chosen option letter.
    #[serde(default)]
    pub answer: String,
}

/// Result of the warmup capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupAnswer {
    /// The answer to the warmup question.
    pub answer: String,
}

/// Result of the question generation capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    /// The generated questions, in the order they are sent.
    pub questions: Vec<Question>,
}

/// Result of the guess capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guess {
    /// The guessed opening sentence of the book.
    pub opening_sentence: String,
    /// Why the opening sentence was chosen.
    pub sentence_justification: String,
    /// The guessed associative word.
    pub associative_word: String,
    /// Why the word was chosen.
    pub word_justification: String,
    /// Confidence in the guess, in `[0, 1]`.
    pub confidence: f64,
}

/// Counts the whitespace separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
