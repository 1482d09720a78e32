//! The `executor` module contains the [GameExecutor], which turns decoded referee payloads into
//! strategy calls and strategy results into protocol payloads.

use crate::{
    error::{ProtocolError, Result},
    gprm::GameResult,
    log,
    messages::{AnswersBatchPayload, RoundStartPayload, ScoreFeedbackPayload, WarmupCallPayload},
};
use q21_player_strategy::{
    word_count, Answer, GuessInput, Question, QuestionsInput, ScoreInput, ServiceInfo, Strategy,
    StrategyContext, WarmupInput, EXPECTED_QUESTION_COUNT, MIN_JUSTIFICATION_WORDS,
};
use serde_json::{json, Value};
use std::{fmt, sync::Arc};

/// Book content of a match. Empty until the referee's round start arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookContent {
    pub book_name: String,
    pub book_hint: String,
    pub association_word: String,
}

impl BookContent {
    /// Overwrites every field for which `payload` carries a non-empty value.
    fn enrich(&mut self, payload: &RoundStartPayload) {
        for (field, value) in [
            (&mut self.book_name, &payload.book_name),
            (&mut self.book_hint, &payload.book_hint),
            (&mut self.association_word, &payload.association_word),
        ] {
            if !value.is_empty() {
                field.clone_from(value);
            }
        }
    }
}

/// Invokes the [Strategy] capabilities for a single match.
///
/// The executor knows nothing about message types or phases. Besides the strategy handle it only
/// keeps the content that arrives mid-protocol and is needed by later capabilities: the book, the
/// questions that were sent and the answers that came back.
pub struct GameExecutor {
    strategy: Arc<dyn Strategy>,
    book: BookContent,
    questions_sent: Vec<Question>,
    answers: Vec<Answer>,
}

impl GameExecutor {
    /// Creates a new [GameExecutor] backed by `strategy`.
    pub fn new(strategy: Arc<dyn Strategy>) -> Self {
        Self {
            strategy,
            book: BookContent::default(),
            questions_sent: Vec::new(),
            answers: Vec::new(),
        }
    }

    /// The book content received so far.
    pub fn book(&self) -> &BookContent {
        &self.book
    }

    /// The questions of the last successful questions batch.
    pub fn questions_sent(&self) -> &[Question] {
        &self.questions_sent
    }

    /// Answers the warmup question.
    ///
    /// ### Takes
    /// - `service`: The identifiers of the match.
    /// - `payload`: The decoded warmup call.
    ///
    /// ### Returns
    /// - `Ok(Value)`: The warmup response payload `{match_id, answer}`.
    /// - `Err(ProtocolError::Strategy)`: The warmup capability failed.
    pub fn execute_warmup(&self, service: &ServiceInfo, payload: &WarmupCallPayload) -> Result<Value> {
        let ctx = StrategyContext::new(
            service.clone(),
            WarmupInput {
                warmup_question: payload.warmup_question.clone(),
            },
        );
        let answer = invoke("answer_warmup", || self.strategy.warmup_answer(&ctx))?;

        Ok(json!({
            "match_id": service.match_id,
            "answer": answer.answer,
        }))
    }

    /// Stores the book content carried by a round start.
    pub fn handle_round_start(&mut self, payload: &RoundStartPayload) {
        self.book.enrich(payload);
    }

    /// Generates the questions batch from the stored book content.
    ///
    /// ### Returns
    /// - `Ok(Value)`: The questions batch payload `{match_id, questions}`, holding exactly the
    ///    questions the strategy returned.
    /// - `Err(ProtocolError::Strategy)`: The question generation capability failed.
    pub fn execute_questions(&mut self, service: &ServiceInfo) -> Result<Value> {
        let ctx = StrategyContext::new(
            service.clone(),
            QuestionsInput {
                book_name: self.book.book_name.clone(),
                book_hint: self.book.book_hint.clone(),
                association_word: self.book.association_word.clone(),
            },
        );
        let set = invoke("generate_questions", || self.strategy.generate_questions(&ctx))?;

        if set.questions.len() != EXPECTED_QUESTION_COUNT {
            tracing::warn!(
                target: "q21-session",
                "Strategy returned {} questions for match {}, the referee expects {}",
                set.questions.len(),
                service.match_id,
                EXPECTED_QUESTION_COUNT
            );
        }

        let payload = json!({
            "match_id": service.match_id,
            "questions": set.questions,
        });
        self.questions_sent = set.questions;
        Ok(payload)
    }

    /// Stores the referee's answers for the guess capability.
    pub fn receive_answers(&mut self, payload: AnswersBatchPayload) {
        self.answers = payload.answers;
    }

    /// Formulates the final guess from the book content, the questions sent and the answers
    /// received.
    ///
    /// ### Returns
    /// - `Ok(Value)`: The guess submission payload `{match_id, guess}`.
    /// - `Err(ProtocolError::Strategy)`: The guess capability failed.
    pub fn execute_guess(&self, service: &ServiceInfo) -> Result<Value> {
        let ctx = StrategyContext::new(
            service.clone(),
            GuessInput {
                book_name: self.book.book_name.clone(),
                book_hint: self.book.book_hint.clone(),
                association_word: self.book.association_word.clone(),
                answers: self.answers.clone(),
                questions_sent: self.questions_sent.clone(),
            },
        );
        let guess = invoke("formulate_guess", || self.strategy.formulate_guess(&ctx))?;

        for (name, text) in [
            ("sentence_justification", &guess.sentence_justification),
            ("word_justification", &guess.word_justification),
        ] {
            let words = word_count(text);
            if words < MIN_JUSTIFICATION_WORDS {
                tracing::warn!(
                    target: "q21-session",
                    "Guess for match {} has a {} of {} words, the referee expects at least {}",
                    service.match_id,
                    name,
                    words,
                    MIN_JUSTIFICATION_WORDS
                );
            }
        }
        if !(0.0..=1.0).contains(&guess.confidence) {
            tracing::warn!(
                target: "q21-session",
                "Guess for match {} has confidence {} outside [0, 1]",
                service.match_id,
                guess.confidence
            );
        }

        Ok(json!({
            "match_id": service.match_id,
            "guess": guess,
        }))
    }

    /// Notifies the strategy of the final score.
    ///
    /// ### Returns
    /// - `Ok(GameResult)`: The completed result of the match.
    /// - `Err(ProtocolError::Strategy)`: The score notification capability failed.
    pub fn handle_score(
        &self,
        service: &ServiceInfo,
        payload: ScoreFeedbackPayload,
    ) -> Result<GameResult> {
        let ctx = StrategyContext::new(
            service.clone(),
            ScoreInput {
                league_points: payload.league_points,
                private_score: payload.private_score,
                breakdown: payload.breakdown.clone(),
            },
        );
        invoke("receive_score", || self.strategy.on_score_received(&ctx))?;

        Ok(GameResult::completed(
            service.match_id.clone(),
            payload.league_points,
            payload.private_score,
            payload.breakdown,
        ))
    }
}

/// Runs one strategy capability between its call and response log lines.
fn invoke<T>(callback: &str, call: impl FnOnce() -> anyhow::Result<T>) -> Result<T> {
    log::log_callback_call(callback);
    let output = call().map_err(ProtocolError::Strategy)?;
    log::log_callback_response(callback);
    Ok(output)
}

impl fmt::Debug for GameExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameExecutor")
            .field("book", &self.book)
            .field("questions_sent", &self.questions_sent.len())
            .field("answers", &self.answers.len())
            .finish_non_exhaustive()
    }
}
