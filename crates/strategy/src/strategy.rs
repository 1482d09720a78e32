//! The strategy module holds the [Strategy] trait.

use crate::{
    Guess, GuessInput, QuestionSet, QuestionsInput, ScoreInput, StrategyContext, WarmupAnswer,
    WarmupInput,
};
use anyhow::Result;

/// The [Strategy] trait defines the four capabilities a player supplies to the match protocol.
/// The session manager calls exactly one capability per handled message and never inspects how
/// the content was produced.
pub trait Strategy: Send + Sync {
    /// Answer the referee's warmup question.
    ///
    /// ### Takes
    /// - `ctx`: The match identifiers and the warmup question.
    ///
    /// ### Returns
    /// - `Ok(WarmupAnswer)`: The answer to send back.
    /// - `Err(anyhow::Error)`: The strategy could not produce an answer.
    fn warmup_answer(&self, ctx: &StrategyContext<WarmupInput>) -> Result<WarmupAnswer>;

    /// Generate the questions batch for the match.
    ///
    /// ### Takes
    /// - `ctx`: The match identifiers and the book content received at round start.
    ///
    /// ### Returns
    /// - `Ok(QuestionSet)`: The questions to send. The referee expects
    ///    [EXPECTED_QUESTION_COUNT](crate::EXPECTED_QUESTION_COUNT) of them.
    /// - `Err(anyhow::Error)`: The strategy could not produce questions.
    fn generate_questions(&self, ctx: &StrategyContext<QuestionsInput>) -> Result<QuestionSet>;

    /// Formulate the final guess from the referee's answers.
    ///
    /// ### Takes
    /// - `ctx`: The match identifiers, the book content, the questions sent and the answers
    ///    received.
    ///
    /// ### Returns
    /// - `Ok(Guess)`: The guess to submit.
    /// - `Err(anyhow::Error)`: The strategy could not produce a guess.
    fn formulate_guess(&self, ctx: &StrategyContext<GuessInput>) -> Result<Guess>;

    /// Receive the final score of the match. Nothing is sent back to the referee.
    fn on_score_received(&self, ctx: &StrategyContext<ScoreInput>) -> Result<()>;
}
