//! The demo module contains [DemoStrategy], an implementation of the [Strategy] trait that
//! answers every capability with fixed content.

use crate::{
    Guess, GuessInput, Question, QuestionSet, QuestionsInput, ScoreInput, Strategy,
    StrategyContext, WarmupAnswer, WarmupInput, EXPECTED_QUESTION_COUNT,
};
use anyhow::Result;
use std::collections::BTreeMap;

/// A [Strategy] with predictable output, used to exercise the protocol end to end without any
/// gameplay intelligence behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoStrategy;

impl Strategy for DemoStrategy {
    fn warmup_answer(&self, _: &StrategyContext<WarmupInput>) -> Result<WarmupAnswer> {
        Ok(WarmupAnswer {
            answer: "4".to_string(),
        })
    }

    fn generate_questions(&self, _: &StrategyContext<QuestionsInput>) -> Result<QuestionSet> {
        let options: BTreeMap<String, String> = [
            ("A", "Yes"),
            ("B", "No"),
            ("C", "Maybe"),
            ("D", "Unknown"),
        ]
        .into_iter()
        .map(|(letter, text)| (letter.to_string(), text.to_string()))
        .collect();

        let questions = (1..=EXPECTED_QUESTION_COUNT as u32)
            .map(|n| Question {
                question_number: n,
                question_text: format!("Demo question {n}?"),
                options: options.clone(),
            })
            .collect();

        Ok(QuestionSet { questions })
    }

    fn formulate_guess(&self, _: &StrategyContext<GuessInput>) -> Result<Guess> {
        Ok(Guess {
            opening_sentence: "Demo opening sentence for testing.".to_string(),
            sentence_justification: "The opening sentence was carefully analyzed based on the \
                pattern of answers received during the questioning phase combined with the book \
                hint and associative domain provided at game start to make this guess about how \
                the text most likely begins."
                .to_string(),
            associative_word: "demo".to_string(),
            word_justification: "The association word was chosen based on thematic connections \
                observed throughout the answer patterns and the overall context of the book \
                description provided, weighed against the associative domain announced by the \
                referee when the game started."
                .to_string(),
            confidence: 0.75,
        })
    }

    fn on_score_received(&self, ctx: &StrategyContext<ScoreInput>) -> Result<()> {
        tracing::info!(
            target: "q21-demo-strategy",
            "Game {}: {} pts, score={}",
            ctx.service.match_id,
            ctx.dynamic.league_points,
            ctx.dynamic.private_score
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::DemoStrategy;
    use crate::{
        word_count, GuessInput, QuestionsInput, ServiceInfo, Strategy, StrategyContext,
        EXPECTED_QUESTION_COUNT, MIN_JUSTIFICATION_WORDS,
    };

    #[test]
    fn demo_questions_fill_a_batch() {
        let ctx = StrategyContext::new(ServiceInfo::default(), QuestionsInput::default());
        let set = DemoStrategy.generate_questions(&ctx).unwrap();

        assert_eq!(set.questions.len(), EXPECTED_QUESTION_COUNT);
        assert_eq!(set.questions[0].question_number, 1);
        assert_eq!(set.questions[19].question_number, 20);
        assert!(set.questions.iter().all(|q| q.options.len() == 4));
    }

    #[test]
    fn demo_guess_meets_the_referee_contract() {
        let ctx = StrategyContext::new(ServiceInfo::default(), GuessInput::default());
        let guess = DemoStrategy.formulate_guess(&ctx).unwrap();

        assert!(word_count(&guess.sentence_justification) >= MIN_JUSTIFICATION_WORDS);
        assert!(word_count(&guess.word_justification) >= MIN_JUSTIFICATION_WORDS);
        assert!((0.0..=1.0).contains(&guess.confidence));
    }
}
