pub mod bank;
pub mod run;

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Unknown keys land on medium rather than failing.
    pub fn from_key(key: &str) -> Self {
        key.parse().unwrap_or_default()
    }

    pub fn key(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Easy,
        }
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Question {
    Choice {
        id: u32,
        text: String,
        options: Vec<String>,
        correct_option: String,
        explanation: Option<String>,
    },
    FreeResponse {
        id: u32,
        text: String,
        sample_answer: String,
        points: u32,
    },
}

impl Question {
    pub fn id(&self) -> u32 {
        match self {
            Question::Choice { id, .. } | Question::FreeResponse { id, .. } => *id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Question::Choice { text, .. } | Question::FreeResponse { text, .. } => text,
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            Question::Choice { .. } => 1,
            Question::FreeResponse { points, .. } => *points,
        }
    }

    /// Shown once the question has been answered.
    pub fn explanation(&self) -> Option<&str> {
        match self {
            Question::Choice { explanation, .. } => explanation.as_deref(),
            Question::FreeResponse { sample_answer, .. } => Some(sample_answer),
        }
    }

    /// Choice answers must match an option exactly; free responses only need
    /// to say something.
    pub fn accepts(&self, answer: &str) -> bool {
        match self {
            Question::Choice { correct_option, .. } => answer == correct_option,
            Question::FreeResponse { .. } => !answer.trim().is_empty(),
        }
    }

    fn shuffle_options<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if let Question::Choice { options, .. } = self {
            options.shuffle(rng);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    #[default]
    Loading,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnswerRecord {
    pub question: Question,
    pub given_answer: String,
    pub was_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizSummary {
    pub score: u32,
    pub total: usize,
    pub max_score: u32,
    pub percentage: u32,
    pub transcript: Vec<AnswerRecord>,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub explanation: Option<String>,
    pub correct_option: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The current question hasn't been answered yet, or the quiz is over.
    Ignored,
    Next,
    Completed(QuizSummary),
}

/// One attempt at a quiz, from loading the bank to the final score.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Quiz {
    pub topic: String,
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
    pub current_question: usize,
    pub score: u32,
    pub answers: Vec<AnswerRecord>,
    pub answered: bool,
    pub phase: Phase,
    pub timed_out: bool,
    pub time_limit: Option<u32>,
    pub time_left: Option<u32>,
    /// Tells apart quizzes started in the same chat.
    pub attempt: u32,
    requested_difficulty: String,
}

impl Quiz {
    pub fn new(topic: impl Into<String>, difficulty: &str, time_limit: Option<u32>) -> Self {
        Self {
            topic: topic.into(),
            difficulty: Difficulty::from_key(difficulty),
            requested_difficulty: difficulty.to_string(),
            time_limit,
            ..Default::default()
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Leaves the loading state with a fresh bank and zeroed counters.
    pub fn load(&mut self) {
        self.load_with(&mut rand::thread_rng());
    }

    pub fn load_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let (difficulty, mut questions) = bank::select(&self.topic, &self.requested_difficulty);
        for question in &mut questions {
            question.shuffle_options(rng);
        }
        self.difficulty = difficulty;
        self.questions = questions;
        self.restart();
    }

    fn restart(&mut self) {
        self.current_question = 0;
        self.score = 0;
        self.answers.clear();
        self.answered = false;
        self.timed_out = false;
        self.time_left = self.time_limit;
        self.phase = if self.questions.is_empty() {
            Phase::Complete
        } else {
            Phase::InProgress
        };
    }

    pub fn current(&self) -> Option<&Question> {
        match self.phase {
            Phase::InProgress => self.questions.get(self.current_question),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn is_last_question(&self) -> bool {
        self.current_question + 1 >= self.questions.len()
    }

    pub fn max_score(&self) -> u32 {
        self.questions.iter().map(Question::points).sum()
    }

    /// Grades `answer` against the current question. Returns `None` when
    /// there is nothing to grade, including a second answer to the same
    /// question.
    pub fn submit_answer(&mut self, answer: &str) -> Option<AnswerOutcome> {
        if self.answered {
            return None;
        }
        let question = self.current()?.clone();
        let correct = question.accepts(answer);
        if correct {
            self.score += question.points();
        }
        self.answered = true;

        let outcome = AnswerOutcome {
            correct,
            explanation: question.explanation().map(str::to_string),
            correct_option: match &question {
                Question::Choice { correct_option, .. } => Some(correct_option.clone()),
                Question::FreeResponse { .. } => None,
            },
        };
        self.answers.push(AnswerRecord {
            question,
            given_answer: answer.to_string(),
            was_correct: correct,
        });
        Some(outcome)
    }

    /// Answers with option `index` of the given question. A press meant for
    /// another attempt or another question is ignored.
    pub fn choose_option(
        &mut self,
        attempt: u32,
        question_id: u32,
        index: usize,
    ) -> Option<AnswerOutcome> {
        if attempt != self.attempt {
            return None;
        }
        let option = match self.current()? {
            Question::Choice { id, options, .. } if *id == question_id => options.get(index)?.clone(),
            _ => return None,
        };
        self.submit_answer(&option)
    }

    /// Typed text only answers an open free-response question.
    pub fn awaits_typed_answer(&self) -> bool {
        !self.answered && matches!(self.current(), Some(Question::FreeResponse { .. }))
    }

    pub fn advance(&mut self) -> Advance {
        if self.phase != Phase::InProgress || !self.answered {
            return Advance::Ignored;
        }
        if self.is_last_question() {
            self.phase = Phase::Complete;
            return Advance::Completed(self.summary());
        }
        self.current_question += 1;
        self.answered = false;
        Advance::Next
    }

    /// One second of the countdown. Hitting zero ends the quiz on the spot.
    pub fn tick(&mut self) -> Option<QuizSummary> {
        if self.phase != Phase::InProgress {
            return None;
        }
        let left = self.time_left.as_mut()?;
        *left = left.saturating_sub(1);
        if *left > 0 {
            return None;
        }
        self.phase = Phase::Complete;
        self.timed_out = true;
        Some(self.summary())
    }

    /// Back to the first question of the same bank.
    pub fn reset(&mut self) {
        if self.phase != Phase::Loading {
            self.restart();
        }
    }

    pub fn summary(&self) -> QuizSummary {
        let max_score = self.max_score();
        let percentage = if max_score == 0 {
            0
        } else {
            (f64::from(self.score) * 100.0 / f64::from(max_score)).round() as u32
        };
        QuizSummary {
            score: self.score,
            total: self.questions.len(),
            max_score,
            percentage,
            transcript: self.answers.clone(),
            timed_out: self.timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn loaded(difficulty: &str) -> Quiz {
        let mut quiz = Quiz::new("Photosynthesis", difficulty, None);
        quiz.load_with(&mut StdRng::seed_from_u64(7));
        quiz
    }

    fn correct_answer(question: &Question) -> String {
        match question {
            Question::Choice { correct_option, .. } => correct_option.clone(),
            Question::FreeResponse { sample_answer, .. } => sample_answer.clone(),
        }
    }

    fn wrong_answer(question: &Question) -> String {
        match question {
            Question::Choice {
                options,
                correct_option,
                ..
            } => options
                .iter()
                .find(|o| *o != correct_option)
                .cloned()
                .unwrap_or_default(),
            Question::FreeResponse { .. } => "   ".to_string(),
        }
    }

    #[test]
    fn starts_loading_then_in_progress() {
        let mut quiz = Quiz::new("Cells", "easy", None);
        assert_eq!(quiz.phase, Phase::Loading);
        assert!(quiz.current().is_none());

        quiz.load();
        assert_eq!(quiz.phase, Phase::InProgress);
        assert_eq!(quiz.difficulty, Difficulty::Easy);
        assert_eq!(quiz.current_question, 0);
        assert!(quiz.current().is_some());
    }

    #[test]
    fn unknown_difficulty_uses_medium_bank() {
        let quiz = loaded("impossible");
        assert_eq!(quiz.difficulty, Difficulty::Medium);
        assert_eq!(quiz.questions.len(), bank::questions("Photosynthesis", Difficulty::Medium).len());
        assert!(!quiz.questions.is_empty());
    }

    #[test]
    fn second_answer_to_same_question_is_ignored() {
        let mut quiz = loaded("easy");
        let question = quiz.current().unwrap().clone();

        let first = quiz.submit_answer(&correct_answer(&question)).unwrap();
        assert!(first.correct);
        assert_eq!(quiz.score, 1);

        assert_eq!(quiz.submit_answer(&correct_answer(&question)), None);
        assert_eq!(quiz.submit_answer(&wrong_answer(&question)), None);
        assert_eq!(quiz.score, 1);
        assert_eq!(quiz.answers.len(), 1);
    }

    #[test]
    fn buttons_from_a_passed_question_are_ignored() {
        let mut quiz = loaded("easy");
        let question = quiz.current().unwrap().clone();
        let first = question.id();
        quiz.submit_answer(&correct_answer(&question));
        assert_eq!(quiz.advance(), Advance::Next);

        assert_eq!(quiz.choose_option(quiz.attempt, first, 0), None);
        assert!(!quiz.answered);
        assert_eq!(quiz.answers.len(), 1);

        let second = quiz.current().unwrap().id();
        assert!(quiz.choose_option(quiz.attempt, second, 0).is_some());
    }

    #[test]
    fn buttons_from_an_earlier_attempt_are_ignored() {
        let mut quiz = Quiz::new("Photosynthesis", "easy", None).with_attempt(2);
        quiz.load_with(&mut StdRng::seed_from_u64(7));
        let id = quiz.current().unwrap().id();

        assert_eq!(quiz.choose_option(1, id, 0), None);
        assert_eq!(quiz.choose_option(2, id, 99), None);
        assert!(quiz.choose_option(2, id, 0).is_some());
    }

    #[test]
    fn typed_text_only_answers_free_response() {
        let mut quiz = loaded("hard");
        assert!(matches!(quiz.current(), Some(Question::Choice { .. })));
        assert!(!quiz.awaits_typed_answer());

        while !matches!(quiz.current(), Some(Question::FreeResponse { .. })) {
            let question = quiz.current().unwrap().clone();
            quiz.submit_answer(&correct_answer(&question));
            quiz.advance();
        }
        assert!(quiz.awaits_typed_answer());
        quiz.submit_answer("chlorophyll absorbs light");
        assert!(!quiz.awaits_typed_answer());
    }

    #[test]
    fn cannot_advance_before_answering() {
        let mut quiz = loaded("easy");
        assert_eq!(quiz.advance(), Advance::Ignored);
        assert_eq!(quiz.current_question, 0);
    }

    #[test]
    fn free_response_needs_non_blank_text() {
        let mut quiz = loaded("hard");
        while !matches!(quiz.current(), Some(Question::FreeResponse { .. })) {
            let question = quiz.current().unwrap().clone();
            quiz.submit_answer(&correct_answer(&question));
            assert_eq!(quiz.advance(), Advance::Next);
        }
        let points = quiz.current().unwrap().points();
        let before = quiz.score;

        let outcome = quiz.submit_answer("  \n").unwrap();
        assert!(!outcome.correct);
        assert!(outcome.explanation.is_some());
        assert_eq!(quiz.score, before);

        quiz.reset();
        while !matches!(quiz.current(), Some(Question::FreeResponse { .. })) {
            let question = quiz.current().unwrap().clone();
            quiz.submit_answer(&correct_answer(&question));
            quiz.advance();
        }
        let before = quiz.score;
        assert!(quiz.submit_answer("light becomes sugar").unwrap().correct);
        assert_eq!(quiz.score, before + points);
    }

    #[test]
    fn two_correct_answers_score_one_hundred_percent() {
        let mut quiz = Quiz::new("Maths", "easy", None);
        quiz.questions = bank::questions("Maths", Difficulty::Easy)
            .into_iter()
            .take(2)
            .collect();
        quiz.restart();

        for _ in 0..2 {
            let question = quiz.current().unwrap().clone();
            quiz.submit_answer(&correct_answer(&question));
            if let Advance::Completed(summary) = quiz.advance() {
                assert_eq!(summary.score, 2);
                assert_eq!(summary.total, 2);
                assert_eq!(summary.percentage, 100);
                assert_eq!(summary.transcript.len(), 2);
                assert!(!summary.timed_out);
            }
        }
        assert!(quiz.is_complete());
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        let mut quiz = loaded("easy");
        let question = quiz.current().unwrap().clone();
        quiz.submit_answer(&correct_answer(&question));
        quiz.advance();
        for _ in 1..quiz.questions.len() {
            let question = quiz.current().unwrap().clone();
            quiz.submit_answer(&wrong_answer(&question));
            quiz.advance();
        }
        let summary = quiz.summary();
        assert_eq!(summary.score, 1);
        assert_eq!(summary.percentage, 33);
    }

    #[test]
    fn countdown_forces_completion_even_mid_question() {
        let mut quiz = Quiz::new("History", "medium", Some(3));
        quiz.load();
        assert_eq!(quiz.tick(), None);
        assert_eq!(quiz.tick(), None);

        let summary = quiz.tick().unwrap();
        assert!(summary.timed_out);
        assert!(quiz.is_complete());
        assert_eq!(quiz.tick(), None);
        assert_eq!(quiz.submit_answer("anything"), None);
    }

    #[test]
    fn no_time_limit_means_ticks_do_nothing() {
        let mut quiz = loaded("medium");
        for _ in 0..100 {
            assert_eq!(quiz.tick(), None);
        }
        assert_eq!(quiz.phase, Phase::InProgress);
    }

    #[test]
    fn reset_keeps_bank_and_zeroes_counters() {
        let mut quiz = loaded("medium");
        let questions = quiz.questions.clone();
        let question = quiz.current().unwrap().clone();
        quiz.submit_answer(&correct_answer(&question));
        quiz.advance();

        quiz.reset();
        assert_eq!(quiz.questions, questions);
        assert_eq!(quiz.current_question, 0);
        assert_eq!(quiz.score, 0);
        assert!(quiz.answers.is_empty());
        assert!(!quiz.answered);
        assert_eq!(quiz.phase, Phase::InProgress);
    }

    #[test]
    fn shuffling_keeps_correct_option_available() {
        let quiz = loaded("hard");
        for question in &quiz.questions {
            if let Question::Choice {
                options,
                correct_option,
                ..
            } = question
            {
                assert!(options.contains(correct_option));
            }
        }
    }

    proptest! {
        #[test]
        fn score_never_decreases_nor_exceeds_max(
            difficulty in prop_oneof![
                Just("easy".to_string()),
                Just("medium".to_string()),
                Just("hard".to_string()),
                "[a-z]{0,8}",
            ],
            answers in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..12),
        ) {
            let mut quiz = Quiz::new("Topic", &difficulty, None);
            quiz.load_with(&mut StdRng::seed_from_u64(1));
            let max = quiz.max_score();
            prop_assert!(max > 0);

            let mut last = quiz.score;
            for (right, repeat) in answers {
                let Some(question) = quiz.current().cloned() else { break };
                let answer = if right { correct_answer(&question) } else { wrong_answer(&question) };
                quiz.submit_answer(&answer);
                if repeat {
                    quiz.submit_answer(&correct_answer(&question));
                }
                prop_assert!(quiz.score >= last);
                prop_assert!(quiz.score <= max);
                last = quiz.score;
                quiz.advance();
            }
            prop_assert!(quiz.summary().percentage <= 100);
        }
    }
}
