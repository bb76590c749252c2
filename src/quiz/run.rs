use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::info;

use super::{Advance, AnswerOutcome, Quiz, QuizSummary};
use crate::timer::{simulate, Timer};

pub type CompletionHandler = Arc<dyn Fn(QuizSummary) + Send + Sync>;

/// Drives a [`Quiz`] in real time: the loading delay, the countdown, and
/// delivering the final summary to whoever started the quiz.
pub struct QuizRun {
    quiz: Arc<Mutex<Quiz>>,
    countdown: Mutex<Option<Timer>>,
    on_complete: CompletionHandler,
}

impl QuizRun {
    pub fn new(quiz: Quiz, on_complete: impl Fn(QuizSummary) + Send + Sync + 'static) -> Self {
        Self {
            quiz: Arc::new(Mutex::new(quiz)),
            countdown: Mutex::new(None),
            on_complete: Arc::new(on_complete),
        }
    }

    fn quiz(&self) -> MutexGuard<'_, Quiz> {
        self.quiz.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn load(&self, delay: Duration) {
        simulate(delay).await;
        {
            let mut quiz = self.quiz();
            quiz.load();
            info!(
                "Quiz on '{}' loaded: {} questions at {} difficulty",
                quiz.topic,
                quiz.questions.len(),
                quiz.difficulty
            );
        }
        self.start_countdown();
    }

    fn start_countdown(&self) {
        let mut countdown = self.countdown.lock().unwrap_or_else(PoisonError::into_inner);
        // Replacing the old timer drops it, which clears it
        *countdown = None;
        if self.quiz().time_limit.is_none() {
            return;
        }

        let quiz = Arc::clone(&self.quiz);
        let on_complete = Arc::clone(&self.on_complete);
        *countdown = Some(Timer::every(Duration::from_secs(1), move || {
            let finished = {
                let mut quiz = quiz.lock().unwrap_or_else(PoisonError::into_inner);
                if quiz.is_complete() {
                    return ControlFlow::Break(());
                }
                quiz.tick()
            };
            match finished {
                Some(summary) => {
                    info!("Quiz timed out with score {}", summary.score);
                    on_complete(summary);
                    ControlFlow::Break(())
                }
                None => ControlFlow::Continue(()),
            }
        }));
    }

    fn stop_countdown(&self) {
        if let Some(timer) = self
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.cancel();
        }
    }

    pub fn submit_answer(&self, answer: &str) -> Option<AnswerOutcome> {
        self.quiz().submit_answer(answer)
    }

    pub fn choose_option(&self, attempt: u32, question_id: u32, index: usize) -> Option<AnswerOutcome> {
        self.quiz().choose_option(attempt, question_id, index)
    }

    pub fn advance(&self) -> Advance {
        let step = self.quiz().advance();
        if let Advance::Completed(summary) = &step {
            self.stop_countdown();
            info!(
                "Quiz completed: {}/{} ({}%)",
                summary.score, summary.max_score, summary.percentage
            );
            (self.on_complete)(summary.clone());
        }
        step
    }

    pub fn reset(&self) {
        self.quiz().reset();
        self.start_countdown();
    }

    pub fn snapshot(&self) -> Quiz {
        self.quiz().clone()
    }
}

impl Drop for QuizRun {
    fn drop(&mut self) {
        self.stop_countdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Phase, Question};

    fn recorder() -> (Arc<Mutex<Vec<QuizSummary>>>, impl Fn(QuizSummary) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |summary| sink.lock().unwrap().push(summary))
    }

    fn answer_for(question: &Question) -> String {
        match question {
            Question::Choice { correct_option, .. } => correct_option.clone(),
            Question::FreeResponse { sample_answer, .. } => sample_answer.clone(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loading_takes_the_configured_delay() {
        let (_, on_complete) = recorder();
        let run = Arc::new(QuizRun::new(Quiz::new("Algebra", "easy", None), on_complete));
        let loader = Arc::clone(&run);
        let task = tokio::spawn(async move { loader.load(Duration::from_millis(1500)).await });

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(run.snapshot().phase, Phase::Loading);

        task.await.unwrap();
        assert_eq!(run.snapshot().phase, Phase::InProgress);
    }

    #[tokio::test]
    async fn completing_the_quiz_fires_callback_once() {
        let (seen, on_complete) = recorder();
        let run = QuizRun::new(Quiz::new("Algebra", "easy", None), on_complete);
        run.load(Duration::ZERO).await;

        loop {
            let question = run.snapshot().current().cloned().unwrap();
            run.submit_answer(&answer_for(&question));
            match run.advance() {
                Advance::Next => continue,
                Advance::Completed(summary) => {
                    assert_eq!(summary.percentage, 100);
                    break;
                }
                Advance::Ignored => panic!("answered question must advance"),
            }
        }
        assert_eq!(run.advance(), Advance::Ignored);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_times_out_unanswered_quiz() {
        let (seen, on_complete) = recorder();
        let run = QuizRun::new(Quiz::new("Algebra", "medium", Some(5)), on_complete);
        run.load(Duration::ZERO).await;

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(run.snapshot().time_left, Some(1));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let summaries = seen.lock().unwrap().clone();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].timed_out);
        assert_eq!(summaries[0].score, 0);
        assert!(run.snapshot().is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_the_countdown() {
        let (seen, on_complete) = recorder();
        let run = QuizRun::new(Quiz::new("Algebra", "medium", Some(3)), on_complete);
        run.load(Duration::ZERO).await;

        tokio::time::sleep(Duration::from_millis(2500)).await;
        run.reset();
        assert_eq!(run.snapshot().time_left, Some(3));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finishing_early_stops_the_countdown() {
        let (seen, on_complete) = recorder();
        let run = QuizRun::new(Quiz::new("Algebra", "easy", Some(10)), on_complete);
        run.load(Duration::ZERO).await;

        while let Some(question) = run.snapshot().current().cloned() {
            run.submit_answer(&answer_for(&question));
            run.advance();
        }
        tokio::time::sleep(Duration::from_secs(20)).await;

        let summaries = seen.lock().unwrap().clone();
        assert_eq!(summaries.len(), 1);
        assert!(!summaries[0].timed_out);
    }
}
