use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use teloxide::types::ChatId;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::chat::StudyAssistant;
use crate::config::Config;
use crate::paper::PaperGenerator;
use crate::quiz::run::QuizRun;
use crate::quiz::{Quiz, QuizSummary};
use crate::resources::ResourceBrowser;
use crate::shell::{Shell, ShellEvent};
use crate::upload::Intake;

/// Something that happened in the background and should reach the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Shell(ShellEvent),
    QuizFinished(QuizSummary),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// All state belonging to one chat: the shell plus each page's machine.
pub struct ChatSession {
    pub shell: Shell,
    pub intake: Intake,
    pub paper: PaperGenerator,
    pub assistant: StudyAssistant,
    pub config: Config,
    quiz: Mutex<Option<Arc<QuizRun>>>,
    attempts: AtomicU32,
    resources: Mutex<ResourceBrowser>,
    events: UnboundedSender<UiEvent>,
}

impl ChatSession {
    pub fn new(config: &Config, events: UnboundedSender<UiEvent>) -> Self {
        let shell_events = events.clone();
        Self {
            shell: Shell::new(config.delays, move |event| {
                let _ = shell_events.send(UiEvent::Shell(event));
            }),
            intake: Intake::new(config.delays.upload),
            paper: PaperGenerator::new(config.delays.paper_generation, config.default_difficulty),
            assistant: StudyAssistant::new(config.delays.chat_reply),
            config: config.clone(),
            quiz: Mutex::new(None),
            attempts: AtomicU32::new(0),
            resources: Mutex::new(ResourceBrowser::default()),
            events,
        }
    }

    /// Mounts a new quiz, replacing any earlier one. The caller still has to
    /// load it.
    pub fn start_quiz(&self, topic: &str, difficulty: &str) -> Arc<QuizRun> {
        let events = self.events.clone();
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let run = Arc::new(QuizRun::new(
            Quiz::new(topic, difficulty, self.config.quiz_time_limit).with_attempt(attempt),
            move |summary| {
                let _ = events.send(UiEvent::QuizFinished(summary));
            },
        ));
        *lock(&self.quiz) = Some(Arc::clone(&run));
        run
    }

    pub fn quiz(&self) -> Option<Arc<QuizRun>> {
        lock(&self.quiz).clone()
    }

    /// Throws the current quiz away, along with its countdown.
    pub fn end_quiz(&self) {
        if lock(&self.quiz).take().is_some() {
            debug!("Quiz discarded");
        }
    }

    /// The resources page, brought up to date with the uploaded files.
    pub fn resources(&self) -> MutexGuard<'_, ResourceBrowser> {
        let mut browser = lock(&self.resources);
        browser.set_files(&self.shell.uploaded_files());
        browser
    }
}

/// Sessions for every chat the bot has seen since it started. They, and
/// their event delivery tasks, live until the bot stops.
pub struct Sessions {
    config: Config,
    chats: Mutex<HashMap<ChatId, Arc<ChatSession>>>,
}

impl Sessions {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            chats: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the chat's session, creating it on first contact. A new
    /// session's event stream is handed to `listen`.
    pub fn get_or_create(
        &self,
        chat_id: ChatId,
        listen: impl FnOnce(UnboundedReceiver<UiEvent>),
    ) -> Arc<ChatSession> {
        let mut chats = lock(&self.chats);
        if let Some(session) = chats.get(&chat_id) {
            return Arc::clone(session);
        }

        debug!("New session for chat {}", chat_id.0);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(ChatSession::new(&self.config, tx));
        chats.insert(chat_id, Arc::clone(&session));
        listen(rx);
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delays;
    use crate::quiz::{Advance, Difficulty, Question};
    use std::time::Duration;
    use crate::upload::UploadedFile;

    fn instant_config() -> Config {
        Config {
            delays: Delays::instant(),
            ..Default::default()
        }
    }

    #[test]
    fn sessions_are_created_once_per_chat() {
        let sessions = Sessions::new(instant_config());
        let mut listeners = 0;

        let first = sessions.get_or_create(ChatId(1), |_| listeners += 1);
        let again = sessions.get_or_create(ChatId(1), |_| listeners += 1);
        let other = sessions.get_or_create(ChatId(2), |_| listeners += 1);

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(listeners, 2);
    }

    #[tokio::test]
    async fn finished_quiz_is_reported_on_the_event_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(&instant_config(), tx);
        let run = session.start_quiz("Optics", "easy");
        run.load(session.config.delays.quiz_load).await;

        while let Some(question) = run.snapshot().current().cloned() {
            if let Question::Choice { correct_option, .. } = &question {
                run.submit_answer(correct_option);
            }
            if let Advance::Completed(_) = run.advance() {
                break;
            }
        }

        match rx.recv().await {
            Some(UiEvent::QuizFinished(summary)) => assert_eq!(summary.percentage, 100),
            other => panic!("expected a finished quiz, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn answers_from_an_earlier_quiz_are_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(&instant_config(), tx);
        let old = session.start_quiz("Optics", "easy");
        old.load(Duration::ZERO).await;
        let stale = old.snapshot();
        let stale_id = stale.current().unwrap().id();

        let run = session.start_quiz("Optics", "easy");
        run.load(Duration::ZERO).await;
        assert_ne!(run.snapshot().attempt, stale.attempt);

        assert_eq!(run.choose_option(stale.attempt, stale_id, 0), None);
        assert!(!run.snapshot().answered);
    }

    #[test]
    fn paper_settings_start_at_the_configured_difficulty() {
        let config = Config {
            default_difficulty: Difficulty::Easy,
            ..instant_config()
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(&config, tx);
        assert_eq!(session.paper.config().difficulty, Difficulty::Easy);
    }

    #[tokio::test]
    async fn leaving_the_quiz_discards_it() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(&instant_config(), tx);
        session.start_quiz("Optics", "medium");
        assert!(session.quiz().is_some());

        session.end_quiz();
        assert!(session.quiz().is_none());
    }

    #[tokio::test]
    async fn resources_follow_the_uploaded_files() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(&instant_config(), tx);
        assert_eq!(session.resources().catalog().len(), 6);

        session.shell.add_file(UploadedFile {
            name: "waves.pdf".to_string(),
            media_type: "application/pdf".to_string(),
            url: "blob:1".to_string(),
            topics: vec!["waves".to_string()],
        });
        assert_eq!(session.resources().catalog()[0].topic, "waves");
    }
}
