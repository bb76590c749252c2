use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::config::Delays;
use crate::timer::Timer;
use crate::toast::{Toast, ToastKind};
use crate::upload::UploadedFile;

/// Everything the pages share.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub uploaded_files: Vec<UploadedFile>,
    pub detected_topic: Option<String>,
    pub toast: Toast,
    pub quiz_suggestion_open: bool,
}

impl AppState {
    /// The topic a quiz should be about: the last detected one, else the
    /// primary topic of the first file.
    pub fn quiz_topic(&self) -> Option<String> {
        self.detected_topic.clone().or_else(|| {
            self.uploaded_files
                .iter()
                .find_map(|f| f.primary_topic().map(str::to_string))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    ToastShown(Toast),
    ToastHidden,
    QuizSuggested { topic: Option<String> },
}

pub type EventSink = Arc<dyn Fn(ShellEvent) + Send + Sync>;

/// Owns the shared state and the timers that act on it. Dropping the shell
/// clears every pending timer.
pub struct Shell {
    state: Arc<Mutex<AppState>>,
    delays: Delays,
    notify: EventSink,
    toast_timer: Mutex<Option<Timer>>,
    suggestion_timer: Mutex<Option<Timer>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shell {
    pub fn new(delays: Delays, notify: impl Fn(ShellEvent) + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::default())),
            delays,
            notify: Arc::new(notify),
            toast_timer: Mutex::new(None),
            suggestion_timer: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> AppState {
        lock(&self.state).clone()
    }

    pub fn uploaded_files(&self) -> Vec<UploadedFile> {
        lock(&self.state).uploaded_files.clone()
    }

    pub fn add_file(&self, file: UploadedFile) {
        lock(&self.state).uploaded_files.push(file);
        self.files_changed();
    }

    pub fn set_detected_topic(&self, topic: impl Into<String>) {
        lock(&self.state).detected_topic = Some(topic.into());
    }

    /// Any change to the file list restarts the quiz-suggestion countdown.
    fn files_changed(&self) {
        let mut pending = lock(&self.suggestion_timer);
        if pending.take().is_some() {
            debug!("Upload list changed, restarting quiz suggestion timer");
        }
        if lock(&self.state).uploaded_files.is_empty() {
            return;
        }

        let state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);
        *pending = Some(Timer::after(self.delays.quiz_suggestion, async move {
            let topic = {
                let mut state = lock(&state);
                state.quiz_suggestion_open = true;
                state.quiz_topic()
            };
            notify(ShellEvent::QuizSuggested { topic });
        }));
    }

    pub fn dismiss_quiz_suggestion(&self) {
        lock(&self.state).quiz_suggestion_open = false;
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show_toast(Toast::success(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show_toast(Toast::error(message));
    }

    /// Shows `toast` in place of any current one and hides it again after
    /// the toast duration.
    pub fn show_toast(&self, toast: Toast) {
        let mut pending = lock(&self.toast_timer);
        *pending = None;
        lock(&self.state).toast = toast.clone();
        (self.notify)(ShellEvent::ToastShown(toast));

        let state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);
        *pending = Some(Timer::after(self.delays.toast, async move {
            lock(&state).toast.visible = false;
            notify(ShellEvent::ToastHidden);
        }));
    }

    /// The manual close button.
    pub fn close_toast(&self) {
        let hidden = {
            let mut state = lock(&self.state);
            let was_visible = state.toast.visible;
            state.toast.visible = false;
            was_visible
        };
        *lock(&self.toast_timer) = None;
        if hidden {
            (self.notify)(ShellEvent::ToastHidden);
        }
    }

    pub fn toast_kind(&self) -> Option<ToastKind> {
        let state = lock(&self.state);
        state.toast.visible.then_some(state.toast.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn file(name: &str, topic: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            media_type: "application/pdf".to_string(),
            url: format!("blob:{}", name),
            topics: vec![topic.to_string()],
        }
    }

    fn shell() -> (Shell, Arc<Mutex<Vec<ShellEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let shell = Shell::new(Delays::default(), move |e| sink.lock().unwrap().push(e));
        (shell, events)
    }

    fn suggestions(events: &Mutex<Vec<ShellEvent>>) -> usize {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ShellEvent::QuizSuggested { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn suggests_a_quiz_five_seconds_after_upload() {
        let (shell, events) = shell();
        shell.add_file(file("notes.pdf", "notes"));
        shell.set_detected_topic("notes");

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(!shell.snapshot().quiz_suggestion_open);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(shell.snapshot().quiz_suggestion_open);
        assert_eq!(
            events.lock().unwrap().last(),
            Some(&ShellEvent::QuizSuggested {
                topic: Some("notes".to_string())
            })
        );

        shell.dismiss_quiz_suggestion();
        assert!(!shell.snapshot().quiz_suggestion_open);
    }

    #[tokio::test(start_paused = true)]
    async fn another_upload_restarts_the_suggestion_timer() {
        let (shell, events) = shell();
        shell.add_file(file("a.pdf", "a"));
        tokio::time::sleep(Duration::from_secs(4)).await;
        shell.add_file(file("b.pdf", "b"));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(suggestions(&events), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(suggestions(&events), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_shell_clears_the_suggestion() {
        let (shell, events) = shell();
        shell.add_file(file("a.pdf", "a"));
        drop(shell);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(suggestions(&events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn toast_hides_itself_after_three_seconds() {
        let (shell, events) = shell();
        shell.success("File uploaded successfully!");
        assert_eq!(shell.toast_kind(), Some(ToastKind::Success));

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(shell.snapshot().toast.visible);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!shell.snapshot().toast.visible);
        assert_eq!(
            *events.lock().unwrap(),
            [
                ShellEvent::ToastShown(Toast::success("File uploaded successfully!")),
                ShellEvent::ToastHidden,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn newer_toast_gets_the_full_duration() {
        let (shell, _) = shell();
        shell.success("first");
        tokio::time::sleep(Duration::from_secs(2)).await;
        shell.error("second");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(shell.toast_kind(), Some(ToastKind::Error));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(shell.toast_kind(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_a_toast_hides_it_once() {
        let (shell, events) = shell();
        shell.error("Something went wrong");
        shell.close_toast();
        shell.close_toast();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let hidden = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == ShellEvent::ToastHidden)
            .count();
        assert_eq!(hidden, 1);
    }

    #[test]
    fn quiz_topic_prefers_detected_topic() {
        let mut state = AppState::default();
        assert_eq!(state.quiz_topic(), None);

        state.uploaded_files.push(file("a.pdf", "first"));
        assert_eq!(state.quiz_topic().as_deref(), Some("first"));

        state.detected_topic = Some("latest".to_string());
        assert_eq!(state.quiz_topic().as_deref(), Some("latest"));
    }
}
