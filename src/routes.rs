use crate::paper::available_topics;
use crate::shell::AppState;
use crate::upload::UploadedFile;

/// Which page a chat is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Route {
    #[default]
    Home,
    Quiz,
    QuestionPaper,
    Resources,
    NotFound,
}

impl Route {
    /// Maps a path or bot command onto a page. `/quiz@some_bot` and
    /// `/Question_Paper` resolve like `/quiz` and `/question-paper`.
    pub fn from_path(path: &str) -> Self {
        let path = path.split_whitespace().next().unwrap_or_default();
        let path = path.split('@').next().unwrap_or_default();
        let path = path.trim_end_matches('/').to_ascii_lowercase().replace('_', "-");
        match path.as_str() {
            "" | "/start" | "/home" => Route::Home,
            "/quiz" => Route::Quiz,
            "/question-paper" | "/paper" => Route::QuestionPaper,
            "/resources" => Route::Resources,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Quiz => "/quiz",
            Route::QuestionPaper => "/question-paper",
            Route::Resources => "/resources",
            Route::NotFound => "/404",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Study Buddy",
            Route::Quiz => "Quiz",
            Route::QuestionPaper => "Question Paper Generator",
            Route::Resources => "Learning Resources",
            Route::NotFound => "Page not found",
        }
    }
}

/// Why a page has nothing to show yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyState {
    pub route: Route,
    pub headline: &'static str,
    pub call_to_action: &'static str,
}

/// A page, resolved against the shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageView {
    Upload { files: Vec<UploadedFile> },
    Quiz { topic: String },
    QuestionPaper { topics: Vec<String> },
    Resources { files: Vec<UploadedFile> },
    Empty(EmptyState),
    NotFound,
}

fn empty(route: Route, headline: &'static str) -> PageView {
    PageView::Empty(EmptyState {
        route,
        headline,
        call_to_action: "Upload a document to get started",
    })
}

pub fn resolve(route: Route, state: &AppState) -> PageView {
    let files = &state.uploaded_files;
    match route {
        Route::Home => PageView::Upload {
            files: files.clone(),
        },
        Route::Quiz => match state.quiz_topic() {
            Some(topic) => PageView::Quiz { topic },
            None => empty(route, "No content available for a quiz"),
        },
        Route::QuestionPaper if files.is_empty() => {
            empty(route, "No content available to build a question paper")
        }
        Route::QuestionPaper => PageView::QuestionPaper {
            topics: available_topics(files),
        },
        Route::Resources if files.is_empty() => empty(route, "No resources yet"),
        Route::Resources => PageView::Resources {
            files: files.clone(),
        },
        Route::NotFound => PageView::NotFound,
    }
}
