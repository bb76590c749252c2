use std::str::FromStr;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html::escape;

use crate::paper::{CountField, PaperConfig, PaperQuestionKind, QuestionPaper};
use crate::quiz::{AnswerOutcome, Difficulty, Question, Quiz, QuizSummary};
use crate::resources::{Category, ResourceBrowser};
use crate::routes::{EmptyState, Route};
use crate::toast::Toast;
use crate::upload::{IntakeError, IntakeState, UploadedFile, ADVERTISED_MAX_SIZE_MB};

/// Telegram refuses messages longer than this.
const MESSAGE_LIMIT: usize = 4000;
const RESOURCES_PER_PAGE: usize = 10;
const OMITTED: &str = "\n…";
const ANSWER_PREVIEW: usize = 200;
const QUERY_PREVIEW: usize = 100;

/// Everything a button can ask for, encoded into the callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Navigate(Route),
    CloseToast,
    AcceptSuggestion,
    DismissSuggestion,
    StartQuiz(Difficulty),
    Answer {
        attempt: u32,
        question: u32,
        option: usize,
    },
    NextQuestion,
    Retake,
    CycleDifficulty,
    AdjustCount(CountField, i32),
    AdjustTime(i32),
    ToggleTopic(usize),
    Generate,
    Download,
    FilterCategory(Category),
    ToggleFavorite(usize),
    ClearSearch,
}

fn count_key(field: CountField) -> &'static str {
    match field {
        CountField::Mcq => "mcq",
        CountField::Short => "short",
        CountField::Long => "long",
    }
}

impl Action {
    pub fn data(&self) -> String {
        match self {
            Action::Navigate(route) => format!("nav:{}", route.path()),
            Action::CloseToast => "toast:close".to_string(),
            Action::AcceptSuggestion => "suggest:accept".to_string(),
            Action::DismissSuggestion => "suggest:dismiss".to_string(),
            Action::StartQuiz(difficulty) => format!("quiz:start:{}", difficulty.key()),
            Action::Answer {
                attempt,
                question,
                option,
            } => format!("quiz:answer:{}:{}:{}", attempt, question, option),
            Action::NextQuestion => "quiz:next".to_string(),
            Action::Retake => "quiz:retake".to_string(),
            Action::CycleDifficulty => "paper:difficulty".to_string(),
            Action::AdjustCount(field, delta) => {
                format!("paper:count:{}:{}", count_key(*field), delta)
            }
            Action::AdjustTime(steps) => format!("paper:time:{}", steps),
            Action::ToggleTopic(index) => format!("paper:topic:{}", index),
            Action::Generate => "paper:generate".to_string(),
            Action::Download => "paper:download".to_string(),
            Action::FilterCategory(category) => format!("res:category:{}", category.key()),
            Action::ToggleFavorite(index) => format!("res:favorite:{}", index),
            Action::ClearSearch => "res:clear".to_string(),
        }
    }

    fn button(&self, label: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(label, self.data())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = data.split(':').collect();
        let number = |s: &str| s.parse::<i64>().map_err(|_| format!("bad number in '{}'", data));
        let action = match parts.as_slice() {
            ["nav", path] => Action::Navigate(Route::from_path(*path)),
            ["toast", "close"] => Action::CloseToast,
            ["suggest", "accept"] => Action::AcceptSuggestion,
            ["suggest", "dismiss"] => Action::DismissSuggestion,
            ["quiz", "start", key] => Action::StartQuiz(Difficulty::from_key(*key)),
            ["quiz", "answer", attempt, question, option] => Action::Answer {
                attempt: number(*attempt)? as u32,
                question: number(*question)? as u32,
                option: number(*option)? as usize,
            },
            ["quiz", "next"] => Action::NextQuestion,
            ["quiz", "retake"] => Action::Retake,
            ["paper", "difficulty"] => Action::CycleDifficulty,
            ["paper", "count", field, delta] => {
                let field = match *field {
                    "mcq" => CountField::Mcq,
                    "short" => CountField::Short,
                    "long" => CountField::Long,
                    _ => return Err(format!("unknown count in '{}'", data)),
                };
                Action::AdjustCount(field, number(*delta)? as i32)
            }
            ["paper", "time", steps] => Action::AdjustTime(number(*steps)? as i32),
            ["paper", "topic", index] => Action::ToggleTopic(number(*index)? as usize),
            ["paper", "generate"] => Action::Generate,
            ["paper", "download"] => Action::Download,
            ["res", "category", key] => Action::FilterCategory(key.parse()?),
            ["res", "favorite", index] => Action::ToggleFavorite(number(*index)? as usize),
            ["res", "clear"] => Action::ClearSearch,
            _ => return Err(format!("unknown action '{}'", data)),
        };
        Ok(action)
    }
}

pub struct View {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

fn home_row() -> Vec<InlineKeyboardButton> {
    vec![Action::Navigate(Route::Home).button("🏠 Back to home")]
}

fn page_row() -> Vec<InlineKeyboardButton> {
    vec![
        Action::Navigate(Route::Quiz).button("📝 Quiz"),
        Action::Navigate(Route::QuestionPaper).button("📄 Paper"),
        Action::Navigate(Route::Resources).button("📚 Resources"),
    ]
}

pub fn home(files: &[UploadedFile], intake: &IntakeState) -> View {
    let mut text = format!(
        "<b>{}</b>\n\nSend me a PDF, DOCX or TXT document (up to {} MB) and I'll \
         turn it into quizzes, question papers and study resources. \
         You can also just ask me questions about it.",
        Route::Home.title(),
        ADVERTISED_MAX_SIZE_MB
    );
    match intake {
        IntakeState::Loading => text.push_str("\n\n⏳ Analysing your document…"),
        IntakeState::Failed(err) => text.push_str(&format!(
            "\n\n❌ Your last upload was rejected: {}",
            escape(&err.to_string())
        )),
        IntakeState::Idle | IntakeState::Done => {}
    }
    if !files.is_empty() {
        text.push_str("\n\n<b>Your documents</b>");
        for file in files {
            text.push_str(&format!(
                "\n• {} ({}), topic: <i>{}</i>",
                escape(&file.name),
                file.kind_label(),
                escape(file.primary_topic().unwrap_or("unknown"))
            ));
        }
    }
    View {
        text,
        keyboard: InlineKeyboardMarkup::new(vec![page_row()]),
    }
}

pub fn upload_error(err: &IntakeError) -> String {
    format!("❌ {}", escape(&err.to_string()))
}

pub fn empty_state(empty: &EmptyState) -> View {
    View {
        text: format!(
            "<b>{}</b>\n\n{}.\n{}: send me a document from the home page.",
            empty.route.title(),
            empty.headline,
            empty.call_to_action
        ),
        keyboard: InlineKeyboardMarkup::new(vec![home_row()]),
    }
}

pub fn not_found(path: &str) -> View {
    View {
        text: format!(
            "<b>404</b>\n\nThere is no page at <code>{}</code>.",
            escape(path)
        ),
        keyboard: InlineKeyboardMarkup::new(vec![home_row()]),
    }
}

pub fn toast(toast: &Toast) -> View {
    View {
        text: format!("{} {}", toast.icon(), escape(&toast.message)),
        keyboard: InlineKeyboardMarkup::new(vec![vec![Action::CloseToast.button("✕")]]),
    }
}

pub fn quiz_suggestion(topic: Option<&str>) -> View {
    let about = topic
        .map(|t| format!(" on <i>{}</i>", escape(t)))
        .unwrap_or_default();
    View {
        text: format!("🎯 Ready to test your knowledge{}? Take a quick quiz!", about),
        keyboard: InlineKeyboardMarkup::new(vec![vec![
            Action::AcceptSuggestion.button("Take quiz"),
            Action::DismissSuggestion.button("Not now"),
        ]]),
    }
}

/// Difficulty buttons, led by the configured default.
pub fn quiz_menu(topic: &str, preferred: Difficulty) -> View {
    let others = Difficulty::ALL.into_iter().filter(|d| *d != preferred);
    let buttons = std::iter::once(preferred)
        .chain(others)
        .map(|d| {
            let label = if d == preferred {
                format!("⭐ {}", d.label())
            } else {
                d.label().to_string()
            };
            Action::StartQuiz(d).button(label)
        })
        .collect::<Vec<_>>();
    View {
        text: format!(
            "<b>{}</b>\n\nTopic: <i>{}</i>\nPick a difficulty to begin.",
            Route::Quiz.title(),
            escape(topic)
        ),
        keyboard: InlineKeyboardMarkup::new(vec![buttons, home_row()]),
    }
}

pub fn question(quiz: &Quiz) -> Option<View> {
    let question = quiz.current()?;
    let mut text = format!(
        "<b>Question {} of {}</b> · {}",
        quiz.current_question + 1,
        quiz.questions.len(),
        quiz.difficulty
    );
    if let Some(left) = quiz.time_left {
        text.push_str(&format!(" · ⏱ {}s", left));
    }
    text.push_str(&format!("\n\n{}", escape(question.text())));

    let mut rows = Vec::new();
    match question {
        Question::Choice { id, options, .. } => {
            for (index, option) in options.iter().enumerate() {
                let answer = Action::Answer {
                    attempt: quiz.attempt,
                    question: *id,
                    option: index,
                };
                rows.push(vec![answer.button(option.clone())]);
            }
        }
        Question::FreeResponse { points, .. } => {
            text.push_str(&format!(
                "\n\n<i>Type your answer ({} points).</i>",
                points
            ));
        }
    }
    rows.push(home_row());
    Some(View {
        text,
        keyboard: InlineKeyboardMarkup::new(rows),
    })
}

pub fn answer_feedback(outcome: &AnswerOutcome, is_last: bool) -> View {
    let mut text = if outcome.correct {
        "✅ Correct!".to_string()
    } else {
        match &outcome.correct_option {
            Some(correct) => format!("❌ Not quite. The answer is <b>{}</b>.", escape(correct)),
            None => "❌ Please write an answer next time.".to_string(),
        }
    };
    if let Some(explanation) = &outcome.explanation {
        text.push_str(&format!("\n\n💡 {}", escape(explanation)));
    }
    let label = if is_last { "See results" } else { "Next question ➡️" };
    View {
        text,
        keyboard: InlineKeyboardMarkup::new(vec![vec![Action::NextQuestion.button(label)]]),
    }
}

pub fn quiz_summary(summary: &QuizSummary) -> View {
    let headline = if summary.timed_out {
        "⏰ Time's up!"
    } else {
        "🏁 Quiz complete!"
    };
    let head = format!(
        "<b>{}</b>\n\nScore: {}/{} ({}%) over {} questions",
        headline, summary.score, summary.max_score, summary.percentage, summary.total
    );
    let lines = summary.transcript.iter().enumerate().map(|(index, record)| {
        format!(
            "\n{} Q{}: {}",
            if record.was_correct { "✅" } else { "❌" },
            index + 1,
            escape(&clip(&record.given_answer, ANSWER_PREVIEW))
        )
    });
    View {
        text: fit(head, lines, ""),
        keyboard: InlineKeyboardMarkup::new(vec![
            vec![Action::Retake.button("🔁 Retake")],
            home_row(),
        ]),
    }
}

pub fn paper_settings(config: &PaperConfig, topics: &[String]) -> View {
    let text = format!(
        "<b>{}</b>\n\nDifficulty: {}\nMultiple choice: {} × 1 mark\nShort answer: {} × 3 marks\n\
         Long answer: {} × 10 marks\nTime limit: {} minutes\nTotal: <b>{} marks</b>\n\nTopics: {}",
        Route::QuestionPaper.title(),
        config.difficulty,
        config.mcq_count,
        config.short_count,
        config.long_count,
        config.time_limit_minutes,
        config.expected_total_marks(),
        if config.selected_topics.is_empty() {
            "all uploaded content".to_string()
        } else {
            escape(&config.selected_topics.join(", "))
        }
    );

    let counter = |field: CountField, label: &str| {
        vec![
            Action::AdjustCount(field, -1).button(format!("➖ {}", label)),
            Action::AdjustCount(field, 1).button(format!("➕ {}", label)),
        ]
    };
    let mut rows = vec![
        vec![Action::CycleDifficulty.button(format!("Difficulty: {}", config.difficulty))],
        counter(CountField::Mcq, "MCQ"),
        counter(CountField::Short, "Short"),
        counter(CountField::Long, "Long"),
        vec![
            Action::AdjustTime(-1).button("➖ 30 min"),
            Action::AdjustTime(1).button("➕ 30 min"),
        ],
    ];
    for (index, topic) in topics.iter().enumerate() {
        let mark = if config.selected_topics.contains(topic) {
            "☑"
        } else {
            "☐"
        };
        rows.push(vec![Action::ToggleTopic(index).button(format!("{} {}", mark, topic))]);
    }
    rows.push(vec![Action::Generate.button("⚙️ Generate paper")]);
    rows.push(home_row());

    View {
        text,
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

/// The paper split into messages small enough to send.
pub fn paper(paper: &QuestionPaper) -> Vec<String> {
    let mut lines = vec![
        format!("<b>{}</b>", escape(&paper.title)),
        format!(
            "Subject: {} · Time: {} minutes · Total marks: {}",
            escape(&paper.subject),
            paper.time_limit_minutes,
            paper.total_marks
        ),
        format!("Generated {}", paper.generated_at.format("%Y-%m-%d %H:%M")),
    ];
    for section in paper.sections.iter().filter(|s| !s.questions.is_empty()) {
        lines.push(String::new());
        lines.push(format!(
            "<b>Part {}: {}</b> ({} marks)",
            section.part, section.title, section.total_marks
        ));
        lines.push(format!("<i>{}</i>", section.instructions));
        for question in &section.questions {
            lines.push(format!(
                "{}. {} [{}]",
                question.number,
                escape(&question.text),
                question.marks
            ));
            if let PaperQuestionKind::MultipleChoice { options } = &question.kind {
                for (letter, option) in ["a", "b", "c", "d"].iter().zip(options) {
                    lines.push(format!("   ({}) {}", letter, escape(option)));
                }
            }
        }
    }
    chunk(lines)
}

pub fn paper_actions() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            Action::Generate.button("🔁 Regenerate"),
            Action::Download.button("⬇️ Download PDF"),
        ],
        home_row(),
    ])
}

pub fn resources(browser: &ResourceBrowser) -> View {
    let visible = browser.visible();
    let mut head = format!(
        "<b>{}</b>\n\nCategory: {}",
        Route::Resources.title(),
        browser.category
    );
    if !browser.query.is_empty() {
        head.push_str(&format!(
            " · Search: <i>{}</i>",
            escape(&clip(&browser.query, QUERY_PREVIEW))
        ));
    }
    head.push_str(&format!(
        " · ★ {}\n<i>Send a message to search.</i>\n",
        browser.favorite_count()
    ));
    if visible.is_empty() {
        head.push_str("\nNo resources match your filters.");
    }

    let entries = visible
        .iter()
        .take(RESOURCES_PER_PAGE)
        .enumerate()
        .map(|(position, resource)| {
            format!(
                "\n{}. {} <a href=\"{}\">{}</a>\n   {} · ⭐ {:.1}\n   {}",
                position + 1,
                if browser.is_favorite(&resource.id) { "★" } else { "☆" },
                escape(&resource.url),
                escape(&resource.title),
                escape(&resource.kind.detail()),
                resource.rating,
                escape(&resource.description)
            )
        });
    let more = if visible.len() > RESOURCES_PER_PAGE {
        format!(
            "\n\n…and {} more. Narrow it down with a search.",
            visible.len() - RESOURCES_PER_PAGE
        )
    } else {
        String::new()
    };
    let text = fit(head, entries, &more);

    let categories = Category::ALL
        .iter()
        .map(|c| {
            let label = if *c == browser.category {
                format!("• {}", c.label())
            } else {
                c.label().to_string()
            };
            Action::FilterCategory(*c).button(label)
        })
        .collect::<Vec<_>>();
    let mut rows = vec![categories];

    let favorites = visible
        .iter()
        .take(RESOURCES_PER_PAGE)
        .enumerate()
        .filter_map(|(position, resource)| {
            let index = browser
                .catalog()
                .iter()
                .position(|r| r.id == resource.id)?;
            let mark = if browser.is_favorite(&resource.id) { "★" } else { "☆" };
            Some(Action::ToggleFavorite(index).button(format!("{} {}", mark, position + 1)))
        })
        .collect::<Vec<_>>();
    rows.extend(favorites.chunks(5).map(|row| row.to_vec()));

    if !browser.query.is_empty() {
        rows.push(vec![Action::ClearSearch.button("✕ Clear search")]);
    }
    rows.push(home_row());

    View {
        text,
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

/// Shortens plain text to `max_chars` characters. Runs before escaping so
/// no entity is ever split.
fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

/// Appends whole `lines` to `head` while they fit under the message limit,
/// then `tail`. Lines are complete markup, so the cut never opens a tag.
fn fit(head: String, lines: impl IntoIterator<Item = String>, tail: &str) -> String {
    let budget = MESSAGE_LIMIT.saturating_sub(tail.len() + OMITTED.len());
    let mut text = head;
    for line in lines {
        if text.len() + line.len() > budget {
            text.push_str(OMITTED);
            break;
        }
        text.push_str(&line);
    }
    text.push_str(tail);
    text
}

fn chunk(lines: Vec<String>) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    for line in lines {
        if !current.is_empty() && current.len() + line.len() + 1 > MESSAGE_LIMIT {
            messages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }
    if !current.trim().is_empty() {
        messages.push(current);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::generate;

    #[test]
    fn actions_survive_the_callback_round_trip() {
        let actions = [
            Action::Navigate(Route::QuestionPaper),
            Action::Navigate(Route::Home),
            Action::CloseToast,
            Action::StartQuiz(Difficulty::Hard),
            Action::Answer {
                attempt: 12,
                question: 4,
                option: 3,
            },
            Action::AdjustCount(CountField::Short, -1),
            Action::AdjustTime(1),
            Action::ToggleTopic(2),
            Action::FilterCategory(Category::Book),
            Action::ToggleFavorite(11),
            Action::ClearSearch,
        ];
        for action in actions {
            let data = action.data();
            assert!(data.len() <= 64, "callback data too long: {}", data);
            assert_eq!(data.parse::<Action>(), Ok(action));
        }
    }

    #[test]
    fn garbage_callback_data_is_rejected() {
        assert!("quiz:answer:x".parse::<Action>().is_err());
        assert!("paper:count:huge:1".parse::<Action>().is_err());
        assert!("launch:rockets".parse::<Action>().is_err());
    }

    #[test]
    fn large_papers_are_split_under_the_limit() {
        let paper = generate(&PaperConfig {
            mcq_count: 50,
            short_count: 20,
            long_count: 10,
            ..Default::default()
        });
        let messages = super::paper(&paper);
        assert!(messages.len() > 1);
        assert!(messages.iter().all(|m| m.len() <= MESSAGE_LIMIT));
        assert!(messages[0].contains("Part A"));
    }

    fn assert_well_formed(text: &str) {
        assert!(text.len() <= MESSAGE_LIMIT, "message too long: {}", text.len());
        for (open, close) in [("<a ", "</a>"), ("<i>", "</i>"), ("<b>", "</b>")] {
            assert_eq!(
                text.matches(open).count(),
                text.matches(close).count(),
                "unbalanced {} in {:?}",
                open,
                text
            );
        }
        if let Some(lt) = text.rfind('<') {
            assert!(text[lt..].contains('>'), "dangling tag");
        }
        if let Some(amp) = text.rfind('&') {
            assert!(text[amp..].contains(';'), "dangling entity");
        }
    }

    fn file_with_topic(topic: String) -> UploadedFile {
        UploadedFile {
            name: format!("{}.pdf", topic),
            media_type: "application/pdf".to_string(),
            url: "blob:1".to_string(),
            topics: vec![topic],
        }
    }

    #[test]
    fn long_resource_pages_stop_between_entries() {
        let files = (0..6)
            .map(|i| file_with_topic(format!("{} & <Condensed> Matter Systems {}", "Advanced ".repeat(15), i)))
            .collect::<Vec<_>>();
        let browser = ResourceBrowser::new(&files);

        let view = resources(&browser);
        assert_well_formed(&view.text);
        assert!(view.text.contains(OMITTED));
        assert!(view.text.ends_with("Narrow it down with a search."));
    }

    #[test]
    fn long_typed_answers_do_not_break_the_summary() {
        let question = Question::FreeResponse {
            id: 1,
            text: "Explain it".to_string(),
            sample_answer: "because".to_string(),
            points: 2,
        };
        let record = crate::quiz::AnswerRecord {
            question,
            given_answer: "<b>a & b</b> ".repeat(400),
            was_correct: false,
        };
        let summary = QuizSummary {
            score: 0,
            total: 30,
            max_score: 60,
            percentage: 0,
            transcript: vec![record; 30],
            timed_out: false,
        };

        let view = quiz_summary(&summary);
        assert_well_formed(&view.text);
        assert!(view.text.contains("Q1: &lt;b&gt;a &amp; b"));
    }

    #[test]
    fn quiz_menu_leads_with_the_preferred_difficulty() {
        let view = quiz_menu("Optics", Difficulty::Hard);
        let first = &view.keyboard.inline_keyboard[0];
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].text, "⭐ Hard");
        assert_eq!(first[1].text, "Easy");
        assert_eq!(first[2].text, "Medium");
    }

    #[test]
    fn home_reports_a_rejected_upload() {
        let failed = IntakeState::Failed(IntakeError::MissingName);
        let view = home(&[], &failed);
        assert!(view.text.contains("last upload was rejected"));
        assert!(!home(&[], &IntakeState::Done).text.contains("rejected"));
    }

    #[test]
    fn answer_buttons_name_their_question() {
        let mut quiz = Quiz::new("Optics", "easy", None).with_attempt(5);
        quiz.load();
        let view = question(&quiz).unwrap();
        let id = quiz.current().unwrap().id();
        let pressed = Action::Answer {
            attempt: 5,
            question: id,
            option: 0,
        };
        assert_eq!(
            view.keyboard.inline_keyboard[0][0].kind,
            teloxide::types::InlineKeyboardButtonKind::CallbackData(pressed.data())
        );
    }

    #[test]
    fn file_names_are_escaped() {
        let view = home(&[UploadedFile {
            name: "<script>.pdf".to_string(),
            media_type: "application/pdf".to_string(),
            url: "blob:1".to_string(),
            topics: vec!["<script>".to_string()],
        }], &IntakeState::Idle);
        assert!(!view.text.contains("<script>"));
        assert!(view.text.contains("&lt;script&gt;"));
    }
}
