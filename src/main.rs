mod chat;
mod config;
mod paper;
mod quiz;
mod resources;
mod routes;
mod session;
mod shell;
mod timer;
mod toast;
mod upload;
mod views;

use std::sync::Arc;

use dotenv::dotenv;
use log::{debug, error, info, warn};
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{ChatAction, MessageId, ParseMode},
    utils::command::BotCommands,
    RequestError,
};
use tokio::sync::mpsc::UnboundedReceiver;

use config::Config;
use quiz::{run::QuizRun, Advance, Difficulty};
use routes::{PageView, Route};
use session::{ChatSession, Sessions, UiEvent};
use shell::ShellEvent;
use upload::FileSelection;
use views::{Action, View};

type RouteDialogue = Dialogue<Route, InMemStorage<Route>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "These commands are supported:")]
enum Command {
    #[command(description = "open the upload page.")]
    Start,
    #[command(description = "back to the upload page.")]
    Home,
    #[command(description = "take a quiz on your document.")]
    Quiz,
    #[command(description = "build an exam paper from your documents.")]
    QuestionPaper,
    #[command(description = "same as /question_paper.")]
    Paper,
    #[command(description = "browse learning resources.")]
    Resources,
    #[command(description = "show this text.")]
    Help,
}

impl Command {
    fn route(&self) -> Option<Route> {
        match self {
            Command::Start | Command::Home => Some(Route::Home),
            Command::Quiz => Some(Route::Quiz),
            Command::QuestionPaper | Command::Paper => Some(Route::QuestionPaper),
            Command::Resources => Some(Route::Resources),
            Command::Help => None,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            return;
        }
    };
    info!("Starting study buddy bot...");

    let bot = Bot::from_env();
    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register bot commands: {}", err);
    }

    let sessions = Arc::new(Sessions::new(config));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<Route>, Route>()
                .branch(dptree::entry().filter_command::<Command>().endpoint(command))
                .branch(dptree::filter(|msg: Message| msg.document().is_some()).endpoint(document))
                .branch(
                    dptree::filter(|msg: Message| {
                        msg.text().is_some_and(|text| text.starts_with('/'))
                    })
                    .endpoint(unknown_command),
                )
                .branch(dptree::case![Route::Quiz].endpoint(quiz_answer))
                .branch(dptree::case![Route::Resources].endpoint(search_resources))
                .branch(dptree::endpoint(ask_assistant)),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<Route>, Route>()
                .endpoint(callback),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<Route>::new(), sessions])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// The chat's session, spawning its event delivery on first contact.
fn session(bot: &Bot, sessions: &Sessions, chat_id: ChatId) -> Arc<ChatSession> {
    sessions.get_or_create(chat_id, |events| {
        tokio::spawn(deliver_events(bot.clone(), chat_id, events));
    })
}

async fn send_view(bot: &Bot, chat_id: ChatId, view: View) -> Result<Message, RequestError> {
    bot.send_message(chat_id, view.text)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true)
        .reply_markup(view.keyboard)
        .await
}

/// Redraws the message a button lives on.
async fn edit_view(bot: &Bot, q: &CallbackQuery, view: View) -> HandlerResult {
    let Some(message) = &q.message else {
        return Ok(());
    };
    let edited = bot
        .edit_message_text(message.chat.id, message.id, view.text)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true)
        .reply_markup(view.keyboard)
        .await;
    // Telegram refuses edits that change nothing, e.g. a counter at its limit.
    if let Err(err) = edited {
        debug!("Message not edited: {}", err);
    }
    Ok(())
}

/// Sends what happens in the background (toasts, suggestions and timed-out
/// quizzes) to the chat.
async fn deliver_events(bot: Bot, chat_id: ChatId, mut events: UnboundedReceiver<UiEvent>) {
    let mut toast: Option<MessageId> = None;

    while let Some(event) = events.recv().await {
        let delivered = match event {
            UiEvent::Shell(ShellEvent::ToastShown(shown)) => {
                if let Some(previous) = toast.take() {
                    if let Err(err) = bot.delete_message(chat_id, previous).await {
                        warn!("Could not remove old toast in chat {}: {}", chat_id.0, err);
                    }
                }
                send_view(&bot, chat_id, views::toast(&shown))
                    .await
                    .map(|message| toast = Some(message.id))
            }
            UiEvent::Shell(ShellEvent::ToastHidden) => match toast.take() {
                Some(id) => bot.delete_message(chat_id, id).await.map(|_| ()),
                None => Ok(()),
            },
            UiEvent::Shell(ShellEvent::QuizSuggested { topic }) => {
                send_view(&bot, chat_id, views::quiz_suggestion(topic.as_deref()))
                    .await
                    .map(|_| ())
            }
            UiEvent::QuizFinished(summary) => {
                send_view(&bot, chat_id, views::quiz_summary(&summary))
                    .await
                    .map(|_| ())
            }
        };

        if let Err(err) = delivered {
            warn!("Could not update chat {}: {}", chat_id.0, err);
        }
    }
    debug!("Event delivery for chat {} stopped", chat_id.0);
}

/// Switches the chat to `route` and shows the page. Leaving the quiz page
/// discards the running quiz.
async fn show_page(
    bot: &Bot,
    dialogue: &RouteDialogue,
    session: &ChatSession,
    route: Route,
    path: &str,
) -> HandlerResult {
    if route != Route::Quiz {
        session.end_quiz();
    }
    dialogue.update(route).await?;
    debug!("Chat {} is now on {}", dialogue.chat_id().0, route.path());

    let state = session.shell.snapshot();
    let view = match routes::resolve(route, &state) {
        PageView::Upload { files } => views::home(&files, &session.intake.state()),
        PageView::Quiz { topic } => views::quiz_menu(&topic, session.config.default_difficulty),
        PageView::QuestionPaper { topics } => views::paper_settings(&session.paper.config(), &topics),
        PageView::Resources { .. } => {
            let browser = session.resources();
            views::resources(&browser)
        }
        PageView::Empty(empty) => views::empty_state(&empty),
        PageView::NotFound => views::not_found(path),
    };
    send_view(bot, dialogue.chat_id(), view).await?;
    Ok(())
}

async fn command(
    bot: Bot,
    dialogue: RouteDialogue,
    msg: Message,
    cmd: Command,
    sessions: Arc<Sessions>,
) -> HandlerResult {
    let session = session(&bot, &sessions, msg.chat.id);
    match cmd.route() {
        Some(route) => show_page(&bot, &dialogue, &session, route, route.path()).await,
        None => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
            Ok(())
        }
    }
}

async fn unknown_command(
    bot: Bot,
    dialogue: RouteDialogue,
    msg: Message,
    sessions: Arc<Sessions>,
) -> HandlerResult {
    let session = session(&bot, &sessions, msg.chat.id);
    let path = msg.text().unwrap_or_default();
    show_page(&bot, &dialogue, &session, Route::from_path(path), path).await
}

async fn document(
    bot: Bot,
    dialogue: RouteDialogue,
    msg: Message,
    sessions: Arc<Sessions>,
) -> HandlerResult {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let session = session(&bot, &sessions, msg.chat.id);
    let selection = FileSelection {
        name: doc.file_name.clone(),
        media_type: doc.mime_type.as_ref().map(|m| m.essence_str().to_string()),
        reference: doc.file.id.clone(),
    };

    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::UploadDocument)
        .await;

    let shell = &session.shell;
    let uploaded = session
        .intake
        .submit(
            selection,
            |file| shell.add_file(file),
            |topic| shell.set_detected_topic(topic),
        )
        .await;

    match uploaded {
        Ok(_) => {
            shell.success("File uploaded successfully!");
            show_page(&bot, &dialogue, &session, Route::Home, Route::Home.path()).await
        }
        Err(err) => {
            bot.send_message(msg.chat.id, views::upload_error(&err))
                .parse_mode(ParseMode::Html)
                .await?;
            Ok(())
        }
    }
}

/// Typed answers, used for free-response questions.
async fn quiz_answer(bot: Bot, msg: Message, sessions: Arc<Sessions>) -> HandlerResult {
    let session = session(&bot, &sessions, msg.chat.id);
    let Some(answer) = msg.text() else {
        bot.send_message(msg.chat.id, "Please answer with text.").await?;
        return Ok(());
    };
    let Some(run) = session.quiz() else {
        bot.send_message(msg.chat.id, "Pick a difficulty to start the quiz.")
            .await?;
        return Ok(());
    };
    if !run.snapshot().awaits_typed_answer() {
        bot.send_message(msg.chat.id, "Use the buttons to answer this question.")
            .await?;
        return Ok(());
    }

    if let Some(outcome) = run.submit_answer(answer) {
        let is_last = run.snapshot().is_last_question();
        send_view(&bot, msg.chat.id, views::answer_feedback(&outcome, is_last)).await?;
    }
    Ok(())
}

async fn search_resources(bot: Bot, msg: Message, sessions: Arc<Sessions>) -> HandlerResult {
    let session = session(&bot, &sessions, msg.chat.id);
    let Some(query) = msg.text() else {
        return Ok(());
    };
    let view = {
        let mut browser = session.resources();
        browser.set_query(query);
        views::resources(&browser)
    };
    send_view(&bot, msg.chat.id, view).await?;
    Ok(())
}

async fn ask_assistant(bot: Bot, msg: Message, sessions: Arc<Sessions>) -> HandlerResult {
    let session = session(&bot, &sessions, msg.chat.id);
    let Some(question) = msg.text() else {
        bot.send_message(
            msg.chat.id,
            "Send me a document to study, or ask a question about one.",
        )
        .await?;
        return Ok(());
    };

    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
    let topic = session.shell.snapshot().quiz_topic();
    let reply = session.assistant.ask(question, topic.as_deref()).await;
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn send_question(bot: &Bot, chat_id: ChatId, run: &QuizRun) -> HandlerResult {
    if let Some(view) = views::question(&run.snapshot()) {
        send_view(bot, chat_id, view).await?;
    }
    Ok(())
}

async fn start_quiz(
    bot: &Bot,
    dialogue: &RouteDialogue,
    session: &ChatSession,
    difficulty: Difficulty,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let Some(topic) = session.shell.snapshot().quiz_topic() else {
        return show_page(bot, dialogue, session, Route::Quiz, Route::Quiz.path()).await;
    };
    dialogue.update(Route::Quiz).await?;

    let run = session.start_quiz(&topic, difficulty.key());
    bot.send_message(
        chat_id,
        format!(
            "⏳ Preparing a {} quiz on <i>{}</i>…",
            difficulty.label().to_lowercase(),
            teloxide::utils::html::escape(&topic)
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    run.load(session.config.delays.quiz_load).await;
    send_question(bot, chat_id, &run).await
}

async fn callback(
    bot: Bot,
    dialogue: RouteDialogue,
    q: CallbackQuery,
    sessions: Arc<Sessions>,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(action) = q.data.as_deref().and_then(|data| data.parse::<Action>().ok()) else {
        warn!("Ignoring unknown callback data {:?}", q.data);
        return Ok(());
    };
    let chat_id = dialogue.chat_id();
    let session = session(&bot, &sessions, chat_id);
    debug!("Chat {} pressed {:?}", chat_id.0, action);

    match action {
        Action::Navigate(route) => {
            show_page(&bot, &dialogue, &session, route, route.path()).await?;
        }
        Action::CloseToast => session.shell.close_toast(),
        Action::AcceptSuggestion => {
            session.shell.dismiss_quiz_suggestion();
            show_page(&bot, &dialogue, &session, Route::Quiz, Route::Quiz.path()).await?;
        }
        Action::DismissSuggestion => {
            session.shell.dismiss_quiz_suggestion();
            if let Some(message) = &q.message {
                bot.delete_message(chat_id, message.id).await?;
            }
        }
        Action::StartQuiz(difficulty) => {
            start_quiz(&bot, &dialogue, &session, difficulty).await?;
        }
        Action::Answer {
            attempt,
            question,
            option,
        } => {
            let Some(run) = session.quiz() else {
                bot.send_message(chat_id, "This quiz has ended.").await?;
                return Ok(());
            };
            let Some(outcome) = run.choose_option(attempt, question, option) else {
                bot.send_message(chat_id, "That question has already passed.")
                    .await?;
                return Ok(());
            };
            if let Some(message) = &q.message {
                if let Err(err) = bot.edit_message_reply_markup(chat_id, message.id).await {
                    debug!("Answer buttons not removed: {}", err);
                }
            }
            let is_last = run.snapshot().is_last_question();
            send_view(&bot, chat_id, views::answer_feedback(&outcome, is_last)).await?;
        }
        Action::NextQuestion => {
            let Some(run) = session.quiz() else {
                return Ok(());
            };
            match run.advance() {
                Advance::Next => send_question(&bot, chat_id, &run).await?,
                // The summary arrives through the event stream.
                Advance::Completed(summary) => {
                    info!("Chat {} finished a quiz with {}%", chat_id.0, summary.percentage)
                }
                Advance::Ignored => {
                    bot.send_message(chat_id, "Answer the question first.").await?;
                }
            }
        }
        Action::Retake => match session.quiz() {
            Some(run) => {
                run.reset();
                send_question(&bot, chat_id, &run).await?;
            }
            None => show_page(&bot, &dialogue, &session, Route::Quiz, Route::Quiz.path()).await?,
        },
        Action::CycleDifficulty => {
            session.paper.update_config(|c| c.difficulty = c.difficulty.next());
            edit_view(&bot, &q, paper_settings(&session)).await?;
        }
        Action::AdjustCount(field, delta) => {
            session.paper.update_config(|c| c.adjust_count(field, delta));
            edit_view(&bot, &q, paper_settings(&session)).await?;
        }
        Action::AdjustTime(steps) => {
            session.paper.update_config(|c| c.adjust_time(steps));
            edit_view(&bot, &q, paper_settings(&session)).await?;
        }
        Action::ToggleTopic(index) => {
            let topics = paper::available_topics(&session.shell.uploaded_files());
            if let Some(topic) = topics.get(index) {
                session.paper.update_config(|c| c.toggle_topic(topic));
            }
            edit_view(&bot, &q, paper_settings(&session)).await?;
        }
        Action::Generate => {
            if session.shell.uploaded_files().is_empty() {
                return show_page(
                    &bot,
                    &dialogue,
                    &session,
                    Route::QuestionPaper,
                    Route::QuestionPaper.path(),
                )
                .await;
            }
            bot.send_message(chat_id, "⏳ Generating your question paper…")
                .await?;
            let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

            let paper = session.paper.generate().await;
            let mut parts = views::paper(&paper).into_iter().peekable();
            while let Some(part) = parts.next() {
                let request = bot.send_message(chat_id, part).parse_mode(ParseMode::Html);
                if parts.peek().is_none() {
                    request.reply_markup(views::paper_actions()).await?;
                } else {
                    request.await?;
                }
            }
            session.shell.success("Question paper generated successfully!");
        }
        Action::Download => match session.paper.paper() {
            Some(paper) => {
                let file_name = paper.download_pdf();
                session.shell.success(format!("Downloading {}", file_name));
            }
            None => session.shell.error("Generate a question paper first"),
        },
        Action::FilterCategory(category) => {
            let view = {
                let mut browser = session.resources();
                browser.category = category;
                views::resources(&browser)
            };
            edit_view(&bot, &q, view).await?;
        }
        Action::ToggleFavorite(index) => {
            let view = {
                let mut browser = session.resources();
                let id = browser.catalog().get(index).map(|r| r.id.clone());
                if let Some(id) = id {
                    browser.toggle_favorite(&id);
                }
                views::resources(&browser)
            };
            edit_view(&bot, &q, view).await?;
        }
        Action::ClearSearch => {
            let view = {
                let mut browser = session.resources();
                browser.clear_query();
                views::resources(&browser)
            };
            edit_view(&bot, &q, view).await?;
        }
    }
    Ok(())
}

fn paper_settings(session: &ChatSession) -> View {
    let topics = paper::available_topics(&session.shell.uploaded_files());
    views::paper_settings(&session.paper.config(), &topics)
}
