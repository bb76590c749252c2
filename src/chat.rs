use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::debug;

use crate::timer::simulate;

/// Turns kept per chat; older ones are dropped first.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

/// What the student seems to be asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Summary,
    Explain,
    Quiz,
    Other,
}

impl Intent {
    fn of(question: &str) -> Self {
        let question = question.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| question.contains(w));
        if mentions(&["summary", "summarize", "summarise", "overview", "tl;dr"]) {
            Intent::Summary
        } else if mentions(&["quiz", "test me", "practice", "question"]) {
            Intent::Quiz
        } else if mentions(&["explain", "what is", "what are", "why", "how"]) {
            Intent::Explain
        } else {
            Intent::Other
        }
    }
}

/// Stand-in for an AI tutor: canned replies built around the topic of the
/// uploaded document.
#[derive(Debug)]
pub struct StudyAssistant {
    delay: Duration,
    history: Mutex<Vec<ChatMessage>>,
}

impl StudyAssistant {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            history: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, role: Role, text: &str) -> usize {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push(ChatMessage {
            role,
            text: text.to_string(),
        });
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }
        history.len()
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reply_to(question: &str, topic: Option<&str>) -> String {
        let Some(topic) = topic else {
            return "Upload a PDF, DOCX or TXT document first and I'll answer questions about it."
                .to_string();
        };

        match Intent::of(question) {
            Intent::Summary => format!(
                "Here is a quick overview of {}: it introduces the core definitions, \
                 builds them into a few central ideas and closes with worked examples. \
                 Try /resources for further reading.",
                topic
            ),
            Intent::Explain => format!(
                "Good question! In {}, the key is to connect the definition to an example. \
                 Start from the main concept, then check how it behaves in a concrete case.",
                topic
            ),
            Intent::Quiz => format!(
                "Let's test what you know about {}. Use /quiz for an interactive quiz, \
                 or /question_paper for a full exam paper.",
                topic
            ),
            Intent::Other => format!(
                "I've noted that about {}. Ask me to summarise it, explain a part of it, \
                 or quiz you on it.",
                topic
            ),
        }
    }

    /// Records the question, waits like a real model would and records the
    /// reply.
    pub async fn ask(&self, question: &str, topic: Option<&str>) -> String {
        self.record(Role::User, question);
        simulate(self.delay).await;

        let reply = Self::reply_to(question, topic);
        let turns = self.record(Role::Assistant, &reply);
        debug!("Assistant replied, {} turns so far", turns);
        reply
    }
}
