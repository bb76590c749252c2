use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use log::info;

use crate::quiz::Difficulty;
use crate::timer::simulate;
use crate::upload::UploadedFile;

pub const MCQ_MARKS: u32 = 1;
pub const SHORT_MARKS: u32 = 3;
pub const LONG_MARKS: u32 = 10;

pub const MAX_MCQ: u32 = 50;
pub const MAX_SHORT: u32 = 20;
pub const MAX_LONG: u32 = 10;
pub const TIME_STEP_MINUTES: u32 = 30;
pub const MIN_TIME_MINUTES: u32 = 30;
pub const MAX_TIME_MINUTES: u32 = 300;

const GENERIC_TOPIC: &str = "the uploaded content";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperConfig {
    pub difficulty: Difficulty,
    pub mcq_count: u32,
    pub short_count: u32,
    pub long_count: u32,
    pub time_limit_minutes: u32,
    pub selected_topics: Vec<String>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            mcq_count: 10,
            short_count: 5,
            long_count: 3,
            time_limit_minutes: 180,
            selected_topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountField {
    Mcq,
    Short,
    Long,
}

impl PaperConfig {
    /// Moves a question count by `delta`, staying within its allowed range.
    pub fn adjust_count(&mut self, field: CountField, delta: i32) {
        let (count, max) = match field {
            CountField::Mcq => (&mut self.mcq_count, MAX_MCQ),
            CountField::Short => (&mut self.short_count, MAX_SHORT),
            CountField::Long => (&mut self.long_count, MAX_LONG),
        };
        *count = count.saturating_add_signed(delta).min(max);
    }

    pub fn adjust_time(&mut self, steps: i32) {
        let minutes = self
            .time_limit_minutes
            .saturating_add_signed(steps * TIME_STEP_MINUTES as i32);
        self.time_limit_minutes = minutes.clamp(MIN_TIME_MINUTES, MAX_TIME_MINUTES);
    }

    /// Selects `topic`, or deselects it if already selected.
    pub fn toggle_topic(&mut self, topic: &str) {
        if let Some(pos) = self.selected_topics.iter().position(|t| t == topic) {
            self.selected_topics.remove(pos);
        } else {
            self.selected_topics.push(topic.to_string());
        }
    }

    pub fn expected_total_marks(&self) -> u32 {
        self.mcq_count * MCQ_MARKS + self.short_count * SHORT_MARKS + self.long_count * LONG_MARKS
    }

    fn topic_phrase(&self) -> &str {
        self.selected_topics
            .first()
            .map(String::as_str)
            .unwrap_or(GENERIC_TOPIC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperQuestionKind {
    MultipleChoice { options: Vec<String> },
    ShortAnswer,
    LongAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperQuestion {
    pub number: u32,
    pub text: String,
    pub marks: u32,
    pub kind: PaperQuestionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub part: &'static str,
    pub title: &'static str,
    pub instructions: String,
    pub questions: Vec<PaperQuestion>,
    pub total_marks: u32,
}

impl Section {
    fn new(
        part: &'static str,
        title: &'static str,
        instructions: String,
        questions: Vec<PaperQuestion>,
    ) -> Self {
        let total_marks = questions.iter().map(|q| q.marks).sum();
        Self {
            part,
            title,
            instructions,
            questions,
            total_marks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPaper {
    pub title: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub time_limit_minutes: u32,
    pub total_marks: u32,
    pub generated_at: DateTime<Local>,
    pub sections: Vec<Section>,
}

impl QuestionPaper {
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    pub fn export_file_name(&self) -> String {
        format!(
            "question-paper-{}-{}.pdf",
            self.difficulty.key(),
            self.generated_at.format("%Y%m%d-%H%M")
        )
    }

    /// There is no PDF writer; the download is only recorded.
    pub fn download_pdf(&self) -> String {
        let file_name = self.export_file_name();
        info!(
            "Simulated PDF download of '{}' ({} questions, {} marks) as {}",
            self.title,
            self.question_count(),
            self.total_marks,
            file_name
        );
        file_name
    }
}

fn mcq_templates(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => &[
            "Which of the following is a basic concept of {topic}?",
            "What is the correct definition of a key term in {topic}?",
            "Which statement about {topic} is true?",
        ],
        Difficulty::Medium => &[
            "Which principle best explains the main idea of {topic}?",
            "How is {topic} typically applied in practice?",
            "Which example correctly illustrates {topic}?",
            "What is the relationship between the core ideas of {topic}?",
        ],
        Difficulty::Hard => &[
            "Which assumption underlying {topic} is most open to challenge?",
            "In which scenario would the standard model of {topic} fail?",
            "Which conclusion about {topic} follows only from the strongest evidence?",
            "How would an expert resolve a conflict between two results in {topic}?",
        ],
    }
}

fn short_templates(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => &[
            "Define the main term introduced in {topic}.",
            "List three key points from {topic}.",
        ],
        Difficulty::Medium => &[
            "Explain the significance of {topic} with one example.",
            "Compare two central ideas from {topic}.",
            "Describe how {topic} is used in a real-world setting.",
        ],
        Difficulty::Hard => &[
            "Critically assess one limitation of {topic}.",
            "Justify the most important assumption made in {topic}.",
            "Analyse how {topic} connects to a neighbouring field.",
        ],
    }
}

fn long_templates(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => &[
            "Write a detailed summary of {topic}, covering its main ideas.",
            "Describe {topic} in your own words with suitable examples.",
        ],
        Difficulty::Medium => &[
            "Discuss {topic} in detail, with examples and applications.",
            "Explain the development of the ideas in {topic} and their impact.",
        ],
        Difficulty::Hard => &[
            "Critically evaluate {topic}, weighing its strengths against its weaknesses.",
            "Propose and defend an original application of {topic}, addressing likely objections.",
        ],
    }
}

fn fill(template: &str, topic: &str) -> String {
    template.replace("{topic}", topic)
}

/// Builds a complete paper from `config`. Marks are fixed per question kind
/// and every total is derived from them.
pub fn generate(config: &PaperConfig) -> QuestionPaper {
    let topic = config.topic_phrase();
    let difficulty = config.difficulty;
    let mut number = 0;
    let mut next_number = || {
        number += 1;
        number
    };

    let mcqs = mcq_templates(difficulty);
    let mcq_questions = (0..config.mcq_count as usize)
        .map(|i| PaperQuestion {
            number: next_number(),
            text: fill(mcqs[i % mcqs.len()], topic),
            marks: MCQ_MARKS,
            kind: PaperQuestionKind::MultipleChoice {
                options: ["A", "B", "C", "D"]
                    .iter()
                    .map(|letter| format!("Option {} related to {}", letter, topic))
                    .collect(),
            },
        })
        .collect();

    let shorts = short_templates(difficulty);
    let short_questions = (0..config.short_count as usize)
        .map(|i| PaperQuestion {
            number: next_number(),
            text: fill(shorts[i % shorts.len()], topic),
            marks: SHORT_MARKS,
            kind: PaperQuestionKind::ShortAnswer,
        })
        .collect();

    let longs = long_templates(difficulty);
    let long_questions = (0..config.long_count as usize)
        .map(|i| PaperQuestion {
            number: next_number(),
            text: fill(longs[i % longs.len()], topic),
            marks: LONG_MARKS,
            kind: PaperQuestionKind::LongAnswer,
        })
        .collect();

    let sections = vec![
        Section::new(
            "A",
            "Multiple Choice Questions",
            format!(
                "Choose the correct option. Each question carries {} mark.",
                MCQ_MARKS
            ),
            mcq_questions,
        ),
        Section::new(
            "B",
            "Short Answer Questions",
            format!(
                "Answer briefly in 50-100 words. Each question carries {} marks.",
                SHORT_MARKS
            ),
            short_questions,
        ),
        Section::new(
            "C",
            "Long Answer Questions",
            format!(
                "Answer in detail in 250-300 words. Each question carries {} marks.",
                LONG_MARKS
            ),
            long_questions,
        ),
    ];

    let subject = config
        .selected_topics
        .first()
        .cloned()
        .unwrap_or_else(|| "General Studies".to_string());

    QuestionPaper {
        title: format!("{} Level Examination: {}", difficulty.label(), subject),
        subject,
        difficulty,
        time_limit_minutes: config.time_limit_minutes,
        total_marks: sections.iter().map(|s| s.total_marks).sum(),
        generated_at: Local::now(),
        sections,
    }
}

/// Every topic a paper can be about, in first-seen order. A file without
/// topics contributes its base name.
pub fn available_topics(files: &[UploadedFile]) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for file in files {
        let file_topics = if file.topics.is_empty() {
            vec![file.base_name()]
        } else {
            file.topics.clone()
        };
        for topic in file_topics {
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
    }
    topics
}

/// The question-paper page: its settings and the latest paper.
#[derive(Debug)]
pub struct PaperGenerator {
    delay: Duration,
    config: Mutex<PaperConfig>,
    paper: Mutex<Option<QuestionPaper>>,
}

impl PaperGenerator {
    /// A generator whose settings start at `difficulty`.
    pub fn new(delay: Duration, difficulty: Difficulty) -> Self {
        Self {
            delay,
            config: Mutex::new(PaperConfig {
                difficulty,
                ..Default::default()
            }),
            paper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> PaperConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_config(&self, change: impl FnOnce(&mut PaperConfig)) -> PaperConfig {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut config);
        config.clone()
    }

    pub fn paper(&self) -> Option<QuestionPaper> {
        self.paper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Generates a new paper from the current settings, replacing any
    /// earlier one.
    pub async fn generate(&self) -> QuestionPaper {
        let config = self.config();
        simulate(self.delay).await;
        let paper = generate(&config);
        info!(
            "Generated '{}' with {} questions worth {} marks",
            paper.title,
            paper.question_count(),
            paper.total_marks
        );
        *self.paper.lock().unwrap_or_else(PoisonError::into_inner) = Some(paper.clone());
        paper
    }
}
