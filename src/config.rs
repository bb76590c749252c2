use std::time::Duration;

use thiserror::Error;

use crate::quiz::Difficulty;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}

/// Lengths of every simulated wait in the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    pub upload: Duration,
    pub quiz_load: Duration,
    pub paper_generation: Duration,
    pub chat_reply: Duration,
    pub toast: Duration,
    pub quiz_suggestion: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            upload: Duration::from_millis(2000),
            quiz_load: Duration::from_millis(1500),
            paper_generation: Duration::from_millis(3000),
            chat_reply: Duration::from_millis(1000),
            toast: Duration::from_millis(3000),
            quiz_suggestion: Duration::from_millis(5000),
        }
    }
}

impl Delays {
    pub fn instant() -> Self {
        Self {
            upload: Duration::ZERO,
            quiz_load: Duration::ZERO,
            paper_generation: Duration::ZERO,
            chat_reply: Duration::ZERO,
            toast: Duration::ZERO,
            quiz_suggestion: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub delays: Delays,
    /// Seconds allowed per quiz; `None` disables the countdown.
    pub quiz_time_limit: Option<u32>,
    pub default_difficulty: Difficulty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delays: Delays::default(),
            quiz_time_limit: None,
            default_difficulty: Difficulty::Medium,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment (after `.env`
    /// has been loaded by the caller).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Delays::default();
        let millis = |key: &'static str, fallback: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_number(key, lookup(key))?
                .map(Duration::from_millis)
                .unwrap_or(fallback))
        };

        let delays = Delays {
            upload: millis("STUDY_UPLOAD_DELAY_MS", defaults.upload)?,
            quiz_load: millis("STUDY_QUIZ_LOAD_DELAY_MS", defaults.quiz_load)?,
            paper_generation: millis("STUDY_PAPER_DELAY_MS", defaults.paper_generation)?,
            chat_reply: millis("STUDY_CHAT_DELAY_MS", defaults.chat_reply)?,
            toast: millis("STUDY_TOAST_MS", defaults.toast)?,
            quiz_suggestion: millis("STUDY_QUIZ_SUGGESTION_MS", defaults.quiz_suggestion)?,
        };

        let quiz_time_limit = parse_number(
            "STUDY_QUIZ_TIME_LIMIT_SECS",
            lookup("STUDY_QUIZ_TIME_LIMIT_SECS"),
        )?
        .filter(|secs| *secs > 0)
        .map(|secs| secs.min(u64::from(u32::MAX)) as u32);

        let default_difficulty = lookup("STUDY_DEFAULT_DIFFICULTY")
            .map(|key| Difficulty::from_key(&key))
            .unwrap_or_default();

        Ok(Self {
            delays,
            quiz_time_limit,
            default_difficulty,
        })
    }
}

fn parse_number(key: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    match value {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}
