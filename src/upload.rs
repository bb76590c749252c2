use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use crate::timer::simulate;

pub const ACCEPTED_MEDIA_TYPES: [&str; 3] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Only ever shown to the user, never checked.
pub const ADVERTISED_MAX_SIZE_MB: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("Please upload a PDF, DOCX, or TXT file")]
    UnsupportedType { media_type: Option<String> },
    #[error("The file has no name, please pick another one")]
    MissingName,
}

/// What the user picked: the declared name, the declared media type and an
/// opaque handle to the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub name: Option<String>,
    pub media_type: Option<String>,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub media_type: String,
    pub url: String,
    pub topics: Vec<String>,
}

impl UploadedFile {
    pub fn primary_topic(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    /// The file name without its extension.
    pub fn base_name(&self) -> String {
        topic_from_file_name(&self.name)
    }

    pub fn kind_label(&self) -> &'static str {
        match essence(&self.media_type).as_str() {
            "application/pdf" => "PDF",
            "text/plain" => "TXT",
            _ => "DOCX",
        }
    }
}

pub fn topic_from_file_name(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| name.to_string())
}

fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn validate(selection: &FileSelection) -> Result<(), IntakeError> {
    let accepted = selection
        .media_type
        .as_deref()
        .map(essence)
        .is_some_and(|media_type| ACCEPTED_MEDIA_TYPES.contains(&media_type.as_str()));
    if !accepted {
        return Err(IntakeError::UnsupportedType {
            media_type: selection.media_type.clone(),
        });
    }
    match selection.name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok(()),
        _ => Err(IntakeError::MissingName),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IntakeState {
    #[default]
    Idle,
    Loading,
    Done,
    Failed(IntakeError),
}

/// Takes in one file at a time and pretends to analyse it.
#[derive(Debug)]
pub struct Intake {
    delay: Duration,
    state: Mutex<IntakeState>,
}

impl Intake {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Mutex::new(IntakeState::Idle),
        }
    }

    pub fn state(&self) -> IntakeState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, state: IntakeState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Validates `selection`, waits out the processing delay and hands the
    /// result to `on_upload` and the derived topic to `on_topic`.
    ///
    /// A rejected file leaves the callbacks untouched.
    pub async fn submit(
        &self,
        selection: FileSelection,
        on_upload: impl FnOnce(UploadedFile),
        on_topic: impl FnOnce(String),
    ) -> Result<UploadedFile, IntakeError> {
        if let Err(err) = validate(&selection) {
            warn!("Rejected upload {:?}: {}", selection.name, err);
            self.set_state(IntakeState::Failed(err.clone()));
            return Err(err);
        }

        self.set_state(IntakeState::Loading);
        simulate(self.delay).await;

        let name = selection.name.unwrap_or_default();
        let topic = topic_from_file_name(&name);
        let file = UploadedFile {
            media_type: selection.media_type.unwrap_or_default(),
            url: format!("blob:{}", selection.reference),
            topics: vec![topic.clone()],
            name,
        };
        info!("Accepted upload '{}' with topic '{}'", file.name, topic);

        self.set_state(IntakeState::Done);
        on_upload(file.clone());
        on_topic(topic);
        Ok(file)
    }
}
