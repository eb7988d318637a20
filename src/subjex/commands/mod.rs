use crate::config::ExchangeConfig;
use crate::model::Subject;
use std::path::PathBuf;

pub mod config;
pub mod export;
pub mod import;
pub mod list;
pub mod reconcile;
pub mod show;

pub use reconcile::{Outcome, Resolution};

#[derive(Debug, Clone)]
pub struct ExchangePaths {
    pub data_dir: PathBuf,
}

impl ExchangePaths {
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("subjects")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub affected_subjects: Vec<Subject>,
    pub listed_subjects: Vec<Subject>,
    pub written_paths: Vec<PathBuf>,
    pub outcome: Option<Outcome>,
    pub config: Option<ExchangeConfig>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected_subjects(mut self, subjects: Vec<Subject>) -> Self {
        self.affected_subjects = subjects;
        self
    }

    pub fn with_listed_subjects(mut self, subjects: Vec<Subject>) -> Self {
        self.listed_subjects = subjects;
        self
    }

    pub fn with_written_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.written_paths = paths;
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = Some(config);
        self
    }
}
