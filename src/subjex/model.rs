use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire format for timestamps inside note payloads and manifests.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_FORMAT_T: &str = "%Y-%m-%dT%H:%M:%S";

/// Current time truncated to whole seconds, so it survives a trip through
/// [`TIMESTAMP_FORMAT`] unchanged.
pub fn now_stamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT_T))
        .ok()
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    AlphaAsc,
    AlphaDesc,
    DateAsc,
    DateDesc,
}

impl SortOrder {
    /// Maps the stored integer to a sort order. Unknown values fall back to
    /// `AlphaAsc` so bad sort metadata never blocks an import.
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => SortOrder::AlphaDesc,
            2 => SortOrder::DateAsc,
            3 => SortOrder::DateDesc,
            _ => SortOrder::AlphaAsc,
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            SortOrder::AlphaAsc => 0,
            SortOrder::AlphaDesc => 1,
            SortOrder::DateAsc => 2,
            SortOrder::DateDesc => 3,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOrder::AlphaAsc => "alpha-asc",
            SortOrder::AlphaDesc => "alpha-desc",
            SortOrder::DateAsc => "date-asc",
            SortOrder::DateDesc => "date-desc",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    pub last_edited: NaiveDateTime,
    pub content: String,
    pub locked: Option<bool>,
    pub alert_at: Option<NaiveDateTime>,
    pub alert_code: Option<i64>,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            last_edited: now_stamp(),
            content: content.into(),
            locked: None,
            alert_at: None,
            alert_code: None,
        }
    }

    pub fn edited_at(mut self, last_edited: NaiveDateTime) -> Self {
        self.last_edited = last_edited.trunc_subsecs(0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub title: String,
    pub sort_order: SortOrder,
    pub notes: Vec<Note>,
}

impl Subject {
    pub fn new(title: impl Into<String>, sort_order: SortOrder) -> Self {
        Self {
            title: title.into(),
            sort_order,
            notes: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: Vec<Note>) -> Self {
        self.notes = notes;
        self
    }

    /// Notes ordered for display. Stored order is never changed.
    pub fn sorted_notes(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.iter().collect();
        match self.sort_order {
            SortOrder::AlphaAsc => notes.sort_by(|a, b| a.title.cmp(&b.title)),
            SortOrder::AlphaDesc => notes.sort_by(|a, b| b.title.cmp(&a.title)),
            SortOrder::DateAsc => notes.sort_by_key(|n| n.last_edited),
            SortOrder::DateDesc => notes.sort_by(|a, b| b.last_edited.cmp(&a.last_edited)),
        }
        notes
    }
}

/// Container kinds a subject can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Subject,
    Zip,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Subject => "subject",
            ExportFormat::Zip => "zip",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subject" | ".subject" => Ok(ExportFormat::Subject),
            "zip" | ".zip" => Ok(ExportFormat::Zip),
            other => Err(format!("Unknown format: {}", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
