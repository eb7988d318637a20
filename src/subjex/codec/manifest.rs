//! The `.subj` manifest that describes the notes inside an archive.
//!
//! Two syntaxes are read. Manifests written by this crate use one record per
//! line with tab-separated fields, so titles may contain spaces:
//!
//! ```text
//! Modern Physics<TAB>0
//! notes/mech.txt<TAB>Classical Mechanics<TAB>false<TAB><TAB>
//! ```
//!
//! Paths and titles in that form are taken literally, except that tab, line
//! breaks and backslash are written as `\t`, `\n`, `\r` and `\\`. An empty
//! value field means `None`.
//!
//! Older manifests are a flat run of whitespace-separated tokens:
//! `title sortOrder (file noteTitle lock alertAt alertCode)*`, with the token
//! `null` standing for `None`. A manifest containing no tab at all is read
//! that way. In both syntaxes a short record is padded with `None` rather
//! than dropped.

use crate::model::{format_timestamp, parse_timestamp, SortOrder, Subject};
use chrono::NaiveDateTime;
use log::warn;

pub const MANIFEST_EXT: &str = "subj";
const GROUP_LEN: usize = 5;
const NULL_TOKEN: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file: String,
    pub title: Option<String>,
    pub locked: Option<bool>,
    pub alert_at: Option<NaiveDateTime>,
    pub alert_code: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub title: String,
    pub sort_order: SortOrder,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn parse(text: &str) -> Self {
        if text.contains('\t') {
            parse_lines(text)
        } else {
            parse_tokens(text)
        }
    }

    /// First entry naming `path`, matching the full relative path before
    /// falling back to the bare file name.
    pub fn entry_for(&self, path: &str) -> Option<&ManifestEntry> {
        let path = normalize(path);
        if let Some(entry) = self.entries.iter().find(|e| normalize(&e.file) == path) {
            return Some(entry);
        }
        let name = file_name(&path);
        self.entries
            .iter()
            .find(|e| file_name(&normalize(&e.file)) == name)
    }

    /// Renders a manifest for `subject` given the archive path of each note.
    pub fn render(subject: &Subject, files: &[String]) -> String {
        let mut out = format!(
            "{}\t{}\n",
            escape(&subject.title),
            subject.sort_order.to_wire()
        );
        for (note, file) in subject.notes.iter().zip(files) {
            let fields = [
                escape(file),
                escape(&note.title),
                note.locked.map(|b| b.to_string()).unwrap_or_default(),
                note.alert_at.map(|ts| format_timestamp(&ts)).unwrap_or_default(),
                note.alert_code.map(|c| c.to_string()).unwrap_or_default(),
            ];
            out.push_str(&fields.join("\t"));
            out.push('\n');
        }
        out
    }
}

fn parse_lines(text: &str) -> Manifest {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = lines.next().map(|l| l.split('\t').collect()).unwrap_or_default();
    let title = header.first().map(|t| unescape(t)).unwrap_or_default();
    let sort_order = parse_sort(header.get(1).copied());

    let entries = lines
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let file = fields.first().map(|f| unescape(f)).unwrap_or_default();
            let title = fields.get(1).map(|t| unescape(t));
            entry_from(file, title, &fields)
        })
        .filter(|e| !e.file.is_empty())
        .collect();

    Manifest {
        title,
        sort_order,
        entries,
    }
}

fn parse_tokens(text: &str) -> Manifest {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let title = tokens.first().map(|t| t.to_string()).unwrap_or_default();
    let sort_order = parse_sort(tokens.get(1).copied());

    let body = tokens.get(2..).unwrap_or_default();
    if body.len() % GROUP_LEN != 0 {
        warn!(
            "Manifest has {} trailing tokens; padding the last entry",
            body.len() % GROUP_LEN
        );
    }
    let entries = body
        .chunks(GROUP_LEN)
        .map(|group| {
            let file = value(group, 0).unwrap_or_default().to_string();
            let title = value(group, 1).map(str::to_string);
            entry_from(file, title, group)
        })
        .collect();

    Manifest {
        title,
        sort_order,
        entries,
    }
}

/// A typed value field. Empty and `null` both mean `None`.
fn value<'a>(fields: &[&'a str], i: usize) -> Option<&'a str> {
    fields
        .get(i)
        .copied()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != NULL_TOKEN)
}

fn entry_from(file: String, title: Option<String>, fields: &[&str]) -> ManifestEntry {
    let get = |i: usize| value(fields, i);

    ManifestEntry {
        file,
        title,
        locked: get(2).and_then(|raw| match raw {
            "true" => Some(true),
            "false" => Some(false),
            other => {
                warn!("Manifest lock flag '{}' is not a boolean", other);
                None
            }
        }),
        alert_at: get(3).and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                warn!("Manifest alert time '{}' is not a timestamp", raw);
            }
            parsed
        }),
        alert_code: get(4).and_then(|raw| {
            let parsed = raw.parse().ok();
            if parsed.is_none() {
                warn!("Manifest alert code '{}' is not an integer", raw);
            }
            parsed
        }),
    }
}

fn parse_sort(raw: Option<&str>) -> SortOrder {
    raw.and_then(|v| v.trim().parse::<i32>().ok())
        .map(SortOrder::from_wire)
        .unwrap_or_default()
}

fn normalize(path: &str) -> String {
    path.trim().replace('\\', "/").trim_start_matches("./").to_string()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`escape`]. Unknown sequences such as `notes\a.txt` are kept as
/// written.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
