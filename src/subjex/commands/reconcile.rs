//! Collision handling between a decoded candidate and the store.
//!
//! [`reconcile`] inserts the candidate when its title is free. When the title
//! is taken it hands the collision back to the caller, who settles it with
//! exactly one of [`merge`], [`rename`] or [`abort`].

use crate::error::{ExchangeError, Result};
use crate::model::{Note, Subject};
use crate::store::SubjectStore;
use log::info;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted(String),
    MergedInto { title: String, added: usize },
    RenamedTo(String),
    Aborted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Inserted(title) => write!(f, "Imported '{}'", title),
            Outcome::MergedInto { title, added } => {
                write!(f, "Merged {} new note(s) into '{}'", added, title)
            }
            Outcome::RenamedTo(title) => write!(f, "Imported as '{}'", title),
            Outcome::Aborted => f.write_str("Import cancelled"),
        }
    }
}

/// How the caller wants a title collision settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Merge,
    Rename(String),
    Abort,
}

#[derive(Debug)]
pub enum Reconciliation {
    Done(Outcome),
    Collision { existing: Subject, candidate: Subject },
}

pub fn reconcile<S: SubjectStore>(store: &mut S, candidate: Subject) -> Result<Reconciliation> {
    if candidate.title.is_empty() {
        return Err(ExchangeError::TitleInvalid);
    }
    match store.find(&candidate.title)? {
        None => {
            store.insert(&candidate)?;
            info!(
                "Inserted '{}' with {} notes",
                candidate.title,
                candidate.notes.len()
            );
            Ok(Reconciliation::Done(Outcome::Inserted(candidate.title)))
        }
        Some(existing) => Ok(Reconciliation::Collision {
            existing,
            candidate,
        }),
    }
}

/// Appends the candidate's notes that `existing` does not already hold.
/// Existing notes and the existing sort order are left as they are.
pub fn merge<S: SubjectStore>(store: &mut S, mut existing: Subject, candidate: Subject) -> Result<Outcome> {
    let added = merge_notes(&mut existing.notes, candidate.notes);
    store.update(&existing)?;
    info!("Merged {} notes into '{}'", added, existing.title);
    Ok(Outcome::MergedInto {
        title: existing.title,
        added,
    })
}

/// Imports the candidate under `new_title`. A taken title is rejected with
/// `TitleTaken` and leaves both the store and the candidate unchanged, so
/// the caller can try another name.
pub fn rename<S: SubjectStore>(store: &mut S, candidate: &mut Subject, new_title: &str) -> Result<Outcome> {
    if new_title.is_empty() {
        return Err(ExchangeError::TitleInvalid);
    }
    if store.find(new_title)?.is_some() {
        return Err(ExchangeError::TitleTaken(new_title.to_string()));
    }
    candidate.title = new_title.to_string();
    store.insert(candidate)?;
    info!("Inserted renamed subject '{}'", new_title);
    Ok(Outcome::RenamedTo(new_title.to_string()))
}

pub fn abort() -> Outcome {
    info!("Import aborted; store untouched");
    Outcome::Aborted
}

/// Pure dedup step: pushes each incoming note unless an identical one is
/// already present. Returns how many were added.
pub fn merge_notes(target: &mut Vec<Note>, incoming: Vec<Note>) -> usize {
    let mut added = 0;
    for note in incoming {
        if !target.contains(&note) {
            target.push(note);
            added += 1;
        }
    }
    added
}
