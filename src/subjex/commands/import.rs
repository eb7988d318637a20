//! Import orchestration: decode a container, unlock it if needed, reconcile
//! the candidate with the store.
//!
//! The container kind is picked once, up front, as an [`ImportSource`].
//! Everything the pipeline needs from a human (passwords, what to do on a
//! title collision) comes in through the [`PasswordPrompt`] and
//! [`CollisionPolicy`] traits, so the same flow serves the CLI and tests.

use crate::codec::{archive, binary};
use crate::commands::reconcile::{self, Outcome, Reconciliation, Resolution};
use crate::commands::{CmdMessage, CmdResult};
use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, Result};
use crate::model::Subject;
use crate::store::SubjectStore;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

const ARCHIVE_EXT: &str = "zip";

#[derive(Debug, Clone)]
pub enum ImportSource {
    /// A `.subject` container. `origin` is the file the bytes came from, if
    /// any, and only shows up in log lines.
    Binary {
        bytes: Vec<u8>,
        origin: Option<PathBuf>,
    },
    Archive(PathBuf),
}

impl ImportSource {
    /// `.zip` files are archives; anything else is read as a `.subject`
    /// container.
    pub fn from_path(path: &Path) -> Result<Self> {
        let is_zip = path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ARCHIVE_EXT))
            .unwrap_or(false);
        if is_zip {
            Ok(ImportSource::Archive(path.to_path_buf()))
        } else {
            Ok(ImportSource::Binary {
                bytes: fs::read(path)?,
                origin: Some(path.to_path_buf()),
            })
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ImportSource::Binary {
            bytes,
            origin: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImportSource::Binary { .. } => "subject file",
            ImportSource::Archive(_) => "archive",
        }
    }

    pub fn origin(&self) -> String {
        match self {
            ImportSource::Binary {
                origin: Some(path), ..
            }
            | ImportSource::Archive(path) => path.display().to_string(),
            ImportSource::Binary { bytes, origin: None } => {
                format!("{} bytes in memory", bytes.len())
            }
        }
    }
}

/// Supplies passwords for encrypted containers. `attempt` starts at 1.
/// Returning `None` cancels the import.
pub trait PasswordPrompt {
    fn password(&mut self, attempt: u32) -> Option<String>;
}

impl<F> PasswordPrompt for F
where
    F: FnMut(u32) -> Option<String>,
{
    fn password(&mut self, attempt: u32) -> Option<String> {
        self(attempt)
    }
}

/// Decides what happens when the imported title already exists.
pub trait CollisionPolicy {
    fn resolve(&mut self, existing: &Subject, candidate: &Subject) -> Resolution;

    /// Called when a rename target is also taken. Return `true` to be asked
    /// to resolve again, `false` to fail with `TitleTaken`.
    fn title_taken(&mut self, _title: &str) -> bool {
        false
    }
}

impl<F> CollisionPolicy for F
where
    F: FnMut(&Subject, &Subject) -> Resolution,
{
    fn resolve(&mut self, existing: &Subject, candidate: &Subject) -> Resolution {
        self(existing, candidate)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub max_password_attempts: u32,
    pub staging_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions::from(&ExchangeConfig::default())
    }
}

impl From<&ExchangeConfig> for ImportOptions {
    fn from(config: &ExchangeConfig) -> Self {
        Self {
            max_password_attempts: config.max_password_attempts.max(1),
            staging_dir: config.staging_dir.clone(),
        }
    }
}

/// Runs a full import and reports it as a command result.
pub fn run<S, P, C>(
    store: &mut S,
    source: ImportSource,
    passwords: &mut P,
    policy: &mut C,
    options: &ImportOptions,
) -> Result<CmdResult>
where
    S: SubjectStore,
    P: PasswordPrompt + ?Sized,
    C: CollisionPolicy + ?Sized,
{
    let outcome = import(store, source, passwords, policy, options)?;
    let mut result = CmdResult::default();

    let stored_title = match &outcome {
        Outcome::Inserted(title) | Outcome::RenamedTo(title) => Some(title.clone()),
        Outcome::MergedInto { title, .. } => Some(title.clone()),
        Outcome::Aborted => None,
    };
    if let Some(title) = stored_title {
        if let Some(subject) = store.find(&title)? {
            result.affected_subjects.push(subject);
        }
    }

    let message = match outcome {
        Outcome::Aborted => CmdMessage::warning(outcome.to_string()),
        _ => CmdMessage::success(outcome.to_string()),
    };
    result.add_message(message);
    Ok(result.with_outcome(outcome))
}

/// Decode, unlock and reconcile. No store write happens unless decoding
/// fully succeeded.
pub fn import<S, P, C>(
    store: &mut S,
    source: ImportSource,
    passwords: &mut P,
    policy: &mut C,
    options: &ImportOptions,
) -> Result<Outcome>
where
    S: SubjectStore,
    P: PasswordPrompt + ?Sized,
    C: CollisionPolicy + ?Sized,
{
    let origin = source.origin();
    debug!("Importing {} from {}", source.kind(), origin);
    let decoded = match source {
        ImportSource::Binary { bytes, .. } => decode_binary(&bytes, passwords, options),
        ImportSource::Archive(path) => decode_archive(&path, passwords, options),
    };
    let candidate = decoded.map_err(|e| {
        warn!("Could not import {}: {}", origin, e);
        e
    })?;
    let outcome = match candidate {
        Some(candidate) => settle(store, candidate, policy)?,
        None => reconcile::abort(),
    };
    info!("Import finished: {}", outcome);
    Ok(outcome)
}

/// Decodes a `.subject` container. The container is parsed once; wrong
/// passwords only repeat the unlock step. `Ok(None)` means the user
/// declined to give a password.
pub fn decode_binary<P>(bytes: &[u8], passwords: &mut P, options: &ImportOptions) -> Result<Option<Subject>>
where
    P: PasswordPrompt + ?Sized,
{
    let sealed = match binary::decode(bytes)? {
        binary::DecodedContainer::Open(subject) => return Ok(Some(subject)),
        binary::DecodedContainer::Sealed(sealed) => sealed,
    };
    debug!("'{}' is encrypted; asking for a password", sealed.title);

    for attempt in 1..=options.max_password_attempts {
        let Some(password) = passwords.password(attempt) else {
            return Ok(None);
        };
        match sealed.open(&password) {
            Some(subject) => return subject.map(Some),
            None => warn!(
                "Wrong password for '{}' (attempt {} of {})",
                sealed.title, attempt, options.max_password_attempts
            ),
        }
    }
    Err(ExchangeError::WrongPassword)
}

/// Decodes a zip archive, asking for passwords only when an entry is
/// encrypted. Every attempt extracts into a fresh staging directory.
pub fn decode_archive<P>(path: &Path, passwords: &mut P, options: &ImportOptions) -> Result<Option<Subject>>
where
    P: PasswordPrompt + ?Sized,
{
    let staging = options.staging_dir.as_deref();
    if !archive::is_encrypted(path)? {
        return archive::decode(path, None, staging).map(Some);
    }
    debug!("{} is encrypted; asking for a password", path.display());

    for attempt in 1..=options.max_password_attempts {
        let Some(password) = passwords.password(attempt) else {
            return Ok(None);
        };
        match archive::decode(path, Some(&password), staging) {
            Err(ExchangeError::WrongPassword) => warn!(
                "Wrong password for {} (attempt {} of {})",
                path.display(),
                attempt,
                options.max_password_attempts
            ),
            other => return other.map(Some),
        }
    }
    Err(ExchangeError::WrongPassword)
}

fn settle<S, C>(store: &mut S, candidate: Subject, policy: &mut C) -> Result<Outcome>
where
    S: SubjectStore,
    C: CollisionPolicy + ?Sized,
{
    let (existing, mut candidate) = match reconcile::reconcile(store, candidate)? {
        Reconciliation::Done(outcome) => return Ok(outcome),
        Reconciliation::Collision {
            existing,
            candidate,
        } => (existing, candidate),
    };
    debug!("'{}' already exists; asking how to resolve", existing.title);

    loop {
        match policy.resolve(&existing, &candidate) {
            Resolution::Merge => return reconcile::merge(store, existing, candidate),
            Resolution::Abort => return Ok(reconcile::abort()),
            Resolution::Rename(new_title) => {
                match reconcile::rename(store, &mut candidate, &new_title) {
                    Err(ExchangeError::TitleTaken(taken)) => {
                        if !policy.title_taken(&taken) {
                            return Err(ExchangeError::TitleTaken(taken));
                        }
                    }
                    other => return other,
                }
            }
        }
    }
}
