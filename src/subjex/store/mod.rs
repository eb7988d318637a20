//! # Storage Layer
//!
//! The exchange pipeline only needs a small slice of a notes store: look a
//! subject up by title, insert a new one, and update an existing one. The
//! [`SubjectStore`] trait captures exactly that, so the pipeline can run
//! against the real application store or against [`memory::InMemoryStore`]
//! in tests.
//!
//! ## Implementations
//!
//! - [`fs::FileStore`]: file-based storage for the CLI
//!   - Index stored in `data.json` (id → title, sort order, timestamps)
//!   - One `subject-{uuid}.json` per subject holding its notes
//!
//! - [`memory::InMemoryStore`]: in-memory storage for testing
//!
//! ## Contract
//!
//! - Titles are the key and are compared literally (no case folding, no
//!   whitespace trimming).
//! - `insert` refuses empty titles (`TitleInvalid`) and titles already
//!   present (`TitleTaken`).
//! - `update` replaces the subject with the same title, failing with
//!   `SubjectNotFound` if there is none.
//! - Each `insert`/`update` call is atomic from the caller's point of view.

use crate::error::Result;
use crate::model::Subject;

pub mod fs;
pub mod memory;

pub trait SubjectStore {
    /// Look up a subject by its exact title.
    fn find(&self, title: &str) -> Result<Option<Subject>>;

    /// Persist a subject under a title that is not yet taken.
    fn insert(&mut self, subject: &Subject) -> Result<()>;

    /// Replace the stored subject that has the same title.
    fn update(&mut self, subject: &Subject) -> Result<()>;

    /// All subjects, ordered by title.
    fn list(&self) -> Result<Vec<Subject>>;
}
