use super::SubjectStore;
use crate::error::{ExchangeError, Result};
use crate::model::Subject;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    subjects: BTreeMap<String, Subject>,
    writes: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `insert`/`update` calls, for asserting that an
    /// operation left the store untouched.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl SubjectStore for InMemoryStore {
    fn find(&self, title: &str) -> Result<Option<Subject>> {
        Ok(self.subjects.get(title).cloned())
    }

    fn insert(&mut self, subject: &Subject) -> Result<()> {
        if subject.title.is_empty() {
            return Err(ExchangeError::TitleInvalid);
        }
        if self.subjects.contains_key(&subject.title) {
            return Err(ExchangeError::TitleTaken(subject.title.clone()));
        }
        self.subjects.insert(subject.title.clone(), subject.clone());
        self.writes += 1;
        Ok(())
    }

    fn update(&mut self, subject: &Subject) -> Result<()> {
        match self.subjects.get_mut(&subject.title) {
            Some(existing) => {
                *existing = subject.clone();
                self.writes += 1;
                Ok(())
            }
            None => Err(ExchangeError::SubjectNotFound(subject.title.clone())),
        }
    }

    fn list(&self) -> Result<Vec<Subject>> {
        Ok(self.subjects.values().cloned().collect())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::{parse_timestamp, Note, SortOrder};

    pub struct StoreFixture {
        pub store: InMemoryStore,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
            }
        }

        /// Adds a subject whose notes are titled after `note_titles`, each
        /// with content `"<title> body"` and a fixed edit time.
        pub fn with_subject(mut self, title: &str, sort: SortOrder, note_titles: &[&str]) -> Self {
            let notes = note_titles.iter().map(|t| fixture_note(t)).collect();
            let subject = Subject::new(title, sort).with_notes(notes);
            self.store.insert(&subject).unwrap();
            self
        }

        pub fn with_empty_subject(self, title: &str) -> Self {
            self.with_subject(title, SortOrder::AlphaAsc, &[])
        }
    }

    pub fn fixture_note(title: &str) -> Note {
        Note::new(title, format!("{} body", title))
            .edited_at(parse_timestamp("2021-01-01 10:00:00").unwrap())
    }
}
