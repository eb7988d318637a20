use super::SubjectStore;
use crate::error::{ExchangeError, Result};
use crate::model::{Note, SortOrder, Subject};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

const INDEX_FILENAME: &str = "data.json";

/// Index record for one subject; the notes live in their own file so listing
/// titles does not read every note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectMeta {
    pub id: Uuid,
    pub title: String,
    pub sort_order: SortOrder,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub note_count: usize,
}

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn subject_filename(id: &Uuid) -> String {
        format!("subject-{}.json", id)
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(ExchangeError::Io)?;
        }
        Ok(())
    }

    fn load_index(&self) -> Result<HashMap<Uuid, SubjectMeta>> {
        let data_file = self.root.join(INDEX_FILENAME);
        if !data_file.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(data_file).map_err(ExchangeError::Io)?;
        let meta: HashMap<Uuid, SubjectMeta> =
            serde_json::from_str(&content).map_err(ExchangeError::Serialization)?;
        Ok(meta)
    }

    fn save_index(&self, meta: &HashMap<Uuid, SubjectMeta>) -> Result<()> {
        let data_file = self.root.join(INDEX_FILENAME);
        let content = serde_json::to_string_pretty(meta).map_err(ExchangeError::Serialization)?;
        fs::write(data_file, content).map_err(ExchangeError::Io)?;
        Ok(())
    }

    fn load_notes(&self, meta: &SubjectMeta) -> Result<Vec<Note>> {
        let path = self.root.join(Self::subject_filename(&meta.id));
        if !path.exists() {
            return Err(ExchangeError::Store(format!(
                "notes for '{}' are missing ({})",
                meta.title,
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(ExchangeError::Io)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_notes(&self, id: &Uuid, notes: &[Note]) -> Result<()> {
        let path = self.root.join(Self::subject_filename(id));
        let content = serde_json::to_string_pretty(notes)?;
        fs::write(path, content).map_err(ExchangeError::Io)?;
        Ok(())
    }

    fn to_subject(&self, meta: &SubjectMeta) -> Result<Subject> {
        Ok(Subject {
            title: meta.title.clone(),
            sort_order: meta.sort_order,
            notes: self.load_notes(meta)?,
        })
    }
}

impl SubjectStore for FileStore {
    fn find(&self, title: &str) -> Result<Option<Subject>> {
        let index = self.load_index()?;
        match index.values().find(|m| m.title == title) {
            Some(meta) => self.to_subject(meta).map(Some),
            None => Ok(None),
        }
    }

    fn insert(&mut self, subject: &Subject) -> Result<()> {
        if subject.title.is_empty() {
            return Err(ExchangeError::TitleInvalid);
        }
        self.ensure_dir()?;

        let mut index = self.load_index()?;
        if index.values().any(|m| m.title == subject.title) {
            return Err(ExchangeError::TitleTaken(subject.title.clone()));
        }

        let now = Utc::now();
        let meta = SubjectMeta {
            id: Uuid::new_v4(),
            title: subject.title.clone(),
            sort_order: subject.sort_order,
            created_at: now,
            updated_at: now,
            note_count: subject.notes.len(),
        };

        // Notes first, so the index never points at a missing file.
        self.save_notes(&meta.id, &subject.notes)?;
        index.insert(meta.id, meta);
        self.save_index(&index)?;
        debug!("Inserted subject '{}'", subject.title);
        Ok(())
    }

    fn update(&mut self, subject: &Subject) -> Result<()> {
        let mut index = self.load_index()?;
        let meta = index
            .values_mut()
            .find(|m| m.title == subject.title)
            .ok_or_else(|| ExchangeError::SubjectNotFound(subject.title.clone()))?;

        meta.sort_order = subject.sort_order;
        meta.updated_at = Utc::now();
        meta.note_count = subject.notes.len();
        let id = meta.id;

        self.save_notes(&id, &subject.notes)?;
        self.save_index(&index)?;
        debug!("Updated subject '{}'", subject.title);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Subject>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let index = self.load_index()?;
        let mut metas: Vec<&SubjectMeta> = index.values().collect();
        metas.sort_by(|a, b| a.title.cmp(&b.title));
        metas.into_iter().map(|m| self.to_subject(m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;

    fn sample() -> Subject {
        Subject::new("Maths", SortOrder::DateAsc).with_notes(vec![Note::new("Algebra", "x+y=2")
            .edited_at(parse_timestamp("2021-01-01 10:00:00").unwrap())])
    }

    #[test]
    fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("data"));
        store.insert(&sample()).unwrap();

        let reopened = FileStore::new(dir.path().join("data"));
        assert_eq!(reopened.find("Maths").unwrap(), Some(sample()));
        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    #[test]
    fn update_rewrites_notes_and_sort() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().to_path_buf());
        store.insert(&sample()).unwrap();

        let mut changed = sample();
        changed.sort_order = SortOrder::AlphaDesc;
        changed.notes.push(Note::new("Geometry", "angles"));
        store.update(&changed).unwrap();

        let found = store.find("Maths").unwrap().unwrap();
        assert_eq!(found.sort_order, SortOrder::AlphaDesc);
        assert_eq!(found.notes.len(), 2);
        assert_eq!(store.load_index().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_insert_is_title_taken() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().to_path_buf());
        store.insert(&sample()).unwrap();
        assert!(matches!(
            store.insert(&sample()),
            Err(ExchangeError::TitleTaken(_))
        ));
        assert!(matches!(
            store.update(&Subject::new("Other", SortOrder::AlphaAsc)),
            Err(ExchangeError::SubjectNotFound(_))
        ));
    }

    #[test]
    fn missing_notes_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().to_path_buf());
        store.insert(&sample()).unwrap();
        let id = *store.load_index().unwrap().keys().next().unwrap();
        fs::remove_file(dir.path().join(FileStore::subject_filename(&id))).unwrap();

        assert!(matches!(store.find("Maths"), Err(ExchangeError::Store(_))));
    }

    #[test]
    fn missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nowhere"));
        assert!(store.list().unwrap().is_empty());
        assert!(store.find("Maths").unwrap().is_none());
    }
}
