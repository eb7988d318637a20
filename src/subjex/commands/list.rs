use crate::commands::CmdResult;
use crate::error::Result;
use crate::store::SubjectStore;

pub fn run<S: SubjectStore>(store: &S) -> Result<CmdResult> {
    let mut subjects = store.list()?;
    subjects.sort_by(|a, b| a.title.cmp(&b.title));
    Ok(CmdResult::default().with_listed_subjects(subjects))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SortOrder;
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::InMemoryStore;

    #[test]
    fn lists_subjects_by_title() {
        let store = StoreFixture::new()
            .with_subject("Physics", SortOrder::AlphaAsc, &["Mechanics"])
            .with_empty_subject("Art")
            .store;

        let result = run(&store).unwrap();
        let titles: Vec<&str> = result
            .listed_subjects
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Art", "Physics"]);
    }

    #[test]
    fn empty_store_lists_nothing() {
        let result = run(&InMemoryStore::new()).unwrap();
        assert!(result.listed_subjects.is_empty());
        assert!(result.messages.is_empty());
    }
}
