use crate::codec::{archive, binary};
use crate::commands::{CmdMessage, CmdResult};
use crate::error::{ExchangeError, Result};
use crate::model::{ExportFormat, Subject};
use crate::store::SubjectStore;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub fn run<S: SubjectStore>(
    store: &S,
    title: &str,
    format: ExportFormat,
    output: Option<&Path>,
    password: Option<&str>,
) -> Result<CmdResult> {
    let subject = store
        .find(title)?
        .ok_or_else(|| ExchangeError::SubjectNotFound(title.to_string()))?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_filename(&subject, format));
    write_subject(&subject, format, &path, password)?;
    info!("Exported '{}' to {}", subject.title, path.display());

    let mut result = CmdResult::default()
        .with_affected_subjects(vec![subject])
        .with_written_paths(vec![path.clone()]);
    let lock = if password.is_some() { " (encrypted)" } else { "" };
    result.add_message(CmdMessage::success(format!(
        "Exported '{}' to {}{}",
        title,
        path.display(),
        lock
    )));
    Ok(result)
}

pub fn default_filename(subject: &Subject, format: ExportFormat) -> PathBuf {
    let safe_title = archive::sanitize_filename(&subject.title);
    let stem = if safe_title.is_empty() {
        "subject"
    } else {
        safe_title.as_str()
    };
    PathBuf::from(format!("{}.{}", stem, format.extension()))
}

fn write_subject(subject: &Subject, format: ExportFormat, path: &Path, password: Option<&str>) -> Result<()> {
    match format {
        ExportFormat::Subject => {
            let bytes = binary::encode(subject, password)?;
            std::fs::write(path, bytes)?;
        }
        ExportFormat::Zip => {
            let file = File::create(path)?;
            archive::encode(subject, BufWriter::new(file), password)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::import::{self, ImportOptions, ImportSource};
    use crate::commands::{Outcome, Resolution};
    use crate::model::SortOrder;
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::InMemoryStore;

    fn fixture() -> InMemoryStore {
        StoreFixture::new()
            .with_subject("Maths", SortOrder::DateDesc, &["Algebra", "Geometry"])
            .store
    }

    #[test]
    fn test_missing_subject_is_not_found() {
        let store = InMemoryStore::new();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.subject");
        let result = run(&store, "Nope", ExportFormat::Subject, Some(&out), None);
        assert!(matches!(result, Err(ExchangeError::SubjectNotFound(t)) if t == "Nope"));
        assert!(!out.exists());
    }

    #[test]
    fn test_default_filename() {
        let subject = Subject::new("Maths/Physics?", SortOrder::AlphaAsc);
        assert_eq!(
            default_filename(&subject, ExportFormat::Subject),
            PathBuf::from("Maths_Physics_.subject")
        );
        assert_eq!(
            default_filename(&Subject::new("***", SortOrder::AlphaAsc), ExportFormat::Zip),
            PathBuf::from("___.zip")
        );
    }

    #[test]
    fn test_exports_reimport_identically() {
        let source = fixture();
        let original = source.find("Maths").unwrap().unwrap();
        let dir = tempfile::tempdir().unwrap();

        for format in [ExportFormat::Subject, ExportFormat::Zip] {
            let out = dir.path().join(format!("maths.{}", format.extension()));
            let result = run(&source, "Maths", format, Some(&out), Some("pw")).unwrap();
            assert_eq!(result.written_paths, vec![out.clone()]);

            let mut target = InMemoryStore::new();
            let outcome = import::import(
                &mut target,
                ImportSource::from_path(&out).unwrap(),
                &mut |_: u32| Some("pw".to_string()),
                &mut |_: &Subject, _: &Subject| Resolution::Abort,
                &ImportOptions::default(),
            )
            .unwrap();
            assert_eq!(outcome, Outcome::Inserted("Maths".into()));

            let imported = target.find("Maths").unwrap().unwrap();
            assert_eq!(imported.sort_order, original.sort_order);
            let summary = |s: &Subject| -> Vec<(String, String)> {
                s.notes
                    .iter()
                    .map(|n| (n.title.clone(), n.content.clone()))
                    .collect()
            };
            assert_eq!(summary(&imported), summary(&original));
            if format == ExportFormat::Subject {
                // Archives carry no edit times; only the binary container
                // brings back every field.
                assert_eq!(imported, original);
            }
        }
    }
}
