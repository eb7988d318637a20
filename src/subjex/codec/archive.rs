//! Zip archives holding a `.subj` manifest and one `.txt` file per note.
//!
//! Every decode extracts into its own [`Staging`] directory. The directory is
//! a `TempDir`, so it is removed when the decode returns, whether it
//! succeeded, failed half way through extraction, or unwound.

use super::manifest::{Manifest, MANIFEST_EXT};
use crate::error::{ExchangeError, Result};
use crate::model::{now_stamp, Note, Subject};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipArchive, ZipWriter};

pub const NOTE_EXT: &str = "txt";
const NOTES_DIR: &str = "notes";
const STAGING_PREFIX: &str = "subjex-import-";
const FALLBACK_NAME: &str = "import";

/// Import-scoped extraction directory.
///
/// Laid out as `<tmp>/subjex-import-XXXX/<archive stem>/...` so the inner
/// directory carries the archive's name, which becomes the subject title
/// when the archive has no manifest.
pub struct Staging {
    dir: TempDir,
    root: PathBuf,
}

impl Staging {
    pub fn create(staging_root: Option<&Path>, name: &str) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match staging_root {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let name = if name.trim().is_empty() {
            FALLBACK_NAME
        } else {
            name
        };
        let root = dir.path().join(name);
        fs::create_dir_all(&root)?;
        debug!("Staging import in {}", root.display());
        Ok(Self { dir, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

struct Extracted {
    name: String,
    path: PathBuf,
}

/// How a single entry is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryLock {
    Plain,
    Aes,
    /// Legacy ZipCrypto. Its one-byte password check lets about one wrong
    /// password in 256 through, and the mistake only shows when reading.
    ZipCrypto,
}

impl EntryLock {
    fn is_encrypted(self) -> bool {
        self != EntryLock::Plain
    }
}

/// True when any entry in the archive at `path` is password protected.
pub fn is_encrypted(path: &Path) -> Result<bool> {
    let mut archive = open(path)?;
    entry_locks(&mut archive, path).map(|locks| locks.into_iter().any(EntryLock::is_encrypted))
}

/// Decodes the archive at `path` into a candidate subject.
pub fn decode(path: &Path, password: Option<&str>, staging_root: Option<&Path>) -> Result<Subject> {
    let mut archive = open(path)?;
    let locks = entry_locks(&mut archive, path)?;
    if password.is_none() && locks.iter().any(|l| l.is_encrypted()) {
        return Err(ExchangeError::PasswordRequired);
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = Staging::create(staging_root, &stem)?;
    let extracted = extract(&mut archive, &locks, password, &staging, path)?;
    let subject = assemble(&staging, &extracted)?;

    info!(
        "Decoded archive {} as '{}' with {} notes",
        path.display(),
        subject.title,
        subject.notes.len()
    );
    Ok(subject)
}

fn open(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| {
        warn!("Rejecting {}: {}", path.display(), e);
        ExchangeError::InvalidArchive(format!("{}: {}", path.display(), e))
    })
}

fn entry_locks(archive: &mut ZipArchive<File>, path: &Path) -> Result<Vec<EntryLock>> {
    let mut locks = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let encrypted = archive
            .by_index_raw(i)
            .map(|entry| entry.encrypted())
            .map_err(|e| zip_error(path, e))?;
        let lock = if !encrypted {
            EntryLock::Plain
        } else if archive
            .get_aes_verification_key_and_salt(i)
            .map_err(|e| zip_error(path, e))?
            .is_some()
        {
            EntryLock::Aes
        } else {
            EntryLock::ZipCrypto
        };
        locks.push(lock);
    }
    Ok(locks)
}

fn extract(
    archive: &mut ZipArchive<File>,
    locks: &[EntryLock],
    password: Option<&str>,
    staging: &Staging,
    path: &Path,
) -> Result<Vec<Extracted>> {
    let mut out = Vec::new();

    for (i, lock) in locks.iter().copied().enumerate() {
        let mut entry = match (lock.is_encrypted(), password) {
            (true, Some(pw)) => archive.by_index_decrypt(i, pw.as_bytes()),
            (true, None) => return Err(ExchangeError::PasswordRequired),
            (false, _) => archive.by_index(i),
        }
        .map_err(|e| zip_error(path, e))?;

        if entry.is_dir() {
            continue;
        }
        let relative = match entry.enclosed_name() {
            Some(rel) => rel.to_path_buf(),
            None => {
                warn!(
                    "Skipping entry with unsafe path '{}' in {}",
                    entry.name(),
                    path.display()
                );
                continue;
            }
        };
        let name = relative.to_string_lossy().replace('\\', "/");
        let target = staging.root().join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&target)?;
        if let Err(e) = io::copy(&mut entry, &mut file) {
            // AES rejects a bad password before any data is read.
            return Err(match lock {
                EntryLock::ZipCrypto => {
                    debug!("Reading '{}' failed after decryption: {}", name, e);
                    ExchangeError::WrongPassword
                }
                EntryLock::Aes | EntryLock::Plain => {
                    warn!("Corrupt entry '{}' in {}: {}", name, path.display(), e);
                    ExchangeError::InvalidArchive(format!(
                        "{}: entry '{}': {}",
                        path.display(),
                        name,
                        e
                    ))
                }
            });
        }
        debug!("Extracted '{}'", name);
        out.push(Extracted { name, path: target });
    }

    Ok(out)
}

fn assemble(staging: &Staging, extracted: &[Extracted]) -> Result<Subject> {
    let mut manifests = extracted.iter().filter(|e| has_ext(&e.name, MANIFEST_EXT));
    let manifest = match manifests.next() {
        Some(found) => {
            for extra in manifests {
                warn!("Ignoring additional manifest '{}'", extra.name);
            }
            let text = read_text(&found.path)?;
            Some(Manifest::parse(&text))
        }
        None => None,
    };

    let (title, sort_order) = match &manifest {
        Some(m) => (m.title.clone(), m.sort_order),
        None => (staging.name(), Default::default()),
    };
    if title.is_empty() {
        return Err(ExchangeError::TitleInvalid);
    }

    let now = now_stamp();
    let mut notes = Vec::new();
    for file in extracted.iter().filter(|e| has_ext(&e.name, NOTE_EXT)) {
        let content = read_text(&file.path)?;
        let stem = file_stem(&file.name);
        let note = match manifest.as_ref().and_then(|m| m.entry_for(&file.name)) {
            Some(entry) => Note {
                title: entry.title.clone().unwrap_or(stem),
                last_edited: now,
                content,
                locked: entry.locked,
                alert_at: entry.alert_at,
                alert_code: entry.alert_code,
            },
            None => Note::new(stem, content).edited_at(now),
        };
        notes.push(note);
    }

    Ok(Subject {
        title,
        sort_order,
        notes,
    })
}

/// Writes `subject` as a zip archive. With a password every entry is
/// AES-256 encrypted.
pub fn encode<W: Write + Seek>(subject: &Subject, writer: W, password: Option<&str>) -> Result<()> {
    if subject.title.is_empty() {
        return Err(ExchangeError::TitleInvalid);
    }

    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let options = match password {
        Some(pw) => base.with_aes_encryption(AesMode::Aes256, pw),
        None => base,
    };

    let files: Vec<String> = subject
        .notes
        .iter()
        .enumerate()
        .map(|(i, note)| {
            format!(
                "{}/{}-{}.{}",
                NOTES_DIR,
                sanitize_filename(&note.title),
                i + 1,
                NOTE_EXT
            )
        })
        .collect();

    let mut zip = ZipWriter::new(writer);
    let manifest_name = format!("{}.{}", or_fallback(sanitize_filename(&subject.title)), MANIFEST_EXT);
    zip.start_file(manifest_name, options)
        .map_err(|e| ExchangeError::Api(format!("Archive write failed: {}", e)))?;
    zip.write_all(Manifest::render(subject, &files).as_bytes())?;

    for (note, name) in subject.notes.iter().zip(&files) {
        zip.start_file(name.as_str(), options)
            .map_err(|e| ExchangeError::Api(format!("Archive write failed: {}", e)))?;
        zip.write_all(note.content.as_bytes())?;
    }

    zip.finish()
        .map_err(|e| ExchangeError::Api(format!("Archive write failed: {}", e)))?
        .flush()?;
    Ok(())
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn or_fallback(name: String) -> String {
    if name.is_empty() {
        "subject".to_string()
    } else {
        name
    }
}

fn zip_error(path: &Path, err: ZipError) -> ExchangeError {
    match err {
        ZipError::InvalidPassword => ExchangeError::WrongPassword,
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => {
            ExchangeError::PasswordRequired
        }
        other => {
            warn!("Invalid archive {}: {}", path.display(), other);
            ExchangeError::InvalidArchive(format!("{}: {}", path.display(), other))
        }
    }
}

fn has_ext(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_timestamp, SortOrder};
    use std::io::{Cursor, SeekFrom};
    use zip::unstable::write::FileOptionsExt;

    fn write_zip(path: &Path, entries: &[(&str, &str)], password: Option<&str>) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let base = SimpleFileOptions::default();
        let options = match password {
            Some(pw) => base.with_aes_encryption(AesMode::Aes256, pw),
            None => base,
        };
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn staging_is_empty(root: &Path) -> bool {
        fs::read_dir(root).map(|mut d| d.next().is_none()).unwrap_or(true)
    }

    #[test]
    fn manifest_and_extra_file() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("physics.zip");
        write_zip(
            &zip_path,
            &[
                ("manifest.subj", "Physics 0 notes/mech.txt Mechanics false null null"),
                ("notes/mech.txt", "F=ma"),
                ("notes/extra.txt", "E=mc^2"),
            ],
            None,
        );

        let subject = decode(&zip_path, None, None).unwrap();
        assert_eq!(subject.title, "Physics");
        assert_eq!(subject.sort_order, SortOrder::AlphaAsc);
        assert_eq!(subject.notes.len(), 2);
        assert_eq!(subject.notes[0].title, "Mechanics");
        assert_eq!(subject.notes[0].content, "F=ma");
        assert_eq!(subject.notes[0].locked, Some(false));
        assert_eq!(subject.notes[1].title, "extra");
        assert_eq!(subject.notes[1].content, "E=mc^2");
        assert_eq!(subject.notes[1].locked, None);
    }

    #[test]
    fn without_manifest_title_is_archive_name() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("Chemistry.zip");
        write_zip(
            &zip_path,
            &[("a.txt", "atoms"), ("b.txt", "bonds"), ("image.png", "\u{0}")],
            None,
        );

        let subject = decode(&zip_path, None, None).unwrap();
        assert_eq!(subject.title, "Chemistry");
        let titles: Vec<&str> = subject.notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn every_txt_file_becomes_one_note() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("bio.zip");
        write_zip(
            &zip_path,
            &[
                ("bio.subj", "Biology 2 cells.txt Cells true null 5 cells.txt Dup null null null"),
                ("cells.txt", "membrane"),
                ("genes.txt", "dna"),
                ("deep/dir/plants.txt", "leaves"),
                ("readme.md", "ignored"),
            ],
            None,
        );

        let subject = decode(&zip_path, None, None).unwrap();
        assert_eq!(subject.sort_order, SortOrder::DateAsc);
        assert_eq!(subject.notes.len(), 3);
        assert_eq!(subject.notes[0].title, "Cells");
        assert_eq!(subject.notes[0].alert_code, Some(5));
        assert_eq!(subject.notes[1].title, "genes");
        assert_eq!(subject.notes[2].title, "plants");
    }

    #[test]
    fn encrypted_archive_needs_the_right_password() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("secret.zip");
        write_zip(
            &zip_path,
            &[("secret.subj", "Secrets 0"), ("one.txt", "shh")],
            Some("open sesame"),
        );

        assert!(is_encrypted(&zip_path).unwrap());
        assert!(matches!(
            decode(&zip_path, None, None),
            Err(ExchangeError::PasswordRequired)
        ));
        assert!(matches!(
            decode(&zip_path, Some("wrong"), None),
            Err(ExchangeError::WrongPassword)
        ));
        let subject = decode(&zip_path, Some("open sesame"), None).unwrap();
        assert_eq!(subject.title, "Secrets");
        assert_eq!(subject.notes[0].content, "shh");
    }

    #[test]
    fn not_a_zip_is_invalid_archive() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.zip");
        fs::write(&bogus, b"this is not a zip file at all").unwrap();
        assert!(matches!(
            decode(&bogus, None, None),
            Err(ExchangeError::InvalidArchive(_))
        ));
    }

    #[test]
    fn empty_manifest_title_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("blank.zip");
        write_zip(&zip_path, &[("blank.subj", "   "), ("a.txt", "x")], None);
        assert!(matches!(
            decode(&zip_path, None, None),
            Err(ExchangeError::TitleInvalid)
        ));
    }

    #[test]
    fn staging_is_removed_on_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let staging_root = dir.path().join("staging");

        let good = dir.path().join("good.zip");
        write_zip(&good, &[("a.txt", "x")], None);
        decode(&good, None, Some(&staging_root)).unwrap();
        assert!(staging_is_empty(&staging_root));

        let blank = dir.path().join("blank.zip");
        write_zip(&blank, &[("blank.subj", ""), ("a.txt", "x")], None);
        assert!(decode(&blank, None, Some(&staging_root)).is_err());
        assert!(staging_is_empty(&staging_root));

        let locked = dir.path().join("locked.zip");
        write_zip(&locked, &[("a.txt", "x")], Some("pw"));
        assert!(decode(&locked, Some("nope"), Some(&staging_root)).is_err());
        assert!(staging_is_empty(&staging_root));
    }

    #[test]
    fn staging_dirs_are_never_shared() {
        let first = Staging::create(None, "same").unwrap();
        let second = Staging::create(None, "same").unwrap();
        assert_ne!(first.path(), second.path());
        assert_eq!(first.name(), "same");

        let kept = first.path().to_path_buf();
        drop(first);
        assert!(!kept.exists());
    }

    #[test]
    fn encoded_archive_decodes_back() {
        let mut note = Note::new("Kinematics", "v = u + at")
            .edited_at(parse_timestamp("2020-01-01 00:00:00").unwrap());
        note.locked = Some(true);
        note.alert_at = parse_timestamp("2020-02-02 02:02:02");
        note.alert_code = Some(11);
        let subject = Subject::new("Modern Physics", SortOrder::DateDesc)
            .with_notes(vec![note, Note::new("Optics / Light", "snell")]);

        for password in [None, Some("pw")] {
            let dir = tempfile::tempdir().unwrap();
            let zip_path = dir.path().join("export.zip");
            encode(&subject, File::create(&zip_path).unwrap(), password).unwrap();

            let decoded = decode(&zip_path, password, None).unwrap();
            assert_eq!(decoded.title, subject.title);
            assert_eq!(decoded.sort_order, subject.sort_order);
            assert_eq!(decoded.notes.len(), 2);
            for (got, want) in decoded.notes.iter().zip(&subject.notes) {
                assert_eq!(got.title, want.title);
                assert_eq!(got.content, want.content);
                assert_eq!(got.locked, want.locked);
                assert_eq!(got.alert_at, want.alert_at);
                assert_eq!(got.alert_code, want.alert_code);
            }
        }
    }

    #[test]
    fn encode_into_memory() {
        let subject = Subject::new("Tiny", SortOrder::AlphaAsc).with_notes(vec![Note::new("n", "c")]);
        let mut buf = Cursor::new(Vec::new());
        encode(&subject, &mut buf, None).unwrap();
        let bytes = buf.into_inner();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_filename("Hello World"), "Hello World");
        assert_eq!(sanitize_filename("foo/bar"), "foo_bar");
        assert_eq!(sanitize_filename("baz\\qux"), "baz_qux");
    }

    #[test]
    fn corrupt_aes_payload_is_invalid_not_wrong_password() {
        let subject = Subject::new("Physics", SortOrder::AlphaAsc)
            .with_notes(vec![Note::new("Mechanics", "F=ma everywhere")]);
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("physics.zip");
        encode(&subject, File::create(&zip_path).unwrap(), Some("pw")).unwrap();

        // Local header: 30 fixed bytes, then name and extra field. AES data
        // starts with a 16 byte salt and a 2 byte verifier.
        let mut bytes = fs::read(&zip_path).unwrap();
        let name = b"notes/Mechanics-1.txt";
        let at = bytes.windows(name.len()).position(|w| w == name).unwrap();
        let header = at - 30;
        let extra_len = u16::from_le_bytes([bytes[header + 28], bytes[header + 29]]) as usize;
        let data = at + name.len() + extra_len;
        bytes[data + 18] ^= 0xff;
        fs::write(&zip_path, &bytes).unwrap();

        assert!(matches!(
            decode(&zip_path, Some("pw"), None),
            Err(ExchangeError::InvalidArchive(_))
        ));
    }

    #[test]
    fn zipcrypto_archive() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("legacy.zip");
        let mut zip = ZipWriter::new(File::create(&zip_path).unwrap());
        let options = FileOptionsExt::with_deprecated_encryption(SimpleFileOptions::default(), b"pw");
        for (name, body) in [("legacy.subj", "Legacy 0 a.txt Alpha null null null"), ("a.txt", "old")] {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        assert!(is_encrypted(&zip_path).unwrap());
        assert!(matches!(
            decode(&zip_path, None, None),
            Err(ExchangeError::PasswordRequired)
        ));
        assert!(matches!(
            decode(&zip_path, Some("not it"), None),
            Err(ExchangeError::WrongPassword)
        ));
        let subject = decode(&zip_path, Some("pw"), None).unwrap();
        assert_eq!(subject.title, "Legacy");
        assert_eq!(subject.notes[0].title, "Alpha");
        assert_eq!(subject.notes[0].content, "old");
    }

    #[test]
    fn first_manifest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("two.zip");
        write_zip(
            &zip_path,
            &[
                ("first.subj", "First 0 a.txt Alpha null null null"),
                ("second.subj", "Second 1 a.txt Other null null null"),
                ("a.txt", "x"),
            ],
            None,
        );

        let subject = decode(&zip_path, None, None).unwrap();
        assert_eq!(subject.title, "First");
        assert_eq!(subject.sort_order, SortOrder::AlphaAsc);
        assert_eq!(subject.notes.len(), 1);
        assert_eq!(subject.notes[0].title, "Alpha");
    }

    #[test]
    fn titles_survive_an_archive_roundtrip() {
        let subject = Subject::new(" Maths ", SortOrder::AlphaAsc).with_notes(vec![
            Note::new("null", "a"),
            Note::new(" padded ", "b"),
            Note::new("", "c"),
            Note::new("tab\there\\", "d"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("maths.zip");
        encode(&subject, File::create(&zip_path).unwrap(), None).unwrap();

        let decoded = decode(&zip_path, None, None).unwrap();
        assert_eq!(decoded.title, " Maths ");
        let titles: Vec<&str> = decoded.notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["null", " padded ", "", "tab\there\\"]);
    }

    struct FlushFails(Cursor<Vec<u8>>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    impl Seek for FlushFails {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.0.seek(pos)
        }
    }

    #[test]
    fn flush_failure_is_reported() {
        let subject = Subject::new("Tiny", SortOrder::AlphaAsc).with_notes(vec![Note::new("n", "c")]);
        let result = encode(&subject, FlushFails(Cursor::new(Vec::new())), None);
        assert!(matches!(result, Err(ExchangeError::Io(_))));
    }
}
