//! The single-file `.subject` container.
//!
//! The whole file is one zlib/deflate stream. Inflated, it reads:
//!
//! ```text
//! [4 bytes titleLength BE][titleLength bytes title]
//! [4 bytes sortOrder BE]
//! [1 byte encryptedFlag]
//! flag == 1: [32 bytes salt][remaining bytes ciphertext]
//! flag == 0: [remaining bytes note-list payload]
//! ```
//!
//! Decoding never decrypts. An encrypted container comes back as a
//! [`SealedSubject`] and the caller decides when and how to ask for a password.

use super::bytes::{deflate, inflate, write_i32_be, ByteReader};
use super::cipher::{self, SALT_LEN};
use super::notes;
use crate::error::{ExchangeError, Result};
use crate::model::{SortOrder, Subject};
use log::{debug, warn};

const FLAG_PLAIN: u8 = 0;
const FLAG_ENCRYPTED: u8 = 1;

/// Result of decoding a `.subject` file.
#[derive(Debug)]
pub enum DecodedContainer {
    Open(Subject),
    Sealed(SealedSubject),
}

impl DecodedContainer {
    pub fn title(&self) -> &str {
        match self {
            DecodedContainer::Open(subject) => &subject.title,
            DecodedContainer::Sealed(sealed) => &sealed.title,
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, DecodedContainer::Sealed(_))
    }
}

/// An encrypted container whose header has been read but whose notes are
/// still locked.
#[derive(Debug, Clone)]
pub struct SealedSubject {
    pub title: String,
    pub sort_order: SortOrder,
    pub salt: [u8; SALT_LEN],
    pub ciphertext: Vec<u8>,
}

impl SealedSubject {
    /// `None` means the password was wrong and the caller may try again.
    /// `Some(Err(ContentCorrupt))` means the password was right but the
    /// recovered payload is unusable.
    pub fn open(&self, password: &str) -> Option<Result<Subject>> {
        let plaintext = cipher::unlock(password, &self.salt, &self.ciphertext)?;
        Some(notes::deserialize(&plaintext).map(|notes| Subject {
            title: self.title.clone(),
            sort_order: self.sort_order,
            notes,
        }))
    }
}

/// Decodes a `.subject` file. Failures are logged with the offset they
/// happened at before being returned.
pub fn decode(raw: &[u8]) -> Result<DecodedContainer> {
    let decoded = decode_inflated(&inflate(raw)?).map_err(|e| {
        warn!("Rejecting .subject container ({} bytes): {}", raw.len(), e);
        e
    })?;
    debug!(
        "Decoded container '{}' (sealed: {})",
        decoded.title(),
        decoded.is_sealed()
    );
    Ok(decoded)
}

fn decode_inflated(inflated: &[u8]) -> Result<DecodedContainer> {
    let mut reader = ByteReader::new(inflated);

    let title_len = reader.read_i32_be()?;
    if title_len < 0 || title_len as usize > reader.remaining() {
        return Err(ExchangeError::ContainerCorrupt(format!(
            "title length {} at byte 0 exceeds the {} bytes that follow",
            title_len,
            reader.remaining()
        )));
    }
    let title = String::from_utf8_lossy(&reader.read_exactly(title_len as usize)?).into_owned();

    let raw_sort = reader.read_i32_be()?;
    let sort_order = SortOrder::from_wire(raw_sort);
    if sort_order.to_wire() != raw_sort {
        debug!(
            "Unknown sort order {} in '{}', using {}",
            raw_sort, title, sort_order
        );
    }

    let flag_offset = reader.offset();
    let flag = reader.read_u8()?;

    let decoded = match flag {
        FLAG_PLAIN => {
            let payload_offset = reader.offset();
            let payload = reader.read_remaining()?;
            let notes = notes::deserialize(&payload).map_err(|e| match e {
                ExchangeError::ContentCorrupt(msg) => ExchangeError::ContentCorrupt(format!(
                    "{} (payload at byte {})",
                    msg, payload_offset
                )),
                other => other,
            })?;
            DecodedContainer::Open(Subject {
                title,
                sort_order,
                notes,
            })
        }
        FLAG_ENCRYPTED => {
            let salt: [u8; SALT_LEN] = reader
                .read_exactly(SALT_LEN)?
                .try_into()
                .map_err(|_| ExchangeError::ContainerCorrupt("salt length".into()))?;
            let ciphertext = reader.read_remaining()?;
            DecodedContainer::Sealed(SealedSubject {
                title,
                sort_order,
                salt,
                ciphertext,
            })
        }
        other => {
            return Err(ExchangeError::ContainerCorrupt(format!(
                "encrypted flag {} at byte {} is neither 0 nor 1",
                other, flag_offset
            )));
        }
    };

    if decoded.title().is_empty() {
        return Err(ExchangeError::TitleInvalid);
    }
    Ok(decoded)
}

/// Writes `subject` as a `.subject` container, sealing the notes when a
/// password is given.
pub fn encode(subject: &Subject, password: Option<&str>) -> Result<Vec<u8>> {
    if subject.title.is_empty() {
        return Err(ExchangeError::TitleInvalid);
    }

    let title = subject.title.as_bytes();
    let payload = notes::serialize(&subject.notes)?;

    let mut out = Vec::with_capacity(title.len() + payload.len() + 64);
    write_i32_be(&mut out, title.len() as i32)?;
    out.extend_from_slice(title);
    write_i32_be(&mut out, subject.sort_order.to_wire())?;

    match password {
        Some(password) => {
            let salt = cipher::generate_salt();
            out.push(FLAG_ENCRYPTED);
            out.extend_from_slice(&salt);
            out.extend_from_slice(&cipher::seal(password, &salt, &payload)?);
        }
        None => {
            out.push(FLAG_PLAIN);
            out.extend_from_slice(&payload);
        }
    }

    deflate(&out)
}
