//! Wire formats.
//!
//! - [`bytes`]: bounded reads, big-endian integers and zlib framing
//! - [`cipher`]: password key derivation and AES-GCM unlock/seal
//! - [`notes`]: the JSON note-list payload
//! - [`binary`]: the `.subject` container
//! - [`manifest`]: the `.subj` file inside archives
//! - [`archive`]: zip archives and their staging directories

pub mod archive;
pub mod binary;
pub mod bytes;
pub mod cipher;
pub mod manifest;
pub mod notes;
