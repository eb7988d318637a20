//! # Subjex Architecture
//!
//! Subjex moves study subjects (a title, a sort order and a list of notes)
//! in and out of a local store. It reads and writes two container kinds:
//!
//! - `.subject` files: a deflated binary record, optionally encrypted with a
//!   password (AES-256-GCM, key derived with SHA3-256 over salt and password)
//! - `.zip` archives: a `.subj` manifest plus one `.txt` file per note,
//!   optionally password protected
//!
//! Like any subjex client, the CLI binary is a thin layer over the library.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs)                                     │
//! │  - Parses arguments, prompts, prints coloured messages      │
//! │  - The ONLY place that knows about stdin/stdout/exit codes  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API (api.rs)                                               │
//! │  - Thin facade over commands, loads config                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Commands (commands/*.rs)                                   │
//! │  - Import orchestration, reconciliation, export             │
//! │  - Ask for passwords and collision decisions via traits     │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │  Codecs (codec/)              │ │  Store (store/)           │
//! │  - binary, archive, manifest  │ │  - SubjectStore trait     │
//! │  - note payload, cipher       │ │  - FileStore, InMemory    │
//! └───────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! ## Import Pipeline
//!
//! 1. The container kind is picked from the file ([`commands::import::ImportSource`]).
//! 2. The container is decoded. Encrypted containers ask a
//!    [`commands::import::PasswordPrompt`] until a password works or the
//!    configured attempts run out.
//! 3. The candidate is reconciled with the store: inserted when its title
//!    is free, otherwise a [`commands::import::CollisionPolicy`] picks merge,
//!    rename or abort.
//!
//! Nothing is written to the store unless decoding fully succeeded.
//! Archive extraction happens in a per-import temporary directory that is
//! removed when the import returns.
//!
//! ## Logging
//!
//! The library logs through the `log` facade. The binary installs
//! `env_logger`; set `RUST_LOG=subjex=debug` to follow an import.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade
//! - [`commands`]: Import, export, list, show and config
//! - [`codec`]: Container and payload formats
//! - [`store`]: Storage abstraction and implementations
//! - [`model`]: `Subject`, `Note`, `SortOrder`, `ExportFormat`
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
