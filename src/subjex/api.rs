//! # API Facade
//!
//! Thin facade over the command layer and the single entry point for every
//! subjex operation. It dispatches to `commands/*.rs`, loads the config the
//! commands need, and returns `Result<CmdResult>`. It never prints.
//!
//! `SubjexApi<S: SubjectStore>` is generic over the storage backend:
//! `SubjexApi<FileStore>` in the binary, `SubjexApi<InMemoryStore>` in tests.

use crate::commands;
use crate::commands::import::{CollisionPolicy, ImportOptions, ImportSource, PasswordPrompt};
use crate::config::ExchangeConfig;
use crate::error::Result;
use crate::model::ExportFormat;
use crate::store::SubjectStore;
use std::path::Path;

pub struct SubjexApi<S: SubjectStore> {
    store: S,
    paths: commands::ExchangePaths,
}

impl<S: SubjectStore> SubjexApi<S> {
    pub fn new(store: S, paths: commands::ExchangePaths) -> Self {
        Self { store, paths }
    }

    pub fn load_config(&self) -> Result<ExchangeConfig> {
        ExchangeConfig::load(&self.paths.data_dir)
    }

    /// Imports an in-memory `.subject` container.
    pub fn import_binary<P, C>(
        &mut self,
        bytes: Vec<u8>,
        passwords: &mut P,
        policy: &mut C,
    ) -> Result<commands::CmdResult>
    where
        P: PasswordPrompt + ?Sized,
        C: CollisionPolicy + ?Sized,
    {
        self.import(ImportSource::from_bytes(bytes), passwords, policy)
    }

    /// Imports a zip archive from disk.
    pub fn import_archive<P, C>(
        &mut self,
        path: &Path,
        passwords: &mut P,
        policy: &mut C,
    ) -> Result<commands::CmdResult>
    where
        P: PasswordPrompt + ?Sized,
        C: CollisionPolicy + ?Sized,
    {
        self.import(ImportSource::Archive(path.to_path_buf()), passwords, policy)
    }

    /// Imports a file, choosing the container kind from its extension.
    pub fn import_path<P, C>(
        &mut self,
        path: &Path,
        passwords: &mut P,
        policy: &mut C,
    ) -> Result<commands::CmdResult>
    where
        P: PasswordPrompt + ?Sized,
        C: CollisionPolicy + ?Sized,
    {
        let source = ImportSource::from_path(path)?;
        self.import(source, passwords, policy)
    }

    fn import<P, C>(
        &mut self,
        source: ImportSource,
        passwords: &mut P,
        policy: &mut C,
    ) -> Result<commands::CmdResult>
    where
        P: PasswordPrompt + ?Sized,
        C: CollisionPolicy + ?Sized,
    {
        let options = ImportOptions::from(&self.load_config()?);
        commands::import::run(&mut self.store, source, passwords, policy, &options)
    }

    /// Exports a stored subject. `format` falls back to the configured
    /// default; `output` to a file named after the subject.
    pub fn export(
        &self,
        title: &str,
        format: Option<ExportFormat>,
        output: Option<&Path>,
        password: Option<&str>,
    ) -> Result<commands::CmdResult> {
        let format = match format {
            Some(format) => format,
            None => self.load_config()?.default_format,
        };
        commands::export::run(&self.store, title, format, output, password)
    }

    pub fn list(&self) -> Result<commands::CmdResult> {
        commands::list::run(&self.store)
    }

    pub fn show(&self, title: &str) -> Result<commands::CmdResult> {
        commands::show::run(&self.store, title)
    }

    pub fn config(&self, action: commands::config::ConfigAction) -> Result<commands::CmdResult> {
        commands::config::run(&self.paths, action)
    }
}
