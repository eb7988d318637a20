use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use log::{debug, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use subjex::api::SubjexApi;
use subjex::commands::config::ConfigAction;
use subjex::commands::import::{CollisionPolicy, PasswordPrompt};
use subjex::commands::{CmdMessage, ExchangePaths, MessageLevel, Outcome, Resolution};
use subjex::config::ExchangeConfig;
use subjex::error::{ExchangeError, Result};
use subjex::model::{format_timestamp, ExportFormat, Subject};
use subjex::store::fs::FileStore;

mod args;
use args::{Cli, Commands, OnConflict};

const HOME_ENV: &str = "SUBJEX_HOME";

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        if e.is_recoverable() {
            eprintln!("{}", "Nothing was imported; run the command again to retry.".dimmed());
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

struct AppContext {
    api: SubjexApi<FileStore>,
}

fn run(cli: Cli) -> Result<()> {
    let mut ctx = init_context(&cli)?;

    match cli.command {
        Commands::Import {
            file,
            password,
            on_conflict,
            rename_to,
        } => handle_import(&mut ctx, file, password, on_conflict, rename_to),
        Commands::Export {
            title,
            file,
            format,
            password,
        } => handle_export(&ctx, title, file, format, password),
        Commands::List => handle_list(&ctx),
        Commands::Show { title } => handle_show(&ctx, title),
        Commands::Config { key, value } => handle_config(&ctx, key, value),
    }
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let data_dir = match (&cli.home, std::env::var_os(HOME_ENV)) {
        (Some(home), _) => home.clone(),
        (None, Some(env_home)) if !env_home.is_empty() => PathBuf::from(env_home),
        _ => ProjectDirs::from("com", "subjex", "subjex")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| ExchangeError::Api("Could not determine data dir".into()))?,
    };
    debug!("Using data dir {}", data_dir.display());

    let paths = ExchangePaths { data_dir };
    let store = FileStore::new(paths.store_dir());
    Ok(AppContext {
        api: SubjexApi::new(store, paths),
    })
}

fn handle_import(
    ctx: &mut AppContext,
    file: PathBuf,
    password: Option<String>,
    on_conflict: Option<OnConflict>,
    rename_to: Option<String>,
) -> Result<()> {
    if rename_to.is_some() && on_conflict.is_some_and(|c| c != OnConflict::Rename) {
        return Err(ExchangeError::Api(
            "--rename-to only applies with --on-conflict rename".into(),
        ));
    }

    let on_conflict = on_conflict.or(rename_to.as_ref().map(|_| OnConflict::Rename));
    let mut passwords = CliPasswords {
        given: password,
        given_rejected: false,
    };
    let mut policy = CliPolicy {
        on_conflict,
        rename_to,
    };
    let result = ctx.api.import_path(&file, &mut passwords, &mut policy)?;
    if passwords.given_rejected && result.outcome == Some(Outcome::Aborted) {
        return Err(ExchangeError::WrongPassword);
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_export(
    ctx: &AppContext,
    title: String,
    file: Option<PathBuf>,
    format: Option<ExportFormat>,
    password: Option<String>,
) -> Result<()> {
    let result = ctx
        .api
        .export(&title, format, file.as_deref(), password.as_deref())?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_list(ctx: &AppContext) -> Result<()> {
    let result = ctx.api.list()?;
    if result.listed_subjects.is_empty() {
        println!("{}", "No subjects yet.".dimmed());
    }
    for subject in &result.listed_subjects {
        println!(
            "{}  {}",
            subject.title.bold(),
            format!("{} notes, {}", subject.notes.len(), subject.sort_order).dimmed()
        );
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_show(ctx: &AppContext, title: String) -> Result<()> {
    let result = ctx.api.show(&title)?;
    for subject in &result.listed_subjects {
        print_full_subject(subject);
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_config(ctx: &AppContext, key: Option<String>, value: Option<String>) -> Result<()> {
    let action = match (key, value) {
        (None, _) => ConfigAction::ShowAll,
        (Some(key), None) => ConfigAction::ShowKey(key),
        (Some(key), Some(value)) => ConfigAction::Set(key, value),
    };

    let result = ctx.api.config(action)?;
    if let (Some(config), true) = (&result.config, result.messages.is_empty()) {
        print_config(config);
    }
    print_messages(&result.messages);
    Ok(())
}

fn print_config(config: &ExchangeConfig) {
    for key in ExchangeConfig::keys() {
        let value = config.get(key).unwrap_or_default();
        println!("{} = {}", key, value);
    }
}

fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

fn print_full_subject(subject: &Subject) {
    println!(
        "{} {}",
        subject.title.bold(),
        format!("({})", subject.sort_order).dimmed()
    );
    for note in subject.sorted_notes() {
        println!("\n================================\n");
        let lock = if note.locked == Some(true) { " [locked]" } else { "" };
        println!(
            "{}{} {}",
            note.title.yellow(),
            lock,
            format_timestamp(&note.last_edited).dimmed()
        );
        if let Some(alert) = &note.alert_at {
            println!("{}", format!("alert at {}", format_timestamp(alert)).dimmed());
        }
        println!("--------------------------------");
        println!("{}", note.content);
    }
}

/// Uses `--password` when given, otherwise asks on the terminal. An empty
/// answer, or no terminal at all, cancels the import.
///
/// `--password` is only offered on the first attempt. Asking for a second one
/// stops the import and sets `given_rejected`.
struct CliPasswords {
    given: Option<String>,
    given_rejected: bool,
}

impl PasswordPrompt for CliPasswords {
    fn password(&mut self, attempt: u32) -> Option<String> {
        if self.given.is_some() {
            if attempt == 1 {
                return self.given.clone();
            }
            self.given_rejected = true;
            return None;
        }
        let prompt = if attempt == 1 {
            "Password: ".to_string()
        } else {
            format!("Wrong password, try again (attempt {}): ", attempt)
        };
        match rpassword::prompt_password(prompt) {
            Ok(pw) if !pw.is_empty() => Some(pw),
            Ok(_) => None,
            Err(e) => {
                warn!("Cannot read password: {}", e);
                None
            }
        }
    }
}

/// Settles title collisions from `--on-conflict`/`--rename-to`, or by
/// asking on stdin when neither was given.
struct CliPolicy {
    on_conflict: Option<OnConflict>,
    rename_to: Option<String>,
}

impl CliPolicy {
    fn ask(&self, question: &str) -> Option<String> {
        eprint!("{}", question);
        io::stderr().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn ask_title(&self) -> Resolution {
        match self.ask("New title: ") {
            Some(title) if !title.is_empty() => Resolution::Rename(title),
            _ => Resolution::Abort,
        }
    }
}

impl CollisionPolicy for CliPolicy {
    fn resolve(&mut self, existing: &Subject, candidate: &Subject) -> Resolution {
        match self.on_conflict {
            Some(OnConflict::Merge) => Resolution::Merge,
            Some(OnConflict::Abort) => Resolution::Abort,
            Some(OnConflict::Rename) => match self.rename_to.clone() {
                Some(title) => Resolution::Rename(title),
                None => self.ask_title(),
            },
            None => {
                let question = format!(
                    "'{}' already exists ({} notes; importing {}). [m]erge, [r]ename, [a]bort? ",
                    existing.title,
                    existing.notes.len(),
                    candidate.notes.len()
                );
                match self.ask(&question).as_deref() {
                    Some("m") | Some("merge") => Resolution::Merge,
                    Some("r") | Some("rename") => self.ask_title(),
                    _ => Resolution::Abort,
                }
            }
        }
    }

    fn title_taken(&mut self, title: &str) -> bool {
        if self.rename_to.is_some() {
            return false;
        }
        eprintln!("{}", format!("'{}' is taken too.", title).yellow());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_password_is_offered_once() {
        let mut passwords = CliPasswords {
            given: Some("pw".into()),
            given_rejected: false,
        };
        assert_eq!(passwords.password(1).as_deref(), Some("pw"));
        assert!(!passwords.given_rejected);
        assert_eq!(passwords.password(2), None);
        assert!(passwords.given_rejected);
    }
}
