use clap::{Parser, Subcommand, ValueEnum};
use subjex::model::ExportFormat;
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format: "0.3.2" for releases, "0.3.2@abc1234 2024-01-15 14:30" for dev builds
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "subjex", bin_name = "subjex", version = get_version())]
#[command(about = "Import and export study subjects", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to $SUBJEX_HOME, then the platform data dir)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// What to do when an imported subject's title already exists
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OnConflict {
    /// Add the incoming notes that are not already there
    Merge,
    /// Import under another title (see --rename-to)
    Rename,
    /// Leave the store untouched
    Abort,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a .subject file or a .zip archive
    #[command(alias = "i")]
    Import {
        /// File to import
        file: PathBuf,

        /// Password for encrypted files (prompted when needed and omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Resolve a title collision without asking
        #[arg(long, value_enum)]
        on_conflict: Option<OnConflict>,

        /// New title when resolving a collision by renaming
        #[arg(long)]
        rename_to: Option<String>,
    },

    /// Export a subject to a file
    #[command(alias = "x")]
    Export {
        /// Title of the subject
        title: String,

        /// Output file (defaults to the title plus the format's extension)
        file: Option<PathBuf>,

        /// Container format: subject or zip
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Encrypt the export with this password
        #[arg(short, long)]
        password: Option<String>,
    },

    /// List stored subjects
    #[command(alias = "ls")]
    List,

    /// Show one subject and its notes
    #[command(alias = "v")]
    Show {
        /// Title of the subject
        title: String,
    },

    /// Get or set configuration
    Config {
        /// Configuration key (e.g., default-format)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}
