use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Input truncated at byte {offset}: wanted {wanted} bytes, {available} available")]
    TruncatedInput {
        offset: u64,
        wanted: usize,
        available: usize,
    },

    #[error("Container is corrupt: {0}")]
    ContainerCorrupt(String),

    #[error("Note content is corrupt: {0}")]
    ContentCorrupt(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("A password is required to open this file")]
    PasswordRequired,

    #[error("Wrong password")]
    WrongPassword,

    #[error("Subject title cannot be empty")]
    TitleInvalid,

    #[error("A subject titled '{0}' already exists")]
    TitleTaken(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Api Error: {0}")]
    Api(String),
}

impl ExchangeError {
    /// Errors the caller can resolve by asking the user again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExchangeError::PasswordRequired
                | ExchangeError::WrongPassword
                | ExchangeError::TitleTaken(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
