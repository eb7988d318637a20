use crate::commands::CmdResult;
use crate::error::{ExchangeError, Result};
use crate::store::SubjectStore;

pub fn run<S: SubjectStore>(store: &S, title: &str) -> Result<CmdResult> {
    let subject = store
        .find(title)?
        .ok_or_else(|| ExchangeError::SubjectNotFound(title.to_string()))?;
    Ok(CmdResult::default().with_listed_subjects(vec![subject]))
}
