//! The note-list payload carried inside a `.subject` container.
//!
//! A JSON array with one tuple per note:
//!
//! ```text
//! [[title, last_edited, content, locked?, alert_at?, alert_code?], ...]
//! ```
//!
//! The three leading fields are required. Trailing optionals may be omitted
//! or `null`. Validation is all-or-nothing: a payload either yields every
//! note or fails with `ContentCorrupt`.

use crate::error::{ExchangeError, Result};
use crate::model::{format_timestamp, parse_timestamp, Note};
use chrono::NaiveDateTime;
use serde_json::Value;

const MIN_FIELDS: usize = 3;
const MAX_FIELDS: usize = 6;

pub fn serialize(notes: &[Note]) -> Result<Vec<u8>> {
    let rows: Vec<Value> = notes
        .iter()
        .map(|note| {
            Value::Array(vec![
                Value::from(note.title.as_str()),
                Value::from(format_timestamp(&note.last_edited)),
                Value::from(note.content.as_str()),
                note.locked.map(Value::Bool).unwrap_or(Value::Null),
                note.alert_at
                    .map(|ts| Value::from(format_timestamp(&ts)))
                    .unwrap_or(Value::Null),
                note.alert_code.map(Value::from).unwrap_or(Value::Null),
            ])
        })
        .collect();
    Ok(serde_json::to_vec(&Value::Array(rows))?)
}

pub fn deserialize(payload: &[u8]) -> Result<Vec<Note>> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| ExchangeError::ContentCorrupt(format!("payload is not JSON: {}", e)))?;
    let rows = value
        .as_array()
        .ok_or_else(|| corrupt(None, "payload is not a list"))?;

    rows.iter()
        .enumerate()
        .map(|(idx, row)| parse_row(idx, row))
        .collect()
}

fn parse_row(idx: usize, row: &Value) -> Result<Note> {
    let fields = row
        .as_array()
        .ok_or_else(|| corrupt(Some(idx), "entry is not a list"))?;
    if fields.len() < MIN_FIELDS || fields.len() > MAX_FIELDS {
        return Err(corrupt(
            Some(idx),
            &format!("expected {}-{} fields, found {}", MIN_FIELDS, MAX_FIELDS, fields.len()),
        ));
    }

    let title = required_str(idx, &fields[0], "title")?;
    let last_edited = required_str(idx, &fields[1], "last edited")?;
    let last_edited = parse_timestamp(last_edited)
        .ok_or_else(|| corrupt(Some(idx), &format!("bad timestamp '{}'", last_edited)))?;
    let content = required_str(idx, &fields[2], "content")?;

    let locked = match fields.get(3) {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => return Err(corrupt(Some(idx), "lock flag is not a boolean")),
    };
    let alert_at = match fields.get(4) {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(optional_timestamp(idx, raw)?),
        Some(_) => return Err(corrupt(Some(idx), "alert time is not a string")),
    };
    let alert_code = match fields.get(5) {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| corrupt(Some(idx), "alert code is not an integer"))?,
        ),
    };

    Ok(Note {
        title: title.to_string(),
        last_edited,
        content: content.to_string(),
        locked,
        alert_at,
        alert_code,
    })
}

fn required_str<'a>(idx: usize, value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| corrupt(Some(idx), &format!("{} is not a string", field)))
}

fn optional_timestamp(idx: usize, raw: &str) -> Result<NaiveDateTime> {
    parse_timestamp(raw).ok_or_else(|| corrupt(Some(idx), &format!("bad alert time '{}'", raw)))
}

fn corrupt(idx: Option<usize>, msg: &str) -> ExchangeError {
    match idx {
        Some(i) => ExchangeError::ContentCorrupt(format!("note {}: {}", i, msg)),
        None => ExchangeError::ContentCorrupt(msg.to_string()),
    }
}
