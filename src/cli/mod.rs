//! Command implementations for the authorchat binary

pub mod ask;
pub mod list;
pub mod session;
pub mod show;
pub mod upload;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};

use crate::directory::SessionDirectory;

/// Resolve a user-supplied session reference.
///
/// Accepts a full session id, a chat label as shown by `list` (`Chat 3`),
/// or a unique id prefix. A bare number is treated as an id prefix.
pub fn resolve_session(directory: &SessionDirectory, query: &str) -> Result<String> {
    let query = query.trim();

    if directory.contains(query) {
        return Ok(query.to_string());
    }

    if let Some(number) = query
        .get(..5)
        .filter(|head| head.eq_ignore_ascii_case("chat "))
        .map(|_| query[5..].trim())
    {
        let n: usize = number
            .parse()
            .with_context(|| format!("Invalid chat label: {}", query))?;
        if !(1..=directory.len()).contains(&n) {
            bail!("No such chat: {}", query);
        }
        return Ok(directory.ids()[directory.len() - n].clone());
    }

    let matches: Vec<&String> = directory
        .ids()
        .iter()
        .filter(|id| id.starts_with(query))
        .collect();
    match matches.as_slice() {
        [id] => Ok((*id).clone()),
        [] => bail!("Session not found: {}", query),
        _ => bail!("Ambiguous session '{}' matches {} sessions", query, matches.len()),
    }
}

/// Short local time for a stored millisecond timestamp.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// First 8 characters of a session id, for tables.
pub fn short_id(session_id: &str) -> &str {
    match session_id.char_indices().nth(8) {
        Some((end, _)) => &session_id[..end],
        None => session_id,
    }
}
