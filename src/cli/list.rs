//! List command implementation

use anyhow::Result;

use crate::app::App;
use crate::backend::Backend;

use super::{format_timestamp, short_id};

pub fn run<B: Backend>(app: &App<B>) -> Result<()> {
    let directory = app.directory()?;

    if directory.is_empty() {
        println!("No sessions yet. Run 'authorchat new' to start one.");
        return Ok(());
    }

    println!(
        "{:<2} {:<10} {:<12} {:<8} {:<6} {}",
        "", "Chat", "Updated", "Chats", "Files", "Session"
    );
    println!("{}", "-".repeat(80));

    for (session_id, label) in directory.entries() {
        let snapshot = app.workspace().load_session(session_id)?;
        let marker = if app.current_session() == Some(session_id) {
            "*"
        } else {
            ""
        };
        let updated = snapshot
            .session
            .as_ref()
            .map(|s| format_timestamp(s.timestamp))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<2} {:<10} {:<12} {:<8} {:<6} {}",
            marker,
            label,
            updated,
            snapshot.chats.len(),
            snapshot.file_names.len(),
            short_id(session_id),
        );
    }

    Ok(())
}
