//! Show command implementation

use anyhow::Result;

use crate::app::App;
use crate::backend::Backend;
use crate::chat::ChatView;

use super::{format_timestamp, resolve_session};

pub fn run<B: Backend>(app: &App<B>, query: Option<String>) -> Result<()> {
    let directory = app.directory()?;
    let session_id = match query {
        Some(q) => resolve_session(&directory, &q)?,
        None => match app.current_session() {
            Some(id) => id.to_string(),
            None => {
                println!("No session selected.");
                return Ok(());
            }
        },
    };

    let snapshot = app.workspace().load_session(&session_id)?;
    let label = directory.label_for(&session_id).unwrap_or_default();

    println!("\n{}", "=".repeat(80));
    println!("{} ({})", label, session_id);
    if snapshot.embeddings().is_none() {
        println!("No documents uploaded yet.");
    }
    if !snapshot.file_names.is_empty() {
        println!("Uploaded files:");
        for name in &snapshot.file_names {
            println!("  📄 {}", name);
        }
    }
    println!("{}", "=".repeat(80));

    let view = ChatView::from_history(snapshot.chats);
    if view.is_empty() {
        println!("\nNo questions asked yet.");
        return Ok(());
    }

    for turn in view.turns() {
        let when = turn.timestamp.map(format_timestamp).unwrap_or_default();
        println!("\n[QUESTION] ({})", when);
        println!("{}", turn.question);
        println!("\n[RESPONSE]");
        println!("{}", turn.response());
        println!("{}", "-".repeat(40));
    }

    Ok(())
}
