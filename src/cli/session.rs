use anyhow::Result;

use crate::app::App;
use crate::backend::Backend;

use super::resolve_session;

pub async fn new<B: Backend>(app: &mut App<B>) -> Result<()> {
    let session_id = app.new_chat().await?;
    let label = app.chat_name()?.unwrap_or_default();
    println!("Started {} ({})", label, session_id);
    Ok(())
}

pub fn switch<B: Backend>(app: &mut App<B>, query: String) -> Result<()> {
    let session_id = resolve_session(&app.directory()?, &query)?;
    let snapshot = app.switch(&session_id)?;
    let label = app.chat_name()?.unwrap_or_default();
    println!(
        "Switched to {} ({}): {} chats, {} files",
        label,
        session_id,
        snapshot.chats.len(),
        snapshot.file_names.len()
    );
    Ok(())
}

pub fn delete<B: Backend>(app: &mut App<B>, query: String) -> Result<()> {
    let session_id = resolve_session(&app.directory()?, &query)?;
    let deleted = app.delete(&session_id)?;
    println!(
        "Deleted session {} ({} chats, {} files)",
        session_id, deleted.chats, deleted.files
    );
    if app.current_session().is_none() {
        println!("No session selected. Run 'authorchat new' or 'authorchat switch'.");
    }
    Ok(())
}
