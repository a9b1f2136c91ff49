//! Ask command implementation

use anyhow::Result;

use crate::app::App;
use crate::backend::Backend;
use crate::chat::TurnState;

pub async fn run<B: Backend>(app: &mut App<B>, question: String) -> Result<()> {
    if app.current_session().is_none() {
        println!("No session selected. Run 'authorchat new' first.");
        return Ok(());
    }

    let turn = match app.ask(&question).await? {
        Some(turn) => turn,
        None => {
            println!("Nothing to ask.");
            return Ok(());
        }
    };

    println!("[QUESTION] {}", turn.question);
    match &turn.state {
        TurnState::Answered(response) => println!("[RESPONSE]\n{}", response),
        TurnState::Failed | TurnState::Pending => println!("[RESPONSE] {}", turn.response()),
    }
    Ok(())
}
