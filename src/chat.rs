//! Displayed chat turns, including questions still waiting for an answer
//!
//! A question is shown immediately with a placeholder response. Each pending
//! turn carries a client-side correlation id, and the answer (or failure) is
//! matched back to the turn by that id, so asking the same question twice
//! never updates the wrong entry.

use uuid::Uuid;

use crate::store::ChatTurn;

/// Response text shown while a question is in flight.
pub const PENDING_PLACEHOLDER: &str = "Loading...";

/// Response text shown when the backend request failed.
pub const ERROR_PLACEHOLDER: &str = "Error fetching response";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Pending,
    Answered(String),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedTurn {
    pub correlation_id: Uuid,
    /// Store key once the turn has been persisted.
    pub stored_id: Option<i64>,
    pub question: String,
    pub state: TurnState,
    pub timestamp: Option<i64>,
}

impl DisplayedTurn {
    pub fn response(&self) -> &str {
        match &self.state {
            TurnState::Pending => PENDING_PLACEHOLDER,
            TurnState::Answered(text) => text,
            TurnState::Failed => ERROR_PLACEHOLDER,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == TurnState::Pending
    }
}

impl From<ChatTurn> for DisplayedTurn {
    fn from(turn: ChatTurn) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            stored_id: turn.id,
            question: turn.question,
            state: TurnState::Answered(turn.response),
            timestamp: Some(turn.timestamp),
        }
    }
}

/// In-memory list of turns as the user sees them.
#[derive(Debug, Clone, Default)]
pub struct ChatView {
    turns: Vec<DisplayedTurn>,
}

impl ChatView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_history(chats: Vec<ChatTurn>) -> Self {
        Self {
            turns: chats.into_iter().map(DisplayedTurn::from).collect(),
        }
    }

    pub fn turns(&self) -> &[DisplayedTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn get(&self, correlation_id: Uuid) -> Option<&DisplayedTurn> {
        self.turns.iter().find(|t| t.correlation_id == correlation_id)
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> impl Iterator<Item = &DisplayedTurn> {
        self.turns.iter().filter(|t| t.is_pending())
    }

    /// Show a question with the pending placeholder; returns its correlation id.
    pub fn begin(&mut self, question: &str) -> Uuid {
        let correlation_id = Uuid::new_v4();
        self.turns.push(DisplayedTurn {
            correlation_id,
            stored_id: None,
            question: question.to_string(),
            state: TurnState::Pending,
            timestamp: None,
        });
        correlation_id
    }

    /// Replace the pending turn with the persisted answer.
    /// Returns `false` if no turn has this correlation id.
    pub fn resolve(&mut self, correlation_id: Uuid, stored: &ChatTurn) -> bool {
        match self.turn_mut(correlation_id) {
            Some(turn) => {
                turn.stored_id = stored.id;
                turn.state = TurnState::Answered(stored.response.clone());
                turn.timestamp = Some(stored.timestamp);
                true
            }
            None => false,
        }
    }

    /// Mark the pending turn as failed.
    pub fn fail(&mut self, correlation_id: Uuid) -> bool {
        match self.turn_mut(correlation_id) {
            Some(turn) => {
                turn.state = TurnState::Failed;
                true
            }
            None => false,
        }
    }

    fn turn_mut(&mut self, correlation_id: Uuid) -> Option<&mut DisplayedTurn> {
        self.turns
            .iter_mut()
            .find(|t| t.correlation_id == correlation_id)
    }
}
