//! Application flow: session selection, questions and uploads
//!
//! Mirrors what the chat UI does with the store: resolve the current session
//! at startup, create sessions through the backend, show questions
//! optimistically, and keep the persisted selection in step with deletions.

use tracing::{info, warn};

use crate::backend::{Backend, UploadFile};
use crate::chat::{ChatView, DisplayedTurn};
use crate::directory::SessionDirectory;
use crate::error::{Error, Result};
use crate::selection::SelectionSlot;
use crate::workspace::{DeletedSession, SessionSnapshot, UploadOutcome, Workspace};

pub struct App<B: Backend> {
    workspace: Workspace,
    backend: B,
    selection: SelectionSlot,
    current: Option<String>,
    view: ChatView,
    file_names: Vec<String>,
}

impl<B: Backend> App<B> {
    /// Restore the persisted selection if it still names a known session.
    pub fn start(workspace: Workspace, backend: B, selection: SelectionSlot) -> Result<Self> {
        let mut app = Self {
            workspace,
            backend,
            selection,
            current: None,
            view: ChatView::new(),
            file_names: Vec::new(),
        };

        if let Some(session_id) = app.selection.load()? {
            if app.workspace.session_exists(&session_id)? {
                app.activate(session_id)?;
            } else {
                warn!(session_id = %session_id, "selected session no longer exists, clearing selection");
                app.selection.clear()?;
            }
        }

        Ok(app)
    }

    fn activate(&mut self, session_id: String) -> Result<SessionSnapshot> {
        let snapshot = self.workspace.load_session(&session_id)?;
        self.view = ChatView::from_history(snapshot.chats.clone());
        self.file_names = snapshot.file_names.clone();
        self.current = Some(session_id);
        Ok(snapshot)
    }

    fn require_current(&self) -> Result<String> {
        self.current.clone().ok_or(Error::NoSession)
    }

    pub fn current_session(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn directory(&self) -> Result<SessionDirectory> {
        self.workspace.directory()
    }

    /// "Chat N" label of the current session.
    pub fn chat_name(&self) -> Result<Option<String>> {
        match &self.current {
            Some(session_id) => Ok(self.directory()?.label_for(session_id)),
            None => Ok(None),
        }
    }

    /// Ask the backend for a new session, record it and select it.
    pub async fn new_chat(&mut self) -> Result<String> {
        let session_id = self.backend.new_session().await?;
        self.workspace.create_session(&session_id)?;
        self.selection.store(&session_id)?;
        self.activate(session_id.clone())?;
        info!(session_id = %session_id, "started new chat");
        Ok(session_id)
    }

    /// Select a known session and load its data.
    pub fn switch(&mut self, session_id: &str) -> Result<SessionSnapshot> {
        if !self.workspace.session_exists(session_id)? {
            return Err(Error::NotFound(session_id.to_string()));
        }
        self.selection.store(session_id)?;
        self.activate(session_id.to_string())
    }

    /// Ask a question in the current session.
    ///
    /// The question is shown with a placeholder right away. A backend failure
    /// marks that turn as failed and is not returned as an error; the session
    /// stays usable. Blank questions are ignored.
    pub async fn ask(&mut self, question: &str) -> Result<Option<DisplayedTurn>> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }
        let session_id = self.require_current()?;

        let correlation_id = self.view.begin(question);
        let embeddings = self.workspace.embeddings(&session_id)?;

        match self
            .backend
            .ask(&session_id, question, embeddings.as_deref())
            .await
        {
            Ok(response) => {
                let chats = match self.workspace.append_chat_turn(&session_id, question, &response) {
                    Ok(chats) => chats,
                    Err(e) => {
                        self.view.fail(correlation_id);
                        return Err(e);
                    }
                };
                if let Some(stored) = chats.last() {
                    self.view.resolve(correlation_id, stored);
                }
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "question failed");
                self.view.fail(correlation_id);
            }
        }

        Ok(self.view.get(correlation_id).cloned())
    }

    /// Upload documents for the current session and record the result.
    ///
    /// A failed upload is returned as an error. Saving the returned names and
    /// embeddings follows the workspace's write policy.
    pub async fn upload(&mut self, files: Vec<UploadFile>) -> Result<UploadOutcome> {
        let session_id = self.require_current()?;

        let receipt = self.backend.upload(&session_id, files).await?;
        let outcome = self.workspace.save_upload(
            &session_id,
            &receipt.file_names,
            receipt.embeddings.as_deref(),
        )?;

        if let Some(names) = &outcome.file_names {
            self.file_names = names.clone();
        }
        Ok(outcome)
    }

    /// Delete a session. If it was selected, the selection is cleared.
    ///
    /// On failure nothing changes, including the in-memory state.
    pub fn delete(&mut self, session_id: &str) -> Result<DeletedSession> {
        let deleted = self.workspace.delete_session(session_id)?;

        if self.current.as_deref() == Some(session_id) {
            self.selection.clear()?;
            self.current = None;
            self.view.clear();
            self.file_names.clear();
        }
        Ok(deleted)
    }

    /// Release the database handle.
    pub fn close(self) -> Result<()> {
        self.workspace.close()
    }
}
