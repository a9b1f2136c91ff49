//! Session-scoped read/write API over the store
//!
//! The store does not enforce relationships between collections; the
//! workspace does. Writes that attach data to a session require the session
//! record to exist, and deleting a session removes its record, chats and
//! files in one transaction.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::directory::SessionDirectory;
use crate::error::{Error, Result};
use crate::store::{ChatTurn, Collection, FileRecord, Index, SessionRecord, Store, TxMode};

/// What to do when a non-critical write (file names, embeddings after an
/// upload) fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Return the error to the caller.
    Strict,
    /// Log a warning and report the skipped write in the outcome.
    #[default]
    LogAndContinue,
}

/// Everything stored for one session, as plain values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// `None` when the session is unknown.
    pub session: Option<SessionRecord>,
    pub chats: Vec<ChatTurn>,
    pub file_names: Vec<String>,
}

impl SessionSnapshot {
    pub fn is_known(&self) -> bool {
        self.session.is_some()
    }

    /// The stored embeddings, if the session exists and an upload produced some.
    pub fn embeddings(&self) -> Option<&[u8]> {
        self.session
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.embeddings.as_slice())
    }
}

/// Result of recording an upload under the workspace's [`WritePolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Updated name list, or `None` if saving the names was skipped.
    pub file_names: Option<Vec<String>>,
    /// The backend returned embeddings for the upload.
    pub embeddings_returned: bool,
    pub embeddings_saved: bool,
}

impl UploadOutcome {
    /// Every write the upload called for was stored.
    pub fn is_complete(&self) -> bool {
        self.file_names.is_some() && (self.embeddings_saved || !self.embeddings_returned)
    }
}

/// Row counts removed by [`Workspace::delete_session`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedSession {
    pub existed: bool,
    pub chats: usize,
    pub files: usize,
}

pub struct Workspace {
    store: Store,
    clock: Box<dyn Clock>,
    policy: WritePolicy,
}

impl Workspace {
    /// Wrap an open store. The clock starts after the newest stored
    /// timestamp, so sessions created now list before every earlier one.
    pub fn new(store: Store) -> Result<Self> {
        let clock = match store.latest_timestamp()? {
            Some(latest) => MonotonicClock::starting_after(latest),
            None => MonotonicClock::new(),
        };
        Ok(Self {
            store,
            clock: Box::new(clock),
            policy: WritePolicy::default(),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Release the database handle.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    // ============================================
    // DIRECTORY
    // ============================================

    /// Known session ids, most recent first.
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self.directory()?.into_ids())
    }

    pub fn directory(&self) -> Result<SessionDirectory> {
        SessionDirectory::load(&self.store)
    }

    pub fn session_exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.store.get::<SessionRecord>(session_id)?.is_some())
    }

    // ============================================
    // READS
    // ============================================

    /// Load a session's record, chats and file names. Unknown sessions yield
    /// an empty snapshot.
    pub fn load_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let chats: Vec<ChatTurn> = self.store.query_by_index(Index::SessionId, session_id)?;
        let session: Option<SessionRecord> = self.store.get(session_id)?;
        let files: Vec<FileRecord> = self.store.query_by_index(Index::SessionId, session_id)?;

        debug!(
            session_id,
            known = session.is_some(),
            chats = chats.len(),
            files = files.len(),
            "loaded session"
        );

        Ok(SessionSnapshot {
            session,
            chats,
            file_names: files.into_iter().map(|f| f.name).collect(),
        })
    }

    /// The session's embeddings, or `None` if it is unknown or has none yet.
    pub fn embeddings(&self, session_id: &str) -> Result<Option<Vec<u8>>> {
        let session: Option<SessionRecord> = self.store.get(session_id)?;
        Ok(session.map(|s| s.embeddings).filter(|blob| !blob.is_empty()))
    }

    // ============================================
    // WRITES
    // ============================================

    /// Record a freshly issued session id with empty embeddings.
    ///
    /// Calling this again with the same id resets the embeddings and
    /// timestamp; chats and files already stored under the id are untouched.
    pub fn create_session(&self, session_id: &str) -> Result<SessionRecord> {
        let record = SessionRecord::new(session_id, self.clock.now_millis());
        self.store.put(&record)?;
        info!(session_id, "created session");
        Ok(record)
    }

    /// Replace a session's embeddings and refresh its timestamp.
    ///
    /// Fails with [`Error::NotFound`] if the session does not exist.
    pub fn save_embeddings(&mut self, session_id: &str, embeddings: &[u8]) -> Result<SessionRecord> {
        let timestamp = self.clock.now_millis();
        let tx = self
            .store
            .transaction(&[Collection::Embeddings], TxMode::ReadWrite)?;

        let mut record: SessionRecord = tx
            .get(session_id)?
            .ok_or_else(|| Error::NotFound(session_id.to_string()))?;
        record.embeddings = embeddings.to_vec();
        record.timestamp = timestamp;
        tx.put(&record)?;
        tx.commit()?;

        debug!(session_id, bytes = embeddings.len(), "saved embeddings");
        Ok(record)
    }

    /// Append a chat turn and return the session's full, ordered chat list.
    pub fn append_chat_turn(
        &mut self,
        session_id: &str,
        question: &str,
        response: &str,
    ) -> Result<Vec<ChatTurn>> {
        let timestamp = self.clock.now_millis();
        let tx = self.store.transaction(
            &[Collection::Embeddings, Collection::Chats],
            TxMode::ReadWrite,
        )?;

        if tx.get::<SessionRecord>(session_id)?.is_none() {
            return Err(Error::NotFound(session_id.to_string()));
        }

        tx.add(&ChatTurn {
            id: None,
            session_id: session_id.to_string(),
            question: question.to_string(),
            response: response.to_string(),
            timestamp,
        })?;
        let chats: Vec<ChatTurn> = tx.query_by_index(Index::SessionId, session_id)?;
        tx.commit()?;

        debug!(session_id, chats = chats.len(), "appended chat turn");
        Ok(chats)
    }

    /// Append one file record per name, in order, and return the session's
    /// full name list. Either all names are stored or none.
    pub fn append_file_names<S: AsRef<str>>(
        &mut self,
        session_id: &str,
        names: &[S],
    ) -> Result<Vec<String>> {
        let tx = self.store.transaction(
            &[Collection::Embeddings, Collection::Files],
            TxMode::ReadWrite,
        )?;

        if tx.get::<SessionRecord>(session_id)?.is_none() {
            return Err(Error::NotFound(session_id.to_string()));
        }

        for name in names {
            tx.add(&FileRecord {
                id: None,
                session_id: session_id.to_string(),
                name: name.as_ref().to_string(),
            })?;
        }
        let files: Vec<FileRecord> = tx.query_by_index(Index::SessionId, session_id)?;
        tx.commit()?;

        debug!(session_id, added = names.len(), total = files.len(), "appended file names");
        Ok(files.into_iter().map(|f| f.name).collect())
    }

    /// Store the result of an upload: file names, then embeddings if the
    /// backend returned any. Failures follow the workspace's [`WritePolicy`].
    pub fn save_upload<S: AsRef<str>>(
        &mut self,
        session_id: &str,
        names: &[S],
        embeddings: Option<&[u8]>,
    ) -> Result<UploadOutcome> {
        let policy = self.policy;

        let file_names = match self.append_file_names(session_id, names) {
            Ok(names) => Some(names),
            Err(e) => skip_or_fail(policy, "file names", session_id, e)?,
        };

        let embeddings_saved = match embeddings {
            Some(blob) => match self.save_embeddings(session_id, blob) {
                Ok(_) => true,
                Err(e) => skip_or_fail(policy, "embeddings", session_id, e)?.unwrap_or(false),
            },
            None => false,
        };

        Ok(UploadOutcome {
            file_names,
            embeddings_returned: embeddings.is_some(),
            embeddings_saved,
        })
    }

    /// Delete the session record and every chat and file of the session in
    /// one transaction.
    ///
    /// Any failure is reported as [`Error::TransactionAborted`] and leaves
    /// the store as it was before the call.
    pub fn delete_session(&mut self, session_id: &str) -> Result<DeletedSession> {
        match delete_footprint(&mut self.store, session_id) {
            Ok(deleted) => {
                info!(
                    session_id,
                    chats = deleted.chats,
                    files = deleted.files,
                    "deleted session"
                );
                Ok(deleted)
            }
            Err(e) => {
                error!(session_id, error = %e, "session deletion aborted");
                Err(e.aborted())
            }
        }
    }
}

fn skip_or_fail<T>(policy: WritePolicy, what: &str, session_id: &str, err: Error) -> Result<Option<T>> {
    match policy {
        WritePolicy::Strict => Err(err),
        WritePolicy::LogAndContinue => {
            warn!(session_id, error = %err, "failed to save {}, continuing", what);
            Ok(None)
        }
    }
}

fn delete_footprint(store: &mut Store, session_id: &str) -> Result<DeletedSession> {
    let tx = store.transaction(&Collection::ALL, TxMode::ReadWrite)?;

    let existed = tx.delete::<SessionRecord>(session_id)? > 0;

    let chats: Vec<ChatTurn> = tx.query_by_index(Index::SessionId, session_id)?;
    for chat in &chats {
        if let Some(id) = chat.id {
            tx.delete::<ChatTurn>(id)?;
        }
    }

    let files: Vec<FileRecord> = tx.query_by_index(Index::SessionId, session_id)?;
    for file in &files {
        if let Some(id) = file.id {
            tx.delete::<FileRecord>(id)?;
        }
    }

    tx.commit()?;

    Ok(DeletedSession {
        existed,
        chats: chats.len(),
        files: files.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::TempDir;

    /// Clock that advances by a fixed step per reading.
    struct StepClock {
        next: AtomicI64,
    }

    impl StepClock {
        fn new(start: i64) -> Self {
            Self {
                next: AtomicI64::new(start),
            }
        }
    }

    impl Clock for StepClock {
        fn now_millis(&self) -> i64 {
            self.next.fetch_add(10, Ordering::Relaxed)
        }
    }

    fn workspace() -> Workspace {
        Workspace::new(Store::open_in_memory().unwrap())
            .unwrap()
            .with_clock(StepClock::new(1_000))
    }

    /// Snapshot of all three collections, for before/after comparisons.
    fn dump(ws: &Workspace) -> (Vec<SessionRecord>, Vec<ChatTurn>, Vec<FileRecord>) {
        let store = ws.store();
        let sessions: Vec<SessionRecord> = store.scan_index_all(Index::Timestamp).unwrap();
        let mut chats: Vec<ChatTurn> = Vec::new();
        let mut files: Vec<FileRecord> = Vec::new();
        for session in &sessions {
            let id = session.session_id.as_str();
            chats.extend(store.query_by_index(Index::SessionId, id).unwrap());
            files.extend(store.query_by_index(Index::SessionId, id).unwrap());
        }
        (sessions, chats, files)
    }

    #[test]
    fn load_unknown_session_is_empty() {
        let ws = workspace();
        let snapshot = ws.load_session("nonexistent").unwrap();
        assert!(!snapshot.is_known());
        assert!(snapshot.chats.is_empty());
        assert!(snapshot.file_names.is_empty());
        assert!(snapshot.embeddings().is_none());
    }

    #[test]
    fn created_session_is_listed_first() {
        let ws = workspace();

        ws.create_session("s1").unwrap();
        assert_eq!(ws.list_sessions().unwrap(), vec!["s1"]);

        ws.create_session("s2").unwrap();
        assert_eq!(ws.list_sessions().unwrap(), vec!["s2", "s1"]);

        let snapshot = ws.load_session("s2").unwrap();
        assert!(snapshot.is_known());
        assert!(snapshot.embeddings().is_none());
    }

    #[test]
    fn sessions_created_back_to_back_keep_order() {
        // Real clock: creations within the same millisecond still order
        let ws = Workspace::new(Store::open_in_memory().unwrap()).unwrap();
        for i in 0..20 {
            ws.create_session(&format!("s{}", i)).unwrap();
        }

        let sessions = ws.list_sessions().unwrap();
        assert_eq!(sessions.len(), 20);
        assert_eq!(sessions[0], "s19");
        assert_eq!(sessions[19], "s0");
    }

    #[test]
    fn create_twice_lists_once() {
        let ws = workspace();
        ws.create_session("s1").unwrap();
        ws.create_session("s2").unwrap();
        ws.create_session("s1").unwrap();

        assert_eq!(ws.list_sessions().unwrap(), vec!["s1", "s2"]);
    }

    #[test]
    fn embeddings_round_trip() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();

        let blob: Vec<u8> = (0..=255u8).chain([0, 0, 255]).collect();
        ws.save_embeddings("s1", &blob).unwrap();

        let snapshot = ws.load_session("s1").unwrap();
        assert_eq!(snapshot.embeddings(), Some(blob.as_slice()));
    }

    #[test]
    fn save_embeddings_refreshes_recency() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();
        ws.create_session("s2").unwrap();

        ws.save_embeddings("s1", b"index").unwrap();

        assert_eq!(ws.list_sessions().unwrap(), vec!["s1", "s2"]);
    }

    #[test]
    fn save_embeddings_rejects_unknown_session() {
        let mut ws = workspace();

        let result = ws.save_embeddings("ghost", b"index");
        assert!(matches!(result, Err(Error::NotFound(id)) if id == "ghost"));
        assert!(ws.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn chat_turns_keep_append_order() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();
        ws.create_session("s2").unwrap();

        let questions: Vec<String> = (0..8).map(|i| format!("question {}", i)).collect();
        for (i, question) in questions.iter().enumerate() {
            let chats = ws.append_chat_turn("s1", question, "answer").unwrap();
            assert_eq!(chats.len(), i + 1);
            assert_eq!(chats.last().unwrap().question, *question);
            // Interleave writes to another session
            ws.append_chat_turn("s2", "noise", "noise").unwrap();
        }

        let snapshot = ws.load_session("s1").unwrap();
        let loaded: Vec<_> = snapshot.chats.iter().map(|c| c.question.clone()).collect();
        assert_eq!(loaded, questions);
        assert!(snapshot.chats.iter().all(|c| c.session_id == "s1"));
        assert!(snapshot.chats.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn append_chat_turn_rejects_unknown_session() {
        let mut ws = workspace();
        let result = ws.append_chat_turn("ghost", "q", "r");
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(ws.store().count(Collection::Chats).unwrap(), 0);
    }

    #[test]
    fn file_names_append_in_order() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();

        let names = ws.append_file_names("s1", &["a", "b", "c"]).unwrap();
        assert_eq!(names, vec!["a", "b", "c"]);
        let names = ws.append_file_names("s1", &["d"]).unwrap();
        assert_eq!(names, vec!["a", "b", "c", "d"]);

        let snapshot = ws.load_session("s1").unwrap();
        assert_eq!(snapshot.file_names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn duplicate_file_names_are_kept() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();

        ws.append_file_names("s1", &["a.pdf"]).unwrap();
        let names = ws.append_file_names("s1", &["a.pdf"]).unwrap();
        assert_eq!(names, vec!["a.pdf", "a.pdf"]);
    }

    #[test]
    fn append_file_names_rejects_unknown_session() {
        let mut ws = workspace();
        let result = ws.append_file_names("ghost", &["a.pdf"]);
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(ws.store().count(Collection::Files).unwrap(), 0);
    }

    #[test]
    fn delete_removes_entire_footprint() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();
        ws.create_session("s2").unwrap();
        ws.save_embeddings("s1", b"index").unwrap();
        ws.append_chat_turn("s1", "q1", "r1").unwrap();
        ws.append_chat_turn("s1", "q2", "r2").unwrap();
        ws.append_file_names("s1", &["a.pdf", "b.pdf"]).unwrap();
        ws.append_chat_turn("s2", "other", "kept").unwrap();

        let deleted = ws.delete_session("s1").unwrap();
        assert_eq!(
            deleted,
            DeletedSession {
                existed: true,
                chats: 2,
                files: 2
            }
        );

        let snapshot = ws.load_session("s1").unwrap();
        assert!(snapshot.session.is_none());
        assert!(snapshot.chats.is_empty());
        assert!(snapshot.file_names.is_empty());
        assert_eq!(ws.list_sessions().unwrap(), vec!["s2"]);
        assert_eq!(ws.load_session("s2").unwrap().chats.len(), 1);
    }

    #[test]
    fn delete_empty_and_unknown_sessions() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();

        let deleted = ws.delete_session("s1").unwrap();
        assert!(deleted.existed);
        assert_eq!(deleted.chats + deleted.files, 0);

        let deleted = ws.delete_session("ghost").unwrap();
        assert!(!deleted.existed);
    }

    #[test]
    fn failed_delete_leaves_all_collections_untouched() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();
        ws.save_embeddings("s1", b"index").unwrap();
        ws.append_chat_turn("s1", "q1", "r1").unwrap();
        ws.append_chat_turn("s1", "q2", "r2").unwrap();
        ws.append_file_names("s1", &["a.pdf"]).unwrap();

        let before = dump(&ws);

        // Fails after the session record and chats have been deleted
        ws.store()
            .connection()
            .execute_batch(
                "CREATE TRIGGER fail_file_delete BEFORE DELETE ON files
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )
            .unwrap();

        let result = ws.delete_session("s1");
        assert!(matches!(result, Err(Error::TransactionAborted(_))));
        assert_eq!(dump(&ws), before);

        let snapshot = ws.load_session("s1").unwrap();
        assert!(snapshot.is_known());
        assert_eq!(snapshot.chats.len(), 2);
        assert_eq!(snapshot.file_names, vec!["a.pdf"]);
    }

    #[test]
    fn recreated_session_does_not_resurrect_old_data() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();
        ws.append_chat_turn("s1", "q1", "r1").unwrap();
        ws.append_chat_turn("s1", "q2", "r2").unwrap();
        ws.append_file_names("s1", &["old.pdf"]).unwrap();

        ws.delete_session("s1").unwrap();
        ws.create_session("s1").unwrap();

        let snapshot = ws.load_session("s1").unwrap();
        assert!(snapshot.is_known());
        assert!(snapshot.chats.is_empty());
        assert!(snapshot.file_names.is_empty());
        assert!(snapshot.embeddings().is_none());

        let chats = ws.append_chat_turn("s1", "fresh", "start").unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].question, "fresh");
    }

    #[test]
    fn save_upload_stores_names_and_embeddings() {
        let mut ws = workspace();
        ws.create_session("s1").unwrap();

        let outcome = ws
            .save_upload("s1", &["a.pdf", "b.pdf"], Some(b"index".as_slice()))
            .unwrap();
        assert_eq!(outcome.file_names, Some(vec!["a.pdf".to_string(), "b.pdf".to_string()]));
        assert!(outcome.embeddings_saved);
        assert!(outcome.is_complete());
        assert_eq!(ws.load_session("s1").unwrap().embeddings(), Some(b"index".as_slice()));
    }

    #[test]
    fn save_upload_log_and_continue_skips_failed_writes() {
        let mut ws = workspace().with_policy(WritePolicy::LogAndContinue);
        ws.create_session("s1").unwrap();
        ws.store()
            .connection()
            .execute_batch(
                "CREATE TRIGGER fail_file_insert BEFORE INSERT ON files
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )
            .unwrap();

        let outcome = ws
            .save_upload("s1", &["a.pdf"], Some(b"index".as_slice()))
            .unwrap();
        assert_eq!(outcome.file_names, None);
        assert!(outcome.embeddings_saved);
        assert!(!outcome.is_complete());
        assert!(ws.load_session("s1").unwrap().file_names.is_empty());
    }

    #[test]
    fn save_upload_log_and_continue_on_unknown_session() {
        let mut ws = workspace().with_policy(WritePolicy::LogAndContinue);

        let outcome = ws
            .save_upload("ghost", &["a.pdf"], Some(b"index".as_slice()))
            .unwrap();
        assert_eq!(outcome.file_names, None);
        assert!(outcome.embeddings_returned);
        assert!(!outcome.embeddings_saved);
        assert!(!outcome.is_complete());
        assert!(ws.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn save_upload_strict_propagates_failure() {
        let mut ws = workspace().with_policy(WritePolicy::Strict);

        let result = ws.save_upload("ghost", &["a.pdf"], None);
        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn workspace_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chat.db");

        let mut ws = Workspace::new(Store::open(&path).unwrap()).unwrap();
        ws.create_session("s1").unwrap();
        ws.append_chat_turn("s1", "q", "r").unwrap();
        ws.close().unwrap();

        let ws = Workspace::new(Store::open(&path).unwrap()).unwrap();
        assert_eq!(ws.list_sessions().unwrap(), vec!["s1"]);
        assert_eq!(ws.load_session("s1").unwrap().chats.len(), 1);
    }

    #[test]
    fn reopened_workspace_lists_new_sessions_first() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chat.db");

        // Stored timestamps can run ahead of the wall clock
        let ahead = Utc::now().timestamp_millis() + 60_000;
        let ws = Workspace::new(Store::open(&path).unwrap())
            .unwrap()
            .with_clock(StepClock::new(ahead));
        ws.create_session("old").unwrap();
        ws.close().unwrap();

        let ws = Workspace::new(Store::open(&path).unwrap()).unwrap();
        let created = ws.create_session("new").unwrap();
        assert!(created.timestamp > ahead);
        assert_eq!(ws.list_sessions().unwrap(), vec!["new", "old"]);
    }
}
