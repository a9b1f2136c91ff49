//! Known sessions, newest first, and their "Chat N" labels

use crate::error::Result;
use crate::store::{Index, SessionRecord, Store};

/// Display label for the session at `position` in a newest-first list of
/// `total` sessions. The newest session is `Chat {total}`, the oldest `Chat 1`.
pub fn chat_label(position: usize, total: usize) -> String {
    format!("Chat {}", total.saturating_sub(position))
}

/// Snapshot of the session ids known to the store, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDirectory {
    ids: Vec<String>,
}

impl SessionDirectory {
    /// Scan sessions by timestamp and reverse the order.
    pub fn load(store: &Store) -> Result<Self> {
        let sessions: Vec<SessionRecord> = store.scan_index_all(Index::Timestamp)?;
        let ids = sessions.into_iter().rev().map(|s| s.session_id).collect();
        Ok(Self { ids })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<String> {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.position(session_id).is_some()
    }

    pub fn position(&self, session_id: &str) -> Option<usize> {
        self.ids.iter().position(|id| id == session_id)
    }

    pub fn label_for(&self, session_id: &str) -> Option<String> {
        self.position(session_id)
            .map(|position| chat_label(position, self.len()))
    }

    /// `(session_id, label)` pairs in directory order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        let total = self.len();
        self.ids
            .iter()
            .enumerate()
            .map(move |(position, id)| (id.as_str(), chat_label(position, total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_counts_down_from_total() {
        assert_eq!(chat_label(0, 3), "Chat 3");
        assert_eq!(chat_label(1, 3), "Chat 2");
        assert_eq!(chat_label(2, 3), "Chat 1");
        assert_eq!(chat_label(0, 1), "Chat 1");
    }

    #[test]
    fn empty_store_has_empty_directory() {
        let store = Store::open_in_memory().unwrap();
        let directory = SessionDirectory::load(&store).unwrap();
        assert!(directory.is_empty());
        assert_eq!(directory.entries().count(), 0);
    }

    #[test]
    fn directory_is_newest_first() {
        let store = Store::open_in_memory().unwrap();
        store.put(&SessionRecord::new("s1", 100)).unwrap();
        store.put(&SessionRecord::new("s3", 300)).unwrap();
        store.put(&SessionRecord::new("s2", 200)).unwrap();

        let directory = SessionDirectory::load(&store).unwrap();
        assert_eq!(directory.ids(), ["s3", "s2", "s1"]);
        assert_eq!(directory.position("s2"), Some(1));
        assert_eq!(directory.label_for("s3").as_deref(), Some("Chat 3"));
        assert_eq!(directory.label_for("s1").as_deref(), Some("Chat 1"));
        assert_eq!(directory.label_for("unknown"), None);

        let labels: Vec<_> = directory.entries().map(|(_, label)| label).collect();
        assert_eq!(labels, vec!["Chat 3", "Chat 2", "Chat 1"]);
    }

    #[test]
    fn refreshed_timestamp_moves_session_to_front() {
        let store = Store::open_in_memory().unwrap();
        store.put(&SessionRecord::new("s1", 100)).unwrap();
        store.put(&SessionRecord::new("s2", 200)).unwrap();
        store.put(&SessionRecord::new("s1", 300)).unwrap();

        let directory = SessionDirectory::load(&store).unwrap();
        assert_eq!(directory.ids(), ["s1", "s2"]);
    }
}
