//! Collections, indices and the record types stored in them.

use std::fmt;

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{Row, ToSql};
use serde::{Deserialize, Serialize};

/// The three collections of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Session records, keyed by session id.
    Embeddings,
    /// Chat turns, keyed by surrogate id.
    Chats,
    /// Uploaded file names, keyed by surrogate id.
    Files,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Embeddings, Collection::Chats, Collection::Files];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Embeddings => "embeddings",
            Collection::Chats => "chats",
            Collection::Files => "files",
        }
    }

    /// All columns, primary key first.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Collection::Embeddings => &["session_id", "embeddings", "timestamp"],
            Collection::Chats => &["id", "session_id", "question", "response", "timestamp"],
            Collection::Files => &["id", "session_id", "name"],
        }
    }

    pub fn key_column(self) -> &'static str {
        self.columns()[0]
    }

    pub fn indexes(self) -> &'static [Index] {
        match self {
            Collection::Embeddings => &[Index::Timestamp],
            Collection::Chats | Collection::Files => &[Index::SessionId],
        }
    }

    pub fn has_index(self, index: Index) -> bool {
        self.indexes().contains(&index)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Secondary indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    Timestamp,
    SessionId,
}

impl Index {
    pub fn column(self) -> &'static str {
        match self {
            Index::Timestamp => "timestamp",
            Index::SessionId => "session_id",
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A primary key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Text(String),
    Id(i64),
}

impl Key {
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Key::Id(id) => Some(*id),
            Key::Text(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => f.write_str(s),
            Key::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Id(id)
    }
}

impl ToSql for Key {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Key::Text(s) => s.to_sql(),
            Key::Id(id) => id.to_sql(),
        }
    }
}

/// A row type that lives in exactly one collection.
pub trait Record: Sized {
    const COLLECTION: Collection;

    /// Build the record from a row selected with `COLLECTION.columns()`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Column values in `COLLECTION.columns()` order. A `Null` key asks the
    /// store to generate one.
    fn to_values(&self) -> Vec<Value>;
}

/// Session metadata and the embeddings blob for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub embeddings: Vec<u8>,
    pub timestamp: i64,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            session_id: session_id.into(),
            embeddings: Vec::new(),
            timestamp,
        }
    }

    /// True until an upload has produced embeddings.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

impl Record for SessionRecord {
    const COLLECTION: Collection = Collection::Embeddings;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            embeddings: row.get(1)?,
            timestamp: row.get(2)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.session_id.clone()),
            Value::Blob(self.embeddings.clone()),
            Value::Integer(self.timestamp),
        ]
    }
}

/// One question/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `None` until the store has assigned a key.
    pub id: Option<i64>,
    pub session_id: String,
    pub question: String,
    pub response: String,
    pub timestamp: i64,
}

impl Record for ChatTurn {
    const COLLECTION: Collection = Collection::Chats;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            question: row.get(2)?,
            response: row.get(3)?,
            timestamp: row.get(4)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.map_or(Value::Null, Value::Integer),
            Value::Text(self.session_id.clone()),
            Value::Text(self.question.clone()),
            Value::Text(self.response.clone()),
            Value::Integer(self.timestamp),
        ]
    }
}

/// The display name of one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Option<i64>,
    pub session_id: String,
    pub name: String,
}

impl Record for FileRecord {
    const COLLECTION: Collection = Collection::Files;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            name: row.get(2)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.map_or(Value::Null, Value::Integer),
            Value::Text(self.session_id.clone()),
            Value::Text(self.name.clone()),
        ]
    }
}
