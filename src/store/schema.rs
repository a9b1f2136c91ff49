//! SQLite schema definition
//!
//! The schema version is kept in `PRAGMA user_version`. A fresh file starts at
//! version 0 and is upgraded to `SCHEMA_VERSION` in a single step.

/// Version written to `user_version` once `SCHEMA` has been applied.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &str = r#"
-- ============================================
-- SESSIONS
-- ============================================

-- One row per session; the row's existence is what makes a session known
CREATE TABLE IF NOT EXISTS embeddings (
    session_id TEXT PRIMARY KEY NOT NULL,  -- Opaque id issued by the backend
    embeddings BLOB NOT NULL DEFAULT x'',  -- Backend-defined blob, empty before upload
    timestamp INTEGER NOT NULL             -- Monotonic millis, ordering only
);

-- ============================================
-- CHAT TURNS
-- ============================================

-- AUTOINCREMENT so ids are never reused after a delete
CREATE TABLE IF NOT EXISTS chats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    question TEXT NOT NULL,
    response TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

-- ============================================
-- UPLOADED FILES
-- ============================================

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    name TEXT NOT NULL
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_embeddings_timestamp ON embeddings(timestamp);
CREATE INDEX IF NOT EXISTS idx_chats_session ON chats(session_id);
CREATE INDEX IF NOT EXISTS idx_files_session ON files(session_id);
"#;
