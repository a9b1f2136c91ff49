//! Session storage with SQLite
//!
//! Three collections (`embeddings`, `chats`, `files`) with typed CRUD, index
//! scans and scoped multi-collection transactions. Every primitive is
//! available both on [`Store`] and on an open [`Tx`].

mod records;
mod schema;

use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, ToSql, Transaction,
    TransactionBehavior,
};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use records::{ChatTurn, Collection, FileRecord, Index, Key, Record, SessionRecord};
pub use schema::{SCHEMA, SCHEMA_VERSION};

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Owned handle to the session database.
pub struct Store {
    conn: Connection,
    location: String,
}

impl Store {
    /// Open the database at `path`, creating and upgrading it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let location = path.display().to_string();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::StorageUnavailable(format!("{}: {}", location, e)))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::StorageUnavailable(format!("{}: {}", location, e)))?;
        let mut store = Self { conn, location };
        store.init_schema()?;
        info!(path = %store.location, "session store opened");
        Ok(store)
    }

    /// Open a private in-memory database with the same schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::StorageUnavailable(format!(":memory:: {}", e)))?;
        let mut store = Self {
            conn,
            location: ":memory:".to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&mut self) -> Result<()> {
        let unavailable =
            |e: rusqlite::Error| Error::StorageUnavailable(format!("{}: {}", self.location, e));

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(unavailable)?;

        if version > SCHEMA_VERSION {
            return Err(Error::StorageUnavailable(format!(
                "{}: schema version {} is newer than supported version {}",
                self.location, version, SCHEMA_VERSION
            )));
        }

        if version < SCHEMA_VERSION {
            let tx = self.conn.transaction().map_err(unavailable)?;
            tx.execute_batch(SCHEMA).map_err(unavailable)?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(unavailable)?;
            tx.commit().map_err(unavailable)?;
            info!(from = version, to = SCHEMA_VERSION, "upgraded store schema");
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    #[cfg(test)]
    pub(crate) fn schema_version(&self) -> Result<i64> {
        let version = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    /// Close the handle, reporting any error SQLite raises while doing so.
    pub fn close(self) -> Result<()> {
        let location = self.location;
        self.conn.close().map_err(|(_, e)| Error::from(e))?;
        debug!(path = %location, "session store closed");
        Ok(())
    }

    // ============================================
    // PRIMITIVES
    // ============================================

    pub fn get<R: Record>(&self, key: impl Into<Key>) -> Result<Option<R>> {
        get(&self.conn, &key.into())
    }

    pub fn put<R: Record>(&self, record: &R) -> Result<Key> {
        put(&self.conn, record)
    }

    pub fn add<R: Record>(&self, record: &R) -> Result<Key> {
        add(&self.conn, record)
    }

    pub fn delete<R: Record>(&self, key: impl Into<Key>) -> Result<usize> {
        delete::<R>(&self.conn, &key.into())
    }

    pub fn query_by_index<R: Record>(&self, index: Index, value: impl ToSql) -> Result<Vec<R>> {
        query_by_index(&self.conn, index, value)
    }

    pub fn scan_index_all<R: Record>(&self, index: Index) -> Result<Vec<R>> {
        scan_index_all(&self.conn, index)
    }

    #[cfg(test)]
    pub(crate) fn count(&self, collection: Collection) -> Result<usize> {
        count(&self.conn, collection)
    }

    /// Largest timestamp stored in the session collection, if any.
    pub fn latest_timestamp(&self) -> Result<Option<i64>> {
        let collection = Collection::Embeddings;
        let sql = format!(
            "SELECT MAX({}) FROM {}",
            Index::Timestamp.column(),
            collection.table()
        );
        let latest = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(latest)
    }

    /// Begin a transaction scoped to `scope`.
    ///
    /// Nothing written through the returned [`Tx`] is visible to later reads
    /// on the store until [`Tx::commit`] succeeds; dropping it rolls back.
    pub fn transaction(&mut self, scope: &[Collection], mode: TxMode) -> Result<Tx<'_>> {
        let behavior = match mode {
            TxMode::ReadOnly => TransactionBehavior::Deferred,
            TxMode::ReadWrite => TransactionBehavior::Immediate,
        };
        let inner = self.conn.transaction_with_behavior(behavior)?;
        Ok(Tx {
            inner,
            scope: scope.to_vec(),
            mode,
        })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// A multi-collection transaction; all writes commit together or not at all.
pub struct Tx<'a> {
    inner: Transaction<'a>,
    scope: Vec<Collection>,
    mode: TxMode,
}

impl Tx<'_> {
    fn check(&self, collection: Collection, write: bool) -> Result<()> {
        if !self.scope.contains(&collection) {
            return Err(Error::OutOfScope(collection));
        }
        if write && self.mode == TxMode::ReadOnly {
            return Err(Error::ReadOnly(collection));
        }
        Ok(())
    }

    pub fn get<R: Record>(&self, key: impl Into<Key>) -> Result<Option<R>> {
        self.check(R::COLLECTION, false)?;
        get(&self.inner, &key.into())
    }

    pub fn put<R: Record>(&self, record: &R) -> Result<Key> {
        self.check(R::COLLECTION, true)?;
        put(&self.inner, record)
    }

    pub fn add<R: Record>(&self, record: &R) -> Result<Key> {
        self.check(R::COLLECTION, true)?;
        add(&self.inner, record)
    }

    pub fn delete<R: Record>(&self, key: impl Into<Key>) -> Result<usize> {
        self.check(R::COLLECTION, true)?;
        delete::<R>(&self.inner, &key.into())
    }

    pub fn query_by_index<R: Record>(&self, index: Index, value: impl ToSql) -> Result<Vec<R>> {
        self.check(R::COLLECTION, false)?;
        query_by_index(&self.inner, index, value)
    }

    pub fn scan_index_all<R: Record>(&self, index: Index) -> Result<Vec<R>> {
        self.check(R::COLLECTION, false)?;
        scan_index_all(&self.inner, index)
    }

    /// Make every write durable. A failure here means nothing was applied.
    pub fn commit(self) -> Result<()> {
        self.inner.commit().map_err(|e| Error::from(e).aborted())?;
        debug!(scope = ?self.scope, "transaction committed");
        Ok(())
    }

    /// Discard every write issued through this transaction.
    pub fn abort(self) -> Result<()> {
        self.inner.rollback()?;
        debug!(scope = ?self.scope, "transaction rolled back");
        Ok(())
    }
}

// ============================================
// SQL
// ============================================

fn select_sql(collection: Collection) -> String {
    format!(
        "SELECT {} FROM {}",
        collection.columns().join(", "),
        collection.table()
    )
}

fn ensure_index(collection: Collection, index: Index) -> Result<()> {
    if collection.has_index(index) {
        Ok(())
    } else {
        Err(Error::UnknownIndex { collection, index })
    }
}

fn get<R: Record>(conn: &Connection, key: &Key) -> Result<Option<R>> {
    let collection = R::COLLECTION;
    let sql = format!("{} WHERE {} = ?1", select_sql(collection), collection.key_column());
    let record = conn
        .query_row(&sql, params![key], |row| R::from_row(row))
        .optional()?;
    Ok(record)
}

fn insert<R: Record>(conn: &Connection, record: &R, verb: &str) -> rusqlite::Result<Key> {
    let collection = R::COLLECTION;
    let values = record.to_values();
    let placeholders = (1..=values.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "{} INTO {} ({}) VALUES ({})",
        verb,
        collection.table(),
        collection.columns().join(", "),
        placeholders
    );
    conn.execute(&sql, params_from_iter(values.iter()))?;

    let key = match &values[0] {
        Value::Text(s) => Key::Text(s.clone()),
        Value::Integer(id) => Key::Id(*id),
        _ => Key::Id(conn.last_insert_rowid()),
    };
    Ok(key)
}

fn put<R: Record>(conn: &Connection, record: &R) -> Result<Key> {
    Ok(insert(conn, record, "INSERT OR REPLACE")?)
}

fn add<R: Record>(conn: &Connection, record: &R) -> Result<Key> {
    match insert(conn, record, "INSERT") {
        Ok(key) => Ok(key),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation
                && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) =>
        {
            let key = match &record.to_values()[0] {
                Value::Text(s) => s.clone(),
                Value::Integer(id) => id.to_string(),
                other => format!("{:?}", other),
            };
            Err(Error::DuplicateKey {
                collection: R::COLLECTION,
                key,
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn delete<R: Record>(conn: &Connection, key: &Key) -> Result<usize> {
    let collection = R::COLLECTION;
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1",
        collection.table(),
        collection.key_column()
    );
    Ok(conn.execute(&sql, params![key])?)
}

fn query_by_index<R: Record>(conn: &Connection, index: Index, value: impl ToSql) -> Result<Vec<R>> {
    let collection = R::COLLECTION;
    ensure_index(collection, index)?;

    let sql = format!(
        "{} WHERE {} = ?1 ORDER BY {}",
        select_sql(collection),
        index.column(),
        collection.key_column()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![value], |row| R::from_row(row))?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

fn scan_index_all<R: Record>(conn: &Connection, index: Index) -> Result<Vec<R>> {
    let collection = R::COLLECTION;
    ensure_index(collection, index)?;

    let sql = format!(
        "{} ORDER BY {}, {}",
        select_sql(collection),
        index.column(),
        collection.key_column()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| R::from_row(row))?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

#[cfg(test)]
fn count(conn: &Connection, collection: Collection) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
    let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(n as usize)
}
