//!
//! # SQLite engine
//!
//! This module provides the SQLite [`Engine`] using the [`rusqlite`](https://crates.io/crates/rusqlite) crate.
//!
//! The database URI is handed to SQLite as a
//! [URI filename](https://www.sqlite.org/uri.html), so `file:///var/db/app.db`,
//! `file:app.db?mode=rwc` and `file::memory:` all work.
//!
//! SQLite supports transactional DDL: when a migration fails, everything it did
//! (including `CREATE TABLE`) is rolled back.

use crate::engine::{Engine, Executor, Row};
use crate::error::Error;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};

// Re-export the rusqlite connection for callers building an engine from their own handle
pub use rusqlite::Connection as SqliteConnection;

/// An [`Engine`] over a single [`rusqlite::Connection`].
#[derive(Debug)]
pub struct SqliteEngine {
    conn: Connection,
}

impl SqliteEngine {
    /// Open the database named by a SQLite URI filename.
    pub fn open(uri: &str) -> Result<Self, Error> {
        let conn = Connection::open_with_flags(uri, OpenFlags::default())
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Executor for SqliteEngine {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        query(&self.conn, sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<(), Error> {
        execute(&self.conn, sql, params)
    }
}

impl Engine for SqliteEngine {
    fn with_tx(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Executor) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let tx = self.conn.transaction()?;

        let result = f(&mut Scoped(&tx));

        match result {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(err) => {
                if let Err(_rollback_err) = tx.rollback() {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Executor bound to an open transaction. `rusqlite::Transaction` derefs to the
/// connection, so statements run through it belong to the transaction.
struct Scoped<'a>(&'a Connection);

impl Executor for Scoped<'_> {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        query(self.0, sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<(), Error> {
        execute(self.0, sql, params)
    }
}

fn query(conn: &Connection, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
    let mut stmt = conn.prepare(sql)?;
    let columns = stmt.column_count();
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            (0..columns)
                .map(|i| row.get_ref(i).map(text))
                .collect::<rusqlite::Result<Row>>()
        })?
        .collect::<rusqlite::Result<Vec<Row>>>()?;
    Ok(rows)
}

fn execute(conn: &Connection, sql: &str, params: &[&str]) -> Result<(), Error> {
    if params.is_empty() {
        conn.execute_batch(sql)?;
    } else {
        conn.execute(sql, params_from_iter(params.iter()))?;
    }
    Ok(())
}

fn text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
