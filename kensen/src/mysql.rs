//!
//! # MySQL engine
//!
//! This module provides the MySQL [`Engine`] using the [`mysql`](https://crates.io/crates/mysql) crate.
//!
//! ## MySQL DDL Behavior
//!
//! **IMPORTANT**: In MySQL, DDL statements (CREATE TABLE, ALTER TABLE, DROP TABLE, etc.)
//! cause an implicit commit and cannot be rolled back. [`Engine::with_tx`] still opens a
//! transaction around each migration, but only the DML part of a failing migration is
//! undone. DDL statements that ran before the failure stay applied, and the migration
//! name is not recorded, so the next run will try the file again.
//!
//! Keep MySQL migrations small and idempotent (`IF NOT EXISTS` / `IF EXISTS`) so that a
//! retried file does not trip over its own half-applied DDL.
//!
//! ## Placeholders
//!
//! `$1`, `$2`, ... placeholders are rewritten to `?` before a statement is prepared, and
//! parameters are reordered to match. Placeholders inside string literals are not
//! recognised; pass such values as parameters instead.

use crate::engine::{Engine, Executor, Row};
use crate::error::Error;
use mysql::prelude::*;
use mysql::{Conn, Opts, Params, TxOpts, Value};

// Re-export the mysql connection for callers building an engine from their own handle
pub use mysql::Conn as MysqlConn;

/// An [`Engine`] over a single [`mysql::Conn`].
#[derive(Debug)]
pub struct MysqlEngine {
    conn: Conn,
}

impl MysqlEngine {
    /// Connect to the server named by a `mysql://` URL.
    pub fn open(uri: &str) -> Result<Self, Error> {
        let opts = Opts::from_url(uri).map_err(|e| Error::Connection(e.to_string()))?;
        let conn = Conn::new(opts).map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Wrap an already open connection.
    pub fn from_conn(conn: Conn) -> Self {
        Self { conn }
    }
}

impl Executor for MysqlEngine {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        query(&mut self.conn, sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<(), Error> {
        execute(&mut self.conn, sql, params)
    }
}

impl Engine for MysqlEngine {
    fn with_tx(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Executor) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut tx = self.conn.start_transaction(TxOpts::default())?;

        let result = f(&mut Scoped(&mut tx));

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

struct Scoped<'a, 'conn>(&'a mut mysql::Transaction<'conn>);

impl Executor for Scoped<'_, '_> {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        query(self.0, sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<(), Error> {
        execute(self.0, sql, params)
    }
}

fn query<Q: Queryable>(conn: &mut Q, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
    let rows: Vec<mysql::Row> = if params.is_empty() {
        conn.query(sql)?
    } else {
        let (sql, values) = positional(sql, params)?;
        conn.exec(sql, Params::Positional(values))?
    };

    Ok(rows
        .into_iter()
        .map(|row| row.unwrap().into_iter().map(text).collect())
        .collect())
}

fn execute<Q: Queryable>(conn: &mut Q, sql: &str, params: &[&str]) -> Result<(), Error> {
    if params.is_empty() {
        // The text protocol accepts several statements separated by semicolons.
        conn.query_drop(sql)?;
    } else {
        let (sql, values) = positional(sql, params)?;
        conn.exec_drop(sql, Params::Positional(values))?;
    }
    Ok(())
}

/// Rewrite `$N` placeholders to `?`, returning the parameters in placeholder order.
fn positional(sql: &str, params: &[&str]) -> Result<(String, Vec<Value>), Error> {
    let mut rewritten = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            rewritten.push(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            rewritten.push('$');
            continue;
        }

        let param = digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| params.get(i))
            .ok_or_else(|| {
                Error::Generic(format!(
                    "placeholder ${} has no matching parameter ({} given)",
                    digits,
                    params.len()
                ))
            })?;
        rewritten.push('?');
        values.push(Value::Bytes(param.as_bytes().to_vec()));
    }

    Ok((rewritten, values))
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        other => Some(other.as_sql(true).trim_matches('\'').to_string()),
    }
}
