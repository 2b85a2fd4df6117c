//! The capability interface over a live database connection.
//!
//! An [`Engine`] owns one connection for the lifetime of a command invocation. Statements
//! run either directly through its [`Executor`] methods or inside
//! [`Engine::with_tx`], which hands the closure an [`Executor`] bound to an open
//! transaction.
//!
//! Placeholders in parameterised statements are written `$1`, `$2`, ... for every
//! backend; adapters translate them to their driver's native syntax.
//!
//! | Scheme | Adapter | Cargo feature |
//! |--------|---------|---------------|
//! | `file:` | [`SqliteEngine`](crate::sqlite::SqliteEngine) | `sqlite` |
//! | `postgresql:` / `postgres:` | [`PostgresEngine`](crate::postgres::PostgresEngine) | `postgres` |
//! | `mysql:` | [`MysqlEngine`](crate::mysql::MysqlEngine) | `mysql` |

use crate::error::Error;

/// One result row. Every column is read back as nullable text.
pub type Row = Vec<Option<String>>;

/// Statement execution against a connection or an open transaction.
pub trait Executor {
    /// Run a query and collect every row.
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error>;

    /// Run a statement, discarding any result.
    ///
    /// With no `params` the text is sent as a script and may contain several statements,
    /// which is how migration bodies are executed. With `params` it must be a single
    /// statement.
    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<(), Error>;
}

/// A database connection able to scope work in a transaction.
pub trait Engine: Executor {
    /// Run `f` inside a transaction.
    ///
    /// The transaction is committed when `f` returns `Ok` and rolled back when it returns
    /// `Err`; `f`'s error is returned unchanged. A failure to begin or commit the
    /// transaction is returned as well.
    fn with_tx(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Executor) -> Result<(), Error>,
    ) -> Result<(), Error>;
}

/// Open an [`Engine`] for `uri`, choosing the adapter from the URI scheme.
///
/// ```
/// let err = kensen::engine::connect("ftp://x").err().unwrap();
/// assert!(matches!(err, kensen::Error::Configuration(_)));
/// ```
pub fn connect(uri: &str) -> Result<Box<dyn Engine>, Error> {
    if uri.is_empty() {
        return Err(Error::Configuration("database URI is not set".to_string()));
    }

    let scheme = uri.split(':').next().unwrap_or_default();

    #[cfg(feature = "tracing")]
    tracing::debug!(scheme = scheme, "Opening database engine");

    match scheme {
        "file" => open_sqlite(uri),
        "postgresql" | "postgres" => open_postgres(uri),
        "mysql" => open_mysql(uri),
        _ => Err(Error::Configuration(format!(
            "unsupported database URI scheme '{}' (expected file, postgresql or mysql)",
            scheme
        ))),
    }
}

#[allow(dead_code)]
fn not_enabled(scheme: &str) -> Error {
    Error::Configuration(format!(
        "support for '{}' databases is not enabled in this build",
        scheme
    ))
}

#[cfg(feature = "sqlite")]
fn open_sqlite(uri: &str) -> Result<Box<dyn Engine>, Error> {
    Ok(Box::new(crate::sqlite::SqliteEngine::open(uri)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_uri: &str) -> Result<Box<dyn Engine>, Error> {
    Err(not_enabled("file"))
}

#[cfg(feature = "postgres")]
fn open_postgres(uri: &str) -> Result<Box<dyn Engine>, Error> {
    Ok(Box::new(crate::postgres::PostgresEngine::open(uri)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_uri: &str) -> Result<Box<dyn Engine>, Error> {
    Err(not_enabled("postgresql"))
}

#[cfg(feature = "mysql")]
fn open_mysql(uri: &str) -> Result<Box<dyn Engine>, Error> {
    Ok(Box::new(crate::mysql::MysqlEngine::open(uri)?))
}

#[cfg(not(feature = "mysql"))]
fn open_mysql(_uri: &str) -> Result<Box<dyn Engine>, Error> {
    Err(not_enabled("mysql"))
}
