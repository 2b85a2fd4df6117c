#![cfg_attr(docsrs, feature(doc_cfg))]
//! `kensen` is a small runner for plain-SQL schema migrations.
//!
//! Migrations are `.sql` files in a single directory, named `YYYY-MM-DD-<name>.sql` so that
//! sorting by name sorts them by creation date. Applied migrations are recorded by name in a
//! table called `kensen`. Running [`Kensen::apply`] walks the directory in order, skips what
//! is already recorded and applies the rest, stopping at the first failure.
//!
//! # Example
//!
//! ```
//! use kensen::{Kensen, Status};
//!
//! # fn main() -> Result<(), kensen::Error> {
//! let dir = tempfile::tempdir()?;
//! let migrations = dir.path().join("migrations");
//! std::fs::create_dir(&migrations)?;
//! std::fs::write(
//!     migrations.join("2024-01-01-create-users.sql"),
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
//! )?;
//!
//! let uri = format!("file:{}", dir.path().join("app.db").display());
//! let mut kensen = Kensen::create(&uri, &migrations)?;
//! kensen.init()?;
//!
//! let report = kensen.apply()?;
//! assert_eq!(report[0].status, Status::Applied);
//!
//! // Running again is a no-op
//! let report = kensen.apply()?;
//! assert_eq!(report[0].status, Status::Skipped);
//! # Ok(())
//! # }
//! ```
//!
//! # Benefits
//! - Each migration and its bookkeeping row commit together, or not at all.
//! - Re-running is always safe: applied migrations are skipped.
//! - Preview support through [`Kensen::pending`] and [`Kensen::status`].
//! - Observability hooks.
//! - Tracing integration - available with the `tracing` feature flag.
//!
//! # Database support
//!
//! - [`SQLite`](sqlite) - `file:` URIs, available with the `sqlite` feature flag.
//! - [`MySQL`](mysql) - `mysql://` URIs, available with the `mysql` feature flag.
//! - [`PostgreSQL`](postgres) - `postgres://` and `postgresql://` URIs, available with the
//!   `postgres` feature flag.

mod core;
pub use core::{
    Kensen, MigrationState, MigrationStatus, Status, StatusReport, MIGRATION_PLACEHOLDER,
};

mod error;
pub use error::{Error, Stage};

pub mod engine;
pub use engine::{connect, Engine, Executor, Row};

pub mod store;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(all(test, feature = "mysql"))]
pub(crate) mod test_mysql;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
