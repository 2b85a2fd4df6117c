//! Read-side helpers: which migrations are applied, and which exist on disk.

use std::fs;
use std::path::Path;

use crate::engine::Executor;
use crate::error::Error;

/// Name of the bookkeeping table recording applied migrations.
pub const MIGRATIONS_TABLE: &str = "kensen";

/// File extension of migration files.
pub const MIGRATION_EXTENSION: &str = "sql";

/// Statement creating the bookkeeping table. `VARCHAR(255)` rather than `TEXT` because
/// MySQL cannot index an unbounded text column.
pub(crate) fn create_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (name VARCHAR(255) NOT NULL UNIQUE)",
        MIGRATIONS_TABLE
    )
}

pub(crate) fn insert_sql() -> String {
    format!("INSERT INTO {} (name) VALUES ($1)", MIGRATIONS_TABLE)
}

/// Names recorded in the bookkeeping table, ascending.
pub fn applied<E: Executor + ?Sized>(engine: &mut E) -> Result<Vec<String>, Error> {
    let rows = engine.query(
        &format!("SELECT name FROM {} ORDER BY name ASC", MIGRATIONS_TABLE),
        &[],
    )?;

    Ok(rows
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect())
}

/// Names of the `*.sql` files directly inside `dir`, without their extension, ascending.
///
/// Subdirectories, other extensions and names that are not valid UTF-8 are ignored.
pub fn available(dir: &Path) -> Result<Vec<String>, Error> {
    let mut migrations = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(MIGRATION_EXTENSION) {
            continue;
        }
        if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
            migrations.push(name.to_string());
        }
    }

    // Directory order is not guaranteed; names start with a date so this is chronological.
    migrations.sort();

    Ok(migrations)
}
