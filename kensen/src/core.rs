use crate::engine::{self, Engine};
use crate::error::{Error, Stage};
use crate::store::{self, MIGRATION_EXTENSION};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Content written into newly created migration files.
pub const MIGRATION_PLACEHOLDER: &str = "-- your sql code";

/// Outcome of a single migration during an apply run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The migration ran and was recorded.
    Applied,
    /// The migration was already recorded; nothing was done.
    Skipped,
    /// The migration failed. The run stopped here.
    Errored,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Applied => f.write_str("applied"),
            Status::Skipped => f.write_str("skipped"),
            Status::Errored => f.write_str("errored"),
        }
    }
}

/// Per-migration entry of the report returned by [`Kensen::apply`].
#[derive(Debug, PartialEq)]
pub struct MigrationStatus {
    pub migration: String,
    pub status: Status,
    /// Set only when `status` is [`Status::Errored`].
    pub error: Option<Error>,
}

impl MigrationStatus {
    fn applied(migration: String) -> Self {
        Self {
            migration,
            status: Status::Applied,
            error: None,
        }
    }

    fn skipped(migration: String) -> Self {
        Self {
            migration,
            status: Status::Skipped,
            error: None,
        }
    }

    fn errored(migration: String, error: Error) -> Self {
        Self {
            migration,
            status: Status::Errored,
            error: Some(error),
        }
    }
}

/// Whether a migration file on disk has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub migration: String,
    pub applied: bool,
}

/// Snapshot of the migrations directory against the bookkeeping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Every migration file, ascending.
    pub migrations: Vec<MigrationState>,
    /// Names recorded as applied that have no file on disk, ascending.
    pub orphaned: Vec<String>,
}

impl StatusReport {
    /// Names that the next [`Kensen::apply`] would attempt, in order.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.migrations
            .iter()
            .filter(|m| !m.applied)
            .map(|m| m.migration.as_str())
    }
}

/// The migration runner: one database connection plus one migrations directory.
pub struct Kensen {
    engine: Box<dyn Engine>,
    migrations_path: PathBuf,
    cancel: Option<Arc<AtomicBool>>,
    on_migration_start: Option<Box<dyn Fn(&str) + Send + Sync>>,
    on_migration_complete: Option<Box<dyn Fn(&str, Duration) + Send + Sync>>,
    on_migration_skipped: Option<Box<dyn Fn(&str) + Send + Sync>>,
    on_migration_error: Option<Box<dyn Fn(&str, &Error) + Send + Sync>>,
}

// Manual Debug impl since closures and trait objects don't implement Debug
impl fmt::Debug for Kensen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kensen")
            .field("migrations_path", &self.migrations_path)
            .field("cancel", &self.cancel)
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .field("on_migration_skipped", &self.on_migration_skipped.is_some())
            .field("on_migration_error", &self.on_migration_error.is_some())
            .finish()
    }
}

impl Kensen {
    /// Validate the inputs and connect to the database named by `uri`.
    ///
    /// Fails with [`Error::Configuration`] when the URI is empty, its scheme is not
    /// supported or the migrations directory does not exist, and with
    /// [`Error::Connection`] when the driver cannot connect. Nothing is returned on
    /// failure.
    pub fn create(uri: &str, migrations_path: impl AsRef<Path>) -> Result<Self, Error> {
        if uri.is_empty() {
            return Err(Error::Configuration("database URI is not set".to_string()));
        }
        let migrations_path = check_migrations_path(migrations_path.as_ref())?;
        let engine = engine::connect(uri)?;
        Ok(Self::build(engine, migrations_path))
    }

    /// Build a runner around an engine the caller has already opened.
    pub fn with_engine(
        engine: Box<dyn Engine>,
        migrations_path: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        let migrations_path = check_migrations_path(migrations_path.as_ref())?;
        Ok(Self::build(engine, migrations_path))
    }

    fn build(engine: Box<dyn Engine>, migrations_path: PathBuf) -> Self {
        Self {
            engine,
            migrations_path,
            cancel: None,
            on_migration_start: None,
            on_migration_complete: None,
            on_migration_skipped: None,
            on_migration_error: None,
        }
    }

    /// Stop the apply run when `flag` is raised. The flag is checked before each pending
    /// migration's transaction is opened; a migration already running is not interrupted.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Set a callback to be invoked when a pending migration starts.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_migration_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration is applied and recorded.
    /// The callback receives the migration name and how long it took.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.on_migration_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration is skipped because it is already applied.
    pub fn on_migration_skipped<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_migration_skipped = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration fails.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        self.on_migration_error = Some(Box::new(callback));
        self
    }

    /// Create the bookkeeping table if it does not exist yet.
    pub fn init(&mut self) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Creating migration tracking table: {}",
            store::MIGRATIONS_TABLE
        );

        self.engine.execute(&store::create_table_sql(), &[])
    }

    /// Create `{today}-{name}.sql` in the migrations directory and return its file name.
    ///
    /// The date is the current UTC date. Fails with [`Error::Io`] if the file already
    /// exists or cannot be written.
    pub fn new_migration(&self, name: &str) -> Result<String, Error> {
        self.new_migration_on(name, Utc::now().date_naive())
    }

    pub(crate) fn new_migration_on(&self, name: &str, date: NaiveDate) -> Result<String, Error> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Configuration(format!(
                "invalid migration name '{}': must be non-empty and contain no path separators",
                name
            )));
        }

        let file_name = format!("{}-{}.{}", date.format("%Y-%m-%d"), name, MIGRATION_EXTENSION);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.migrations_path.join(&file_name))?;
        file.write_all(MIGRATION_PLACEHOLDER.as_bytes())?;

        #[cfg(feature = "tracing")]
        tracing::info!(file = %file_name, "Created migration file");

        Ok(file_name)
    }

    /// Names recorded in the bookkeeping table, ascending.
    pub fn applied(&mut self) -> Result<Vec<String>, Error> {
        store::applied(self.engine.as_mut())
    }

    /// Names of the migration files on disk, ascending.
    pub fn available(&self) -> Result<Vec<String>, Error> {
        store::available(&self.migrations_path)
    }

    /// Compare the migrations directory with the bookkeeping table without changing anything.
    pub fn status(&mut self) -> Result<StatusReport, Error> {
        let available = self.available()?;
        let applied: HashSet<String> = self.applied()?.into_iter().collect();

        let on_disk: HashSet<&str> = available.iter().map(String::as_str).collect();
        let mut orphaned: Vec<String> = applied
            .iter()
            .filter(|name| !on_disk.contains(name.as_str()))
            .cloned()
            .collect();
        orphaned.sort();

        let migrations = available
            .into_iter()
            .map(|migration| MigrationState {
                applied: applied.contains(&migration),
                migration,
            })
            .collect();

        Ok(StatusReport {
            migrations,
            orphaned,
        })
    }

    /// Names that [`Kensen::apply`] would attempt, in the order it would attempt them.
    pub fn pending(&mut self) -> Result<Vec<String>, Error> {
        Ok(self.status()?.pending().map(str::to_string).collect())
    }

    /// Apply every pending migration in ascending name order.
    ///
    /// Each migration body runs in its own transaction together with the insert that
    /// records it, so a migration is recorded if and only if its body committed. The run
    /// stops at the first failure; the returned report has one entry per migration visited,
    /// the last of which is the [`Status::Errored`] one. Failing to list the directory or to
    /// read the bookkeeping table (for instance before [`Kensen::init`]) is returned as an
    /// error instead of a report.
    pub fn apply(&mut self) -> Result<Vec<MigrationStatus>, Error> {
        let available = self.available()?;
        let applied: HashSet<String> = self.applied()?.into_iter().collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            available = ?available,
            applied = applied.len(),
            "Considering migrations to run"
        );

        let mut statuses = Vec::with_capacity(available.len());

        for migration in available {
            if applied.contains(&migration) {
                #[cfg(feature = "tracing")]
                tracing::debug!(migration = %migration, "Skipping migration (already applied)");

                if let Some(ref callback) = self.on_migration_skipped {
                    callback(&migration);
                }
                statuses.push(MigrationStatus::skipped(migration));
                continue;
            }

            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!("apply_migration", migration = %migration).entered();

            #[cfg(feature = "tracing")]
            tracing::info!("Starting migration");

            if let Some(ref callback) = self.on_migration_start {
                callback(&migration);
            }

            let migration_start = Instant::now();

            match self.apply_migration(&migration) {
                Ok(()) => {
                    let migration_duration = migration_start.elapsed();

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        duration_ms = migration_duration.as_millis(),
                        "Migration applied successfully"
                    );

                    if let Some(ref callback) = self.on_migration_complete {
                        callback(&migration, migration_duration);
                    }
                    statuses.push(MigrationStatus::applied(migration));
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %error, "Migration failed");

                    if let Some(ref callback) = self.on_migration_error {
                        callback(&migration, &error);
                    }
                    statuses.push(MigrationStatus::errored(migration, error));
                    break;
                }
            }
        }

        Ok(statuses)
    }

    fn apply_migration(&mut self, migration: &str) -> Result<(), Error> {
        let path = self
            .migrations_path
            .join(format!("{}.{}", migration, MIGRATION_EXTENSION));
        let sql = fs::read_to_string(&path)
            .map_err(|e| Error::migration(migration, Stage::Read, e.into()))?;

        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Err(Error::Cancelled);
        }

        let insert = store::insert_sql();
        let mut stage = Stage::Execute;
        let result = self.engine.with_tx(&mut |tx| {
            stage = Stage::Execute;
            tx.execute(&sql, &[])?;
            stage = Stage::Record;
            tx.execute(&insert, &[migration])
        });

        result.map_err(|e| Error::migration(migration, stage, e))
    }
}

fn check_migrations_path(path: &Path) -> Result<PathBuf, Error> {
    if !path.is_dir() {
        return Err(Error::Configuration(format!(
            "migrations path directory does not exist: {}",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}
