use std::fmt;

/// The step of a migration during which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the migration file from disk.
    Read,
    /// Executing the migration body.
    Execute,
    /// Inserting the migration name into the bookkeeping table.
    Record,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Read => f.write_str("reading"),
            Stage::Execute => f.write_str("executing"),
            Stage::Record => f.write_str("recording"),
        }
    }
}

/// Error type for the kensen crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid input detected before any connection is made: empty URI, unknown scheme,
    /// missing migrations directory, bad migration name.
    #[error("{0}")]
    Configuration(String),
    /// The database driver could not open a connection.
    #[error("failed to connect to database: {0}")]
    Connection(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] postgres::Error),
    /// A failure while applying a single migration, tagged with its name.
    #[error("error {stage} migration {migration}: {source}")]
    Migration {
        migration: String,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
    /// The run was cancelled before the migration's transaction was opened.
    #[error("apply run cancelled")]
    Cancelled,
    #[error("{0}")]
    Generic(String),
}

impl Error {
    pub(crate) fn migration(migration: &str, stage: Stage, source: Error) -> Self {
        Self::Migration {
            migration: migration.to_string(),
            stage,
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through [`Error::Migration`] wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Migration { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the underlying cause is a file-system error.
    pub fn is_io(&self) -> bool {
        matches!(self.root(), Error::Io(_))
    }

    /// Whether the underlying cause was reported by the database while running SQL.
    pub fn is_execution(&self) -> bool {
        match self.root() {
            #[cfg(feature = "sqlite")]
            Error::Rusqlite(_) => true,
            #[cfg(feature = "mysql")]
            Error::Mysql(_) => true,
            #[cfg(feature = "postgres")]
            Error::Postgres(_) => true,
            Error::Generic(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

// Manual PartialEq implementation because io::Error and postgres::Error don't implement PartialEq
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (Self::Connection(a), Self::Connection(b)) => a == b,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind() && a.to_string() == b.to_string(),
            #[cfg(feature = "sqlite")]
            (Self::Rusqlite(a), Self::Rusqlite(b)) => a == b,
            #[cfg(feature = "mysql")]
            (Self::Mysql(a), Self::Mysql(b)) => a == b,
            #[cfg(feature = "postgres")]
            (Self::Postgres(a), Self::Postgres(b)) => a.to_string() == b.to_string(),
            (
                Self::Migration {
                    migration: a,
                    stage: sa,
                    source: ea,
                },
                Self::Migration {
                    migration: b,
                    stage: sb,
                    source: eb,
                },
            ) => a == b && sa == sb && ea == eb,
            (Self::Cancelled, Self::Cancelled) => true,
            (Self::Generic(a), Self::Generic(b)) => a == b,
            _ => false,
        }
    }
}
