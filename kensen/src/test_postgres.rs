#![allow(dead_code)]

//! PostgreSQL test infrastructure module.
//!
//! Starts one PostgreSQL container per test run and hands every test its own freshly
//! created database.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Once, OnceLock};

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use crate::postgres::PostgresEngine;

/// Global PostgreSQL container port, set once the container is started
static POSTGRES_PORT: AtomicU16 = AtomicU16::new(0);

/// Ensures the container is started only once
static POSTGRES_INIT: Once = Once::new();

/// Tokio runtime for container management (kept alive for container lifecycle)
static TOKIO_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

/// Default credentials for testcontainers-modules postgres
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";
const PG_DB: &str = "postgres";

fn ensure_postgres_started() {
    POSTGRES_INIT.call_once(|| {
        let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

        let port = rt.block_on(async {
            let container = Postgres::default()
                .start()
                .await
                .expect("failed to start postgres container");

            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("failed to get postgres port");

            // Leak the container to keep it alive for the test duration
            std::mem::forget(container);

            port
        });

        POSTGRES_PORT.store(port, Ordering::SeqCst);
        let _ = TOKIO_RT.set(rt);
    });
}

/// Get a PostgreSQL connection URL for a specific database.
fn url_with_db(db: &str) -> String {
    ensure_postgres_started();
    format!(
        "postgresql://{}:{}@127.0.0.1:{}/{}",
        PG_USER,
        PG_PASSWORD,
        POSTGRES_PORT.load(Ordering::SeqCst),
        db
    )
}

/// Create a fresh database with a unique name and return its connection URL.
pub fn fresh_postgres_url() -> String {
    let mut admin =
        Client::connect(&url_with_db(PG_DB), NoTls).expect("failed to connect as admin");

    let db_name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .batch_execute(&format!("CREATE DATABASE \"{}\"", db_name))
        .expect("failed to create test database");

    url_with_db(&db_name)
}

/// An engine connected to a fresh, isolated database.
pub fn get_test_engine() -> PostgresEngine {
    PostgresEngine::open(&fresh_postgres_url()).expect("failed to connect to test database")
}
