//! Database layer
//!
//! Storage for users, content items and relationship records. Two backends
//! are supported behind the `DatabasePool` trait:
//! - SQLite (default, single-file deployment)
//! - MySQL
//!
//! The pool is constructed once at start-up and handed to every repository.
//!
//! # Usage
//!
//! ```ignore
//! use sayings::config::DatabaseConfig;
//! use sayings::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Whether an error (possibly wrapped in context) is a unique-constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .filter_map(|e| e.as_database_error())
        .any(|db_err| db_err.is_unique_violation())
}
