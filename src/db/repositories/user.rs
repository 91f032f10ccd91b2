//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user. A duplicate email surfaces as a unique violation.
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by (normalised) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Set account status. Returns false when the user does not exist.
    async fn update_status(&self, id: i64, status: UserStatus) -> Result<bool>;

    /// Set role. Returns false when the user does not exist.
    async fn update_role(&self, id: i64, role: UserRole) -> Result<bool>;

    /// Set display name and username. Returns false when the user does not exist.
    async fn update_profile(&self, id: i64, name: &str, username: &str) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite(&self.pool)?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql(&self.pool)?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_email_sqlite(sqlite(&self.pool)?, email).await,
            DatabaseDriver::Mysql => get_user_by_email_mysql(mysql(&self.pool)?, email).await,
        }
    }

    async fn update_status(&self, id: i64, status: UserStatus) -> Result<bool> {
        let sql = "UPDATE users SET status = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.to_string())
                .bind(Utc::now())
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to update user status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.to_string())
                .bind(Utc::now())
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to update user status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn update_role(&self, id: i64, role: UserRole) -> Result<bool> {
        let sql = "UPDATE users SET role = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(role.to_string())
                .bind(Utc::now())
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to update user role")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(role.to_string())
                .bind(Utc::now())
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to update user role")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn update_profile(&self, id: i64, name: &str, username: &str) -> Result<bool> {
        let sql = "UPDATE users SET name = ?, username = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(name)
                .bind(username)
                .bind(Utc::now())
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to update user profile")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(name)
                .bind(username)
                .bind(Utc::now())
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to update user profile")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .fetch_one(sqlite(&self.pool)?)
                .await
                .context("Failed to count users"),
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .fetch_one(mysql(&self.pool)?)
                .await
                .context("Failed to count users"),
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, name, password_hash, role, status, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, name, password_hash, role, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.try_get("role")?;
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    let status_str: String = row.try_get("status")?;
    let status = UserStatus::from_str(&status_str)
        .with_context(|| format!("Invalid status in database: {}", status_str))?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        role,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, name, password_hash, role, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.try_get("role")?;
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    let status_str: String = row.try_get("status")?;
    let status = UserStatus::from_str(&status_str)
        .with_context(|| format!("Invalid status in database: {}", status_str))?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        role,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn create_test_user(username: &str, email: &str) -> User {
        User::new(
            username.to_string(),
            email.to_string(),
            "Test User".to_string(),
            "not-a-real-hash".to_string(),
            UserRole::User,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&create_test_user("ada", "ada@example.com"))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("user by id");
        assert_eq!(by_id.email, "ada@example.com");
        assert_eq!(by_id.name, "Test User");
        assert_eq!(by_id.role, UserRole::User);
        assert_eq!(by_id.status, UserStatus::Active);

        let by_email = repo.get_by_email("ada@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_id(999).await.unwrap().is_none());
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let repo = setup_test_repo().await;
        repo.create(&create_test_user("a", "same@example.com")).await.unwrap();

        let err = repo
            .create(&create_test_user("b", "same@example.com"))
            .await
            .expect_err("duplicate email must fail");
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_update_status_and_role() {
        let repo = setup_test_repo().await;
        let user = repo.create(&create_test_user("c", "c@example.com")).await.unwrap();

        assert!(repo.update_status(user.id, UserStatus::Inactive).await.unwrap());
        assert!(repo.update_role(user.id, UserRole::Admin).await.unwrap());

        let user = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Inactive);
        assert_eq!(user.role, UserRole::Admin);

        assert!(!repo.update_status(12345, UserStatus::Active).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let repo = setup_test_repo().await;
        let user = repo.create(&create_test_user("d", "d@example.com")).await.unwrap();

        assert!(repo.update_profile(user.id, "Dana", "dana").await.unwrap());
        let user = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.name, "Dana");
        assert_eq!(user.username, "dana");
        assert_eq!(user.email, "d@example.com");

        assert!(!repo.update_profile(12345, "X", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_count() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.count().await.unwrap(), 0);
        repo.create(&create_test_user("d", "d@example.com")).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
