//! Relationship repository
//!
//! Favorites and likes. The `(user_id, item_id, kind)` unique key is the only
//! guard against duplicate records; inserts use the driver's ignore-on-conflict
//! form and report whether a row was actually written.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::repositories::content::{row_to_item_mysql, row_to_item_sqlite, ITEM_COLUMNS};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, RelatedItem, RelationshipKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Relationship repository trait
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Whether a record exists for the triple
    async fn exists(&self, user_id: i64, item_id: i64, kind: RelationshipKind) -> Result<bool>;

    /// Insert a record unless one already exists.
    ///
    /// Returns false when the unique key absorbed the insert.
    async fn insert(&self, user_id: i64, item_id: i64, kind: RelationshipKind) -> Result<bool>;

    /// Delete the record for the triple. Returns false when nothing was deleted.
    async fn delete(&self, user_id: i64, item_id: i64, kind: RelationshipKind) -> Result<bool>;

    /// A user's related items, most recently marked first
    async fn list_for_user(
        &self,
        user_id: i64,
        kind: RelationshipKind,
        params: &ListParams,
    ) -> Result<(Vec<RelatedItem>, i64)>;

    /// Number of records a user holds of a kind
    async fn count_for_user(&self, user_id: i64, kind: RelationshipKind) -> Result<i64>;
}

/// SQLx-based relationship repository implementation
pub struct SqlxRelationshipRepository {
    pool: DynDatabasePool,
}

impl SqlxRelationshipRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RelationshipRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RelationshipRepository for SqlxRelationshipRepository {
    async fn exists(&self, user_id: i64, item_id: i64, kind: RelationshipKind) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM relationships WHERE user_id = ? AND item_id = ? AND kind = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(user_id)
                .bind(item_id)
                .bind(kind.as_str())
                .fetch_one(sqlite(&self.pool)?)
                .await
                .context("Failed to check relationship")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(user_id)
                .bind(item_id)
                .bind(kind.as_str())
                .fetch_one(mysql(&self.pool)?)
                .await
                .context("Failed to check relationship")?,
        };
        Ok(count > 0)
    }

    async fn insert(&self, user_id: i64, item_id: i64, kind: RelationshipKind) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                insert_sqlite(sqlite(&self.pool)?, user_id, item_id, kind).await
            }
            DatabaseDriver::Mysql => insert_mysql(mysql(&self.pool)?, user_id, item_id, kind).await,
        }
    }

    async fn delete(&self, user_id: i64, item_id: i64, kind: RelationshipKind) -> Result<bool> {
        let sql = "DELETE FROM relationships WHERE user_id = ? AND item_id = ? AND kind = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(item_id)
                .bind(kind.as_str())
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete relationship")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(item_id)
                .bind(kind.as_str())
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete relationship")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        kind: RelationshipKind,
        params: &ListParams,
    ) -> Result<(Vec<RelatedItem>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_user_sqlite(sqlite(&self.pool)?, user_id, kind, params).await
            }
            DatabaseDriver::Mysql => {
                list_for_user_mysql(mysql(&self.pool)?, user_id, kind, params).await
            }
        }
    }

    async fn count_for_user(&self, user_id: i64, kind: RelationshipKind) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM relationships WHERE user_id = ? AND kind = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(user_id)
                .bind(kind.as_str())
                .fetch_one(sqlite(&self.pool)?)
                .await
                .context("Failed to count relationships"),
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(user_id)
                .bind(kind.as_str())
                .fetch_one(mysql(&self.pool)?)
                .await
                .context("Failed to count relationships"),
        }
    }
}

fn list_sql() -> String {
    format!(
        r#"
        SELECT {}, r.created_at AS related_at
        FROM relationships r
        INNER JOIN content_items c ON c.id = r.item_id
        WHERE r.user_id = ? AND r.kind = ?
        ORDER BY r.created_at DESC, r.id DESC
        LIMIT ? OFFSET ?
        "#,
        ITEM_COLUMNS
    )
}

const COUNT_FOR_LIST: &str = r#"
    SELECT COUNT(*)
    FROM relationships r
    INNER JOIN content_items c ON c.id = r.item_id
    WHERE r.user_id = ? AND r.kind = ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    item_id: i64,
    kind: RelationshipKind,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO relationships (user_id, item_id, kind, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(item_id)
    .bind(kind.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to insert relationship")?;

    Ok(result.rows_affected() > 0)
}

async fn list_for_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    kind: RelationshipKind,
    params: &ListParams,
) -> Result<(Vec<RelatedItem>, i64)> {
    let total: i64 = sqlx::query_scalar(COUNT_FOR_LIST)
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(pool)
        .await
        .context("Failed to count relationships")?;

    let rows = sqlx::query(&list_sql())
        .bind(user_id)
        .bind(kind.as_str())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list relationships")?;

    let items = rows
        .iter()
        .map(|row| {
            Ok(RelatedItem {
                item: row_to_item_sqlite(row)?,
                related_at: row.try_get("related_at")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((items, total))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_mysql(
    pool: &MySqlPool,
    user_id: i64,
    item_id: i64,
    kind: RelationshipKind,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT IGNORE INTO relationships (user_id, item_id, kind, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(item_id)
    .bind(kind.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to insert relationship")?;

    Ok(result.rows_affected() > 0)
}

async fn list_for_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    kind: RelationshipKind,
    params: &ListParams,
) -> Result<(Vec<RelatedItem>, i64)> {
    let total: i64 = sqlx::query_scalar(COUNT_FOR_LIST)
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(pool)
        .await
        .context("Failed to count relationships")?;

    let rows = sqlx::query(&list_sql())
        .bind(user_id)
        .bind(kind.as_str())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list relationships")?;

    let items = rows
        .iter()
        .map(|row| {
            Ok(RelatedItem {
                item: row_to_item_mysql(row)?,
                related_at: row.try_get("related_at")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ContentRepository, SqlxContentRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ContentKind, ContentStatus, NewContentItem};

    async fn setup() -> (SqlxRelationshipRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        sqlx::query("INSERT INTO users (username, email, name, password_hash) VALUES ('u', 'u@example.com', 'U', 'x')")
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();

        let content = SqlxContentRepository::new(pool.clone());
        let item = content
            .create(
                &NewContentItem {
                    kind: ContentKind::Proverb,
                    body: "Still waters run deep.".to_string(),
                    secondary: None,
                    category: None,
                    origin: Some("Latin".to_string()),
                    tags: vec![],
                },
                None,
                ContentStatus::Approved,
            )
            .await
            .unwrap();

        (SqlxRelationshipRepository::new(pool), 1, item.id)
    }

    #[tokio::test]
    async fn test_insert_is_absorbed_on_duplicate() {
        let (repo, user, item) = setup().await;

        assert!(repo.insert(user, item, RelationshipKind::Favorite).await.unwrap());
        assert!(!repo.insert(user, item, RelationshipKind::Favorite).await.unwrap());
        assert_eq!(repo.count_for_user(user, RelationshipKind::Favorite).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let (repo, user, item) = setup().await;

        repo.insert(user, item, RelationshipKind::Favorite).await.unwrap();
        assert!(repo.exists(user, item, RelationshipKind::Favorite).await.unwrap());
        assert!(!repo.exists(user, item, RelationshipKind::Like).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (repo, user, item) = setup().await;

        repo.insert(user, item, RelationshipKind::Like).await.unwrap();
        assert!(repo.delete(user, item, RelationshipKind::Like).await.unwrap());
        assert!(!repo.delete(user, item, RelationshipKind::Like).await.unwrap());
        assert!(!repo.exists(user, item, RelationshipKind::Like).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let (repo, user, item) = setup().await;

        let (items, total) = repo
            .list_for_user(user, RelationshipKind::Favorite, &ListParams::default())
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);

        repo.insert(user, item, RelationshipKind::Favorite).await.unwrap();
        let (items, total) = repo
            .list_for_user(user, RelationshipKind::Favorite, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].item.id, item);
        assert_eq!(items[0].item.origin.as_deref(), Some("Latin"));
    }
}
