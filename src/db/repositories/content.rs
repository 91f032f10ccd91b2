//! Content repository
//!
//! Database operations for quotes and proverbs.
//!
//! Listing SQL is assembled from a `ContentFilter` into a `WHERE` clause with
//! positional `?` placeholders, which both drivers understand, so only the
//! execution and row mapping differ per backend.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{
    ContentFilter, ContentItem, ContentKind, ContentStatus, ContentView, ListParams,
    NewContentItem, SortKey,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Content repository trait
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a new item with the given initial status
    async fn create(
        &self,
        input: &NewContentItem,
        submitted_by: Option<i64>,
        status: ContentStatus,
    ) -> Result<ContentItem>;

    /// Get item by ID, whatever its status
    async fn get_by_id(&self, id: i64) -> Result<Option<ContentItem>>;

    /// Get item by ID with relationship counts and the viewer's flags
    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<ContentView>>;

    /// Move an item from `expected` to `status` in one conditional write.
    ///
    /// Returns false when no row matched: the item is missing or its status
    /// is no longer `expected`.
    async fn update_status(
        &self,
        id: i64,
        expected: ContentStatus,
        status: ContentStatus,
        reviewed_by: Option<i64>,
    ) -> Result<bool>;

    /// One page of items matching the filter, plus the total match count
    async fn list(
        &self,
        filter: &ContentFilter,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<(Vec<ContentView>, i64)>;

    /// Number of items matching the filter
    async fn count(&self, filter: &ContentFilter) -> Result<i64>;

    /// The `index`-th matching item in id order
    async fn nth_by_id(&self, filter: &ContentFilter, index: i64) -> Result<Option<ContentItem>>;

    /// A uniformly random matching item
    async fn random(&self, filter: &ContentFilter) -> Result<Option<ContentItem>>;

    /// Distinct non-empty categories of matching items, sorted
    async fn categories(&self, filter: &ContentFilter) -> Result<Vec<String>>;

    /// Number of items submitted by a user, any status
    async fn count_by_submitter(&self, user_id: i64) -> Result<i64>;
}

/// SQLx-based content repository implementation
pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

// ============================================================================
// Query assembly
// ============================================================================

pub(crate) const ITEM_COLUMNS: &str = "c.id, c.kind, c.body, c.secondary, c.category, c.origin, c.tags, \
     c.submitted_by, c.status, c.reviewed_by, c.reviewed_at, c.created_at, c.updated_at";

const VIEW_COUNTS: &str = "\
     (SELECT COUNT(*) FROM relationships r WHERE r.item_id = c.id AND r.kind = 'like') AS like_count, \
     (SELECT COUNT(*) FROM relationships r WHERE r.item_id = c.id AND r.kind = 'favorite') AS favorite_count, \
     (SELECT COUNT(*) FROM relationships r WHERE r.item_id = c.id AND r.kind = 'like' AND r.user_id = ?) AS is_liked, \
     (SELECT COUNT(*) FROM relationships r WHERE r.item_id = c.id AND r.kind = 'favorite' AND r.user_id = ?) AS is_favorited";

/// A positional bind value
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Int(i64),
}

/// `WHERE` conditions joined by `AND`, with their binds in placeholder order
#[derive(Debug, Default)]
struct Conditions {
    clauses: Vec<String>,
    binds: Vec<Bind>,
}

impl Conditions {
    fn from_filter(filter: &ContentFilter) -> Self {
        let mut conditions = Self::default();

        if let Some(status) = filter.status.status() {
            conditions.push("c.status = ?", [Bind::Text(status.as_str().to_string())]);
        }
        if let Some(kind) = filter.kind {
            conditions.push("c.kind = ?", [Bind::Text(kind.as_str().to_string())]);
        }
        if let Some(category) = non_blank(&filter.category) {
            conditions.push("c.category = ?", [Bind::Text(fold(category))]);
        }
        if let Some(origin) = non_blank(&filter.origin) {
            let pattern = like_pattern(origin);
            conditions.push("c.author_text LIKE ? ESCAPE '!'", [Bind::Text(pattern)]);
        }
        if let Some(search) = non_blank(&filter.search) {
            let pattern = like_pattern(search);
            conditions.push("c.search_text LIKE ? ESCAPE '!'", [Bind::Text(pattern)]);
        }

        conditions
    }

    fn push(&mut self, clause: &str, binds: impl IntoIterator<Item = Bind>) {
        self.clauses.push(clause.to_string());
        self.binds.extend(binds);
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Escape LIKE wildcards with `!` so user input always matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(ch);
    }
    escaped
}

/// Case folding shared by stored keys and query terms.
///
/// SQLite `LOWER()` folds ASCII only, so matching never folds in SQL.
fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// Substring pattern matched against a folded column with `ESCAPE '!'`
fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like(&fold(term)))
}

/// Folded author and origin, the target of the origin filter
fn author_text(input: &NewContentItem) -> String {
    fold(&format!(
        "{}\n{}",
        input.secondary.as_deref().unwrap_or_default(),
        input.origin.as_deref().unwrap_or_default()
    ))
}

/// Folded body, author and origin, the target of free-text search
fn search_text(input: &NewContentItem) -> String {
    format!("{}\n{}", fold(&input.body), author_text(input))
}

/// Every ordering ends in `c.id` so pagination is deterministic.
fn order_by(sort: SortKey) -> &'static str {
    match sort {
        SortKey::Created => "c.created_at DESC, c.id DESC",
        SortKey::Oldest => "c.created_at ASC, c.id ASC",
        SortKey::Author => "c.secondary IS NULL, c.secondary ASC, c.id ASC",
        SortKey::Category => "c.category IS NULL, c.category ASC, c.id ASC",
    }
}

fn viewer_binds(viewer: Option<i64>) -> [Bind; 2] {
    // Ids start at 1, so 0 matches no relationship.
    let id = viewer.unwrap_or(0);
    [Bind::Int(id), Bind::Int(id)]
}

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &[Bind],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            Bind::Text(value) => query.bind(value.clone()),
            Bind::Int(value) => query.bind(*value),
        };
    }
    query
}

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    binds: &[Bind],
) -> Query<'q, MySql, MySqlArguments> {
    for bind in binds {
        query = match bind {
            Bind::Text(value) => query.bind(value.clone()),
            Bind::Int(value) => query.bind(*value),
        };
    }
    query
}

/// A statement together with its binds
struct Statement {
    sql: String,
    binds: Vec<Bind>,
}

impl Statement {
    fn list(filter: &ContentFilter, params: &ListParams, viewer: Option<i64>) -> Self {
        let conditions = Conditions::from_filter(filter);
        let mut binds: Vec<Bind> = viewer_binds(viewer).into();
        binds.extend(conditions.binds.iter().cloned());
        binds.push(Bind::Int(params.limit()));
        binds.push(Bind::Int(params.offset()));
        Self {
            sql: format!(
                "SELECT {}, {} FROM content_items c{} ORDER BY {} LIMIT ? OFFSET ?",
                ITEM_COLUMNS,
                VIEW_COUNTS,
                conditions.sql(),
                order_by(filter.sort)
            ),
            binds,
        }
    }

    fn view(id: i64, viewer: Option<i64>) -> Self {
        let mut binds: Vec<Bind> = viewer_binds(viewer).into();
        binds.push(Bind::Int(id));
        Self {
            sql: format!(
                "SELECT {}, {} FROM content_items c WHERE c.id = ?",
                ITEM_COLUMNS, VIEW_COUNTS
            ),
            binds,
        }
    }

    fn count(filter: &ContentFilter) -> Self {
        let conditions = Conditions::from_filter(filter);
        Self {
            sql: format!("SELECT COUNT(*) FROM content_items c{}", conditions.sql()),
            binds: conditions.binds,
        }
    }

    fn nth_by_id(filter: &ContentFilter, index: i64) -> Self {
        let conditions = Conditions::from_filter(filter);
        let mut binds = conditions.binds.clone();
        binds.push(Bind::Int(index));
        Self {
            sql: format!(
                "SELECT {} FROM content_items c{} ORDER BY c.id ASC LIMIT 1 OFFSET ?",
                ITEM_COLUMNS,
                conditions.sql()
            ),
            binds,
        }
    }

    fn random(filter: &ContentFilter, random_fn: &str) -> Self {
        let conditions = Conditions::from_filter(filter);
        Self {
            sql: format!(
                "SELECT {} FROM content_items c{} ORDER BY {}() LIMIT 1",
                ITEM_COLUMNS,
                conditions.sql(),
                random_fn
            ),
            binds: conditions.binds,
        }
    }

    fn categories(filter: &ContentFilter) -> Self {
        let mut conditions = Conditions::from_filter(filter);
        conditions.push("c.category IS NOT NULL AND c.category <> ''", []);
        Self {
            sql: format!(
                "SELECT DISTINCT c.category FROM content_items c{} ORDER BY c.category ASC",
                conditions.sql()
            ),
            binds: conditions.binds,
        }
    }

    async fn fetch_all_sqlite(&self, pool: &SqlitePool) -> Result<Vec<SqliteRow>> {
        bind_sqlite(sqlx::query(&self.sql), &self.binds)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to query content: {}", self.sql))
    }

    async fn fetch_optional_sqlite(&self, pool: &SqlitePool) -> Result<Option<SqliteRow>> {
        bind_sqlite(sqlx::query(&self.sql), &self.binds)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to query content: {}", self.sql))
    }

    async fn fetch_all_mysql(&self, pool: &MySqlPool) -> Result<Vec<MySqlRow>> {
        bind_mysql(sqlx::query(&self.sql), &self.binds)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to query content: {}", self.sql))
    }

    async fn fetch_optional_mysql(&self, pool: &MySqlPool) -> Result<Option<MySqlRow>> {
        bind_mysql(sqlx::query(&self.sql), &self.binds)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to query content: {}", self.sql))
    }

    async fn scalar(&self, pool: &DynDatabasePool) -> Result<i64> {
        match pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = bind_sqlite(sqlx::query(&self.sql), &self.binds)
                    .fetch_one(sqlite(pool)?)
                    .await
                    .with_context(|| format!("Failed to count content: {}", self.sql))?;
                Ok(row.try_get(0)?)
            }
            DatabaseDriver::Mysql => {
                let row = bind_mysql(sqlx::query(&self.sql), &self.binds)
                    .fetch_one(mysql(pool)?)
                    .await
                    .with_context(|| format!("Failed to count content: {}", self.sql))?;
                Ok(row.try_get(0)?)
            }
        }
    }
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(
        &self,
        input: &NewContentItem,
        submitted_by: Option<i64>,
        status: ContentStatus,
    ) -> Result<ContentItem> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_item_sqlite(sqlite(&self.pool)?, input, submitted_by, status).await
            }
            DatabaseDriver::Mysql => {
                create_item_mysql(mysql(&self.pool)?, input, submitted_by, status).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContentItem>> {
        let statement = Statement {
            sql: format!("SELECT {} FROM content_items c WHERE c.id = ?", ITEM_COLUMNS),
            binds: vec![Bind::Int(id)],
        };
        match self.pool.driver() {
            DatabaseDriver::Sqlite => statement
                .fetch_optional_sqlite(sqlite(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_item_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => statement
                .fetch_optional_mysql(mysql(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_item_mysql)
                .transpose(),
        }
    }

    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<ContentView>> {
        let statement = Statement::view(id, viewer);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => statement
                .fetch_optional_sqlite(sqlite(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_view_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => statement
                .fetch_optional_mysql(mysql(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_view_mysql)
                .transpose(),
        }
    }

    async fn update_status(
        &self,
        id: i64,
        expected: ContentStatus,
        status: ContentStatus,
        reviewed_by: Option<i64>,
    ) -> Result<bool> {
        let sql = r#"
            UPDATE content_items
            SET status = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ?
            WHERE id = ? AND status = ?
        "#;
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.as_str())
                .bind(reviewed_by)
                .bind(now)
                .bind(now)
                .bind(id)
                .bind(expected.as_str())
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to update content status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.as_str())
                .bind(reviewed_by)
                .bind(now)
                .bind(now)
                .bind(id)
                .bind(expected.as_str())
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to update content status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(
        &self,
        filter: &ContentFilter,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<(Vec<ContentView>, i64)> {
        let total = Statement::count(filter).scalar(&self.pool).await?;
        let statement = Statement::list(filter, params, viewer);
        let items = match self.pool.driver() {
            DatabaseDriver::Sqlite => statement
                .fetch_all_sqlite(sqlite(&self.pool)?)
                .await?
                .iter()
                .map(row_to_view_sqlite)
                .collect::<Result<Vec<_>>>()?,
            DatabaseDriver::Mysql => statement
                .fetch_all_mysql(mysql(&self.pool)?)
                .await?
                .iter()
                .map(row_to_view_mysql)
                .collect::<Result<Vec<_>>>()?,
        };
        Ok((items, total))
    }

    async fn count(&self, filter: &ContentFilter) -> Result<i64> {
        Statement::count(filter).scalar(&self.pool).await
    }

    async fn nth_by_id(&self, filter: &ContentFilter, index: i64) -> Result<Option<ContentItem>> {
        let statement = Statement::nth_by_id(filter, index);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => statement
                .fetch_optional_sqlite(sqlite(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_item_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => statement
                .fetch_optional_mysql(mysql(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_item_mysql)
                .transpose(),
        }
    }

    async fn random(&self, filter: &ContentFilter) -> Result<Option<ContentItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Statement::random(filter, "RANDOM")
                .fetch_optional_sqlite(sqlite(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_item_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => Statement::random(filter, "RAND")
                .fetch_optional_mysql(mysql(&self.pool)?)
                .await?
                .as_ref()
                .map(row_to_item_mysql)
                .transpose(),
        }
    }

    async fn categories(&self, filter: &ContentFilter) -> Result<Vec<String>> {
        let statement = Statement::categories(filter);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => statement
                .fetch_all_sqlite(sqlite(&self.pool)?)
                .await?
                .iter()
                .map(|row| row.try_get::<String, _>(0).map_err(Into::into))
                .collect(),
            DatabaseDriver::Mysql => statement
                .fetch_all_mysql(mysql(&self.pool)?)
                .await?
                .iter()
                .map(|row| row.try_get::<String, _>(0).map_err(Into::into))
                .collect(),
        }
    }

    async fn count_by_submitter(&self, user_id: i64) -> Result<i64> {
        Statement {
            sql: "SELECT COUNT(*) FROM content_items c WHERE c.submitted_by = ?".to_string(),
            binds: vec![Bind::Int(user_id)],
        }
        .scalar(&self.pool)
        .await
    }
}

/// Categories are stored folded so equality filters need no SQL case handling.
fn category_key(input: &NewContentItem) -> Option<String> {
    input.category.as_deref().map(fold)
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).context("Failed to encode tags")
}

fn decode_tags(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("Invalid tags in database: {}", raw))
}

fn parse_kind(raw: &str) -> Result<ContentKind> {
    ContentKind::from_str(raw).with_context(|| format!("Invalid kind in database: {}", raw))
}

fn parse_status(raw: &str) -> Result<ContentStatus> {
    ContentStatus::from_str(raw).with_context(|| format!("Invalid status in database: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_item_sqlite(
    pool: &SqlitePool,
    input: &NewContentItem,
    submitted_by: Option<i64>,
    status: ContentStatus,
) -> Result<ContentItem> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO content_items
            (kind, body, secondary, category, origin, tags, submitted_by, status,
             search_text, author_text, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.kind.as_str())
    .bind(&input.body)
    .bind(&input.secondary)
    .bind(category_key(input))
    .bind(&input.origin)
    .bind(encode_tags(&input.tags)?)
    .bind(submitted_by)
    .bind(status.as_str())
    .bind(search_text(input))
    .bind(author_text(input))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create content item")?;

    Ok(new_item(result.last_insert_rowid(), input, submitted_by, status, now))
}

pub(crate) fn row_to_item_sqlite(row: &SqliteRow) -> Result<ContentItem> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let tags: String = row.try_get("tags")?;

    Ok(ContentItem {
        id: row.try_get("id")?,
        kind: parse_kind(&kind)?,
        body: row.try_get("body")?,
        secondary: row.try_get("secondary")?,
        category: row.try_get("category")?,
        origin: row.try_get("origin")?,
        tags: decode_tags(&tags)?,
        submitted_by: row.try_get("submitted_by")?,
        status: parse_status(&status)?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_view_sqlite(row: &SqliteRow) -> Result<ContentView> {
    Ok(ContentView {
        item: row_to_item_sqlite(row)?,
        like_count: row.try_get("like_count")?,
        favorite_count: row.try_get("favorite_count")?,
        is_liked: row.try_get::<i64, _>("is_liked")? > 0,
        is_favorited: row.try_get::<i64, _>("is_favorited")? > 0,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_item_mysql(
    pool: &MySqlPool,
    input: &NewContentItem,
    submitted_by: Option<i64>,
    status: ContentStatus,
) -> Result<ContentItem> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO content_items
            (kind, body, secondary, category, origin, tags, submitted_by, status,
             search_text, author_text, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.kind.as_str())
    .bind(&input.body)
    .bind(&input.secondary)
    .bind(category_key(input))
    .bind(&input.origin)
    .bind(encode_tags(&input.tags)?)
    .bind(submitted_by)
    .bind(status.as_str())
    .bind(search_text(input))
    .bind(author_text(input))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create content item")?;

    Ok(new_item(result.last_insert_id() as i64, input, submitted_by, status, now))
}

pub(crate) fn row_to_item_mysql(row: &MySqlRow) -> Result<ContentItem> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let tags: String = row.try_get("tags")?;

    Ok(ContentItem {
        id: row.try_get("id")?,
        kind: parse_kind(&kind)?,
        body: row.try_get("body")?,
        secondary: row.try_get("secondary")?,
        category: row.try_get("category")?,
        origin: row.try_get("origin")?,
        tags: decode_tags(&tags)?,
        submitted_by: row.try_get("submitted_by")?,
        status: parse_status(&status)?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_view_mysql(row: &MySqlRow) -> Result<ContentView> {
    Ok(ContentView {
        item: row_to_item_mysql(row)?,
        like_count: row.try_get("like_count")?,
        favorite_count: row.try_get("favorite_count")?,
        is_liked: row.try_get::<i64, _>("is_liked")? > 0,
        is_favorited: row.try_get::<i64, _>("is_favorited")? > 0,
    })
}

fn new_item(
    id: i64,
    input: &NewContentItem,
    submitted_by: Option<i64>,
    status: ContentStatus,
    now: chrono::DateTime<Utc>,
) -> ContentItem {
    ContentItem {
        id,
        kind: input.kind,
        body: input.body.clone(),
        secondary: input.secondary.clone(),
        category: category_key(input),
        origin: input.origin.clone(),
        tags: input.tags.clone(),
        submitted_by,
        status,
        reviewed_by: None,
        reviewed_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::StatusFilter;
    use proptest::prelude::*;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxContentRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxContentRepository::new(pool.clone());
        (pool, repo)
    }

    fn quote(body: &str, author: &str, category: &str) -> NewContentItem {
        NewContentItem {
            kind: ContentKind::Quote,
            body: body.to_string(),
            secondary: Some(author.to_string()),
            category: Some(category.to_string()),
            origin: None,
            tags: vec!["test".to_string()],
        }
    }

    fn proverb(body: &str, origin: &str) -> NewContentItem {
        NewContentItem {
            kind: ContentKind::Proverb,
            body: body.to_string(),
            secondary: None,
            category: Some("wisdom".to_string()),
            origin: Some(origin.to_string()),
            tags: vec![],
        }
    }

    fn approved() -> ContentFilter {
        ContentFilter::default()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&quote("Know thyself.", "Socrates", "philosophy"), None, ContentStatus::Approved)
            .await
            .expect("Failed to create item");

        let fetched = repo.get_by_id(created.id).await.unwrap().expect("item");
        assert_eq!(fetched.body, "Know thyself.");
        assert_eq!(fetched.secondary.as_deref(), Some("Socrates"));
        assert_eq!(fetched.tags, vec!["test".to_string()]);
        assert_eq!(fetched.status, ContentStatus::Approved);
        assert!(fetched.submitted_by.is_none());

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status_is_conditional() {
        let (_pool, repo) = setup_test_repo().await;
        let item = repo
            .create(&proverb("Haste makes waste.", "English"), None, ContentStatus::Pending)
            .await
            .unwrap();

        let moved = repo
            .update_status(item.id, ContentStatus::Pending, ContentStatus::Approved, None)
            .await
            .unwrap();
        assert!(moved);

        // Second write expecting pending finds nothing to update.
        let moved = repo
            .update_status(item.id, ContentStatus::Pending, ContentStatus::Rejected, None)
            .await
            .unwrap();
        assert!(!moved);

        let item = repo.get_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(item.status, ContentStatus::Approved);
        assert!(item.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_list_hides_unapproved_items() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&quote("Visible", "A", "c"), None, ContentStatus::Approved).await.unwrap();
        repo.create(&quote("Waiting", "A", "c"), None, ContentStatus::Pending).await.unwrap();
        repo.create(&quote("Refused", "A", "c"), None, ContentStatus::Rejected).await.unwrap();

        let (items, total) = repo.list(&approved(), &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].item.body, "Visible");

        let all = ContentFilter { status: StatusFilter::All, ..Default::default() };
        let (_, total) = repo.list(&all, &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_pagination() {
        let (_pool, repo) = setup_test_repo().await;
        for i in 0..5 {
            repo.create(&quote(&format!("Q{}", i), "A", "c"), None, ContentStatus::Approved)
                .await
                .unwrap();
        }

        let (page1, total) = repo.list(&approved(), &ListParams::new(1, 2), None).await.unwrap();
        assert_eq!(total, 5);
        let bodies: Vec<_> = page1.iter().map(|v| v.item.body.as_str()).collect();
        assert_eq!(bodies, vec!["Q4", "Q3"]);

        let (page3, _) = repo.list(&approved(), &ListParams::new(3, 2), None).await.unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].item.body, "Q0");

        let (beyond, total) = repo.list(&approved(), &ListParams::new(4, 2), None).await.unwrap();
        assert!(beyond.is_empty());
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_across_fields() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&quote("The unexamined life", "Socrates", "philosophy"), None, ContentStatus::Approved)
            .await
            .unwrap();
        repo.create(&proverb("Fall seven times, stand up eight.", "Japanese"), None, ContentStatus::Approved)
            .await
            .unwrap();

        let search = |term: &str| ContentFilter { search: Some(term.to_string()), ..Default::default() };

        let (_, total) = repo.list(&search("UNEXAMINED"), &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
        let (_, total) = repo.list(&search("socr"), &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
        let (_, total) = repo.list(&search("japan"), &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
        let (_, total) = repo.list(&search("nothing like this"), &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&proverb("Éternité passe", "Ürümqi"), None, ContentStatus::Approved)
            .await
            .unwrap();

        for term in ["Éternité", "éternité", "ÉTERNITÉ", "ürümqi"] {
            let filter = ContentFilter { search: Some(term.to_string()), ..Default::default() };
            let (_, total) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
            assert_eq!(total, 1, "search for {:?}", term);
        }

        let filter = ContentFilter { origin: Some("ÜRÜMQI".to_string()), ..Default::default() };
        let (_, total) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_category_is_stored_folded() {
        let (_pool, repo) = setup_test_repo().await;
        let item = repo
            .create(&quote("Know thyself", "Thales", "Éthique"), None, ContentStatus::Approved)
            .await
            .unwrap();
        assert_eq!(item.category.as_deref(), Some("éthique"));

        let filter = ContentFilter { category: Some("ÉTHIQUE".to_string()), ..Default::default() };
        let (items, total) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].item.category.as_deref(), Some("éthique"));
    }

    #[tokio::test]
    async fn test_wildcards_match_literally() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&quote("Give 100% effort", "Coach", "sport"), None, ContentStatus::Approved)
            .await
            .unwrap();
        repo.create(&quote("Give it all", "Coach", "sport"), None, ContentStatus::Approved)
            .await
            .unwrap();

        let filter = ContentFilter { search: Some("%".to_string()), ..Default::default() };
        let (items, total) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].item.body, "Give 100% effort");

        let filter = ContentFilter { search: Some("_".to_string()), ..Default::default() };
        let (_, total) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&quote("A", "Seneca", "stoicism"), None, ContentStatus::Approved).await.unwrap();
        repo.create(&quote("B", "Seneca", "letters"), None, ContentStatus::Approved).await.unwrap();
        repo.create(&proverb("C", "Chinese"), None, ContentStatus::Approved).await.unwrap();

        let filter = ContentFilter {
            origin: Some("seneca".to_string()),
            category: Some("Stoicism".to_string()),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].item.body, "A");

        let filter = ContentFilter { kind: Some(ContentKind::Proverb), ..Default::default() };
        let (_, total) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_sort_by_author() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&quote("1", "Zeno", "c"), None, ContentStatus::Approved).await.unwrap();
        repo.create(&quote("2", "Aristotle", "c"), None, ContentStatus::Approved).await.unwrap();
        repo.create(&quote("3", "Marcus", "c"), None, ContentStatus::Approved).await.unwrap();

        let filter = ContentFilter { sort: SortKey::Author, ..Default::default() };
        let (items, _) = repo.list(&filter, &ListParams::default(), None).await.unwrap();
        let authors: Vec<_> = items.iter().filter_map(|v| v.item.secondary.as_deref()).collect();
        assert_eq!(authors, vec!["Aristotle", "Marcus", "Zeno"]);
    }

    #[tokio::test]
    async fn test_view_counts_and_flags() {
        let (pool, repo) = setup_test_repo().await;
        let db = pool.as_sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, email, name, password_hash) VALUES ('u', 'u@example.com', 'U', 'x')")
            .execute(db)
            .await
            .unwrap();
        let item = repo.create(&quote("Q", "A", "c"), None, ContentStatus::Approved).await.unwrap();
        sqlx::query("INSERT INTO relationships (user_id, item_id, kind) VALUES (1, ?, 'like')")
            .bind(item.id)
            .execute(db)
            .await
            .unwrap();

        let view = repo.get_view(item.id, Some(1)).await.unwrap().unwrap();
        assert_eq!(view.like_count, 1);
        assert_eq!(view.favorite_count, 0);
        assert!(view.is_liked);
        assert!(!view.is_favorited);

        let anonymous = repo.get_view(item.id, None).await.unwrap().unwrap();
        assert_eq!(anonymous.like_count, 1);
        assert!(!anonymous.is_liked);
    }

    #[tokio::test]
    async fn test_nth_random_and_categories() {
        let (_pool, repo) = setup_test_repo().await;
        let first = repo.create(&quote("1", "A", "zen"), None, ContentStatus::Approved).await.unwrap();
        let second = repo.create(&quote("2", "B", "art"), None, ContentStatus::Approved).await.unwrap();
        repo.create(&quote("3", "C", "hidden"), None, ContentStatus::Pending).await.unwrap();

        assert_eq!(repo.count(&approved()).await.unwrap(), 2);
        assert_eq!(repo.nth_by_id(&approved(), 0).await.unwrap().unwrap().id, first.id);
        assert_eq!(repo.nth_by_id(&approved(), 1).await.unwrap().unwrap().id, second.id);
        assert!(repo.nth_by_id(&approved(), 2).await.unwrap().is_none());

        let random = repo.random(&approved()).await.unwrap().unwrap();
        assert_eq!(random.status, ContentStatus::Approved);

        let categories = repo.categories(&approved()).await.unwrap();
        assert_eq!(categories, vec!["art".to_string(), "zen".to_string()]);
    }

    #[tokio::test]
    async fn test_count_by_submitter() {
        let (pool, repo) = setup_test_repo().await;
        sqlx::query("INSERT INTO users (username, email, name, password_hash) VALUES ('u', 'u@example.com', 'U', 'x')")
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        repo.create(&quote("Mine", "Me", "c"), Some(1), ContentStatus::Pending).await.unwrap();
        repo.create(&quote("Seed", "X", "c"), None, ContentStatus::Approved).await.unwrap();
        assert_eq!(repo.count_by_submitter(1).await.unwrap(), 1);
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("Ab"), "%ab%");
        assert_eq!(like_pattern("50%_!"), "%50!%!_!!%");
    }

    fn unescape_like(escaped: &str) -> String {
        let mut out = String::new();
        let mut chars = escaped.chars();
        while let Some(ch) = chars.next() {
            if ch == '!' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(ch);
            }
        }
        out
    }

    proptest! {
        #[test]
        fn escaped_like_has_no_bare_wildcards(term in ".*") {
            let escaped = escape_like(&term);
            let mut chars = escaped.chars();
            while let Some(ch) = chars.next() {
                if ch == '!' {
                    let next = chars.next();
                    prop_assert!(matches!(next, Some('!' | '%' | '_')));
                } else {
                    prop_assert!(ch != '%' && ch != '_');
                }
            }
            prop_assert_eq!(unescape_like(&escaped), term);
        }
    }
}
