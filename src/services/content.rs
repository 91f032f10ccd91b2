//! Content service
//!
//! Read paths over single items: lookup with visibility, random pick,
//! the deterministic item of the day, and the category list. Also seeds
//! the catalogue on first start.

use crate::db::repositories::ContentRepository;
use crate::models::{
    ContentFilter, ContentItem, ContentKind, ContentStatus, ContentView, NewContentItem, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use chrono::NaiveDate;
use std::sync::Arc;

/// Content read service
pub struct ContentService {
    content_repo: Arc<dyn ContentRepository>,
}

impl ContentService {
    pub fn new(content_repo: Arc<dyn ContentRepository>) -> Self {
        Self { content_repo }
    }

    /// Get an item as seen by `viewer`.
    ///
    /// Unapproved items are visible only to admins and their submitter; for
    /// everyone else they do not exist.
    pub async fn get(&self, id: i64, viewer: Option<&User>) -> ServiceResult<ContentView> {
        let view = self
            .content_repo
            .get_view(id, viewer.map(|u| u.id))
            .await?
            .ok_or_else(not_found)?;

        if is_visible(&view.item, viewer) {
            Ok(view)
        } else {
            Err(not_found())
        }
    }

    /// A random approved item
    pub async fn random(&self, kind: Option<ContentKind>) -> ServiceResult<ContentItem> {
        self.content_repo
            .random(&approved(kind))
            .await?
            .ok_or_else(not_found)
    }

    /// The approved item for a calendar day.
    ///
    /// Items are taken in id order, indexed by days since the Unix epoch modulo
    /// the number of approved items, so every caller sees the same item all day.
    pub async fn daily(&self, kind: Option<ContentKind>, date: NaiveDate) -> ServiceResult<ContentItem> {
        let filter = approved(kind);
        let count = self.content_repo.count(&filter).await?;
        if count == 0 {
            return Err(not_found());
        }

        let index = daily_index(date, count);
        self.content_repo
            .nth_by_id(&filter, index)
            .await?
            .ok_or_else(not_found)
    }

    /// Categories in use by approved items, sorted
    pub async fn categories(&self, kind: Option<ContentKind>) -> ServiceResult<Vec<String>> {
        Ok(self.content_repo.categories(&approved(kind)).await?)
    }

    /// Insert the starter catalogue if the content table is empty.
    ///
    /// Returns the number of items inserted.
    pub async fn seed_defaults(&self) -> ServiceResult<usize> {
        let everything = ContentFilter {
            status: crate::models::StatusFilter::All,
            ..Default::default()
        };
        if self.content_repo.count(&everything).await? > 0 {
            return Ok(0);
        }

        let seeds = default_items();
        for item in &seeds {
            self.content_repo
                .create(item, None, ContentStatus::Approved)
                .await?;
        }
        tracing::info!("Seeded {} content items", seeds.len());
        Ok(seeds.len())
    }
}

fn not_found() -> ServiceError {
    ServiceError::not_found("Content item not found")
}

fn approved(kind: Option<ContentKind>) -> ContentFilter {
    ContentFilter {
        kind,
        ..Default::default()
    }
}

/// Whether `viewer` may see `item`
pub fn is_visible(item: &ContentItem, viewer: Option<&User>) -> bool {
    if item.status == ContentStatus::Approved {
        return true;
    }
    match viewer {
        Some(user) => user.is_admin() || item.submitted_by == Some(user.id),
        None => false,
    }
}

fn daily_index(date: NaiveDate, count: i64) -> i64 {
    let days = date.signed_duration_since(NaiveDate::default()).num_days();
    days.rem_euclid(count)
}

fn default_items() -> Vec<NewContentItem> {
    let quote = |body: &str, author: &str, category: &str, tags: &[&str]| NewContentItem {
        kind: ContentKind::Quote,
        body: body.to_string(),
        secondary: Some(author.to_string()),
        category: Some(category.to_string()),
        origin: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    };
    let proverb = |body: &str, meaning: &str, origin: &str, category: &str| NewContentItem {
        kind: ContentKind::Proverb,
        body: body.to_string(),
        secondary: Some(meaning.to_string()),
        category: Some(category.to_string()),
        origin: Some(origin.to_string()),
        tags: vec![],
    };

    vec![
        quote("The unexamined life is not worth living.", "Socrates", "philosophy", &["reflection"]),
        quote("We suffer more often in imagination than in reality.", "Seneca", "stoicism", &["fear"]),
        quote("Knowing yourself is the beginning of all wisdom.", "Aristotle", "wisdom", &["self"]),
        quote("The journey of a thousand miles begins with one step.", "Lao Tzu", "perseverance", &["beginnings"]),
        quote("Waste no more time arguing what a good man should be. Be one.", "Marcus Aurelius", "stoicism", &["virtue"]),
        proverb("Fall seven times, stand up eight.", "Keep going after every failure.", "Japanese", "perseverance"),
        proverb("Many hands make light work.", "Shared effort makes a task easy.", "English", "cooperation"),
        proverb("The best time to plant a tree was twenty years ago. The second best time is now.", "Start late rather than never.", "Chinese", "wisdom"),
        proverb("Still waters run deep.", "Quiet people often think deeply.", "Latin", "wisdom"),
        proverb("If you want to go fast, go alone. If you want to go far, go together.", "Lasting progress is collective.", "African", "cooperation"),
    ]
}
