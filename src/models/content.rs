//! Content model
//!
//! This module provides:
//! - `ContentItem` covering both quotes and proverbs
//! - `ContentStatus` and its moderation transition table
//! - `ContentFilter` describing a listing query
//! - `ContentView`, an item decorated with relationship counts for a reader

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A quote or proverb.
///
/// `secondary` carries the author for quotes and the meaning or translation
/// for proverbs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub kind: ContentKind,
    pub body: String,
    pub secondary: Option<String>,
    pub category: Option<String>,
    /// Source work, region or language of origin
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// `None` for seeded items
    pub submitted_by: Option<i64>,
    pub status: ContentStatus,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind tag distinguishing quotes from proverbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Quote,
    Proverb,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Quote => "quote",
            ContentKind::Proverb => "proverb",
        }
    }

    /// Quotes must name who said them.
    pub fn requires_secondary(&self) -> bool {
        matches!(self, ContentKind::Quote)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quote" | "quotes" => Ok(ContentKind::Quote),
            "proverb" | "proverbs" => Ok(ContentKind::Proverb),
            _ => Err(anyhow::anyhow!("Invalid content kind: {}", s)),
        }
    }
}

/// Moderation status.
///
/// `Pending` is the only non-terminal state. Items leave it exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Approved => "approved",
            ContentStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContentStatus::Pending)
    }

    /// Whether moderation may move an item from `self` to `next`.
    pub fn can_transition_to(&self, next: ContentStatus) -> bool {
        *self == ContentStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ContentStatus::Pending),
            "approved" => Ok(ContentStatus::Approved),
            "rejected" => Ok(ContentStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

/// Status visibility requested by a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Approved,
    Pending,
    Rejected,
    /// Every status; admin only
    All,
}

impl StatusFilter {
    /// The single status this filter selects, or `None` for `All`.
    pub fn status(&self) -> Option<ContentStatus> {
        match self {
            StatusFilter::Approved => Some(ContentStatus::Approved),
            StatusFilter::Pending => Some(ContentStatus::Pending),
            StatusFilter::Rejected => Some(ContentStatus::Rejected),
            StatusFilter::All => None,
        }
    }

    pub fn is_public(&self) -> bool {
        *self == StatusFilter::Approved
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            other => Ok(match ContentStatus::from_str(other)? {
                ContentStatus::Pending => StatusFilter::Pending,
                ContentStatus::Approved => StatusFilter::Approved,
                ContentStatus::Rejected => StatusFilter::Rejected,
            }),
        }
    }
}

/// Listing sort key. Every key is made total by an `id` tie-break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Newest first
    #[default]
    Created,
    /// Author / secondary text, A to Z
    Author,
    /// Category, A to Z
    Category,
    /// Oldest first; the moderation queue order
    Oldest,
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" | "newest" | "created_at" => Ok(SortKey::Created),
            "author" => Ok(SortKey::Author),
            "category" => Ok(SortKey::Category),
            "oldest" => Ok(SortKey::Oldest),
            _ => Err(anyhow::anyhow!("Invalid sort key: {}", s)),
        }
    }
}

/// Filter set for a content listing.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub kind: Option<ContentKind>,
    /// Exact category match
    pub category: Option<String>,
    /// Case-insensitive substring of author (`secondary`) or `origin`
    pub origin: Option<String>,
    /// Case-insensitive substring of body, author or origin
    pub search: Option<String>,
    pub status: StatusFilter,
    pub sort: SortKey,
}

/// Fields accepted when creating an item
#[derive(Debug, Clone, Deserialize)]
pub struct NewContentItem {
    pub kind: ContentKind,
    pub body: String,
    #[serde(default)]
    pub secondary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A content item as presented to a particular reader.
#[derive(Debug, Clone, Serialize)]
pub struct ContentView {
    #[serde(flatten)]
    pub item: ContentItem,
    pub like_count: i64,
    pub favorite_count: i64,
    /// Always `false` for anonymous readers
    pub is_liked: bool,
    pub is_favorited: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = ContentStatus> {
        prop_oneof![
            Just(ContentStatus::Pending),
            Just(ContentStatus::Approved),
            Just(ContentStatus::Rejected),
        ]
    }

    #[test]
    fn test_pending_moves_to_terminal_states_only() {
        assert!(ContentStatus::Pending.can_transition_to(ContentStatus::Approved));
        assert!(ContentStatus::Pending.can_transition_to(ContentStatus::Rejected));
        assert!(!ContentStatus::Pending.can_transition_to(ContentStatus::Pending));
    }

    #[test]
    fn test_kind_parsing_accepts_plurals() {
        assert_eq!(ContentKind::from_str("Quotes").unwrap(), ContentKind::Quote);
        assert_eq!(ContentKind::from_str("proverb").unwrap(), ContentKind::Proverb);
        assert!(ContentKind::from_str("joke").is_err());
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!(StatusFilter::from_str("ALL").unwrap(), StatusFilter::All);
        assert_eq!(StatusFilter::from_str("pending").unwrap(), StatusFilter::Pending);
        assert!(StatusFilter::from_str("draft").is_err());
        assert_eq!(StatusFilter::All.status(), None);
        assert!(StatusFilter::default().is_public());
    }

    #[test]
    fn test_view_flattens_item() {
        let now = Utc::now();
        let view = ContentView {
            item: ContentItem {
                id: 7,
                kind: ContentKind::Proverb,
                body: "Many hands make light work.".to_string(),
                secondary: None,
                category: Some("cooperation".to_string()),
                origin: Some("English".to_string()),
                tags: vec!["work".to_string()],
                submitted_by: None,
                status: ContentStatus::Approved,
                reviewed_by: None,
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            },
            like_count: 2,
            favorite_count: 1,
            is_liked: true,
            is_favorited: false,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["kind"], "proverb");
        assert_eq!(json["like_count"], 2);
        assert_eq!(json["is_liked"], true);
    }

    proptest! {
        #[test]
        fn terminal_states_never_transition(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
            // Nothing ever moves back to pending.
            prop_assert!(!from.can_transition_to(ContentStatus::Pending));
        }
    }
}
