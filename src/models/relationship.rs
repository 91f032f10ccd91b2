//! Relationship model
//!
//! Per-user markers on content items. Favorites and likes are independent
//! kinds sharing one table; at most one record exists per (user, item, kind).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ContentItem;

/// Relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Favorite,
    Like,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Favorite => "favorite",
            RelationshipKind::Like => "like",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "favorite" | "favorites" => Ok(RelationshipKind::Favorite),
            "like" | "likes" => Ok(RelationshipKind::Like),
            _ => Err(anyhow::anyhow!("Invalid relationship kind: {}", s)),
        }
    }
}

/// Result of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Added,
    Removed,
}

/// A content item in a user's favorites or likes, with when it was marked.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub related_at: DateTime<Utc>,
}

/// Per-user activity counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub favorites: i64,
    pub likes: i64,
    pub submissions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path_segment() {
        assert_eq!(RelationshipKind::from_str("favorites").unwrap(), RelationshipKind::Favorite);
        assert_eq!(RelationshipKind::from_str("LIKE").unwrap(), RelationshipKind::Like);
        assert!(RelationshipKind::from_str("bookmark").is_err());
    }

    #[test]
    fn test_toggle_action_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ToggleAction::Added).unwrap(), "added");
        assert_eq!(serde_json::to_value(ToggleAction::Removed).unwrap(), "removed");
    }
}
