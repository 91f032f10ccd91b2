//! Data models
//!
//! Entities stored by the repositories plus the request and response shapes
//! the services exchange with the HTTP layer.

mod content;
mod pagination;
mod relationship;
mod user;

pub use content::{
    ContentFilter, ContentItem, ContentKind, ContentStatus, ContentView, NewContentItem, SortKey,
    StatusFilter,
};
pub use pagination::{ListParams, PagedResult, MAX_PER_PAGE};
pub use relationship::{RelatedItem, RelationshipKind, ToggleAction, UserStats};
pub use user::{ProfileUpdate, RegisterInput, User, UserRole, UserStatus};
