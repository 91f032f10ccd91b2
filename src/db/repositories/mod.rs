//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the storage operations for one entity.

pub mod content;
pub mod relationship;
pub mod user;

pub use content::{ContentRepository, SqlxContentRepository};
pub use relationship::{RelationshipRepository, SqlxRelationshipRepository};
pub use user::{SqlxUserRepository, UserRepository};
