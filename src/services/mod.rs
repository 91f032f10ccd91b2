//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They own:
//! - Validation and normalisation of input
//! - Role checks and visibility rules
//! - The moderation and toggle state changes
//! - Change notifications through the hook manager

pub mod content;
pub mod error;
pub mod moderation;
pub mod password;
pub mod query;
pub mod relationship;
pub mod token;
pub mod user;

pub use content::ContentService;
pub use error::{ServiceError, ServiceResult};
pub use moderation::{parse_target_status, ModerationService};
pub use password::{hash_password, verify_password};
pub use query::{ListRequest, QueryComposer};
pub use relationship::RelationshipService;
pub use token::{Claims, IssuedToken, TokenIssuer};
pub use user::{AuthSession, UserService};
