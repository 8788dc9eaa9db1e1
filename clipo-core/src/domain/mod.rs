//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O.

pub mod auth;
pub mod clicks;
pub mod identity;
pub mod link;
pub mod result;

pub use auth::{AuthMode, AuthResponse, Credentials, Registration};
pub use clicks::{ClickCount, DateRange};
pub use identity::UserIdentity;
pub use link::ShortLink;
