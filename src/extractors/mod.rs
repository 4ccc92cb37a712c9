pub mod auth;
pub mod permissions;

pub use auth::AuthenticatedUser;
pub use permissions::{ensure_owner, ensure_owner_or_admin, require_role};
