pub mod auth;
pub mod rate_limit;

pub use auth::{admin_auth, AdminIdentity};
pub use rate_limit::{contact_rate_limit, RateLimiter};
