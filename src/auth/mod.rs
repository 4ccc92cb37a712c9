pub mod claims;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod reset_token;

pub use jwt::{issue_token, validate_token};
pub use otp::{LogDelivery, OtpCache, OtpDelivery, WebhookDelivery};
pub use password::{hash_password, verify_password};
pub use reset_token::{generate_reset_token, ResetToken};
