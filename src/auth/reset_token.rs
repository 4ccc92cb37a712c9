use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::AppError;

type HmacSha256 = Hmac<Sha256>;

const RESET_TOKEN_TTL_SECS: i64 = 10 * 60;

/// Generate a password-reset token valid for 10 minutes.
/// Token format: base64(user_id:expiry_timestamp:hmac_signature)
///
/// The signature also covers the account's current password hash, so the token stops
/// validating as soon as the password is changed.
pub fn generate_reset_token(user_id: Uuid, password_hash: &str, secret: &str) -> Result<String, AppError> {
    let expiry_time = chrono::Utc::now().timestamp() + RESET_TOKEN_TTL_SECS;

    let payload = format!("{}:{}", user_id, expiry_time);
    let signature = create_hmac_signature(&payload, password_hash, secret)?;

    let token_data = format!("{}:{}", payload, signature);
    Ok(STANDARD.encode(token_data.as_bytes()))
}

/// Decoded but not yet verified reset token.
#[derive(Debug)]
pub struct ResetToken {
    pub user_id: Uuid,
    expiry_time: i64,
    signature: String,
}

impl ResetToken {
    pub fn parse(token: &str) -> Result<Self, AppError> {
        let decoded_bytes = STANDARD
            .decode(token.trim())
            .map_err(|_| AppError::Unauthorized("Invalid token format".to_string()))?;

        let decoded = String::from_utf8(decoded_bytes)
            .map_err(|_| AppError::Unauthorized("Invalid token encoding".to_string()))?;

        // Parse token: user_id:expiry_time:signature
        let mut parts = decoded.splitn(3, ':');
        let (Some(user_id), Some(expiry_time), Some(signature)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AppError::Unauthorized("Invalid token structure".to_string()));
        };

        Ok(Self {
            user_id: user_id
                .parse()
                .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?,
            expiry_time: expiry_time
                .parse()
                .map_err(|_| AppError::Unauthorized("Invalid expiry time in token".to_string()))?,
            signature: signature.to_string(),
        })
    }

    /// Checks expiry and signature against the account's current password hash.
    pub fn verify(&self, password_hash: &str, secret: &str) -> Result<(), AppError> {
        if chrono::Utc::now().timestamp() > self.expiry_time {
            return Err(AppError::Unauthorized(
                "Reset token has expired. Please request a new code.".to_string(),
            ));
        }

        let payload = format!("{}:{}", self.user_id, self.expiry_time);
        let expected = create_hmac_signature(&payload, password_hash, secret)?;

        if !bool::from(expected.as_bytes().ct_eq(self.signature.as_bytes())) {
            return Err(AppError::Unauthorized("Invalid reset token".to_string()));
        }
        Ok(())
    }
}

/// Create HMAC-SHA256 signature for the given data
fn create_hmac_signature(data: &str, password_hash: &str, secret: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC initialization error: {}", e)))?;

    mac.update(data.as_bytes());
    mac.update(b":");
    mac.update(password_hash.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}
